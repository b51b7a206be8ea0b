//! Battle orchestration.
//!
//! The orchestrator is the only place that mutates player records, and it
//! does so while holding both combatants' resource locks. Locks are
//! acquired in sorted key order so two workers racing on the same pair in
//! swapped roles always contend at the first key instead of deadlocking,
//! and every exit path releases whatever was acquired (guards).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use skirmish_combat::resolve;
use skirmish_players::Player;

use crate::jobs::{Job, JobResult};
use crate::lock::{LockError, LockGuard, LockStore, ResourceLock};
use crate::store::{Leaderboard, PlayerStore, StoreError};

/// Kind tag routing battle jobs to the orchestrator.
pub const BATTLE_JOB_KIND: &str = "battle.resolve";

/// Lock TTL per combatant. Longer than worst-case resolution plus
/// persistence, so a live worker is never preempted mid-update; expiry only
/// matters for a holder that crashed without releasing.
pub const LOCK_TTL: Duration = Duration::from_secs(10);

/// Payload of a queued battle job: both snapshots, captured at submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleJobPayload {
    pub attacker: Player,
    pub defender: Player,
}

/// The persisted effect of a battle, echoed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleOutcome {
    /// Winner with post-battle balances.
    pub winner: Player,
    /// Loser with post-battle balances.
    pub loser: Player,
    pub gold_loot: u64,
    pub silver_loot: u64,
    pub log: Vec<String>,
}

/// Failure taxonomy for `manage`.
///
/// The classes drive the retry decision: only contention is worth
/// retrying, an invalid combatant is a caller bug, and an internal fault
/// must not be blindly re-applied (the mutation may have partially
/// persisted).
#[derive(Debug, Clone, thiserror::Error)]
pub enum BattleError {
    #[error("invalid combatant: {0}")]
    InvalidCombatant(String),
    #[error("resource busy: {0}")]
    Contention(String),
    #[error("internal fault: {0}")]
    Internal(String),
}

impl From<StoreError> for BattleError {
    fn from(e: StoreError) -> Self {
        BattleError::Internal(e.to_string())
    }
}

impl From<LockError> for BattleError {
    fn from(e: LockError) -> Self {
        BattleError::Internal(e.to_string())
    }
}

/// Resolves battles under per-player mutual exclusion.
pub struct BattleOrchestrator<S, L> {
    store: S,
    locks: L,
    lock_ttl: Duration,
}

impl<S, L> BattleOrchestrator<S, L>
where
    S: PlayerStore + Leaderboard,
    L: LockStore + Clone,
{
    pub fn new(store: S, locks: L) -> Self {
        Self {
            store,
            locks,
            lock_ttl: LOCK_TTL,
        }
    }

    /// Override the lock TTL (tests exercise expiry with short values).
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Resolve one battle end to end: lock both combatants, run combat,
    /// persist the loot transfer and leaderboard delta, release.
    ///
    /// Self-battles are rejected at the submission boundary; this method
    /// assumes validated, freshly fetched snapshots.
    pub fn manage(
        &self,
        attacker: &Player,
        defender: &Player,
    ) -> Result<BattleOutcome, BattleError> {
        // Canonical ordering: sorting by derived key is the sole
        // deadlock-avoidance mechanism, so (A,B) and (B,A) always acquire
        // in the same relative order.
        let mut locks = vec![
            ResourceLock::for_player(self.locks.clone(), attacker.id, self.lock_ttl),
            ResourceLock::for_player(self.locks.clone(), defender.id, self.lock_ttl),
        ];
        locks.sort_by(|a, b| a.key().cmp(b.key()));

        let mut guards: Vec<LockGuard<L>> = Vec::with_capacity(locks.len());
        for lock in locks {
            let key = lock.key().to_string();
            match lock.try_acquire()? {
                Some(guard) => guards.push(guard),
                // Guards drop here, releasing anything already acquired;
                // the caller's retry policy re-attempts the whole job.
                None => return Err(BattleError::Contention(format!("{key} is held"))),
            }
        }

        info!(attacker = %attacker.name, defender = %defender.name, "battle started");
        let result = self.settle(attacker, defender);
        match &result {
            Ok(outcome) => info!(
                winner = %outcome.winner.name,
                loser = %outcome.loser.name,
                gold_loot = outcome.gold_loot,
                silver_loot = outcome.silver_loot,
                "battle resolved"
            ),
            Err(e) => warn!(error = %e, "battle failed under lock"),
        }
        // Guards drop on return: both locks are released on success and on
        // every failure path alike.
        result
    }

    /// The critical section: combat plus the persisted mutation. Called
    /// only with both locks held.
    fn settle(&self, attacker: &Player, defender: &Player) -> Result<BattleOutcome, BattleError> {
        let result = resolve(&mut rand::thread_rng(), attacker, defender);
        for entry in &result.log {
            debug!("{entry}");
        }

        let mut winner = result.winner;
        let mut loser = result.loser;

        winner.gold += result.gold_loot;
        winner.silver += result.silver_loot;
        loser.gold = loser
            .gold
            .checked_sub(result.gold_loot)
            .ok_or_else(|| BattleError::Internal("loot exceeds loser gold".to_string()))?;
        loser.silver = loser
            .silver
            .checked_sub(result.silver_loot)
            .ok_or_else(|| BattleError::Internal("loot exceeds loser silver".to_string()))?;

        self.store.put(&winner)?;
        self.store.put(&loser)?;
        self.store
            .increment(winner.id, (result.gold_loot + result.silver_loot) as i64)?;

        Ok(BattleOutcome {
            winner,
            loser,
            gold_loot: result.gold_loot,
            silver_loot: result.silver_loot,
            log: result.log,
        })
    }
}

/// Job-side adapter: deserialize the payload, run `manage`, and map the
/// error class onto the queue's retry semantics. Only contention retries;
/// bad payloads and internal faults go straight to the dead-letter queue.
pub fn handle_battle_job<S, L>(
    orchestrator: &BattleOrchestrator<S, L>,
    job: &Job,
) -> JobResult
where
    S: PlayerStore + Leaderboard,
    L: LockStore + Clone,
{
    let payload: BattleJobPayload = match serde_json::from_value(job.payload.clone()) {
        Ok(p) => p,
        Err(e) => {
            let err = BattleError::InvalidCombatant(format!("malformed battle payload: {e}"));
            return JobResult::Discard(err.to_string());
        }
    };

    match orchestrator.manage(&payload.attacker, &payload.defender) {
        Ok(_) => JobResult::Success,
        Err(e @ BattleError::Contention(_)) => JobResult::Retry(e.to_string()),
        Err(e) => JobResult::Discard(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use skirmish_core::PlayerId;
    use skirmish_players::PlayerDraft;

    use crate::jobs::{InMemoryJobStore, JobExecutor, JobStore, RetryPolicy};
    use crate::lock::InMemoryLockStore;
    use crate::store::InMemoryStore;

    type TestOrchestrator = BattleOrchestrator<Arc<InMemoryStore>, Arc<InMemoryLockStore>>;

    fn player(name: &str) -> Player {
        Player::register(PlayerDraft {
            name: name.to_string(),
            description: "A brave warrior".to_string(),
            gold: 100,
            silver: 50,
            attack: 20,
            defense: 10,
            hit_points: 100,
        })
        .unwrap()
    }

    fn setup() -> (Arc<InMemoryStore>, Arc<InMemoryLockStore>, TestOrchestrator) {
        let store = Arc::new(InMemoryStore::new());
        let locks = Arc::new(InMemoryLockStore::new());
        let orchestrator = BattleOrchestrator::new(store.clone(), locks.clone());
        (store, locks, orchestrator)
    }

    fn seed(store: &InMemoryStore, player: &Player) {
        store.put(player).unwrap();
        store.insert(player.id, 0).unwrap();
    }

    fn total_wealth(store: &InMemoryStore, a: PlayerId, b: PlayerId) -> u64 {
        let pa = store.get(a).unwrap().unwrap();
        let pb = store.get(b).unwrap().unwrap();
        pa.gold + pa.silver + pb.gold + pb.silver
    }

    #[test]
    fn loot_is_conserved_and_scored() {
        let (store, _locks, orchestrator) = setup();
        let attacker = player("Attacker");
        let defender = player("Defender");
        seed(&store, &attacker);
        seed(&store, &defender);

        let before = total_wealth(&store, attacker.id, defender.id);
        let outcome = orchestrator.manage(&attacker, &defender).unwrap();
        let after = total_wealth(&store, attacker.id, defender.id);

        assert_eq!(before, after, "gold+silver must be conserved");

        // Equal 100 gold / 50 silver stakes: ceil of 5..10%.
        assert!((5..=10).contains(&outcome.gold_loot));
        assert!((3..=5).contains(&outcome.silver_loot));

        let winner = store.get(outcome.winner.id).unwrap().unwrap();
        let loser = store.get(outcome.loser.id).unwrap().unwrap();
        assert_eq!(winner.gold, 100 + outcome.gold_loot);
        assert_eq!(winner.silver, 50 + outcome.silver_loot);
        assert_eq!(loser.gold, 100 - outcome.gold_loot);
        assert_eq!(loser.silver, 50 - outcome.silver_loot);

        let top = store.top(2).unwrap();
        assert_eq!(top[0].player_id, outcome.winner.id);
        assert_eq!(
            top[0].score,
            (outcome.gold_loot + outcome.silver_loot) as i64
        );
    }

    #[test]
    fn held_lock_aborts_with_contention_and_releases_the_other() {
        let (store, locks, orchestrator) = setup();
        let attacker = player("Attacker");
        let defender = player("Defender");
        seed(&store, &attacker);
        seed(&store, &defender);

        let _blocker = ResourceLock::for_player(locks.clone(), defender.id, LOCK_TTL)
            .try_acquire()
            .unwrap()
            .unwrap();

        let err = orchestrator.manage(&attacker, &defender).unwrap_err();
        assert!(matches!(err, BattleError::Contention(_)), "{err}");

        // The attacker's lock (whichever sort position it took) must have
        // been released during the abort.
        let reacquire = ResourceLock::for_player(locks.clone(), attacker.id, LOCK_TTL)
            .try_acquire()
            .unwrap();
        assert!(reacquire.is_some());
    }

    #[test]
    fn both_locks_are_free_after_success() {
        let (store, locks, orchestrator) = setup();
        let attacker = player("Attacker");
        let defender = player("Defender");
        seed(&store, &attacker);
        seed(&store, &defender);

        orchestrator.manage(&attacker, &defender).unwrap();

        for id in [attacker.id, defender.id] {
            let guard = ResourceLock::for_player(locks.clone(), id, LOCK_TTL)
                .try_acquire()
                .unwrap();
            assert!(guard.is_some(), "lock for {id} still held after manage");
        }
    }

    #[test]
    fn self_battle_degrades_to_contention() {
        // The boundary rejects self-battles; if one slips through, the
        // second acquisition on the same key fails and nothing is mutated.
        let (store, _locks, orchestrator) = setup();
        let fighter = player("Narcissus");
        seed(&store, &fighter);

        let err = orchestrator.manage(&fighter, &fighter).unwrap_err();
        assert!(matches!(err, BattleError::Contention(_)));

        let stored = store.get(fighter.id).unwrap().unwrap();
        assert_eq!(stored.gold, 100);
        assert_eq!(stored.silver, 50);
    }

    #[test]
    fn swapped_role_battles_never_deadlock() {
        let (store, locks, _) = setup();
        let a = player("Castor");
        let b = player("Pollux");
        seed(&store, &a);
        seed(&store, &b);

        let before = total_wealth(&store, a.id, b.id);

        let mut handles = Vec::new();
        for (attacker, defender) in [(a.clone(), b.clone()), (b.clone(), a.clone())] {
            let store = store.clone();
            let locks = locks.clone();
            handles.push(thread::spawn(move || {
                let orchestrator = BattleOrchestrator::new(store, locks);
                let mut completed = 0u32;
                let mut contended = 0u32;
                for _ in 0..50 {
                    match orchestrator.manage(&attacker, &defender) {
                        Ok(_) => completed += 1,
                        Err(BattleError::Contention(_)) => contended += 1,
                        Err(e) => panic!("unexpected battle failure: {e}"),
                    }
                }
                (completed, contended)
            }));
        }

        let mut total_completed = 0;
        for handle in handles {
            let (completed, _contended) = handle.join().expect("worker thread panicked");
            total_completed += completed;
        }

        assert!(total_completed > 0, "no battle ever completed");
        assert_eq!(before, total_wealth(&store, a.id, b.id));
    }

    #[test]
    fn malformed_payload_is_discarded_not_retried() {
        let (_, _, orchestrator) = setup();
        let job = Job::new(
            BATTLE_JOB_KIND,
            serde_json::json!({"attacker": {"id": "nope"}}),
        );

        let result = handle_battle_job(&orchestrator, &job);
        assert!(matches!(result, JobResult::Discard(_)), "{result:?}");
    }

    #[test]
    fn missing_defender_is_discarded_not_retried() {
        let (_, _, orchestrator) = setup();
        let payload = serde_json::json!({ "attacker": player("Attacker") });
        let job = Job::new(BATTLE_JOB_KIND, payload);

        let result = handle_battle_job(&orchestrator, &job);
        assert!(matches!(result, JobResult::Discard(_)), "{result:?}");
    }

    #[test]
    fn contention_maps_to_retry() {
        let (store, locks, orchestrator) = setup();
        let attacker = player("Attacker");
        let defender = player("Defender");
        seed(&store, &attacker);
        seed(&store, &defender);

        let _blocker = ResourceLock::for_player(locks.clone(), attacker.id, LOCK_TTL)
            .try_acquire()
            .unwrap()
            .unwrap();

        let payload = serde_json::to_value(BattleJobPayload {
            attacker: attacker.clone(),
            defender: defender.clone(),
        })
        .unwrap();
        let job = Job::new(BATTLE_JOB_KIND, payload);

        let result = handle_battle_job(&orchestrator, &job);
        assert!(matches!(result, JobResult::Retry(_)), "{result:?}");
    }

    #[test]
    fn queued_battle_resolves_through_the_executor() {
        let (store, locks, _) = setup();
        let attacker = player("Attacker");
        let defender = player("Defender");
        seed(&store, &attacker);
        seed(&store, &defender);

        let jobs = InMemoryJobStore::arc();
        let orchestrator = Arc::new(BattleOrchestrator::new(store.clone(), locks));
        let mut executor = JobExecutor::new(jobs.clone());
        {
            let orchestrator = orchestrator.clone();
            executor.register_handler(BATTLE_JOB_KIND, move |job| {
                handle_battle_job(&orchestrator, job)
            });
        }

        let payload = serde_json::to_value(BattleJobPayload {
            attacker: attacker.clone(),
            defender: defender.clone(),
        })
        .unwrap();
        let job = Job::new(BATTLE_JOB_KIND, payload)
            .with_retry_policy(RetryPolicy::linear(4, Duration::from_secs(1)));
        jobs.enqueue(job).unwrap();

        let before = total_wealth(&store, attacker.id, defender.id);
        let mut claimed = jobs.claim_next().unwrap().unwrap();
        executor.execute_one(&mut claimed).unwrap();

        assert_eq!(before, total_wealth(&store, attacker.id, defender.id));

        // Exactly one side gained, by the loot bounds of equal stakes.
        let pa = store.get(attacker.id).unwrap().unwrap();
        let pb = store.get(defender.id).unwrap().unwrap();
        let (winner, loser) = if pa.gold > 100 { (pa, pb) } else { (pb, pa) };
        assert!((105..=110).contains(&winner.gold));
        assert!((53..=55).contains(&winner.silver));
        assert_eq!(winner.gold - 100, 100 - loser.gold);
        assert_eq!(winner.silver - 50, 50 - loser.silver);
    }
}
