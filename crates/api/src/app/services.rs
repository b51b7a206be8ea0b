//! Service wiring: stores, locks, and the background battle worker.
//!
//! In-memory backends are the default; the `redis` feature adds
//! Redis-backed players, leaderboard, and locks, selected at startup via
//! `REDIS_URL`. The job queue itself stays in-process either way.

use std::sync::Arc;
use std::time::Duration;

use skirmish_core::PlayerId;
use skirmish_infra::jobs::{
    InMemoryJobStore, Job, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobId, JobStats,
    JobStore, JobStoreError, RetryPolicy,
};
use skirmish_infra::lock::{InMemoryLockStore, LockStore};
use skirmish_infra::store::{InMemoryStore, Leaderboard, LeaderboardEntry, PlayerStore, StoreError};
use skirmish_infra::{handle_battle_job, BattleJobPayload, BattleOrchestrator, BATTLE_JOB_KIND};
use skirmish_players::Player;

#[cfg(feature = "redis")]
use skirmish_infra::lock::RedisLockStore;
#[cfg(feature = "redis")]
use skirmish_infra::store::RedisStore;

/// First retry after 1s, then 2s, then 3s; four executions total.
const BATTLE_RETRY_BASE: Duration = Duration::from_secs(1);
const BATTLE_MAX_ATTEMPTS: u32 = 4;

/// Application services behind the HTTP handlers.
///
/// One variant per backend pairing, so handlers stay monomorphic over the
/// stores without trait objects at every call site.
pub enum AppServices {
    InMemory {
        store: Arc<InMemoryStore>,
        jobs: Arc<InMemoryJobStore>,
        executor: JobExecutorHandle,
    },
    #[cfg(feature = "redis")]
    Persistent {
        store: Arc<RedisStore>,
        jobs: Arc<InMemoryJobStore>,
        executor: JobExecutorHandle,
    },
}

/// Wire up services from the environment.
pub fn build_services() -> AppServices {
    #[cfg(feature = "redis")]
    if let Ok(url) = std::env::var("REDIS_URL") {
        match build_persistent(&url) {
            Ok(services) => return services,
            Err(e) => {
                tracing::error!(error = %e, "redis wiring failed; falling back to in-memory");
            }
        }
    }

    let store = Arc::new(InMemoryStore::new());
    let jobs = InMemoryJobStore::arc();
    let locks = Arc::new(InMemoryLockStore::new());
    let executor = spawn_battle_executor(store.clone(), locks, jobs.clone());
    tracing::info!("services wired with in-memory backends");

    AppServices::InMemory {
        store,
        jobs,
        executor,
    }
}

#[cfg(feature = "redis")]
fn build_persistent(url: &str) -> Result<AppServices, String> {
    let store = Arc::new(RedisStore::new(url).map_err(|e| e.to_string())?);
    let locks = Arc::new(RedisLockStore::new(url).map_err(|e| e.to_string())?);
    let jobs = InMemoryJobStore::arc();
    let executor = spawn_battle_executor(store.clone(), locks, jobs.clone());
    tracing::info!("services wired with redis backends");

    Ok(AppServices::Persistent {
        store,
        jobs,
        executor,
    })
}

fn spawn_battle_executor<S, L>(
    store: S,
    locks: L,
    jobs: Arc<InMemoryJobStore>,
) -> JobExecutorHandle
where
    S: PlayerStore + Leaderboard + Send + Sync + 'static,
    L: LockStore + Clone + Send + Sync + 'static,
{
    let orchestrator = Arc::new(BattleOrchestrator::new(store, locks));
    let mut executor = JobExecutor::new(jobs);
    executor.register_handler(BATTLE_JOB_KIND, move |job| {
        handle_battle_job(&orchestrator, job)
    });
    executor.spawn(JobExecutorConfig::default().with_name("battle-executor"))
}

impl AppServices {
    pub fn get_player(&self, id: PlayerId) -> Result<Option<Player>, StoreError> {
        match self {
            AppServices::InMemory { store, .. } => store.get(id),
            #[cfg(feature = "redis")]
            AppServices::Persistent { store, .. } => store.get(id),
        }
    }

    /// Persist a new player and give them a leaderboard seat at zero.
    pub fn register_player(&self, player: &Player) -> Result<(), StoreError> {
        match self {
            AppServices::InMemory { store, .. } => {
                store.put(player)?;
                store.insert(player.id, 0)
            }
            #[cfg(feature = "redis")]
            AppServices::Persistent { store, .. } => {
                store.put(player)?;
                store.insert(player.id, 0)
            }
        }
    }

    pub fn leaderboard_top(&self, n: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        match self {
            AppServices::InMemory { store, .. } => store.top(n),
            #[cfg(feature = "redis")]
            AppServices::Persistent { store, .. } => store.top(n),
        }
    }

    /// Queue a battle between two snapshots; returns the job id the caller
    /// can poll.
    pub fn enqueue_battle(&self, payload: BattleJobPayload) -> Result<JobId, JobStoreError> {
        let payload = serde_json::to_value(&payload)
            .map_err(|e| JobStoreError::Storage(e.to_string()))?;
        let job = Job::new(BATTLE_JOB_KIND, payload).with_retry_policy(RetryPolicy::linear(
            BATTLE_MAX_ATTEMPTS,
            BATTLE_RETRY_BASE,
        ));
        self.jobs().enqueue(job)
    }

    pub fn battle_job(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        self.jobs().get(id)
    }

    pub fn job_queue_stats(&self) -> Result<JobStats, JobStoreError> {
        self.jobs().stats()
    }

    pub fn executor(&self) -> &JobExecutorHandle {
        match self {
            AppServices::InMemory { executor, .. } => executor,
            #[cfg(feature = "redis")]
            AppServices::Persistent { executor, .. } => executor,
        }
    }

    fn jobs(&self) -> &Arc<InMemoryJobStore> {
        match self {
            AppServices::InMemory { jobs, .. } => jobs,
            #[cfg(feature = "redis")]
            AppServices::Persistent { jobs, .. } => jobs,
        }
    }
}
