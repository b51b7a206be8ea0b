//! `skirmish-infra` — storage, locking, the job queue, and battle
//! orchestration.
//!
//! Every seam is a trait with an in-memory implementation for tests and
//! development; Redis-backed implementations live behind the `redis`
//! feature.

pub mod battle;
pub mod jobs;
pub mod lock;
pub mod store;

pub use battle::{
    handle_battle_job, BattleError, BattleJobPayload, BattleOrchestrator, BattleOutcome,
    BATTLE_JOB_KIND,
};
pub use lock::{LockStore, ResourceLock};
pub use store::{Leaderboard, PlayerStore};
