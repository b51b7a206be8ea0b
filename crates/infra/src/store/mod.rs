//! Persistence seams for player records and the leaderboard.

mod in_memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use in_memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use std::sync::Arc;

use serde::Serialize;

use skirmish_core::PlayerId;
use skirmish_players::Player;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("snapshot serialization error: {0}")]
    Serialize(String),
}

/// Keyed access to player records (JSON-serializable snapshots).
///
/// Writes must happen only while the writer holds that player's resource
/// lock; the store itself does not enforce this.
pub trait PlayerStore: Send + Sync {
    fn get(&self, id: PlayerId) -> Result<Option<Player>, StoreError>;
    fn put(&self, player: &Player) -> Result<(), StoreError>;
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub score: i64,
}

/// Global score ranking.
pub trait Leaderboard: Send + Sync {
    /// Seed a player's score (registration time), overwriting any previous
    /// value.
    fn insert(&self, id: PlayerId, score: i64) -> Result<(), StoreError>;

    /// Atomic score increment; takes no resource lock.
    fn increment(&self, id: PlayerId, delta: i64) -> Result<(), StoreError>;

    /// Top `n` entries by descending score.
    fn top(&self, n: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

impl<S: PlayerStore + ?Sized> PlayerStore for Arc<S> {
    fn get(&self, id: PlayerId) -> Result<Option<Player>, StoreError> {
        (**self).get(id)
    }

    fn put(&self, player: &Player) -> Result<(), StoreError> {
        (**self).put(player)
    }
}

impl<S: Leaderboard + ?Sized> Leaderboard for Arc<S> {
    fn insert(&self, id: PlayerId, score: i64) -> Result<(), StoreError> {
        (**self).insert(id, score)
    }

    fn increment(&self, id: PlayerId, delta: i64) -> Result<(), StoreError> {
        (**self).increment(id, delta)
    }

    fn top(&self, n: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        (**self).top(n)
    }
}
