//! Named, time-bounded mutual exclusion backed by a shared key-value store.
//!
//! Acquisition is non-blocking create-if-absent with a TTL; release is a
//! token-checked compare-and-delete, so a delayed or expired holder can
//! never delete a newer holder's lock. The TTL bounds the damage of a
//! crashed holder that never releases.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use uuid::Uuid;

use skirmish_core::PlayerId;

/// Prefix for player resource-lock keys.
pub const LOCK_KEY_PREFIX: &str = "lock:player:";

#[derive(Debug, Clone, thiserror::Error)]
pub enum LockError {
    #[error("lock backend error: {0}")]
    Backend(String),
}

/// Store-level lock primitive.
///
/// Implementations must make both operations atomic with respect to each
/// other: `try_acquire` is create-if-absent with expiry, `release` deletes
/// only when the stored holder token matches.
pub trait LockStore: Send + Sync {
    /// Create `key` with `token` and expiry `ttl` only if absent (or
    /// expired). Returns whether acquisition succeeded. Never blocks.
    fn try_acquire(&self, key: &str, token: Uuid, ttl: Duration) -> Result<bool, LockError>;

    /// Delete `key` only if it still holds `token`. Returns whether a
    /// deletion happened. Safe to call when the key never existed, has
    /// expired, or has been re-acquired by another holder.
    fn release(&self, key: &str, token: Uuid) -> Result<bool, LockError>;
}

impl<S: LockStore + ?Sized> LockStore for Arc<S> {
    fn try_acquire(&self, key: &str, token: Uuid, ttl: Duration) -> Result<bool, LockError> {
        (**self).try_acquire(key, token, ttl)
    }

    fn release(&self, key: &str, token: Uuid) -> Result<bool, LockError> {
        (**self).release(key, token)
    }
}

/// A single named lock with a random holder token.
#[derive(Debug)]
pub struct ResourceLock<S: LockStore> {
    key: String,
    token: Uuid,
    ttl: Duration,
    store: S,
}

impl<S: LockStore> ResourceLock<S> {
    /// Lock for one player's record, keyed deterministically by id.
    pub fn for_player(store: S, player: PlayerId, ttl: Duration) -> Self {
        Self {
            key: format!("{LOCK_KEY_PREFIX}{player}"),
            token: Uuid::new_v4(),
            ttl,
            store,
        }
    }

    /// The derived key; orchestrators sort by this before acquiring.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Try to take the lock. On success the returned guard releases on
    /// drop; on contention nothing is held and `None` is returned. The
    /// caller decides whether to abort or retry at a higher level.
    pub fn try_acquire(self) -> Result<Option<LockGuard<S>>, LockError> {
        if self.store.try_acquire(&self.key, self.token, self.ttl)? {
            Ok(Some(LockGuard { lock: self }))
        } else {
            Ok(None)
        }
    }

    fn release(&self) -> Result<bool, LockError> {
        self.store.release(&self.key, self.token)
    }
}

/// Held lock; releases (token-checked) when dropped.
#[derive(Debug)]
pub struct LockGuard<S: LockStore> {
    lock: ResourceLock<S>,
}

impl<S: LockStore> LockGuard<S> {
    pub fn key(&self) -> &str {
        self.lock.key()
    }
}

impl<S: LockStore> Drop for LockGuard<S> {
    fn drop(&mut self) {
        match self.lock.release() {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(key = %self.lock.key, "lock already expired or reassigned at release")
            }
            Err(e) => tracing::warn!(key = %self.lock.key, error = %e, "failed to release lock"),
        }
    }
}

/// In-memory lock table for tests/dev. Expiry is checked at acquisition,
/// mirroring how a TTL-backed store behaves for a new claimant.
#[derive(Debug, Default)]
pub struct InMemoryLockStore {
    inner: RwLock<HashMap<String, (Uuid, Instant)>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockStore for InMemoryLockStore {
    fn try_acquire(&self, key: &str, token: Uuid, ttl: Duration) -> Result<bool, LockError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| LockError::Backend("poisoned lock table".to_string()))?;

        let now = Instant::now();
        if let Some((_, expires_at)) = map.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }
        map.insert(key.to_string(), (token, now + ttl));
        Ok(true)
    }

    fn release(&self, key: &str, token: Uuid) -> Result<bool, LockError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| LockError::Backend("poisoned lock table".to_string()))?;

        match map.get(key) {
            Some((holder, _)) if *holder == token => {
                map.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Redis-backed lock store: `SET key token NX PX ttl` to acquire, a Lua
/// compare-and-delete to release.
#[cfg(feature = "redis")]
pub struct RedisLockStore {
    client: ::redis::Client,
}

#[cfg(feature = "redis")]
impl RedisLockStore {
    const RELEASE_SCRIPT: &'static str = r#"
        if redis.call("get", KEYS[1]) == ARGV[1] then
            return redis.call("del", KEYS[1])
        else
            return 0
        end
    "#;

    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, LockError> {
        let client = ::redis::Client::open(redis_url.as_ref())
            .map_err(|e| LockError::Backend(e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "redis")]
impl LockStore for RedisLockStore {
    fn try_acquire(&self, key: &str, token: Uuid, ttl: Duration) -> Result<bool, LockError> {
        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| LockError::Backend(e.to_string()))?;

        let reply: Option<String> = ::redis::cmd("SET")
            .arg(key)
            .arg(token.to_string())
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query(&mut conn)
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(reply.is_some())
    }

    fn release(&self, key: &str, token: Uuid) -> Result<bool, LockError> {
        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| LockError::Backend(e.to_string()))?;

        let deleted: i64 = ::redis::Script::new(Self::RELEASE_SCRIPT)
            .key(key)
            .arg(token.to_string())
            .invoke(&mut conn)
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(deleted > 0)
    }
}
