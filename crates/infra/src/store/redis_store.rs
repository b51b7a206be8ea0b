//! Redis-backed player store + leaderboard.
//!
//! Player records are JSON strings under `player:<id>`; the leaderboard is
//! a sorted set, so `increment` maps to ZINCRBY and `top` to ZREVRANGE.

use redis::Commands;

use skirmish_core::PlayerId;
use skirmish_players::Player;

use super::{Leaderboard, LeaderboardEntry, PlayerStore, StoreError};

const PLAYER_KEY_PREFIX: &str = "player:";
const LEADERBOARD_KEY: &str = "leaderboard";

#[derive(Debug, Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { client })
    }

    fn connection(&self) -> Result<redis::Connection, StoreError> {
        self.client
            .get_connection()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn player_key(id: PlayerId) -> String {
        format!("{PLAYER_KEY_PREFIX}{id}")
    }
}

impl PlayerStore for RedisStore {
    fn get(&self, id: PlayerId) -> Result<Option<Player>, StoreError> {
        let mut conn = self.connection()?;
        let raw: Option<String> = conn
            .get(Self::player_key(id))
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match raw {
            Some(json) => {
                let player = serde_json::from_str(&json)
                    .map_err(|e| StoreError::Serialize(e.to_string()))?;
                Ok(Some(player))
            }
            None => Ok(None),
        }
    }

    fn put(&self, player: &Player) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(player).map_err(|e| StoreError::Serialize(e.to_string()))?;
        let mut conn = self.connection()?;
        conn.set::<_, _, ()>(Self::player_key(player.id), json)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

impl Leaderboard for RedisStore {
    fn insert(&self, id: PlayerId, score: i64) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        conn.zadd::<_, _, _, ()>(LEADERBOARD_KEY, id.to_string(), score)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    fn increment(&self, id: PlayerId, delta: i64) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        conn.zincr::<_, _, _, ()>(LEADERBOARD_KEY, id.to_string(), delta)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    fn top(&self, n: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection()?;
        let rows: Vec<(String, f64)> = conn
            .zrevrange_withscores(LEADERBOARD_KEY, 0, n as isize - 1)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(member, score)| {
                // Skip members that are not player ids rather than failing
                // the whole read.
                member.parse().ok().map(|player_id| LeaderboardEntry {
                    player_id,
                    score: score as i64,
                })
            })
            .collect())
    }
}
