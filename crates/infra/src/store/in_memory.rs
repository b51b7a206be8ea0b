use std::collections::HashMap;
use std::sync::RwLock;

use skirmish_core::PlayerId;
use skirmish_players::Player;

use super::{Leaderboard, LeaderboardEntry, PlayerStore, StoreError};

/// In-memory player store + leaderboard for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    players: RwLock<HashMap<PlayerId, Player>>,
    scores: RwLock<HashMap<PlayerId, i64>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("poisoned store".to_string())
}

impl PlayerStore for InMemoryStore {
    fn get(&self, id: PlayerId) -> Result<Option<Player>, StoreError> {
        let players = self.players.read().map_err(|_| poisoned())?;
        Ok(players.get(&id).cloned())
    }

    fn put(&self, player: &Player) -> Result<(), StoreError> {
        let mut players = self.players.write().map_err(|_| poisoned())?;
        players.insert(player.id, player.clone());
        Ok(())
    }
}

impl Leaderboard for InMemoryStore {
    fn insert(&self, id: PlayerId, score: i64) -> Result<(), StoreError> {
        let mut scores = self.scores.write().map_err(|_| poisoned())?;
        scores.insert(id, score);
        Ok(())
    }

    fn increment(&self, id: PlayerId, delta: i64) -> Result<(), StoreError> {
        let mut scores = self.scores.write().map_err(|_| poisoned())?;
        *scores.entry(id).or_insert(0) += delta;
        Ok(())
    }

    fn top(&self, n: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let scores = self.scores.read().map_err(|_| poisoned())?;
        let mut entries: Vec<LeaderboardEntry> = scores
            .iter()
            .map(|(&player_id, &score)| LeaderboardEntry { player_id, score })
            .collect();
        // Descending score; id as a stable tie-break.
        entries.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.player_id.to_string().cmp(&b.player_id.to_string()))
        });
        entries.truncate(n);
        Ok(entries)
    }
}
