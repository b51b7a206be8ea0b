use serde::{Deserialize, Serialize};

use skirmish_core::{DomainError, DomainResult, PlayerId};

/// Upper bound on gold and silver balances.
pub const MAX_BALANCE: u64 = 1_000_000_000;
/// Maximum display-name length.
pub const MAX_NAME_LEN: usize = 20;
/// Maximum description length.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// A persisted player record.
///
/// Owned by the storage layer; mutated only while the player's resource
/// lock is held. The copy handed to combat resolution is a point-in-time
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub description: String,
    pub gold: u64,
    pub silver: u64,
    pub attack: u32,
    /// Percentage-like hit threshold: an incoming roll in [0, 100] must
    /// exceed this to land.
    pub defense: u32,
    pub hit_points: u32,
}

impl Player {
    /// Register a new player from a validated draft, assigning a fresh id.
    pub fn register(draft: PlayerDraft) -> DomainResult<Self> {
        draft.validate()?;
        Ok(Self {
            id: PlayerId::new(),
            name: draft.name,
            description: draft.description,
            gold: draft.gold,
            silver: draft.silver,
            attack: draft.attack,
            defense: draft.defense,
            hit_points: draft.hit_points,
        })
    }
}

/// Registration input, validated before a `Player` exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub gold: u64,
    pub silver: u64,
    pub attack: u32,
    pub defense: u32,
    pub hit_points: u32,
}

impl PlayerDraft {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.is_empty() || self.name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::validation(format!(
                "name must be 1..={MAX_NAME_LEN} characters"
            )));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(DomainError::validation(format!(
                "description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if self.gold > MAX_BALANCE {
            return Err(DomainError::validation(format!(
                "gold should be less than or equal to {MAX_BALANCE}"
            )));
        }
        if self.silver > MAX_BALANCE {
            return Err(DomainError::validation(format!(
                "silver should be less than or equal to {MAX_BALANCE}"
            )));
        }
        if self.hit_points == 0 {
            return Err(DomainError::validation("hit_points must be at least 1"));
        }
        Ok(())
    }
}
