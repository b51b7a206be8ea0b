//! `skirmish-players` — the player record and its registration rules.

pub mod player;

pub use player::{Player, PlayerDraft, MAX_BALANCE, MAX_DESCRIPTION_LEN, MAX_NAME_LEN};
