//! `skirmish-combat` — pure turn-based combat resolution.
//!
//! No I/O and no shared state: given two combatant snapshots and a random
//! source, produce the winner, the loser, the loot amounts, and a
//! chronological log. Deterministic for a fixed RNG, which is what the
//! tests rely on.

pub mod resolver;

pub use resolver::{resolve, CombatResult};
