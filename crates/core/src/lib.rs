//! `skirmish-core` — domain foundation building blocks.
//!
//! Pure domain primitives shared by every other crate: strongly-typed
//! identifiers and the domain error model. No infrastructure concerns.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::PlayerId;
