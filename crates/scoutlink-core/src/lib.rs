//! Core data model for scoutlink transfers: scouting records, content-derived
//! entry identity, payload classification, and the merge engine.
//!
//! Everything here is pure and deterministic. Two devices that share nothing
//! but this crate derive the same id for the same observation and the same
//! merge result for the same inputs, which is what makes offline QR transfer
//! safe to repeat.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod entry;
mod error;
mod merge;
mod payload;

pub use entry::*;
pub use error::*;
pub use merge::*;
pub use payload::*;
