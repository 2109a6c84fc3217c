//! Category-keyed dataset storage for scoutlink devices.
//!
//! The transfer pipeline treats storage as three opaque row lists
//! (match scouting, scouter profiles, pit scouting) that are read whole,
//! merged, and written back whole. This crate provides the trait for that
//! plus two backends: an in-memory store for tests and dry runs, and a
//! JSON-file store with atomic replacement for real devices.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod error;
mod json_file;
mod store;

pub use error::StoreError;
pub use json_file::JsonFileStore;
pub use store::{DataCategory, DatasetStore, MemoryDatasetStore};
