//! Dataset store interface and in-memory implementation.
//!
//! A device keeps one row list per category; a transfer always replaces a
//! whole category after merging, never individual rows.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Dataset categories a device keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    /// Match scouting records.
    Scouting,
    /// Scouter profiles and their prediction state.
    ScouterProfiles,
    /// Pit scouting rows, including pit images.
    PitScouting,
}

impl DataCategory {
    /// Every category, in storage order.
    pub const ALL: [Self; 3] = [Self::Scouting, Self::ScouterProfiles, Self::PitScouting];

    /// Stable storage key for this category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scouting => "scouting",
            Self::ScouterProfiles => "scouter_profiles",
            Self::PitScouting => "pit_scouting",
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataCategory {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| StoreError::UnknownCategory { name: s.to_owned() })
    }
}

/// Category-keyed dataset storage.
///
/// `read_all`/`write_all` move whole categories; the merge engine owns the
/// row-level semantics.
pub trait DatasetStore: Send + Sync {
    /// Read every row of a category. A category never written reads as empty.
    ///
    /// # Errors
    /// I/O or deserialization failure of the backing storage.
    fn read_all(&self, category: DataCategory) -> Result<Vec<Value>, StoreError>;

    /// Replace a category with `rows`.
    ///
    /// # Errors
    /// I/O or serialization failure; on error the previous rows remain.
    fn write_all(&self, category: DataCategory, rows: &[Value]) -> Result<(), StoreError>;
}

/// In-memory dataset store.
///
/// Suitable for tests and for scan sessions that only report.
#[derive(Debug, Default)]
pub struct MemoryDatasetStore {
    rows: RwLock<HashMap<DataCategory, Vec<Value>>>,
}

impl MemoryDatasetStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatasetStore for MemoryDatasetStore {
    fn read_all(&self, category: DataCategory) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .rows
            .read()
            .get(&category)
            .cloned()
            .unwrap_or_default())
    }

    fn write_all(&self, category: DataCategory, rows: &[Value]) -> Result<(), StoreError> {
        self.rows.write().insert(category, rows.to_vec());
        Ok(())
    }
}
