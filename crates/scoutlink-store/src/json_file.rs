//! File-backed dataset store.
//!
//! One pretty-printed JSON array per category under a root directory, named
//! by the category's storage key (`scouting.json` and friends). Writes go
//! through a sibling temp file that is synced to disk before the rename, so
//! a category file is always a complete document and an acknowledged write
//! survives a crash.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{DataCategory, DatasetStore};

/// Dataset store persisted as JSON files.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    /// I/O failure creating the root directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory the category files live in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, category: DataCategory) -> PathBuf {
        self.root.join(format!("{}.json", category.as_str()))
    }
}

impl DatasetStore for JsonFileStore {
    fn read_all(&self, category: DataCategory) -> Result<Vec<Value>, StoreError> {
        let path = self.path_for(category);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(%category, "no category file yet, reading empty");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<Value> = serde_json::from_slice(&bytes)?;
        debug!(%category, rows = rows.len(), "category read");
        Ok(rows)
    }

    fn write_all(&self, category: DataCategory, rows: &[Value]) -> Result<(), StoreError> {
        let path = self.path_for(category);
        let staged = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(rows)?;
        let mut file = fs::File::create(&staged)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&staged, &path)?;
        debug!(%category, rows = rows.len(), bytes = bytes.len(), "category written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_temp_store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_the_root_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("event/2026casd");
        let store = JsonFileStore::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.root(), nested.as_path());
    }

    #[test]
    fn unwritten_category_reads_empty() {
        let (_dir, store) = open_temp_store();
        assert!(store.read_all(DataCategory::Scouting).unwrap().is_empty());
    }

    #[test]
    fn write_then_read_roundtrips() {
        let (_dir, store) = open_temp_store();
        let rows = vec![
            json!({"id": "aa", "data": ["AB", 12.0, 254.0]}),
            json!({"id": "bb", "data": ["CD", 13.0, 118.0]}),
        ];
        store.write_all(DataCategory::Scouting, &rows).unwrap();
        assert_eq!(store.read_all(DataCategory::Scouting).unwrap(), rows);
    }

    #[test]
    fn files_are_named_by_category() {
        let (dir, store) = open_temp_store();
        for category in DataCategory::ALL {
            store.write_all(category, &[json!({})]).unwrap();
        }
        for name in ["scouting.json", "scouter_profiles.json", "pit_scouting.json"] {
            assert!(dir.path().join(name).is_file(), "{name} missing");
        }
    }

    #[test]
    fn write_replaces_and_leaves_no_temp_file() {
        let (dir, store) = open_temp_store();
        store
            .write_all(DataCategory::PitScouting, &[json!({"team": 254.0})])
            .unwrap();
        store
            .write_all(DataCategory::PitScouting, &[json!({"team": 118.0})])
            .unwrap();

        assert_eq!(
            store.read_all(DataCategory::PitScouting).unwrap(),
            vec![json!({"team": 118.0})]
        );
        assert!(!dir.path().join("pit_scouting.json.tmp").exists());
    }

    #[test]
    fn acknowledged_writes_survive_reopening_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![json!({"id": "aa", "data": ["AB", 12.0, 254.0]})];
        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            store.write_all(DataCategory::Scouting, &rows).unwrap();
        }

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.read_all(DataCategory::Scouting).unwrap(), rows);
    }

    #[test]
    fn corrupted_file_surfaces_a_serialization_error() {
        let (dir, store) = open_temp_store();
        fs::write(dir.path().join("scouting.json"), b"{ not json").unwrap();
        let err = store.read_all(DataCategory::Scouting).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn empty_file_reads_as_empty_category() {
        let (dir, store) = open_temp_store();
        fs::write(dir.path().join("scouting.json"), b"").unwrap();
        assert!(store.read_all(DataCategory::Scouting).unwrap().is_empty());
    }
}
