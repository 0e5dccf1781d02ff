//! Persisted assignment snapshot.
//!
//! The file holds one JSON object mapping channel name to its assignment.
//! Worker handles are never persisted; `active` only records whether a
//! worker was attached when the snapshot was written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sw_core::{Error, Result};

use crate::atomic::write_atomic;

/// Persisted form of one channel's assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// Channel name to assignment, ordered by channel name.
pub type Snapshot = BTreeMap<String, SnapshotEntry>;

/// Location of the snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. A missing file is an empty snapshot; an unreadable
    /// or corrupt file is a [`Error::Persistence`] error.
    pub fn read(&self) -> Result<Snapshot> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No snapshot file");
                return Ok(Snapshot::new());
            }
            Err(e) => return Err(Error::persistence("snapshot", e.to_string())),
        };

        serde_json::from_str(&contents)
            .map_err(|e| Error::persistence("snapshot", format!("corrupt snapshot: {e}")))
    }

    /// Atomically replace the snapshot file.
    pub fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| Error::persistence("snapshot", e.to_string()))?;
        write_atomic(&self.path, &json).map_err(|e| {
            Error::persistence(
                "snapshot",
                format!("failed to write {}: {e}", self.path.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str, active: bool) -> SnapshotEntry {
        SnapshotEntry {
            external_id: Some(id.into()),
            title: Some(title.into()),
            active,
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("state.json"));
        assert!(file.read().unwrap().is_empty());
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("data").join("state.json"));

        let mut snapshot = Snapshot::new();
        snapshot.insert("ch1".into(), entry("abc", "News", true));
        snapshot.insert("ch2".into(), SnapshotEntry::default());
        file.write(&snapshot).unwrap();

        assert_eq!(file.read().unwrap(), snapshot);
    }

    #[test]
    fn entries_without_active_flag_read_as_inactive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"ch1": {"external_id": "abc", "title": null}}"#).unwrap();

        let snapshot = SnapshotFile::new(&path).read().unwrap();
        let ch1 = &snapshot["ch1"];
        assert_eq!(ch1.external_id.as_deref(), Some("abc"));
        assert!(!ch1.active);
    }

    #[test]
    fn corrupt_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{\"ch1\": ").unwrap();

        let err = SnapshotFile::new(&path).read().unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }
}
