//! Snapshot persistence backends.

use crate::error::MemoryError;
use crate::snapshot::{SNAPSHOT_VERSION, Snapshot, SnapshotEntry};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Storage for store snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot, replacing any previous one.
    fn save(&self, snapshot: &Snapshot) -> Result<(), MemoryError>;

    /// Load the last saved snapshot, if any.
    fn load(&self) -> Result<Option<Snapshot>, MemoryError>;
}

/// One JSONL line of a snapshot file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SnapshotLine {
    Header { version: u32, dimension: usize },
    Entry(SnapshotEntry),
}

/// JSONL snapshot file: a header line followed by one entry per line.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        info!("initialized snapshot store (path={})", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl SnapshotStore for FileSnapshotStore {
    /// Write to a temp file then rename over the target.
    fn save(&self, snapshot: &Snapshot) -> Result<(), MemoryError> {
        let temp_path = self.temp_path();
        {
            let file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            let mut writer = BufWriter::new(file);
            let header = SnapshotLine::Header {
                version: snapshot.version,
                dimension: snapshot.dimension,
            };
            writeln!(writer, "{}", serde_json::to_string(&header)?)?;
            for entry in &snapshot.entries {
                let line = serde_json::to_string(&SnapshotLine::Entry(entry.clone()))?;
                writeln!(writer, "{line}")?;
            }
            writer.flush()?;
        }
        fs::rename(&temp_path, &self.path)?;
        info!(
            "snapshot saved (path={}, entries={})",
            self.path.display(),
            snapshot.entries.len()
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, MemoryError> {
        if !self.path.exists() {
            debug!("no snapshot found (path={})", self.path.display());
            return Ok(None);
        }
        let file = OpenOptions::new().read(true).open(&self.path)?;
        let reader = BufReader::new(file);
        let mut header = None;
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SnapshotLine>(&line)? {
                SnapshotLine::Header { version, dimension } => {
                    if version > SNAPSHOT_VERSION {
                        return Err(MemoryError::UnsupportedSnapshot(version));
                    }
                    header = Some((version, dimension));
                }
                SnapshotLine::Entry(entry) => entries.push(entry),
            }
        }
        let (version, dimension) = header.ok_or_else(|| {
            MemoryError::InvalidInput(format!(
                "snapshot {} has no header line",
                self.path.display()
            ))
        })?;
        debug!(
            "snapshot loaded (path={}, entries={})",
            self.path.display(),
            entries.len()
        );
        Ok(Some(Snapshot {
            version,
            dimension,
            entries,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{FileSnapshotStore, SnapshotStore};
    use crate::snapshot::{Snapshot, SnapshotEntry};
    use crate::{MemoryError, Metadata, MetadataValue, RecordId};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn entry(vector: Vec<f32>) -> SnapshotEntry {
        let now = Utc::now();
        let mut metadata = Metadata::new();
        metadata.insert("success".to_string(), MetadataValue::Bool(true));
        SnapshotEntry {
            id: RecordId::new(),
            vector,
            text: "remember me".to_string(),
            object_type: "command".to_string(),
            metadata,
            importance: 0.7,
            created_at: now,
            last_accessed_at: now,
            access_count: 3,
        }
    }

    #[test]
    fn missing_file_loads_none() {
        let temp = tempdir().expect("tempdir");
        let store = FileSnapshotStore::new(temp.path().join("snap.jsonl")).expect("store");
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn save_then_load_preserves_entries() {
        let temp = tempdir().expect("tempdir");
        let store =
            FileSnapshotStore::new(temp.path().join("nested").join("snap.jsonl")).expect("store");
        let snapshot = Snapshot::new(
            3,
            vec![entry(vec![0.1, 0.2, 1.0 / 3.0]), entry(vec![1.0, 0.0, 0.0])],
        );

        store.save(&snapshot).expect("save");
        let loaded = store.load().expect("load").expect("snapshot");
        assert_eq!(loaded, snapshot);
        assert!(!temp.path().join("nested").join("snap.jsonl.tmp").exists());
    }

    #[test]
    fn newer_versions_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("snap.jsonl");
        std::fs::write(&path, "{\"type\":\"header\",\"version\":99,\"dimension\":3}\n")
            .expect("write");
        let store = FileSnapshotStore::new(&path).expect("store");
        let err = store.load().unwrap_err();
        assert!(matches!(err, MemoryError::UnsupportedSnapshot(99)));
    }

    #[test]
    fn headerless_file_is_invalid() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("snap.jsonl");
        std::fs::write(&path, "\n").expect("write");
        let store = FileSnapshotStore::new(&path).expect("store");
        assert!(matches!(store.load(), Err(MemoryError::InvalidInput(_))));
    }
}
