//! Serializable snapshot of all live records and vectors.

use crate::error::MemoryError;
use crate::model::{Embedding, MAX_IMPORTANCE, MIN_IMPORTANCE, Metadata, Record, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Exported store contents. Entry order carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub dimension: usize,
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn new(dimension: usize, entries: Vec<SnapshotEntry>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            dimension,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One exported record with its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: RecordId,
    pub vector: Vec<f32>,
    pub text: String,
    pub object_type: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub importance: f32,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    #[serde(default)]
    pub access_count: u64,
}

impl SnapshotEntry {
    pub(crate) fn from_record(record: &Record, vector: &[f32]) -> Self {
        Self {
            id: record.id,
            vector: vector.to_vec(),
            text: record.text.clone(),
            object_type: record.object_type.clone(),
            metadata: record.metadata.clone(),
            importance: record.importance,
            created_at: record.created_at,
            last_accessed_at: record.last_accessed_at,
            access_count: record.access_count,
        }
    }

    /// Reject importances that cannot be clamped into range.
    pub(crate) fn check_importance(&self) -> Result<(), MemoryError> {
        if self.importance.is_finite() {
            Ok(())
        } else {
            Err(MemoryError::InvalidInput(format!(
                "record {} has non-finite importance {}",
                self.id, self.importance
            )))
        }
    }

    /// Split into record and vector. Importance is clamped into range.
    pub(crate) fn into_parts(self) -> (Record, Embedding) {
        let record = Record {
            id: self.id,
            text: self.text,
            object_type: self.object_type,
            metadata: self.metadata,
            importance: self.importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE),
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
        };
        (record, Embedding::new(self.vector))
    }
}
