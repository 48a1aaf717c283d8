use chrono::{DateTime, Utc};
use mnemon_memory::{
    BackendPreference, MemoryStore, Metadata, MetadataValue, RecordId, SnapshotEntry,
    StoreOptions,
};

/// One-hot vector along `axis`.
pub fn unit(dimension: usize, axis: usize) -> Vec<f32> {
    let mut vector = vec![0.0_f32; dimension];
    if let Some(slot) = vector.get_mut(axis) {
        *slot = 1.0;
    }
    vector
}

pub fn exact_store(dimension: usize, capacity: usize) -> MemoryStore {
    MemoryStore::new(StoreOptions::new(dimension, capacity).backend(BackendPreference::Exact))
        .expect("exact store")
}

pub fn fallback_store(dimension: usize, capacity: usize) -> MemoryStore {
    MemoryStore::new(StoreOptions::new(dimension, capacity).backend(BackendPreference::Fallback))
        .expect("fallback store")
}

/// Builder for snapshot entries with controlled timestamps and counters.
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    entry: SnapshotEntry,
}

impl EntryBuilder {
    pub fn new(vector: Vec<f32>) -> Self {
        let now = Utc::now();
        Self {
            entry: SnapshotEntry {
                id: RecordId::new(),
                vector,
                text: String::new(),
                object_type: "x".to_string(),
                metadata: Metadata::new(),
                importance: 0.5,
                created_at: now,
                last_accessed_at: now,
                access_count: 0,
            },
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.entry.text = text.into();
        self
    }

    pub fn object_type(mut self, object_type: impl Into<String>) -> Self {
        self.entry.object_type = object_type.into();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.entry.metadata.insert(key.into(), value.into());
        self
    }

    pub fn importance(mut self, importance: f32) -> Self {
        self.entry.importance = importance;
        self
    }

    /// Sets both creation and last access time.
    pub fn accessed_at(mut self, at: DateTime<Utc>) -> Self {
        self.entry.created_at = at;
        self.entry.last_accessed_at = at;
        self
    }

    pub fn access_count(mut self, count: u64) -> Self {
        self.entry.access_count = count;
        self
    }

    pub fn id(&self) -> RecordId {
        self.entry.id
    }

    pub fn build(self) -> SnapshotEntry {
        self.entry
    }
}
