//! Memory store façade keeping the vector index and record store consistent.

use crate::error::MemoryError;
use crate::index::{BackendStatus, IndexBackend, VectorIndex, open_index};
use crate::model::{
    Embedding, MAX_IMPORTANCE, MIN_IMPORTANCE, Metadata, Record, RecordId, check_vector,
};
use crate::policy::StoreOptions;
use crate::recall::{SearchHit, SearchOptions, overfetch};
use crate::records::{RecordSnapshot, RecordStore};
use crate::snapshot::{SNAPSHOT_VERSION, Snapshot, SnapshotEntry};
use chrono::Utc;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug)]
struct StoreState {
    index: Box<dyn VectorIndex>,
    records: RecordStore,
}

/// Point-in-time store diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreHealth {
    pub records: usize,
    pub index_rows: usize,
    pub tombstones: usize,
    pub tombstone_ratio: f32,
    pub capacity: usize,
    pub over_capacity: bool,
    /// Set once a consistency defect was detected; cleared by `import`.
    pub read_only: Option<String>,
    pub backend: BackendStatus,
}

/// Vector-indexed record store.
///
/// Writers (`add`, `remove`, `import`, ...) are serialized through a single
/// mutation lock and publish the index and record updates together under a
/// write lock, so readers never observe one without the other. `search` and
/// `iterate` only take the read lock.
///
/// Once a position/id mismatch is detected the store turns read-only: every
/// mutating call fails with [`MemoryError::ReadOnly`] until a snapshot is
/// imported, while searches keep working.
#[derive(Debug)]
pub struct MemoryStore {
    options: StoreOptions,
    status: BackendStatus,
    state: RwLock<StoreState>,
    mutation: Mutex<()>,
    defect: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new(options: StoreOptions) -> Result<Self, MemoryError> {
        if options.capacity == 0 {
            return Err(MemoryError::InvalidInput(
                "capacity must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&options.compaction_threshold) {
            return Err(MemoryError::InvalidInput(format!(
                "compaction threshold {} is outside [0, 1]",
                options.compaction_threshold
            )));
        }
        if let Some(threshold) = options.similarity_threshold {
            check_threshold(threshold)?;
        }
        let (index, status) = open_index(options.backend, options.dimension, options.index)?;
        info!(
            "memory store ready (dimension={}, capacity={}, backend={}, degraded={})",
            options.dimension, options.capacity, status.active, status.degraded
        );
        Ok(Self {
            options,
            status,
            state: RwLock::new(StoreState {
                index,
                records: RecordStore::new(),
            }),
            mutation: Mutex::new(()),
            defect: RwLock::new(None),
        })
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn dimension(&self) -> usize {
        self.options.dimension
    }

    pub fn capacity(&self) -> usize {
        self.options.capacity
    }

    /// Which backend serves searches and whether it is a substitute.
    pub fn backend_status(&self) -> &BackendStatus {
        &self.status
    }

    pub fn backend(&self) -> IndexBackend {
        self.status.active
    }

    pub fn count(&self) -> usize {
        self.state.read().records.len()
    }

    /// Advisory only; `add` never rejects a write for being over capacity.
    pub fn over_capacity(&self) -> bool {
        self.count() > self.options.capacity
    }

    /// Reason the store refuses mutations, if it does.
    pub fn read_only_reason(&self) -> Option<String> {
        self.defect.read().clone()
    }

    pub fn is_read_only(&self) -> bool {
        self.defect.read().is_some()
    }

    /// Insert a record under a fresh id.
    pub fn add(
        &self,
        text: impl Into<String>,
        object_type: impl Into<String>,
        metadata: Metadata,
        embedding: impl Into<Embedding>,
    ) -> Result<RecordId, MemoryError> {
        let embedding = embedding.into();
        embedding.validate(self.options.dimension)?;
        let record = Record::new(
            RecordId::new(),
            text.into(),
            object_type.into(),
            metadata,
            Utc::now(),
        );
        let id = record.id;

        let _guard = self.mutation.lock();
        self.ensure_writable()?;
        let count = {
            let mut state = self.state.write();
            self.insert_locked(&mut state, record, embedding.as_slice())?;
            state.records.len()
        };
        debug!("record added (id={}, count={})", id, count);
        if count > self.options.capacity {
            debug!(
                "store over capacity (count={}, capacity={})",
                count, self.options.capacity
            );
        }
        Ok(id)
    }

    /// Insert a previously exported entry, keeping its id and counters.
    pub fn insert_entry(&self, entry: SnapshotEntry) -> Result<RecordId, MemoryError> {
        check_vector(&entry.vector, self.options.dimension)?;
        entry.check_importance()?;
        let (record, embedding) = entry.into_parts();
        let id = record.id;

        let _guard = self.mutation.lock();
        self.ensure_writable()?;
        let mut state = self.state.write();
        self.insert_locked(&mut state, record, embedding.as_slice())?;
        debug!("record restored (id={})", id);
        Ok(id)
    }

    /// Ranked records most similar to `query`.
    ///
    /// Results are ordered by descending normalized score and carry the
    /// access counters as updated by this call. Fewer than `k` results is not
    /// an error.
    pub fn search(
        &self,
        query: impl Into<Embedding>,
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        let query = query.into();
        query.validate(self.options.dimension)?;
        let threshold = options.threshold.or(self.options.similarity_threshold);
        if let Some(threshold) = threshold {
            check_threshold(threshold)?;
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let read_only = self.read_only_reason();
        if let Some(reason) = &read_only {
            warn!("searching read-only store (reason={})", reason);
        }

        let mut candidates: Vec<(Arc<Record>, f32)> = {
            let state = self.state.read();
            let metric = state.index.metric();
            let neighbors = state.index.search(query.as_slice(), overfetch(k))?;
            let mut candidates = Vec::with_capacity(neighbors.len());
            for neighbor in neighbors {
                let record = match state.records.get_by_position(neighbor.position) {
                    Ok(record) => record,
                    Err(err) => {
                        self.flag_defect(&err.to_string());
                        continue;
                    }
                };
                if let Some(object_type) = &options.object_type {
                    if &record.object_type != object_type {
                        continue;
                    }
                }
                let score = metric.normalize(neighbor.distance);
                if threshold.is_some_and(|threshold| score < threshold) {
                    continue;
                }
                candidates.push((record, score));
            }
            candidates
        };

        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.id.cmp(&b.0.id)));
        candidates.truncate(k);

        if read_only.is_some() || self.is_read_only() {
            return Ok(candidates
                .into_iter()
                .map(|(record, score)| SearchHit {
                    record: record.as_ref().clone(),
                    score,
                })
                .collect());
        }

        let now = Utc::now();
        let mut state = self.state.write();
        let hits = candidates
            .into_iter()
            .map(|(record, score)| {
                // A concurrent remove may have dropped the record since the scan.
                let touched = state.records.update(&record.id, |record| {
                    record.last_accessed_at = now;
                    record.access_count = record.access_count.saturating_add(1);
                });
                let record = touched.unwrap_or(record);
                SearchHit {
                    record: record.as_ref().clone(),
                    score,
                }
            })
            .collect();
        Ok(hits)
    }

    /// Remove records by id and return how many were present.
    ///
    /// Absent ids are skipped. The index is compacted once dead rows exceed
    /// the configured tombstone ratio.
    pub fn remove(&self, ids: &[RecordId]) -> Result<usize, MemoryError> {
        let _guard = self.mutation.lock();
        self.ensure_writable()?;
        let mut state = self.state.write();
        let mut removed = 0;
        for id in ids {
            let Some((_, position)) = state.records.remove(id) else {
                continue;
            };
            if !state.index.tombstone(position) {
                let reason = format!("record {id} was mapped to dead row {position}");
                self.flag_defect(&reason);
                return Err(MemoryError::InconsistentState(reason));
            }
            removed += 1;
        }
        if removed > 0 {
            debug!(
                "records removed (removed={}, count={})",
                removed,
                state.records.len()
            );
            self.maybe_compact_locked(&mut state)?;
        }
        Ok(removed)
    }

    /// Drop tombstoned rows now. Returns the number of rows reclaimed.
    pub fn compact(&self) -> Result<usize, MemoryError> {
        let _guard = self.mutation.lock();
        self.ensure_writable()?;
        let mut state = self.state.write();
        if state.index.tombstones() == 0 {
            return Ok(0);
        }
        self.compact_locked(&mut state)
    }

    pub fn get(&self, id: &RecordId) -> Result<Record, MemoryError> {
        self.state
            .read()
            .records
            .get(id)
            .map(|record| record.as_ref().clone())
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.state.read().records.contains(id)
    }

    /// Stored vector of a record, as `f32`.
    pub fn vector(&self, id: &RecordId) -> Result<Vec<f32>, MemoryError> {
        let state = self.state.read();
        let position = state
            .records
            .position_of(id)
            .ok_or(MemoryError::NotFound(*id))?;
        state
            .index
            .vector(position)
            .map(<[f32]>::to_vec)
            .ok_or_else(|| {
                MemoryError::InconsistentState(format!("record {id} maps to dead row {position}"))
            })
    }

    /// Merge metadata into a record; existing keys are overwritten.
    pub fn update_metadata(
        &self,
        id: &RecordId,
        metadata: Metadata,
    ) -> Result<Record, MemoryError> {
        let _guard = self.mutation.lock();
        self.ensure_writable()?;
        let updated = self
            .state
            .write()
            .records
            .update(id, |record| record.metadata.extend(metadata))?;
        debug!("record metadata updated (id={})", id);
        Ok(updated.as_ref().clone())
    }

    /// Snapshot of all records at call time.
    pub fn iterate(&self) -> RecordSnapshot {
        if let Some(reason) = self.read_only_reason() {
            warn!("iterating read-only store (reason={})", reason);
        }
        self.state.read().records.iterate()
    }

    /// Nearest other records to a stored record, with normalized scores.
    ///
    /// Does not touch access counters.
    pub fn similar_to(&self, id: &RecordId, k: usize) -> Result<Vec<(RecordId, f32)>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let state = self.state.read();
        let position = state
            .records
            .position_of(id)
            .ok_or(MemoryError::NotFound(*id))?;
        let vector = state.index.vector(position).ok_or_else(|| {
            MemoryError::InconsistentState(format!("record {id} maps to dead row {position}"))
        })?;
        let metric = state.index.metric();
        let neighbors = state.index.search(vector, k.saturating_add(1))?;
        let mut similar = Vec::with_capacity(k.min(neighbors.len()));
        for neighbor in neighbors {
            if neighbor.position == position {
                continue;
            }
            match state.records.get_by_position(neighbor.position) {
                Ok(record) => similar.push((record.id, metric.normalize(neighbor.distance))),
                Err(err) => self.flag_defect(&err.to_string()),
            }
            if similar.len() == k {
                break;
            }
        }
        Ok(similar)
    }

    /// Store computed importances. Unknown ids are skipped.
    pub(crate) fn apply_importance(
        &self,
        scores: &[(RecordId, f32)],
    ) -> Result<usize, MemoryError> {
        let _guard = self.mutation.lock();
        self.ensure_writable()?;
        let mut state = self.state.write();
        let mut updated = 0;
        for (id, importance) in scores {
            let importance = if importance.is_finite() {
                importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE)
            } else {
                MIN_IMPORTANCE
            };
            if state
                .records
                .update(id, |record| record.importance = importance)
                .is_ok()
            {
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Serializable copy of all live records and their vectors.
    pub fn export(&self) -> Result<Snapshot, MemoryError> {
        let state = self.state.read();
        let mut entries = Vec::with_capacity(state.records.len());
        for (position, id) in state.records.mappings() {
            let record = state.records.get(&id)?;
            let vector = state.index.vector(position).ok_or_else(|| {
                MemoryError::InconsistentState(format!("record {id} maps to dead row {position}"))
            })?;
            entries.push(SnapshotEntry::from_record(&record, vector));
        }
        debug!("store exported (entries={})", entries.len());
        Ok(Snapshot::new(self.options.dimension, entries))
    }

    /// Replace the store contents with a snapshot.
    ///
    /// The snapshot is validated before anything is touched. A successful
    /// import clears read-only mode.
    pub fn import(&self, snapshot: Snapshot) -> Result<usize, MemoryError> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(MemoryError::UnsupportedSnapshot(snapshot.version));
        }
        if snapshot.dimension != self.options.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.options.dimension,
                actual: snapshot.dimension,
            });
        }
        let mut seen = HashSet::with_capacity(snapshot.entries.len());
        for entry in &snapshot.entries {
            check_vector(&entry.vector, self.options.dimension)?;
            entry.check_importance()?;
            if !seen.insert(entry.id) {
                return Err(MemoryError::DuplicateId(entry.id));
            }
        }

        let _guard = self.mutation.lock();
        let mut state = self.state.write();
        state.index.clear();
        state.records.clear();
        let total = snapshot.entries.len();
        for entry in snapshot.entries {
            let (record, embedding) = entry.into_parts();
            if let Err(err) = self.insert_locked(&mut state, record, embedding.as_slice()) {
                self.flag_defect(&format!("import aborted: {err}"));
                return Err(err);
            }
        }
        if let Some(reason) = self.defect.write().take() {
            info!("read-only mode cleared by import (reason={})", reason);
        }
        info!(
            "snapshot imported (entries={}, over_capacity={})",
            total,
            total > self.options.capacity
        );
        Ok(total)
    }

    pub fn health(&self) -> StoreHealth {
        let state = self.state.read();
        let records = state.records.len();
        StoreHealth {
            records,
            index_rows: state.index.size(),
            tombstones: state.index.tombstones(),
            tombstone_ratio: state.index.tombstone_ratio(),
            capacity: self.options.capacity,
            over_capacity: records > self.options.capacity,
            read_only: self.read_only_reason(),
            backend: self.status.clone(),
        }
    }

    /// Check that every record maps to a live row and vice versa.
    pub fn verify(&self) -> Result<(), MemoryError> {
        let state = self.state.read();
        if state.index.size() != state.records.len() {
            return Err(MemoryError::InconsistentState(format!(
                "index has {} live rows but {} records are mapped",
                state.index.size(),
                state.records.len()
            )));
        }
        for (position, id) in state.records.mappings() {
            if state.index.vector(position).is_none() {
                return Err(MemoryError::InconsistentState(format!(
                    "record {id} maps to dead row {position}"
                )));
            }
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), MemoryError> {
        match self.defect.read().as_ref() {
            Some(reason) => Err(MemoryError::ReadOnly(reason.clone())),
            None => Ok(()),
        }
    }

    fn flag_defect(&self, reason: &str) {
        let mut defect = self.defect.write();
        error!("consistency defect detected; store is now read-only (reason={})", reason);
        if defect.is_none() {
            *defect = Some(reason.to_string());
        }
    }

    /// Index insert followed by record insert; the row is tombstoned again if
    /// the record insert fails.
    fn insert_locked(
        &self,
        state: &mut StoreState,
        record: Record,
        vector: &[f32],
    ) -> Result<(), MemoryError> {
        let id = record.id;
        let position = state.index.insert(vector)?;
        let Err(err) = state.records.put(position, record, false) else {
            return Ok(());
        };
        if !state.index.tombstone(position) {
            let reason = format!("rollback of row {position} for {id} failed");
            self.flag_defect(&reason);
            return Err(MemoryError::InconsistentState(reason));
        }
        match &err {
            MemoryError::InconsistentState(reason) => self.flag_defect(reason),
            _ => error!(
                "record insert rolled back (id={}, row={}, error={})",
                id, position, err
            ),
        }
        Err(err)
    }

    fn maybe_compact_locked(&self, state: &mut StoreState) -> Result<(), MemoryError> {
        if state.index.tombstone_ratio() > self.options.compaction_threshold {
            self.compact_locked(state)?;
        }
        Ok(())
    }

    fn compact_locked(&self, state: &mut StoreState) -> Result<usize, MemoryError> {
        let dropped = state.index.tombstones();
        let remap = state.index.compact();
        if let Err(err) = state.records.apply_remap(&remap) {
            self.flag_defect(&err.to_string());
            return Err(err);
        }
        debug!(
            "index compacted (dropped={}, live={})",
            dropped,
            remap.retained()
        );
        Ok(dropped)
    }
}

fn check_threshold(threshold: f32) -> Result<(), MemoryError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(MemoryError::InvalidInput(format!(
            "similarity threshold {threshold} is outside [0, 1]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BackendPreference;
    use crate::model::MetadataValue;
    use pretty_assertions::assert_eq;

    fn store(capacity: usize) -> MemoryStore {
        MemoryStore::new(StoreOptions::new(4, capacity).backend(BackendPreference::Fallback))
            .expect("store")
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = MemoryStore::new(StoreOptions::new(4, 0)).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[test]
    fn duplicate_entry_rolls_back_index_row() {
        let store = store(10);
        let id = store
            .add("a", "x", Metadata::new(), vec![1.0_f32, 0.0, 0.0, 0.0])
            .expect("add");
        let mut entry = store.export().expect("export").entries.remove(0);
        entry.vector = vec![0.0, 1.0, 0.0, 0.0];

        let err = store.insert_entry(entry).unwrap_err();
        assert!(matches!(err, MemoryError::DuplicateId(dup) if dup == id));
        assert_eq!(store.count(), 1);
        store.verify().expect("consistent after rollback");
        assert!(!store.is_read_only());
    }

    #[test]
    fn missing_mapping_turns_store_read_only() {
        let store = store(10);
        let kept = store
            .add("a", "x", Metadata::new(), vec![1.0_f32, 0.0, 0.0, 0.0])
            .expect("add");
        let orphan = store
            .add("b", "x", Metadata::new(), vec![0.9_f32, 0.1, 0.0, 0.0])
            .expect("add");
        store.state.write().records.remove(&orphan);

        let hits = store
            .search(vec![1.0_f32, 0.0, 0.0, 0.0], 5, &SearchOptions::new())
            .expect("search still works");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, kept);
        assert!(store.is_read_only());
        assert!(store.verify().is_err());

        let err = store
            .add("c", "x", Metadata::new(), vec![0.0_f32, 1.0, 0.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, MemoryError::ReadOnly(_)));
        assert!(matches!(store.remove(&[kept]), Err(MemoryError::ReadOnly(_))));
    }

    #[test]
    fn import_clears_read_only_mode() {
        let store = store(10);
        store
            .add("a", "x", Metadata::new(), vec![1.0_f32, 0.0, 0.0, 0.0])
            .expect("add");
        let snapshot = store.export().expect("export");
        store.flag_defect("test defect");
        assert!(store.is_read_only());

        store.import(snapshot).expect("import");
        assert!(!store.is_read_only());
        store
            .add("b", "x", Metadata::new(), vec![0.0_f32, 1.0, 0.0, 0.0])
            .expect("writable again");
    }

    #[test]
    fn remove_compacts_past_threshold() {
        let store = store(10);
        let ids: Vec<RecordId> = (0..4)
            .map(|axis| {
                let mut vector = vec![0.0_f32; 4];
                vector[axis] = 1.0;
                store.add("r", "x", Metadata::new(), vector).expect("add")
            })
            .collect();

        store.remove(&ids[..1]).expect("remove one");
        assert_eq!(store.health().tombstones, 1);

        store.remove(&ids[1..2]).expect("remove two");
        let health = store.health();
        assert_eq!(health.tombstones, 0);
        assert_eq!(health.index_rows, 2);
        store.verify().expect("consistent");
        assert_eq!(
            store.vector(&ids[3]).expect("vector"),
            vec![0.0_f32, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn update_metadata_merges_keys() {
        let store = store(10);
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), MetadataValue::from("shell"));
        let id = store
            .add("a", "x", metadata, vec![1.0_f32, 0.0, 0.0, 0.0])
            .expect("add");
        let mut update = Metadata::new();
        update.insert("success".to_string(), MetadataValue::Bool(false));

        let record = store.update_metadata(&id, update).expect("update");
        assert_eq!(record.metadata.len(), 2);
        assert_eq!(record.metadata["success"], MetadataValue::Bool(false));
    }

    #[test]
    fn similar_to_excludes_self() {
        let store = store(10);
        let a = store
            .add("a", "x", Metadata::new(), vec![1.0_f32, 0.0, 0.0, 0.0])
            .expect("add");
        let b = store
            .add("b", "x", Metadata::new(), vec![0.9_f32, 0.1, 0.0, 0.0])
            .expect("add");
        let similar = store.similar_to(&a, 3).expect("similar");
        assert_eq!(similar[0].0, b);
        assert!(similar.iter().all(|(id, _)| *id != a));
        assert_eq!(store.get(&b).expect("b").access_count, 0);
    }

    #[test]
    fn similar_to_accepts_unbounded_k() {
        let store = store(10);
        let a = store
            .add("a", "x", Metadata::new(), vec![1.0_f32, 0.0, 0.0, 0.0])
            .expect("add");
        store
            .add("b", "x", Metadata::new(), vec![0.0_f32, 1.0, 0.0, 0.0])
            .expect("add");
        let similar = store.similar_to(&a, usize::MAX).expect("similar");
        assert_eq!(similar.len(), 1);
    }

    #[test]
    fn import_clamps_out_of_range_importance() {
        let source = store(10);
        for axis in 0..2 {
            let mut vector = vec![0.0_f32; 4];
            vector[axis] = 1.0;
            source.add("r", "x", Metadata::new(), vector).expect("add");
        }
        let mut snapshot = source.export().expect("export");
        snapshot.entries[0].importance = 5.0;
        snapshot.entries[1].importance = -1.0;
        let high = snapshot.entries[0].id;
        let low = snapshot.entries[1].id;

        let target = store(10);
        target.import(snapshot).expect("import");
        assert_eq!(target.get(&high).expect("high").importance, MAX_IMPORTANCE);
        assert_eq!(target.get(&low).expect("low").importance, MIN_IMPORTANCE);
    }

    #[test]
    fn import_rejects_non_finite_importance() {
        let source = store(10);
        source
            .add("a", "x", Metadata::new(), vec![1.0_f32, 0.0, 0.0, 0.0])
            .expect("add");
        let mut snapshot = source.export().expect("export");
        snapshot.entries[0].importance = f32::NAN;

        let target = store(10);
        let err = target.import(snapshot.clone()).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
        assert_eq!(target.count(), 0);
        let err = target.insert_entry(snapshot.entries.remove(0)).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }
}
