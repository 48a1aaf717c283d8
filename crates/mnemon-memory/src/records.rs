//! Id → record map and the authoritative row-position ↔ id mapping.

use crate::error::MemoryError;
use crate::index::PositionRemap;
use crate::model::{Record, RecordId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// In-memory record map keyed by id, with a reverse map from index rows.
///
/// Records are held behind `Arc` so `iterate` can hand out a point-in-time
/// snapshot; updates replace the `Arc` rather than mutating shared data.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: HashMap<RecordId, Arc<Record>>,
    positions: HashMap<RecordId, usize>,
    by_position: BTreeMap<usize, RecordId>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record at an index position.
    ///
    /// Without `replace`, an existing id fails with `DuplicateId`. A position
    /// already owned by another id is a consistency defect.
    pub fn put(
        &mut self,
        position: usize,
        record: Record,
        replace: bool,
    ) -> Result<(), MemoryError> {
        let id = record.id;
        if self.records.contains_key(&id) && !replace {
            return Err(MemoryError::DuplicateId(id));
        }
        if let Some(owner) = self.by_position.get(&position) {
            if *owner != id {
                return Err(MemoryError::InconsistentState(format!(
                    "row {position} already mapped to {owner}"
                )));
            }
        }
        if let Some(previous) = self.positions.insert(id, position) {
            if previous != position {
                self.by_position.remove(&previous);
            }
        }
        self.by_position.insert(position, id);
        self.records.insert(id, Arc::new(record));
        Ok(())
    }

    pub fn get(&self, id: &RecordId) -> Result<Arc<Record>, MemoryError> {
        self.records
            .get(id)
            .cloned()
            .ok_or(MemoryError::NotFound(*id))
    }

    /// Resolve an index row to its record.
    pub fn get_by_position(&self, position: usize) -> Result<Arc<Record>, MemoryError> {
        let id = self.by_position.get(&position).ok_or_else(|| {
            MemoryError::InconsistentState(format!("no record mapped to row {position}"))
        })?;
        self.records.get(id).cloned().ok_or_else(|| {
            MemoryError::InconsistentState(format!("row {position} maps to missing record {id}"))
        })
    }

    pub fn position_of(&self, id: &RecordId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    /// Delete a record and its position mapping. Absent ids are a no-op.
    pub fn remove(&mut self, id: &RecordId) -> Option<(Arc<Record>, usize)> {
        let record = self.records.remove(id)?;
        let position = self.positions.remove(id)?;
        self.by_position.remove(&position);
        Some((record, position))
    }

    /// Apply an in-place edit to one record.
    pub fn update<F>(&mut self, id: &RecordId, edit: F) -> Result<Arc<Record>, MemoryError>
    where
        F: FnOnce(&mut Record),
    {
        let slot = self.records.get_mut(id).ok_or(MemoryError::NotFound(*id))?;
        edit(Arc::make_mut(slot));
        Ok(slot.clone())
    }

    /// Point-in-time view of all records in row order.
    pub fn iterate(&self) -> RecordSnapshot {
        let records = self
            .by_position
            .values()
            .filter_map(|id| self.records.get(id).cloned())
            .collect();
        RecordSnapshot { records }
    }

    /// Rewrite row positions after index compaction.
    pub fn apply_remap(&mut self, remap: &PositionRemap) -> Result<(), MemoryError> {
        let mut by_position = BTreeMap::new();
        for (id, position) in self.positions.iter_mut() {
            let next = remap.get(*position).ok_or_else(|| {
                MemoryError::InconsistentState(format!(
                    "record {id} at row {position} was dropped by compaction"
                ))
            })?;
            *position = next;
            by_position.insert(next, *id);
        }
        self.by_position = by_position;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.positions.clear();
        self.by_position.clear();
    }

    /// Ids with their row positions, in row order.
    pub fn mappings(&self) -> impl Iterator<Item = (usize, RecordId)> + '_ {
        self.by_position.iter().map(|(position, id)| (*position, *id))
    }
}

/// Restartable snapshot of records, unaffected by later mutations.
#[derive(Debug, Clone, Default)]
pub struct RecordSnapshot {
    records: Vec<Arc<Record>>,
}

impl RecordSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter().map(|record| record.as_ref())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a RecordSnapshot {
    type Item = &'a Record;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, Arc<Record>>, fn(&Arc<Record>) -> &Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records
            .iter()
            .map(deref_record as fn(&Arc<Record>) -> &Record)
    }
}

fn deref_record(record: &Arc<Record>) -> &Record {
    record
}
