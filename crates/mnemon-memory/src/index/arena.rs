//! Contiguous vector storage with tombstones.

use rayon::prelude::*;

/// Mapping from pre-compaction positions to post-compaction positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionRemap {
    slots: Vec<Option<usize>>,
}

impl PositionRemap {
    /// New position for an old position, `None` if the row was dropped.
    pub fn get(&self, old_position: usize) -> Option<usize> {
        self.slots.get(old_position).copied().flatten()
    }

    /// Number of rows that survived compaction.
    pub fn retained(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Row-major `f32` arena. Positions are append-only until `compact`.
#[derive(Debug, Clone)]
pub(crate) struct VectorArena {
    dimension: usize,
    data: Vec<f32>,
    live: Vec<bool>,
    live_count: usize,
}

impl VectorArena {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
            live: Vec::new(),
            live_count: 0,
        }
    }

    pub(crate) fn dimension(&self) -> usize {
        self.dimension
    }

    /// Append a row. Callers validate the length first.
    pub(crate) fn push(&mut self, vector: &[f32]) -> usize {
        debug_assert_eq!(vector.len(), self.dimension);
        let position = self.live.len();
        self.data.extend_from_slice(vector);
        self.live.push(true);
        self.live_count += 1;
        position
    }

    /// Live row at a position.
    pub(crate) fn row(&self, position: usize) -> Option<&[f32]> {
        if !self.is_live(position) {
            return None;
        }
        let start = position * self.dimension;
        self.data.get(start..start + self.dimension)
    }

    pub(crate) fn is_live(&self, position: usize) -> bool {
        self.live.get(position).copied().unwrap_or(false)
    }

    /// Mark a row dead. Returns false if it was already dead or unknown.
    pub(crate) fn tombstone(&mut self, position: usize) -> bool {
        match self.live.get_mut(position) {
            Some(slot) if *slot => {
                *slot = false;
                self.live_count -= 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn live_len(&self) -> usize {
        self.live_count
    }

    pub(crate) fn tombstone_len(&self) -> usize {
        self.live.len() - self.live_count
    }

    pub(crate) fn live_rows(&self) -> impl Iterator<Item = (usize, &[f32])> + '_ {
        self.data
            .chunks_exact(self.dimension)
            .zip(self.live.iter())
            .enumerate()
            .filter_map(|(position, (row, live))| live.then_some((position, row)))
    }

    pub(crate) fn par_live_rows(&self) -> impl ParallelIterator<Item = (usize, &[f32])> + '_ {
        self.data
            .par_chunks_exact(self.dimension)
            .zip(self.live.par_iter())
            .enumerate()
            .filter_map(|(position, (row, live))| live.then_some((position, row)))
    }

    /// Rebuild storage from live rows only, renumbering positions densely.
    pub(crate) fn compact(&mut self) -> PositionRemap {
        let mut slots = Vec::with_capacity(self.live.len());
        let mut data = Vec::with_capacity(self.live_count * self.dimension);
        let mut next = 0;
        for (row, live) in self.data.chunks_exact(self.dimension).zip(self.live.iter()) {
            if *live {
                data.extend_from_slice(row);
                slots.push(Some(next));
                next += 1;
            } else {
                slots.push(None);
            }
        }
        self.data = data;
        self.live = vec![true; next];
        self.live_count = next;
        PositionRemap { slots }
    }

    pub(crate) fn clear(&mut self) {
        self.data.clear();
        self.live.clear();
        self.live_count = 0;
    }
}
