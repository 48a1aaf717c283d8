//! Fallback index: sequential cosine-similarity scan, no worker pool.

use super::arena::{PositionRemap, VectorArena};
use super::{DistanceMetric, IndexBackend, Neighbor, VectorIndex, select_nearest};
use crate::error::MemoryError;
use crate::model::check_vector;

/// Pure numeric cosine index reporting `1 - cosine similarity`.
#[derive(Debug, Clone)]
pub struct CosineIndex {
    arena: VectorArena,
}

impl CosineIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            arena: VectorArena::new(dimension),
        }
    }
}

impl VectorIndex for CosineIndex {
    fn backend(&self) -> IndexBackend {
        IndexBackend::Fallback
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Cosine
    }

    fn dimension(&self) -> usize {
        self.arena.dimension()
    }

    fn insert(&mut self, vector: &[f32]) -> Result<usize, MemoryError> {
        check_vector(vector, self.arena.dimension())?;
        Ok(self.arena.push(vector))
    }

    fn tombstone(&mut self, position: usize) -> bool {
        self.arena.tombstone(position)
    }

    fn vector(&self, position: usize) -> Option<&[f32]> {
        self.arena.row(position)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, MemoryError> {
        check_vector(query, self.arena.dimension())?;
        if k == 0 || self.arena.live_len() == 0 {
            return Ok(Vec::new());
        }
        let candidates = self
            .arena
            .live_rows()
            .map(|(position, row)| Neighbor {
                position,
                distance: 1.0 - cosine_similarity(query, row),
            })
            .collect();
        Ok(select_nearest(candidates, k))
    }

    fn size(&self) -> usize {
        self.arena.live_len()
    }

    fn tombstones(&self) -> usize {
        self.arena.tombstone_len()
    }

    fn compact(&mut self) -> PositionRemap {
        self.arena.compact()
    }

    fn clear(&mut self) {
        self.arena.clear();
    }
}

/// Cosine similarity in `[-1, 1]`; zero-length vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if !denom.is_finite() || denom < f64::EPSILON {
        return 0.0;
    }
    let raw = dot / denom;
    if !raw.is_finite() {
        return 0.0;
    }
    raw.clamp(-1.0, 1.0) as f32
}
