//! Exact brute-force index using squared Euclidean distance.

use super::arena::{PositionRemap, VectorArena};
use super::{DistanceMetric, IndexBackend, Neighbor, VectorIndex, select_nearest};
use crate::error::MemoryError;
use crate::model::check_vector;
use log::debug;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;

/// Flat exact index. Scans run on a dedicated rayon pool.
pub struct FlatL2Index {
    arena: VectorArena,
    pool: ThreadPool,
}

impl FlatL2Index {
    /// Start the worker pool. Fails if the pool cannot be built.
    pub fn new(dimension: usize, threads: Option<usize>) -> Result<Self, MemoryError> {
        let mut builder =
            ThreadPoolBuilder::new().thread_name(|index| format!("mnemon-exact-{index}"));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|err| MemoryError::BackendUnavailable(err.to_string()))?;
        debug!(
            "exact index pool started (threads={}, dimension={})",
            pool.current_num_threads(),
            dimension
        );
        Ok(Self {
            arena: VectorArena::new(dimension),
            pool,
        })
    }
}

impl fmt::Debug for FlatL2Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatL2Index")
            .field("dimension", &self.arena.dimension())
            .field("live", &self.arena.live_len())
            .field("tombstones", &self.arena.tombstone_len())
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl VectorIndex for FlatL2Index {
    fn backend(&self) -> IndexBackend {
        IndexBackend::Exact
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::SquaredL2
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
        let candidates: Vec<Neighbor> = self.pool.install(|| {
            self.arena
                .par_live_rows()
                .map(|(position, row)| Neighbor {
                    position,
                    distance: squared_l2(query, row),
                })
                .collect()
        });
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

/// Squared Euclidean distance.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}
