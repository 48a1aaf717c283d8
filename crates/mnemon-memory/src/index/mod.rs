//! Nearest-neighbour search over fixed-dimension `f32` vectors.
//!
//! Two interchangeable backends implement [`VectorIndex`]: the exact flat
//! index (squared Euclidean distance, scanned on a dedicated rayon pool) and
//! the fallback cosine scan. Both report "smaller is more similar" distances;
//! raw distances are only comparable within one backend instance, so callers
//! should go through [`DistanceMetric::normalize`].

mod arena;
pub mod cosine;
pub mod flat;

pub use arena::PositionRemap;
pub use cosine::CosineIndex;
pub use flat::FlatL2Index;

use crate::error::MemoryError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One search candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row position in the index.
    pub position: usize,
    /// Backend distance, ascending is more similar.
    pub distance: f32,
}

/// Distance semantics of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance, `[0, inf)`.
    SquaredL2,
    /// `1 - cosine similarity`, `[0, 2]`.
    Cosine,
}

impl DistanceMetric {
    /// Convert a raw distance into a similarity in `[0, 1]`.
    pub fn normalize(self, distance: f32) -> f32 {
        let score = match self {
            Self::SquaredL2 => 1.0 / (1.0 + distance.max(0.0)),
            Self::Cosine => 1.0 - distance,
        };
        score.clamp(0.0, 1.0)
    }
}

/// Backend requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    Exact,
    Fallback,
    #[default]
    Auto,
}

/// Backend actually serving searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Exact,
    Fallback,
}

impl fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Outcome of backend selection, surfaced for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    /// Backend requested by the caller.
    pub requested: BackendPreference,
    /// Backend in use.
    pub active: IndexBackend,
    /// True when the exact backend was wanted but could not start.
    pub degraded: bool,
    /// Initialization failure that caused the fallback.
    pub reason: Option<String>,
}

/// Options for constructing an index.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Worker threads for the exact backend; rayon's default when `None`.
    pub exact_threads: Option<usize>,
}

/// Nearest-neighbour engine over fixed-dimension vectors.
pub trait VectorIndex: Send + Sync + fmt::Debug {
    /// Which backend this is.
    fn backend(&self) -> IndexBackend;

    /// Distance semantics of `search` results.
    fn metric(&self) -> DistanceMetric;

    /// Fixed vector dimension.
    fn dimension(&self) -> usize;

    /// Append a vector and return its row position.
    fn insert(&mut self, vector: &[f32]) -> Result<usize, MemoryError>;

    /// Mark a row dead. Returns false if the row was not live.
    fn tombstone(&mut self, position: usize) -> bool;

    /// Live vector at a position.
    fn vector(&self, position: usize) -> Option<&[f32]>;

    /// Up to `k` live rows ordered by ascending distance.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, MemoryError>;

    /// Number of live rows.
    fn size(&self) -> usize;

    /// Number of tombstoned rows awaiting compaction.
    fn tombstones(&self) -> usize;

    /// Drop tombstoned rows and renumber positions.
    fn compact(&mut self) -> PositionRemap;

    /// Remove every row.
    fn clear(&mut self);

    /// Dead rows as a fraction of all stored rows.
    fn tombstone_ratio(&self) -> f32 {
        let total = self.size() + self.tombstones();
        if total == 0 {
            return 0.0;
        }
        self.tombstones() as f32 / total as f32
    }
}

/// Build an index for a preference, substituting the fallback backend when
/// the exact backend cannot start.
pub fn open_index(
    preference: BackendPreference,
    dimension: usize,
    options: IndexOptions,
) -> Result<(Box<dyn VectorIndex>, BackendStatus), MemoryError> {
    if dimension == 0 {
        return Err(MemoryError::InvalidInput(
            "index dimension must be positive".to_string(),
        ));
    }
    select_backend(preference, dimension, || {
        FlatL2Index::new(dimension, options.exact_threads)
    })
}

pub(crate) fn select_backend<F>(
    preference: BackendPreference,
    dimension: usize,
    init_exact: F,
) -> Result<(Box<dyn VectorIndex>, BackendStatus), MemoryError>
where
    F: FnOnce() -> Result<FlatL2Index, MemoryError>,
{
    if preference == BackendPreference::Fallback {
        info!("vector index opened (backend=fallback, dimension={dimension})");
        return Ok((
            Box::new(CosineIndex::new(dimension)),
            BackendStatus {
                requested: preference,
                active: IndexBackend::Fallback,
                degraded: false,
                reason: None,
            },
        ));
    }

    match init_exact() {
        Ok(index) => {
            info!("vector index opened (backend=exact, dimension={dimension})");
            Ok((
                Box::new(index),
                BackendStatus {
                    requested: preference,
                    active: IndexBackend::Exact,
                    degraded: false,
                    reason: None,
                },
            ))
        }
        Err(err) => {
            warn!(
                "exact backend unavailable; using fallback (requested={:?}, reason={})",
                preference, err
            );
            Ok((
                Box::new(CosineIndex::new(dimension)),
                BackendStatus {
                    requested: preference,
                    active: IndexBackend::Fallback,
                    degraded: true,
                    reason: Some(err.to_string()),
                },
            ))
        }
    }
}

/// Sort candidates ascending by distance (position breaks ties) and keep `k`.
pub(crate) fn select_nearest(mut neighbors: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    let order = |a: &Neighbor, b: &Neighbor| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.position.cmp(&b.position))
    };
    if k == 0 {
        return Vec::new();
    }
    if neighbors.len() > k {
        neighbors.select_nth_unstable_by(k - 1, order);
        neighbors.truncate(k);
    }
    neighbors.sort_by(order);
    neighbors
}
