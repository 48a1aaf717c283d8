//! Store and consolidation policies.

use crate::index::{BackendPreference, IndexOptions};
use std::time::Duration;

/// Construction-time options for a [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Vector dimension, fixed for the store's lifetime.
    pub dimension: usize,
    /// Record count that consolidation prunes down to.
    pub capacity: usize,
    /// Requested index backend.
    pub backend: BackendPreference,
    /// Default minimum normalized score for searches.
    pub similarity_threshold: Option<f32>,
    /// Tombstone ratio above which removals compact the index.
    pub compaction_threshold: f32,
    /// Index construction options.
    pub index: IndexOptions,
}

impl StoreOptions {
    pub fn new(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            capacity,
            ..Self::default()
        }
    }

    pub fn backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn compaction_threshold(mut self, threshold: f32) -> Self {
        self.compaction_threshold = threshold;
        self
    }

    pub fn exact_threads(mut self, threads: usize) -> Self {
        self.index.exact_threads = Some(threads);
        self
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            dimension: 384,
            capacity: 10_000,
            backend: BackendPreference::Auto,
            similarity_threshold: None,
            compaction_threshold: 0.3,
            index: IndexOptions::default(),
        }
    }
}

/// Weights of the importance terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsolidationWeights {
    pub recency: f32,
    pub frequency: f32,
    pub outcome: f32,
    pub redundancy: f32,
}

impl ConsolidationWeights {
    /// Sum of the positive terms; the redundancy weight is a penalty.
    pub fn positive_total(&self) -> f32 {
        self.recency + self.frequency + self.outcome
    }
}

impl Default for ConsolidationWeights {
    fn default() -> Self {
        Self {
            recency: 0.4,
            frequency: 0.3,
            outcome: 0.2,
            redundancy: 0.1,
        }
    }
}

/// Scoring parameters for consolidation passes.
#[derive(Debug, Clone)]
pub struct ConsolidationPolicy {
    pub weights: ConsolidationWeights,
    /// Time for the recency term to halve.
    pub recency_half_life: Duration,
    /// Access count at which the frequency term reaches ~63%.
    pub frequency_saturation: f32,
    /// Metadata key carrying the success/failure signal.
    pub outcome_key: String,
    /// Normalized score above which a neighbour counts as a near-duplicate.
    pub redundancy_threshold: f32,
    /// Neighbours probed per record; 0 disables the redundancy term.
    pub redundancy_probe: usize,
}

impl Default for ConsolidationPolicy {
    fn default() -> Self {
        Self {
            weights: ConsolidationWeights::default(),
            recency_half_life: Duration::from_secs(7 * 24 * 60 * 60),
            frequency_saturation: 10.0,
            outcome_key: "success".to_string(),
            redundancy_threshold: 0.95,
            redundancy_probe: 8,
        }
    }
}
