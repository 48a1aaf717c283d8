//! Search options and results.

use crate::model::Record;

/// Filters applied after the index returns candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    /// Keep only records with this object type.
    pub object_type: Option<String>,
    /// Minimum normalized score; the store default applies when `None`.
    pub threshold: Option<f32>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Matched record, with access counters already updated.
    pub record: Record,
    /// Normalized similarity in `[0, 1]`.
    pub score: f32,
}

/// Candidates requested from the index for a caller's `k`.
pub fn overfetch(k: usize) -> usize {
    k.saturating_mul(4).max(k.saturating_add(20))
}
