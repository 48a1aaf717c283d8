//! Error types for memory store operations.

use crate::model::RecordId;

/// Errors returned by the vector index, record store and store façade.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Vector length does not match the store dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Record id already present and replacement was not requested.
    #[error("duplicate record id: {0}")]
    DuplicateId(RecordId),
    /// Record id is unknown to the store.
    #[error("record not found: {0}")]
    NotFound(RecordId),
    /// Position and id mappings disagree.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
    /// Store refuses mutation after a consistency defect.
    #[error("store is read-only until reloaded: {0}")]
    ReadOnly(String),
    /// Exact backend failed to initialize.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// Malformed caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Snapshot written by a newer schema.
    #[error("unsupported snapshot version: {0}")]
    UnsupportedSnapshot(u32),
}
