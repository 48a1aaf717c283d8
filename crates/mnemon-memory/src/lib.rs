//! Vector-indexed semantic memory with importance-weighted consolidation.

pub mod consolidation;
pub mod error;
pub mod index;
pub mod model;
pub mod policy;
pub mod provider;
pub mod recall;
pub mod records;
pub mod snapshot;
pub mod store;

/// Consolidation engine, pass control and reports.
pub use consolidation::{
    ConsolidationEngine, ConsolidationReport, PassControl, PassOutcome, PassState, ScoringFailure,
};
/// Memory error type.
pub use error::MemoryError;
/// Index backends and selection status.
pub use index::{BackendPreference, BackendStatus, DistanceMetric, IndexBackend, IndexOptions};
/// Record model.
pub use model::{Embedding, Metadata, MetadataValue, Record, RecordId};
/// Store and consolidation policies.
pub use policy::{ConsolidationPolicy, ConsolidationWeights, StoreOptions};
/// Snapshot store interface and default file implementation.
pub use provider::{FileSnapshotStore, SnapshotStore};
/// Search options and hits.
pub use recall::{SearchHit, SearchOptions};
pub use records::RecordSnapshot;
/// Snapshot model.
pub use snapshot::{SNAPSHOT_VERSION, Snapshot, SnapshotEntry};
/// Store façade.
pub use store::{MemoryStore, StoreHealth};
