//! Test helpers shared across mnemon crates.

pub mod embedder;
pub mod memory;

pub use embedder::{FailingEmbedder, HashEmbedder};
pub use memory::{EntryBuilder, exact_store, fallback_store, unit};
