//! Error types for the hosting runtime.

use mnemon_config::ConfigError;
use mnemon_memory::MemoryError;
use thiserror::Error;

/// Errors returned by the memory service and maintenance scheduler.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Store, index or snapshot error.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
    /// Config loading or validation error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// The embedding function failed.
    #[error("embedding failed: {0}")]
    Embedding(String),
    /// Embedder output size differs from the configured store dimension.
    #[error("embedder dimension {actual} does not match store dimension {expected}")]
    EmbedderDimension { expected: usize, actual: usize },
    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
