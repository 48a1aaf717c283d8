//! External embedding function.

use crate::error::RuntimeError;
use async_trait::async_trait;
use mnemon_memory::Embedding;

/// Turns text into a fixed-dimension vector.
///
/// Implementations may be slow or remote; the store never calls them while
/// holding a lock.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector `embed` returns.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Embedding, RuntimeError>;
}
