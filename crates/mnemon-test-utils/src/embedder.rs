use async_trait::async_trait;
use mnemon_memory::Embedding;
use mnemon_runtime::{Embedder, RuntimeError};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Deterministic bag-of-words embedder. Texts sharing words land close
/// together; identical texts produce identical vectors.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    texts: Arc<Mutex<Vec<String>>>,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            texts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every text embedded so far, in call order.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut values = vec![0.0_f32; self.dimension];
        if self.dimension == 0 {
            return values;
        }
        for word in text
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();
            let slot = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            values[slot] += sign;
        }
        let norm = values.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut values {
                *value /= norm;
            }
        }
        values
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, RuntimeError> {
        self.texts.lock().push(text.to_string());
        Ok(Embedding::new(self.vector(text)))
    }
}

/// Embedder whose every call fails.
#[derive(Debug, Clone)]
pub struct FailingEmbedder {
    dimension: usize,
    message: String,
}

impl FailingEmbedder {
    pub fn new(dimension: usize, message: impl Into<String>) -> Self {
        Self {
            dimension,
            message: message.into(),
        }
    }
}

#[async_trait]
impl Embedder for FailingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _text: &str) -> Result<Embedding, RuntimeError> {
        Err(RuntimeError::Embedding(self.message.clone()))
    }
}
