//! Record model shared by the record store, the façade and snapshots.

use crate::error::MemoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Importance assigned to a record when it is first inserted.
pub const DEFAULT_IMPORTANCE: f32 = 0.5;
/// Lower bound of the importance range.
pub const MIN_IMPORTANCE: f32 = 0.0;
/// Upper bound of the importance range.
pub const MAX_IMPORTANCE: f32 = 1.0;

/// Stable record identifier, assigned once and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Scalar or string metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view of integer and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Open key/value attributes attached to a record.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single memory record.
///
/// The record's vector lives in the vector index; use
/// [`MemoryStore::vector`](crate::MemoryStore::vector) to read it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identifier.
    pub id: RecordId,
    /// Source text the vector was derived from.
    pub text: String,
    /// Tag used for filtered search.
    pub object_type: String,
    /// Free-form attributes (outcome signal, source session, ...).
    pub metadata: Metadata,
    /// Importance as last computed by consolidation.
    pub importance: f32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last search hit.
    pub last_accessed_at: DateTime<Utc>,
    /// Number of search hits.
    pub access_count: u64,
}

impl Record {
    pub(crate) fn new(
        id: RecordId,
        text: String,
        object_type: String,
        metadata: Metadata,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            text,
            object_type,
            metadata,
            importance: DEFAULT_IMPORTANCE,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
        }
    }
}

/// Embedding vector stored and compared as `f32`.
///
/// Higher precision inputs are downcast on conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check length against the store dimension and reject non-finite values.
    pub fn validate(&self, dimension: usize) -> Result<(), MemoryError> {
        check_vector(&self.0, dimension)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl From<&[f32]> for Embedding {
    fn from(values: &[f32]) -> Self {
        Self(values.to_vec())
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(values: Vec<f64>) -> Self {
        Self(values.into_iter().map(|value| value as f32).collect())
    }
}

impl From<&[f64]> for Embedding {
    fn from(values: &[f64]) -> Self {
        Self(values.iter().map(|value| *value as f32).collect())
    }
}

/// Validate a raw vector against a dimension.
pub(crate) fn check_vector(values: &[f32], dimension: usize) -> Result<(), MemoryError> {
    if values.len() != dimension {
        return Err(MemoryError::DimensionMismatch {
            expected: dimension,
            actual: values.len(),
        });
    }
    if let Some(index) = values.iter().position(|value| !value.is_finite()) {
        return Err(MemoryError::InvalidInput(format!(
            "vector component {index} is not finite"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Embedding, MetadataValue};
    use crate::MemoryError;
    use pretty_assertions::assert_eq;

    #[test]
    fn f64_inputs_are_downcast() {
        let embedding = Embedding::from(vec![0.1_f64, 1.0 / 3.0]);
        assert_eq!(embedding.as_slice(), &[0.1_f32, 1.0_f32 / 3.0]);
    }

    #[test]
    fn validate_rejects_wrong_length() {
        let err = Embedding::from(vec![1.0_f32, 0.0, 0.0])
            .validate(4)
            .unwrap_err();
        assert!(matches!(
            err,
            MemoryError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn validate_rejects_nan() {
        let err = Embedding::from(vec![1.0_f32, f32::NAN])
            .validate(2)
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[test]
    fn metadata_values_deserialize_untagged() {
        let value: MetadataValue = serde_json::from_str("3").expect("integer");
        assert_eq!(value, MetadataValue::Integer(3));
        let value: MetadataValue = serde_json::from_str("0.25").expect("float");
        assert_eq!(value, MetadataValue::Float(0.25));
        let value: MetadataValue = serde_json::from_str("\"ok\"").expect("text");
        assert_eq!(value.as_str(), Some("ok"));
    }
}
