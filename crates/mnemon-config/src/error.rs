//! Error types for config loading and validation.

use thiserror::Error;

/// Errors returned while loading or validating a `mnemon.json5` stack.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a config file failed.
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// JSON5 syntax error.
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] json5::Error),
    /// Merged value did not deserialize into the schema.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A field is malformed or out of range; `path` is `layer:dotted.key`.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
}

impl ConfigError {
    pub(crate) fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            path: path.into(),
            message: message.into(),
        }
    }
}
