//! Embedding client error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or running the embedding model.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model not found at {path}")]
    ModelNotFound { path: PathBuf },

    #[error("failed to load embedding model: {reason}")]
    ModelLoadFailed { reason: String },

    #[error("requested device unavailable ({device}): {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("embedding inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("tokenization failed: {reason}")]
    TokenizationFailed { reason: String },

    #[error("invalid embedding client configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("embedding client already initialized with model `{existing}`, cannot reinit with `{requested}`")]
    AlreadyInitialized { existing: String, requested: String },
}

impl From<candle_core::Error> for EmbeddingError {
    fn from(err: candle_core::Error) -> Self {
        EmbeddingError::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for EmbeddingError {
    fn from(err: std::io::Error) -> Self {
        EmbeddingError::ModelLoadFailed {
            reason: err.to_string(),
        }
    }
}
