//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Specified path does not exist on the filesystem.
    #[error("config file not found: {path}")]
    PathNotFound {
        /// Path that was missing.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadFailed {
        /// Path that failed to read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file's contents are not valid YAML, or don't match the expected document shape.
    #[error("failed to parse config YAML: {source}")]
    ParseFailed {
        #[source]
        source: serde_yaml::Error,
    },

    /// `default_model` was absent or empty.
    #[error("config field `default_model` must be non-empty")]
    MissingDefaultModel,

    /// `embed_model.model_id` was absent or empty.
    #[error("config field `embed_model.model_id` must be non-empty")]
    MissingEmbedModelId,

    /// A similarity threshold fell outside `[0, 1]`.
    #[error("config field `{field}` must be in [0, 1], got {value}")]
    ThresholdOutOfRange {
        /// Dotted field path, e.g. `embed_model.threshold`.
        field: &'static str,
        /// The out-of-range value that was rejected.
        value: f32,
    },

    /// A category declared no tasks, so it can never be matched by the router.
    #[error("config field `categories[{index}].tasks` must not be empty")]
    EmptyTaskList {
        /// Index of the offending category.
        index: usize,
    },
}
