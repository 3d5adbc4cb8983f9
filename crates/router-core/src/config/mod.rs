//! Router configuration: the declarative document that drives embedding, routing, and the
//! semantic cache.

pub mod error;


pub use error::ConfigError;

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_THRESHOLD, DEFAULT_CACHE_TTL_SECONDS,
    DEFAULT_EMBED_THRESHOLD,
};

/// One routing anchor: a short description of a kind of prompt, scored against the incoming
/// request's non-user message content.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub typical_prompt: Option<String>,
}

impl TaskConfig {
    /// The string embedded as a routing candidate: `typical_prompt` when present, else
    /// `description`.
    pub fn routing_text(&self) -> &str {
        match &self.typical_prompt {
            Some(p) if !p.is_empty() => p,
            _ => &self.description,
        }
    }
}

/// A group of tasks that all route to the same backend model.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub model: String,
    pub tasks: Vec<TaskConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedModelConfig {
    pub model_id: String,
    #[serde(default = "default_embed_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub use_cpu: bool,
}

fn default_embed_threshold() -> f32 {
    DEFAULT_EMBED_THRESHOLD
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemanticCacheConfig {
    #[serde(default)]
    pub enabled: bool,
    pub similarity_threshold: f32,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_CACHE_TTL_SECONDS
}

impl SemanticCacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        if self.ttl_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.ttl_seconds))
        }
    }
}

/// The raw shape of the YAML document, deserialized before a single flattened task catalog is
/// derived from it.
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    embed_model: EmbedModelConfig,
    default_model: String,
    #[serde(default)]
    semantic_cache: Option<SemanticCacheConfig>,
    #[serde(default)]
    categories: Vec<CategoryConfig>,
}

/// A single flattened routing candidate: the text to embed, and the model it routes to.
#[derive(Debug, Clone)]
pub struct RoutingTask {
    pub description: String,
    pub model: String,
}

/// Fully validated, in-memory configuration. Immutable after load.
#[derive(Debug, Clone)]
pub struct Config {
    pub default_model: String,
    pub embed_model: EmbedModelConfig,
    pub semantic_cache: SemanticCacheConfig,
    pub categories: Vec<CategoryConfig>,
    tasks: Vec<RoutingTask>,
}

impl Config {
    /// Load and validate a configuration document from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::PathNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Parse and validate a configuration document from an in-memory YAML string.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(raw).map_err(|source| ConfigError::ParseFailed { source })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.default_model.trim().is_empty() {
            return Err(ConfigError::MissingDefaultModel);
        }
        if raw.embed_model.model_id.trim().is_empty() {
            return Err(ConfigError::MissingEmbedModelId);
        }
        Self::check_threshold("embed_model.threshold", raw.embed_model.threshold)?;

        let semantic_cache = raw.semantic_cache.unwrap_or(SemanticCacheConfig {
            enabled: false,
            similarity_threshold: DEFAULT_CACHE_THRESHOLD,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        });
        Self::check_threshold(
            "semantic_cache.similarity_threshold",
            semantic_cache.similarity_threshold,
        )?;

        let mut tasks = Vec::new();
        for (index, category) in raw.categories.iter().enumerate() {
            if category.tasks.is_empty() {
                return Err(ConfigError::EmptyTaskList { index });
            }
            for task in &category.tasks {
                tasks.push(RoutingTask {
                    description: task.routing_text().to_string(),
                    model: category.model.clone(),
                });
            }
        }

        Ok(Self {
            default_model: raw.default_model,
            embed_model: raw.embed_model,
            semantic_cache,
            categories: raw.categories,
            tasks,
        })
    }

    fn check_threshold(field: &'static str, value: f32) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::ThresholdOutOfRange { field, value });
        }
        Ok(())
    }

    /// Ordered routing candidate strings, in the same order as [`Config::model_for_task_index`]
    /// expects.
    pub fn task_descriptions(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.description.as_str()).collect()
    }

    /// The model assigned to the task at `index`, or `default_model` if out of range.
    pub fn model_for_task_index(&self, index: i64) -> &str {
        if index < 0 {
            return &self.default_model;
        }
        self.tasks
            .get(index as usize)
            .map(|t| t.model.as_str())
            .unwrap_or(&self.default_model)
    }
}
