//! # Router Core
//!
//! Embedding-driven routing and semantic caching for an inline LLM request router.
//!
//! ```text
//! Request → Router (embedding match) → chosen model
//!        ↘ Semantic cache (embedding match) → cached response
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use router_core::config::Config;
//! use router_core::embedding::{EmbeddingClient, STUB_MODEL_ID};
//!
//! # fn run() -> anyhow::Result<()> {
//! let config = Config::load("router.yaml")?;
//! let embedder = EmbeddingClient::init(&config.embed_model.model_id, config.embed_model.use_cpu)?;
//! let _ = (config, embedder, STUB_MODEL_ID);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Purpose |
//! |---------|---------|
//! | `cpu` | CPU-only inference (docs.rs default) |
//! | `metal` | Apple Silicon GPU acceleration |
//! | `cuda` | NVIDIA GPU acceleration |
//!
//! Pass [`embedding::STUB_MODEL_ID`] as the model id to `EmbeddingClient::init` to use a
//! deterministic, content-derived embedder instead of loading a GGUF model file — this is how
//! tests and `mock`-style deployments avoid a dependency on real model assets.
//!
//! ## Modules
//!
//! - [`cache`] - similarity-indexed semantic cache
//! - [`config`] - YAML-backed configuration
//! - [`embedding`] - embedding client (real GGUF backend + deterministic stub)
//! - [`routing`] - embedding-based model selection
//! - [`metrics`] - fire-and-forget observability counters

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod metrics;
pub mod routing;

pub use cache::{CacheEntry, CacheOptions, EntryState, SemanticCache};
pub use config::Config;
pub use embedding::EmbeddingClient;
pub use metrics::{MetricsSink, NoopMetrics};
pub use routing::{Message, choose_model};
