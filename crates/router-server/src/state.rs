//! Shared, read-mostly application state handed to every stream handler.

use std::sync::Arc;

use router_core::{Config, EmbeddingClient, MetricsSink, SemanticCache};

/// Everything a stream handler needs that outlives any single stream: the immutable config, the
/// embedding client (thread-safe, may block), the semantic cache, and the metrics sink.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub embedder: Arc<EmbeddingClient>,
    pub cache: Arc<SemanticCache>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        embedder: Arc<EmbeddingClient>,
        cache: Arc<SemanticCache>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            config,
            embedder,
            cache,
            metrics,
        }
    }
}
