//! Embedding-based request routing: picks a backend model from the non-user content of a chat
//! request.


use tracing::{debug, instrument};

use crate::config::Config;
use crate::embedding::EmbeddingClient;

/// A single chat message, reduced to the two fields routing cares about.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Picks a target model for `messages`, given the client's originally requested `model`.
///
/// Context text is the concatenation of every non-`user` message's content; the query text is
/// the last `user` message's content. When either is empty the router leaves the model
/// unchanged, since it has nothing to route on.
#[instrument(skip(embedder, config, messages), fields(original_model = %original_model))]
pub fn choose_model(
    embedder: &EmbeddingClient,
    config: &Config,
    original_model: &str,
    messages: &[Message],
) -> (String, bool) {
    let context_text = messages
        .iter()
        .filter(|m| m.role != "user")
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let user_text = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or("");

    if context_text.is_empty() || user_text.is_empty() {
        debug!("routing skipped: missing non-user context or user content");
        return (original_model.to_string(), false);
    }

    let descriptions = config.task_descriptions();
    let (index, score) = match embedder.most_similar(&context_text, &descriptions) {
        Ok(result) => result,
        Err(err) => {
            debug!(error = %err, "embedding call failed during routing, falling back to default");
            (-1, 0.0)
        }
    };

    if index < 0 || score < config.embed_model.threshold {
        let model = config.default_model.clone();
        let routed = model != original_model;
        return (model, routed);
    }

    let model = config.model_for_task_index(index).to_string();
    let routed = !model.is_empty() && model != original_model;
    (model, routed)
}
