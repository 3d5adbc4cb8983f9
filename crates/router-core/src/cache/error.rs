//! Semantic cache error types.

use thiserror::Error;

/// Errors from the semantic cache. Callers are expected to treat all of these as a cache miss
/// or a no-op write rather than propagate them to the client.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("embedding failed while querying the cache: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("no pending entry found for cache id {id}")]
    PendingEntryNotFound { id: u64 },

    #[error("pending entry {id} was already completed")]
    AlreadyComplete { id: u64 },
}
