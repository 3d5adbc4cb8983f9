//! Embedding client: turns text into a fixed-dimensional unit vector and finds the closest
//! match among a set of candidate strings.

mod backend;
pub mod device;
pub mod error;
mod utils;

#[cfg(test)]
mod tests;

pub use backend::STUB_MODEL_ID;
pub use error::EmbeddingError;

use backend::EmbedderBackend;
use tracing::instrument;

use crate::constants::{DEFAULT_EMBEDDING_DIM, DEFAULT_MAX_SEQ_LEN};

/// Cosine similarity between two vectors of equal length. Defends against zero-norm and NaN
/// inputs by returning `0.0` rather than propagating a non-finite score.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (dot, norm_a_sq, norm_b_sq) = a.iter().zip(b.iter()).fold(
        (0.0f32, 0.0f32, 0.0f32),
        |(dot, na, nb), (&av, &bv)| (dot + av * bv, na + av * av, nb + bv * bv),
    );
    let norm_a = norm_a_sq.sqrt();
    let norm_b = norm_b_sq.sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    if score.is_nan() { 0.0 } else { score }
}

/// Embeds text and finds nearest matches among a catalog of candidate strings. Constructed once
/// at startup via [`EmbeddingClient::init`] and shared (typically behind an `Arc`) with the
/// router and the semantic cache.
///
/// Both `embed` and `most_similar` may block for the duration of a model forward pass; callers
/// must not hold any lock across these calls.
pub struct EmbeddingClient {
    backend: EmbedderBackend,
    model_id: String,
}

impl EmbeddingClient {
    /// Loads the embedding backend named by `model_id`. Pass [`STUB_MODEL_ID`] to use the
    /// deterministic stub backend; any other value is treated as a path to a local GGUF model
    /// file.
    #[instrument(skip_all, fields(model_id = %model_id, use_cpu))]
    pub fn init(model_id: &str, use_cpu: bool) -> Result<Self, EmbeddingError> {
        let device = device::select_device(use_cpu)?;
        let backend = EmbedderBackend::load(
            model_id,
            device,
            DEFAULT_MAX_SEQ_LEN,
            DEFAULT_EMBEDDING_DIM,
        )?;
        Ok(Self {
            backend,
            model_id: model_id.to_string(),
        })
    }

    /// The model identifier this client was initialized with.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Embedding dimension produced by this client.
    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    /// Embeds `text` into a unit vector of length [`EmbeddingClient::dimension`].
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.backend.embed(text)
    }

    /// Finds the candidate most similar to `query`. Returns `(-1, 0.0)` when `candidates` is
    /// empty. Ties are broken in favor of the lowest index.
    pub fn most_similar(
        &self,
        query: &str,
        candidates: &[&str],
    ) -> Result<(i64, f32), EmbeddingError> {
        if candidates.is_empty() {
            return Ok((-1, 0.0));
        }
        let query_vec = self.embed(query)?;
        let mut best_index: i64 = -1;
        let mut best_score = f32::MIN;
        for (i, candidate) in candidates.iter().enumerate() {
            let candidate_vec = self.embed(candidate)?;
            let score = cosine_similarity(&query_vec, &candidate_vec);
            if score > best_score {
                best_score = score;
                best_index = i as i64;
            }
        }
        Ok((best_index, best_score))
    }
}
