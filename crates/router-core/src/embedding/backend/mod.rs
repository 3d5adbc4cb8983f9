//! Concrete embedding backends: a real GGUF-backed transformer and a deterministic stub used
//! in tests and by deployments that don't want a dependency on real model assets.

pub mod model;

use std::sync::Arc;

use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use parking_lot::Mutex;
use tokenizers::Tokenizer;
use tracing::{info, warn};

use super::error::EmbeddingError;
use super::utils::load_tokenizer;
use model::Qwen2ForEmbedding;

/// The literal model id that selects the deterministic stub backend instead of loading a real
/// model from disk. Used by tests and by deployments without access to real model assets.
pub const STUB_MODEL_ID: &str = "stub";

pub(crate) enum EmbedderBackend {
    Model {
        model: Arc<Mutex<Qwen2ForEmbedding>>,
        tokenizer: Arc<Tokenizer>,
        device: Device,
    },
    Stub {
        dim: usize,
    },
}

impl EmbedderBackend {
    pub(crate) fn load(
        model_id: &str,
        device: Device,
        max_seq_len: usize,
        stub_dim: usize,
    ) -> Result<Self, EmbeddingError> {
        if model_id == STUB_MODEL_ID {
            info!("embedding backend: stub (deterministic, no model file loaded)");
            return Ok(EmbedderBackend::Stub { dim: stub_dim });
        }

        let path = std::path::Path::new(model_id);
        if !path.exists() {
            return Err(EmbeddingError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }

        let mut file = std::fs::File::open(path)?;
        let content = gguf_file::Content::read(&mut file).map_err(|err| {
            EmbeddingError::ModelLoadFailed {
                reason: format!("invalid gguf file {}: {err}", path.display()),
            }
        })?;
        let model = Qwen2ForEmbedding::from_gguf(content, &mut file, &device, max_seq_len)?;
        let tokenizer = load_tokenizer(path).map_err(|err| EmbeddingError::TokenizationFailed {
            reason: err.to_string(),
        })?;

        info!(model = %path.display(), "embedding backend: model loaded");
        Ok(EmbedderBackend::Model {
            model: Arc::new(Mutex::new(model)),
            tokenizer: Arc::new(tokenizer),
            device,
        })
    }

    pub(crate) fn dimension(&self) -> usize {
        match self {
            EmbedderBackend::Model { model, .. } => model.lock().config().hidden_size,
            EmbedderBackend::Stub { dim } => *dim,
        }
    }

    pub(crate) fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            EmbedderBackend::Stub { dim } => Ok(stub_embed(text, *dim)),
            EmbedderBackend::Model {
                model,
                tokenizer,
                device,
            } => {
                let encoding =
                    tokenizer
                        .encode(text, true)
                        .map_err(|err| EmbeddingError::TokenizationFailed {
                            reason: err.to_string(),
                        })?;
                let ids: Vec<u32> = encoding.get_ids().to_vec();
                if ids.is_empty() {
                    return Err(EmbeddingError::TokenizationFailed {
                        reason: "empty token sequence".to_string(),
                    });
                }
                let ids_i64: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
                let input = Tensor::new(ids_i64.as_slice(), device)?.unsqueeze(0)?;

                let model = model.lock();
                let hidden = model.forward(&input)?;
                drop(model);

                // Mean-pool across the sequence dimension, then L2-normalize.
                let pooled = hidden.mean(1)?.squeeze(0)?;
                let values: Vec<f32> = pooled.to_vec1().map_err(|err| {
                    EmbeddingError::InferenceFailed {
                        reason: err.to_string(),
                    }
                })?;
                Ok(normalize(values))
            }
        }
    }
}

/// Deterministic, content-derived unit vector. Not a semantically meaningful embedding, but
/// stable and cheap enough to drive tests and asset-free deployments without a GPU or model
/// files.
fn stub_embed(text: &str, dim: usize) -> Vec<f32> {
    let mut values = vec![0.0f32; dim];
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return values;
    }
    let mut state: u64 = 1469598103934665603; // FNV offset basis
    for &b in bytes {
        state ^= b as u64;
        state = state.wrapping_mul(1099511628211); // FNV prime
        let idx = (state as usize) % dim;
        values[idx] += 1.0;
        state = state.rotate_left(13);
    }
    normalize(values)
}

fn normalize(mut values: Vec<f32>) -> Vec<f32> {
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for v in values.iter_mut() {
            *v /= norm;
        }
    } else {
        warn!("embedding normalization produced a zero or non-finite norm");
    }
    values
}
