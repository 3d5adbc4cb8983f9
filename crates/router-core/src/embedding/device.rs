//! Compute device selection for the embedding model.

use candle_core::Device;
use tracing::{debug, info, warn};

use super::error::EmbeddingError;

/// Selects the best available device, honoring the `cpu`/`metal`/`cuda` feature flags compiled
/// into this crate. Falls back to CPU when no accelerator is available or requested.
pub fn select_device(use_cpu: bool) -> Result<Device, EmbeddingError> {
    if use_cpu {
        debug!("embedding device: cpu requested explicitly");
        return Ok(Device::Cpu);
    }

    let mut failures: Vec<String> = Vec::new();

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("embedding device: metal");
                return Ok(device);
            }
            Err(err) => failures.push(format!("metal: {err}")),
        }
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("embedding device: cuda");
                return Ok(device);
            }
            Err(err) => failures.push(format!("cuda: {err}")),
        }
    }

    if !failures.is_empty() {
        warn!(attempts = ?failures, "accelerator device unavailable, falling back to cpu");
    } else {
        debug!("embedding device: cpu (no accelerator feature compiled in)");
    }
    Ok(Device::Cpu)
}
