//! External-processor stream errors. Only [`ExtProcError::MalformedRequestBody`] is ever
//! surfaced to the gateway; every other failure mode in this system degrades silently (see
//! `router_core`'s cache and embedding error handling).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtProcError {
    #[error("malformed chat request body: {reason}")]
    MalformedRequestBody { reason: String },

    #[error("stream transport error: {reason}")]
    Transport { reason: String },
}
