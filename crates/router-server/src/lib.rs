//! External-processor gRPC service for the inline LLM request router.

pub mod extproc;
pub mod model;
pub mod observability;
pub mod pb;
pub mod server;
pub mod state;

pub use server::{ServerConfig, run};
pub use state::AppState;
