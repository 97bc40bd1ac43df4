//! Resilient generation client
//!
//! Turns a templated prompt into a structured JSON result via the Gemini
//! API, with API-key rotation, model fallback, bounded retry with backoff,
//! and lenient recovery of malformed model output.

use std::sync::Arc;

use crate::config::Config;

mod classify;
pub mod client;
mod error;
mod gemini;
mod keys;
mod recover;

pub use classify::{ErrorKind, classify};
pub use client::{Generated, GenerationClient, TextGenerator};
pub use error::{GenerateError, ProviderError};
pub use gemini::GeminiBackend;
pub use keys::KeyRing;
pub use recover::decode_lenient;

/// Create a generation client backed by the real Gemini API
pub fn create_client(config: &Config) -> eyre::Result<Arc<GenerationClient>> {
    Ok(Arc::new(GenerationClient::from_config(config)?))
}
