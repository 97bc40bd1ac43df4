//! Generation client error types

use thiserror::Error;

/// Opaque failure reported by the provider for a single attempt.
///
/// The provider is an external collaborator; all we get is message text,
/// which [`crate::llm::classify`] turns into a retry decision.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Raw provider message text
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Terminal errors from a whole `generate` call
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("no API credentials configured")]
    NoCredentials,

    #[error("all models are currently unavailable (quota exceeded or overloaded), please try again later")]
    Exhausted,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("unparseable model output: {reason}; text prefix: {prefix}")]
    Unparseable {
        /// The original decode error
        reason: String,
        /// Bounded prefix of the offending text, for diagnostics
        prefix: String,
    },
}

impl GenerateError {
    /// True when the caller should present a "quota exhausted, try later"
    /// message rather than a generic failure
    pub fn is_quota_exhaustion(&self) -> bool {
        matches!(self, GenerateError::Exhausted)
    }
}
