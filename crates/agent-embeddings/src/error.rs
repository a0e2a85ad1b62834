//! Embedding error types.

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Input exceeds the model's token window
    #[error("Input exceeds token limit: {tokens} tokens, limit {limit}")]
    TokenLimit { tokens: usize, limit: usize },

    /// Provider returned a non-success response
    #[error("Embedding API error (status {status:?}): {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Failed to parse a provider response
    #[error("Failed to parse embedding response: {0}")]
    Parse(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid provider configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EmbeddingError {
    /// True when the error means "this input is too long for the model".
    ///
    /// Matches the explicit variant and provider messages such as
    /// "maximum context length is 8192 tokens".
    pub fn is_token_limit(&self) -> bool {
        match self {
            EmbeddingError::TokenLimit { .. } => true,
            EmbeddingError::Api { message, .. } | EmbeddingError::InvalidInput(message) => {
                let msg = message.to_ascii_lowercase();
                msg.contains("context length")
                    || (msg.contains("token")
                        && (msg.contains("limit")
                            || msg.contains("maximum")
                            || msg.contains("exceed")))
            }
            _ => false,
        }
    }

    /// True for failures worth retrying: rate limits, 5xx and transport errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::RateLimited => true,
            EmbeddingError::Api { status: None, .. } => true,
            EmbeddingError::Api {
                status: Some(code), ..
            } => *code >= 500,
            _ => false,
        }
    }
}
