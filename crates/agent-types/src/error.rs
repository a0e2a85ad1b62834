//! Error types shared across the agent-search workspace.

use thiserror::Error;

/// Errors raised by the shared domain types.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Vector id could not be parsed
    #[error("Invalid vector id: {0}")]
    InvalidVectorId(String),

    /// Sort expression could not be parsed
    #[error("Invalid sort expression: {0}")]
    InvalidSort(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
