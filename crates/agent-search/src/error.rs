//! Search error types.

use agent_embeddings::EmbeddingError;
use agent_types::AgentError;
use agent_vector::VectorError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur during indexing and search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Request rejected before any provider call
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Embedding provider error
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector store error
    #[error("Vector store error: {0}")]
    Vector(#[from] VectorError),

    /// Domain type error (vector ids, sort expressions)
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Cursor could not be decoded to an offset
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Embedder and store disagree on vector size
    #[error("Dimension mismatch: embedder produces {embedder}, store expects {store}")]
    DimensionMismatch { embedder: usize, store: usize },
}
