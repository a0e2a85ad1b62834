//! Error types for the sync pipeline.

use agent_embeddings::EmbeddingError;
use agent_search::SearchError;
use agent_storage::StorageError;
use agent_vector::VectorError;
use thiserror::Error;

/// Errors that can occur in the sync pipeline
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Sync state or sync log storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Indexing through the search manager failed
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Vector store error
    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    /// Embedding generation error
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Subgraph request failed or returned errors
    #[error("Subgraph error (status {status:?}): {message}")]
    Subgraph {
        status: Option<u16>,
        message: String,
    },

    /// Missing or invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Queue closed or message rejected
    #[error("Queue error: {0}")]
    Queue(String),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IndexingError {
    /// True for subgraph failures worth retrying: 429, 5xx and transport errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            IndexingError::Subgraph { status: None, .. } => true,
            IndexingError::Subgraph {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for IndexingError {
    fn from(err: serde_json::Error) -> Self {
        IndexingError::Serialization(err.to_string())
    }
}
