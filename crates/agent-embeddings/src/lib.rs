//! # agent-embeddings
//!
//! Embedding providers for agent-search.
//!
//! - [`EmbeddingProvider`]: single-text embedding, implemented by every provider
//! - [`BatchEmbeddingProvider`]: optional batch capability, probed via
//!   [`EmbeddingProvider::as_batch`]
//! - [`OpenAiEmbedder`]: OpenAI-compatible HTTP provider with retries and local
//!   token-limit checks
//! - [`MockEmbedder`]: deterministic hashed bag-of-words embedder

pub mod embedding;
pub mod error;
pub mod mock;
pub mod openai;
pub mod provider;

pub use embedding::{EmbedderInfo, Embedding};
pub use error::EmbeddingError;
pub use mock::MockEmbedder;
pub use openai::{OpenAiConfig, OpenAiEmbedder};
pub use provider::{create_provider, BatchEmbeddingProvider, EmbeddingProvider};
