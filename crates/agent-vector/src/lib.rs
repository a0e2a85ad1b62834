//! # agent-vector
//!
//! Vector store providers for agent-search.
//!
//! - [`VectorStore`] / [`BatchVectorStore`]: provider traits; batch support
//!   is probed via [`VectorStore::as_batch`]
//! - [`NativeFilter`]: equality and membership filters evaluated in-store
//! - [`InMemoryVectorStore`]: exact cosine search, no persistence
//! - [`HnswVectorStore`]: usearch HNSW index with RocksDB metadata

pub mod error;
pub mod filter;
pub mod hnsw;
pub mod hnsw_store;
pub mod memory;
pub mod metadata;
pub mod store;

pub use error::VectorError;
pub use filter::NativeFilter;
pub use hnsw::{HnswConfig, HnswIndex, KeyHit};
pub use hnsw_store::HnswVectorStore;
pub use memory::InMemoryVectorStore;
pub use metadata::{VectorEntry, VectorMetadata, CF_VECTOR_IDS, CF_VECTOR_META, CF_VECTOR_STATE};
pub use store::{BatchVectorStore, QueryMatch, VectorQuery, VectorRecord, VectorStore};
