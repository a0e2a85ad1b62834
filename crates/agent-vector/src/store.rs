//! Vector store provider traits.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::VectorError;
use crate::filter::NativeFilter;

/// A stored embedding with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: Map<String, Value>,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, embedding: Vec<f32>, metadata: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            embedding,
            metadata,
        }
    }
}

/// A nearest-neighbour query.
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub filter: Option<NativeFilter>,
    pub include_metadata: bool,
}

impl VectorQuery {
    pub fn new(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            vector,
            top_k,
            filter: None,
            include_metadata: true,
        }
    }

    pub fn with_filter(mut self, filter: Option<NativeFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }
}

/// One query hit, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    /// Cosine similarity (higher is closer)
    pub score: f32,
    /// Empty unless the query asked for metadata
    pub metadata: Map<String, Value>,
}

/// Trait for vector stores.
///
/// Implementations must be thread-safe for concurrent read access.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Largest `top_k` a query may ask for.
    fn max_top_k(&self) -> usize;

    /// Insert or replace the record with `record.id`.
    async fn upsert(&self, record: VectorRecord) -> Result<(), VectorError>;

    /// Return up to `top_k` matches passing the filter, best first.
    async fn query(&self, query: &VectorQuery) -> Result<Vec<QueryMatch>, VectorError>;

    /// Delete a record. Returns false if it did not exist.
    async fn delete(&self, id: &str) -> Result<bool, VectorError>;

    async fn count(&self) -> Result<usize, VectorError>;

    /// Flush in-memory state to durable storage.
    async fn persist(&self) -> Result<(), VectorError> {
        Ok(())
    }

    /// Batch capability, if the store has one.
    fn as_batch(&self) -> Option<&dyn BatchVectorStore> {
        None
    }
}

/// Stores that write many records per call.
#[async_trait]
pub trait BatchVectorStore: VectorStore {
    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<(), VectorError>;

    /// Delete records by id. Returns how many existed.
    async fn delete_many(&self, ids: &[String]) -> Result<usize, VectorError>;
}

/// Shared argument checks for store implementations.
pub(crate) fn check_query(
    query: &VectorQuery,
    dimensions: usize,
    max_top_k: usize,
) -> Result<(), VectorError> {
    if query.top_k > max_top_k {
        return Err(VectorError::TopKExceeded {
            requested: query.top_k,
            max: max_top_k,
        });
    }
    check_dimension(query.vector.len(), dimensions)
}

pub(crate) fn check_dimension(actual: usize, expected: usize) -> Result<(), VectorError> {
    if actual != expected {
        return Err(VectorError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
