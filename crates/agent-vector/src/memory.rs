//! Brute-force in-process vector store.

use std::collections::HashMap;
use std::sync::RwLock;

use agent_embeddings::Embedding;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::VectorError;
use crate::store::{
    check_dimension, check_query, BatchVectorStore, QueryMatch, VectorQuery, VectorRecord,
    VectorStore,
};

struct Entry {
    embedding: Embedding,
    metadata: Map<String, Value>,
}

/// Exact cosine search over a `HashMap`.
pub struct InMemoryVectorStore {
    dimensions: usize,
    max_top_k: usize,
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryVectorStore {
    pub fn new(dimensions: usize, max_top_k: usize) -> Self {
        Self {
            dimensions,
            max_top_k,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Stored metadata for an id.
    pub fn get_metadata(&self, id: &str) -> Result<Option<Map<String, Value>>, VectorError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| VectorError::LockPoisoned("memory store"))?;
        Ok(entries.get(id).map(|e| e.metadata.clone()))
    }

    fn insert(&self, records: Vec<VectorRecord>) -> Result<(), VectorError> {
        for record in &records {
            check_dimension(record.embedding.len(), self.dimensions)?;
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|_| VectorError::LockPoisoned("memory store"))?;
        for record in records {
            entries.insert(
                record.id,
                Entry {
                    embedding: Embedding::new(record.embedding),
                    metadata: record.metadata,
                },
            );
        }
        Ok(())
    }

    fn remove(&self, ids: &[String]) -> Result<usize, VectorError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| VectorError::LockPoisoned("memory store"))?;
        Ok(ids.iter().filter(|id| entries.remove(*id).is_some()).count())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_top_k(&self) -> usize {
        self.max_top_k
    }

    async fn upsert(&self, record: VectorRecord) -> Result<(), VectorError> {
        self.insert(vec![record])
    }

    async fn query(&self, query: &VectorQuery) -> Result<Vec<QueryMatch>, VectorError> {
        check_query(query, self.dimensions, self.max_top_k)?;
        if query.top_k == 0 {
            return Ok(Vec::new());
        }

        let probe = Embedding::new(query.vector.clone());
        let entries = self
            .entries
            .read()
            .map_err(|_| VectorError::LockPoisoned("memory store"))?;

        let mut scored: Vec<(&String, &Entry, f32)> = entries
            .iter()
            .filter(|(_, e)| {
                query
                    .filter
                    .as_ref()
                    .map_or(true, |f| f.matches(&e.metadata))
            })
            .map(|(id, e)| (id, e, probe.cosine_similarity(&e.embedding)))
            .collect();

        scored.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(b.0)));
        scored.truncate(query.top_k);

        debug!(top_k = query.top_k, found = scored.len(), "Memory query complete");

        Ok(scored
            .into_iter()
            .map(|(id, e, score)| QueryMatch {
                id: id.clone(),
                score,
                metadata: if query.include_metadata {
                    e.metadata.clone()
                } else {
                    Map::new()
                },
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, VectorError> {
        Ok(self.remove(&[id.to_string()])? > 0)
    }

    async fn count(&self) -> Result<usize, VectorError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| VectorError::LockPoisoned("memory store"))?;
        Ok(entries.len())
    }

    fn as_batch(&self) -> Option<&dyn BatchVectorStore> {
        Some(self)
    }
}

#[async_trait]
impl BatchVectorStore for InMemoryVectorStore {
    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<(), VectorError> {
        self.insert(records)
    }

    async fn delete_many(&self, ids: &[String]) -> Result<usize, VectorError> {
        self.remove(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::NativeFilter;
    use serde_json::json;

    fn meta(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = InMemoryVectorStore::new(2, 100);
        let record = VectorRecord::new("1-a", vec![1.0, 0.0], meta(json!({"name": "A"})));

        store.upsert(record.clone()).await.unwrap();
        store.upsert(record).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_orders_and_filters() {
        let store = InMemoryVectorStore::new(2, 100);
        store
            .upsert_batch(vec![
                VectorRecord::new("1-a", vec![1.0, 0.0], meta(json!({"chainId": 1}))),
                VectorRecord::new("1-b", vec![0.7, 0.7], meta(json!({"chainId": 1}))),
                VectorRecord::new("2-c", vec![1.0, 0.1], meta(json!({"chainId": 2}))),
            ])
            .await
            .unwrap();

        let all = store
            .query(&VectorQuery::new(vec![1.0, 0.0], 10))
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1-a", "2-c", "1-b"]);

        let filtered = store
            .query(&VectorQuery::new(vec![1.0, 0.0], 10).with_filter(Some(
                NativeFilter::Eq {
                    field: "chainId".into(),
                    value: 1i64.into(),
                },
            )))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|m| m.id.starts_with("1-")));
    }

    #[tokio::test]
    async fn test_query_limits() {
        let store = InMemoryVectorStore::new(2, 5);
        let err = store
            .query(&VectorQuery::new(vec![1.0, 0.0], 6))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::TopKExceeded { requested: 6, max: 5 }));

        let err = store
            .query(&VectorQuery::new(vec![1.0], 1))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_metadata_omitted_on_request() {
        let store = InMemoryVectorStore::new(2, 10);
        store
            .upsert(VectorRecord::new("1-a", vec![1.0, 0.0], meta(json!({"name": "A"}))))
            .await
            .unwrap();

        let hits = store
            .query(&VectorQuery::new(vec![1.0, 0.0], 1).with_metadata(false))
            .await
            .unwrap();
        assert!(hits[0].metadata.is_empty());
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = InMemoryVectorStore::new(2, 10);
        store
            .upsert(VectorRecord::new("1-a", vec![1.0, 0.0], Map::new()))
            .await
            .unwrap();

        let removed = store
            .delete_many(&["1-a".to_string(), "1-missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!store.delete("1-a").await.unwrap());
    }
}
