//! Persistent vector store: usearch HNSW index plus RocksDB metadata.
//!
//! Every upsert gets a fresh internal key; the previous key of the same id
//! is removed from the index and its metadata row dropped in the same
//! RocksDB write. Metadata is durable on every write; the index file is
//! written by [`VectorStore::persist`]. On open, metadata rows whose key is
//! missing from the saved index are discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::VectorError;
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::metadata::{VectorEntry, VectorMetadata};
use crate::store::{
    check_dimension, check_query, BatchVectorStore, QueryMatch, VectorQuery, VectorRecord,
    VectorStore,
};

#[derive(Default)]
struct KeyState {
    ids: HashMap<String, u64>,
    entries: HashMap<u64, (String, Map<String, Value>)>,
}

/// HNSW-backed [`VectorStore`].
pub struct HnswVectorStore {
    index: HnswIndex,
    meta: VectorMetadata,
    state: RwLock<KeyState>,
    next_key: AtomicU64,
    max_top_k: usize,
}

impl HnswVectorStore {
    /// Open or create the store under `config.index_path`.
    pub fn open(config: HnswConfig, max_top_k: usize) -> Result<Self, VectorError> {
        let meta_path = config.index_path.join("meta");
        let index = HnswIndex::open_or_create(config)?;
        let meta = VectorMetadata::open(meta_path)?;

        let mut state = KeyState::default();
        let mut stale = Vec::new();
        for entry in meta.get_all()? {
            if !index.contains(entry.key)? {
                stale.push(entry);
                continue;
            }
            state.ids.insert(entry.id.clone(), entry.key);
            state.entries.insert(entry.key, (entry.id, entry.metadata));
        }

        if !stale.is_empty() {
            warn!(count = stale.len(), "Dropping metadata for vectors missing from index");
            for entry in stale {
                if meta.key_of(&entry.id)? == Some(entry.key) {
                    meta.delete_all(&[(entry.key, entry.id)])?;
                } else {
                    meta.delete_key(entry.key)?;
                }
            }
        }

        let next_key = meta
            .next_key()?
            .max(meta.last_key()?.map_or(0, |k| k + 1));

        info!(
            vectors = state.entries.len(),
            next_key = next_key,
            "Opened HNSW vector store"
        );

        Ok(Self {
            index,
            meta,
            state: RwLock::new(state),
            next_key: AtomicU64::new(next_key),
            max_top_k,
        })
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, KeyState>, VectorError> {
        self.state
            .read()
            .map_err(|_| VectorError::LockPoisoned("hnsw store state"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, KeyState>, VectorError> {
        self.state
            .write()
            .map_err(|_| VectorError::LockPoisoned("hnsw store state"))
    }

    /// Stored metadata for an id.
    pub fn get_metadata(&self, id: &str) -> Result<Option<Map<String, Value>>, VectorError> {
        let state = self.read_state()?;
        Ok(state
            .ids
            .get(id)
            .and_then(|key| state.entries.get(key))
            .map(|(_, metadata)| metadata.clone()))
    }

    fn upsert_many(&self, records: Vec<VectorRecord>) -> Result<(), VectorError> {
        for record in &records {
            check_dimension(record.embedding.len(), self.index.dimension())?;
        }

        let mut state = self.write_state()?;
        let mut stale = Vec::new();
        let mut entries = Vec::with_capacity(records.len());

        for record in records {
            if let Some(old) = state.ids.get(&record.id).copied() {
                self.index.remove(old)?;
                state.entries.remove(&old);
                stale.push(old);
            }

            let key = self.next_key.fetch_add(1, Ordering::SeqCst);
            self.index.add(key, &record.embedding)?;

            state.ids.insert(record.id.clone(), key);
            state
                .entries
                .insert(key, (record.id.clone(), record.metadata.clone()));
            entries.push(VectorEntry {
                key,
                id: record.id,
                metadata: record.metadata,
            });
        }

        self.meta
            .replace(&stale, &entries, self.next_key.load(Ordering::SeqCst))?;

        debug!(upserted = entries.len(), replaced = stale.len(), "Upserted vectors");
        Ok(())
    }

    fn delete_ids(&self, ids: &[String]) -> Result<usize, VectorError> {
        let mut state = self.write_state()?;
        let mut removed = Vec::new();

        for id in ids {
            if let Some(key) = state.ids.remove(id) {
                self.index.remove(key)?;
                state.entries.remove(&key);
                removed.push((key, id.clone()));
            }
        }

        if !removed.is_empty() {
            self.meta.delete_all(&removed)?;
        }
        Ok(removed.len())
    }
}

#[async_trait]
impl VectorStore for HnswVectorStore {
    fn name(&self) -> &str {
        "hnsw"
    }

    fn dimensions(&self) -> usize {
        self.index.dimension()
    }

    fn max_top_k(&self) -> usize {
        self.max_top_k
    }

    async fn upsert(&self, record: VectorRecord) -> Result<(), VectorError> {
        self.upsert_many(vec![record])
    }

    async fn query(&self, query: &VectorQuery) -> Result<Vec<QueryMatch>, VectorError> {
        check_query(query, self.index.dimension(), self.max_top_k)?;

        let state = self.read_state()?;
        let filter = query.filter.as_ref();
        let hits = self.index.search(&query.vector, query.top_k, |key| {
            state
                .entries
                .get(&key)
                .is_some_and(|(_, metadata)| filter.map_or(true, |f| f.matches(metadata)))
        })?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let (id, metadata) = state.entries.get(&hit.key)?;
                Some(QueryMatch {
                    id: id.clone(),
                    score: hit.score,
                    metadata: if query.include_metadata {
                        metadata.clone()
                    } else {
                        Map::new()
                    },
                })
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, VectorError> {
        Ok(self.delete_ids(&[id.to_string()])? > 0)
    }

    async fn count(&self) -> Result<usize, VectorError> {
        Ok(self.read_state()?.entries.len())
    }

    async fn persist(&self) -> Result<(), VectorError> {
        self.index.save()
    }

    fn as_batch(&self) -> Option<&dyn BatchVectorStore> {
        Some(self)
    }
}

#[async_trait]
impl BatchVectorStore for HnswVectorStore {
    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<(), VectorError> {
        self.upsert_many(records)
    }

    async fn delete_many(&self, ids: &[String]) -> Result<usize, VectorError> {
        self.delete_ids(ids)
    }
}
