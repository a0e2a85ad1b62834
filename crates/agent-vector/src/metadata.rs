//! Vector metadata storage.
//!
//! Maps internal HNSW keys (u64) to vector ids and their metadata, with a
//! reverse id -> key index. Stored in RocksDB for persistence and atomic
//! updates.

use std::path::Path;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::VectorError;

/// Column family for key -> entry
pub const CF_VECTOR_META: &str = "vector_meta";

/// Column family for vector id -> key
pub const CF_VECTOR_IDS: &str = "vector_ids";

/// Column family for store counters
pub const CF_VECTOR_STATE: &str = "vector_state";

const NEXT_KEY: &[u8] = b"next_key";

/// Metadata of one indexed vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    /// Internal key in the HNSW index
    pub key: u64,
    /// External vector id
    pub id: String,
    pub metadata: Map<String, Value>,
}

/// Vector metadata storage using RocksDB.
pub struct VectorMetadata {
    db: DB,
}

impl VectorMetadata {
    /// Open or create metadata storage.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VectorError> {
        let path = path.as_ref();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_VECTOR_META, Options::default()),
            ColumnFamilyDescriptor::new(CF_VECTOR_IDS, Options::default()),
            ColumnFamilyDescriptor::new(CF_VECTOR_STATE, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        info!(path = ?path, "Opened vector metadata storage");
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, VectorError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| VectorError::ColumnFamilyNotFound(name.to_string()))
    }

    /// Store entries, drop `stale` keys and record the key counter in one
    /// atomic write.
    pub fn replace(
        &self,
        stale: &[u64],
        entries: &[VectorEntry],
        next_key: u64,
    ) -> Result<(), VectorError> {
        let meta_cf = self.cf(CF_VECTOR_META)?;
        let ids_cf = self.cf(CF_VECTOR_IDS)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_VECTOR_STATE)?, NEXT_KEY, next_key.to_be_bytes());
        for key in stale {
            batch.delete_cf(meta_cf, key.to_be_bytes());
        }
        for entry in entries {
            batch.put_cf(meta_cf, entry.key.to_be_bytes(), serde_json::to_vec(entry)?);
            batch.put_cf(ids_cf, entry.id.as_bytes(), entry.key.to_be_bytes());
        }
        self.db.write(batch)?;

        debug!(count = entries.len(), "Stored vector metadata");
        Ok(())
    }

    /// Delete entries by `(key, id)` atomically.
    pub fn delete_all(&self, keys: &[(u64, String)]) -> Result<(), VectorError> {
        let meta_cf = self.cf(CF_VECTOR_META)?;
        let ids_cf = self.cf(CF_VECTOR_IDS)?;

        let mut batch = WriteBatch::default();
        for (key, id) in keys {
            batch.delete_cf(meta_cf, key.to_be_bytes());
            batch.delete_cf(ids_cf, id.as_bytes());
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// Delete a metadata row without touching the id index.
    pub fn delete_key(&self, key: u64) -> Result<(), VectorError> {
        self.db.delete_cf(self.cf(CF_VECTOR_META)?, key.to_be_bytes())?;
        Ok(())
    }

    pub fn get(&self, key: u64) -> Result<Option<VectorEntry>, VectorError> {
        match self.db.get_cf(self.cf(CF_VECTOR_META)?, key.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Key currently assigned to a vector id.
    pub fn key_of(&self, id: &str) -> Result<Option<u64>, VectorError> {
        match self.db.get_cf(self.cf(CF_VECTOR_IDS)?, id.as_bytes())? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    VectorError::Serialization(format!("bad key bytes for '{}'", id))
                })?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    /// Persisted key counter; keys below it may still live in a saved index.
    pub fn next_key(&self) -> Result<u64, VectorError> {
        match self.db.get_cf(self.cf(CF_VECTOR_STATE)?, NEXT_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| VectorError::Serialization("bad counter bytes".to_string()))?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Highest key currently stored, if any.
    pub fn last_key(&self) -> Result<Option<u64>, VectorError> {
        let mut iter = self
            .db
            .iterator_cf(self.cf(CF_VECTOR_META)?, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                let raw: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| VectorError::Serialization("bad key bytes".to_string()))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    /// Get all entries.
    pub fn get_all(&self) -> Result<Vec<VectorEntry>, VectorError> {
        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator_cf(self.cf(CF_VECTOR_META)?, IteratorMode::Start);

        for item in iter {
            let (_, value) = item?;
            entries.push(serde_json::from_slice(&value)?);
        }

        Ok(entries)
    }
}
