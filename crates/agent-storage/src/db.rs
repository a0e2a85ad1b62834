//! RocksDB wrapper for agent-search storage.
//!
//! Provides:
//! - Database open with column family setup
//! - Atomic write batches for full-set sync state replacement
//! - Monotonic sync log ids and event sequences

use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::column_families::{build_cf_descriptors, CF_SYNC_EVENTS, CF_SYNC_LOG, CF_SYNC_STATE};
use crate::error::StorageError;
use crate::keys::{ChainStateKey, SyncEventKey, SyncLogKey};

/// Main storage interface for agent-search
pub struct Storage {
    db: DB,
    /// Next sync log id
    log_sequence: AtomicU64,
    /// Next sync event sequence
    event_sequence: AtomicU64,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())?;

        let log_sequence = Self::load_log_sequence(&db)?.max(1);
        let event_sequence = Self::load_event_sequence(&db)?;

        Ok(Self {
            db,
            log_sequence: AtomicU64::new(log_sequence),
            event_sequence: AtomicU64::new(event_sequence),
        })
    }

    /// One past the highest sync log id in storage
    fn load_log_sequence(db: &DB) -> Result<u64, StorageError> {
        let cf = db
            .cf_handle(CF_SYNC_LOG)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_SYNC_LOG.to_string()))?;

        // Iterate in reverse to find highest key
        let mut iter = db.iterator_cf(cf, IteratorMode::End);
        if let Some(result) = iter.next() {
            let (key, _) = result?;
            return Ok(SyncLogKey::from_bytes(&key)?.log_id + 1);
        }
        Ok(0)
    }

    /// One past the highest event sequence; events sort by log id first,
    /// so the whole column family is scanned.
    fn load_event_sequence(db: &DB) -> Result<u64, StorageError> {
        let cf = db
            .cf_handle(CF_SYNC_EVENTS)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_SYNC_EVENTS.to_string()))?;

        let mut next = 0;
        for item in db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            next = next.max(SyncEventKey::from_bytes(&key)?.sequence + 1);
        }
        Ok(next)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    // ==================== Sync State ====================

    pub fn get_chain_state(&self, chain_id: u64) -> Result<Option<Vec<u8>>, StorageError> {
        let key = ChainStateKey::new(chain_id);
        Ok(self.db.get_cf(self.cf(CF_SYNC_STATE)?, key.to_bytes())?)
    }

    pub fn put_chain_state(&self, chain_id: u64, bytes: &[u8]) -> Result<(), StorageError> {
        let key = ChainStateKey::new(chain_id);
        self.db.put_cf(self.cf(CF_SYNC_STATE)?, key.to_bytes(), bytes)?;
        Ok(())
    }

    /// Every persisted chain state, ordered by chain id.
    pub fn get_all_chain_states(&self) -> Result<Vec<(u64, Vec<u8>)>, StorageError> {
        let mut results = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_SYNC_STATE)?, IteratorMode::Start) {
            let (key, value) = item?;
            results.push((ChainStateKey::from_bytes(&key)?.chain_id, value.to_vec()));
        }
        Ok(results)
    }

    /// Upsert `puts` and delete `deletes` in one atomic write.
    pub fn write_chain_states(
        &self,
        puts: &[(u64, Vec<u8>)],
        deletes: &[u64],
    ) -> Result<(), StorageError> {
        let cf = self.cf(CF_SYNC_STATE)?;
        let mut batch = WriteBatch::default();
        for (chain_id, bytes) in puts {
            batch.put_cf(cf, ChainStateKey::new(*chain_id).to_bytes(), bytes);
        }
        for chain_id in deletes {
            batch.delete_cf(cf, ChainStateKey::new(*chain_id).to_bytes());
        }
        self.db.write(batch)?;
        debug!(puts = puts.len(), deletes = deletes.len(), "Wrote chain states");
        Ok(())
    }

    // ==================== Sync Log ====================

    /// Reserve the next sync log id.
    pub fn next_log_id(&self) -> u64 {
        self.log_sequence.fetch_add(1, Ordering::SeqCst)
    }

    pub fn put_log_entry(&self, log_id: u64, bytes: &[u8]) -> Result<(), StorageError> {
        self.db
            .put_cf(self.cf(CF_SYNC_LOG)?, SyncLogKey::new(log_id).to_bytes(), bytes)?;
        Ok(())
    }

    /// Write an entry and one of its events atomically.
    pub fn put_log_entry_with_event(
        &self,
        log_id: u64,
        entry_bytes: &[u8],
        event_bytes: &[u8],
    ) -> Result<(), StorageError> {
        let event_key = SyncEventKey::new(log_id, self.next_event_sequence());
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_SYNC_LOG)?,
            SyncLogKey::new(log_id).to_bytes(),
            entry_bytes,
        );
        batch.put_cf(self.cf(CF_SYNC_EVENTS)?, event_key.to_bytes(), event_bytes);
        self.db.write(batch)?;
        Ok(())
    }

    pub fn get_log_entry(&self, log_id: u64) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .db
            .get_cf(self.cf(CF_SYNC_LOG)?, SyncLogKey::new(log_id).to_bytes())?)
    }

    /// Most recent entries first.
    pub fn get_recent_log_entries(&self, limit: usize) -> Result<Vec<Vec<u8>>, StorageError> {
        let mut results = Vec::new();
        for item in self
            .db
            .iterator_cf(self.cf(CF_SYNC_LOG)?, IteratorMode::End)
            .take(limit)
        {
            let (_, value) = item?;
            results.push(value.to_vec());
        }
        Ok(results)
    }

    fn next_event_sequence(&self) -> u64 {
        self.event_sequence.fetch_add(1, Ordering::SeqCst)
    }

    pub fn append_log_event(&self, log_id: u64, bytes: &[u8]) -> Result<(), StorageError> {
        let key = SyncEventKey::new(log_id, self.next_event_sequence());
        self.db
            .put_cf(self.cf(CF_SYNC_EVENTS)?, key.to_bytes(), bytes)?;
        Ok(())
    }

    /// Events of one run in append order.
    pub fn get_log_events(&self, log_id: u64) -> Result<Vec<Vec<u8>>, StorageError> {
        let prefix = SyncEventKey::prefix(log_id);
        let iter = self.db.iterator_cf(
            self.cf(CF_SYNC_EVENTS)?,
            IteratorMode::From(&prefix, Direction::Forward),
        );

        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            results.push(value.to_vec());
        }
        Ok(results)
    }
}
