//! Append-only audit log of sync runs.
//!
//! A run is opened with [`SyncLogger::start`] for a set of chains. Each
//! chain's worker reports once through [`SyncLogger::record_chain_result`];
//! the report that covers the last outstanding chain completes the entry.
//! An entry is completed at most once.

use std::sync::{Arc, Mutex};

use agent_types::{ChainSyncReport, SyncEventKind, SyncLogEntry, SyncLogEvent, SyncStatus};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::db::Storage;
use crate::error::StorageError;

/// Outcome of one chain within a run.
#[derive(Debug, Clone)]
pub enum ChainOutcome {
    Success(ChainSyncReport),
    Failed(String),
}

/// Writer and reader of sync log entries and events.
pub struct SyncLogger {
    storage: Arc<Storage>,
    /// Serializes read-modify-write of entries
    write_lock: Mutex<()>,
}

impl SyncLogger {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a pending entry for `chains` and record a `started` event.
    pub fn start(&self, chains: &[u64]) -> Result<u64, StorageError> {
        let log_id = self.storage.next_log_id();
        let entry = SyncLogEntry::new(log_id, chains.to_vec());
        let event = SyncLogEvent::new(
            log_id,
            SyncEventKind::Started,
            format!("sync started for {} chain(s)", chains.len()),
        )
        .with_data(json!({ "chains": chains }));

        self.storage.put_log_entry_with_event(
            log_id,
            &serde_json::to_vec(&entry)?,
            &serde_json::to_vec(&event)?,
        )?;

        info!(log_id, chains = ?chains, "Sync run started");
        Ok(log_id)
    }

    /// Append an event to a run.
    pub fn record_event(&self, event: &SyncLogEvent) -> Result<(), StorageError> {
        self.storage
            .append_log_event(event.log_id, &serde_json::to_vec(event)?)
    }

    /// Record one chain's outcome.
    ///
    /// Returns the completed entry when this report finished the run.
    pub fn record_chain_result(
        &self,
        log_id: u64,
        chain_id: u64,
        outcome: ChainOutcome,
    ) -> Result<Option<SyncLogEntry>, StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::LockPoisoned("sync log"))?;

        let mut entry = self.read_entry(log_id)?;
        if entry.is_completed() {
            warn!(log_id, chain_id, "Chain reported on completed sync run, ignoring");
            return Ok(None);
        }
        if entry.reported_chains.contains(&chain_id) {
            warn!(log_id, chain_id, "Chain reported twice, ignoring");
            return Ok(None);
        }
        if !entry.chains.contains(&chain_id) {
            warn!(log_id, chain_id, "Chain was not part of sync run, adding");
            entry.chains.push(chain_id);
        }
        entry.reported_chains.push(chain_id);

        let event = match &outcome {
            ChainOutcome::Success(report) => {
                entry.agents_indexed += report.agents_indexed;
                entry.agents_deleted += report.agents_deleted;
                entry.batches_processed += report.batches_processed;
                SyncLogEvent::new(log_id, SyncEventKind::ChainCompleted, "chain sync completed")
                    .for_chain(chain_id)
                    .with_data(serde_json::to_value(report)?)
            }
            ChainOutcome::Failed(message) => {
                let line = format!("chain {}: {}", chain_id, message);
                entry.error_message = Some(match entry.error_message.take() {
                    Some(existing) => format!("{}; {}", existing, line),
                    None => line,
                });
                SyncLogEvent::new(log_id, SyncEventKind::ChainFailed, message.clone())
                    .for_chain(chain_id)
            }
        };

        self.storage.put_log_entry_with_event(
            log_id,
            &serde_json::to_vec(&entry)?,
            &serde_json::to_vec(&event)?,
        )?;

        if entry.all_chains_reported() {
            let status = if entry.error_message.is_some() {
                SyncStatus::Error
            } else {
                SyncStatus::Success
            };
            return self.complete_locked(entry, status).map(Some);
        }
        Ok(None)
    }

    /// Complete a run with `error`, whatever its chains reported.
    ///
    /// No-op on an already completed entry.
    pub fn fail(&self, log_id: u64, message: &str) -> Result<Option<SyncLogEntry>, StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::LockPoisoned("sync log"))?;

        let mut entry = self.read_entry(log_id)?;
        if entry.is_completed() {
            return Ok(None);
        }
        entry.error_message = Some(match entry.error_message.take() {
            Some(existing) => format!("{}; {}", existing, message),
            None => message.to_string(),
        });
        self.complete_locked(entry, SyncStatus::Error).map(Some)
    }

    fn complete_locked(
        &self,
        mut entry: SyncLogEntry,
        status: SyncStatus,
    ) -> Result<SyncLogEntry, StorageError> {
        entry.status = status;
        entry.completed_at = Some(Utc::now());

        let (kind, message) = match status {
            SyncStatus::Error => (
                SyncEventKind::Failed,
                entry
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "sync failed".to_string()),
            ),
            _ => (SyncEventKind::Completed, "sync completed".to_string()),
        };
        let event = SyncLogEvent::new(entry.id, kind, message);

        self.storage.put_log_entry_with_event(
            entry.id,
            &serde_json::to_vec(&entry)?,
            &serde_json::to_vec(&event)?,
        )?;

        info!(
            log_id = entry.id,
            status = %entry.status,
            agents_indexed = entry.agents_indexed,
            agents_deleted = entry.agents_deleted,
            "Sync run completed"
        );
        Ok(entry)
    }

    fn read_entry(&self, log_id: u64) -> Result<SyncLogEntry, StorageError> {
        self.get(log_id)?.ok_or(StorageError::NotFound(log_id))
    }

    pub fn get(&self, log_id: u64) -> Result<Option<SyncLogEntry>, StorageError> {
        match self.storage.get_log_entry(log_id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Most recent entries first.
    pub fn recent(&self, limit: usize) -> Result<Vec<SyncLogEntry>, StorageError> {
        self.storage
            .get_recent_log_entries(limit)?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(StorageError::from))
            .collect()
    }

    /// Events of a run in append order.
    pub fn events(&self, log_id: u64) -> Result<Vec<SyncLogEvent>, StorageError> {
        self.storage
            .get_log_events(log_id)?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(StorageError::from))
            .collect()
    }
}
