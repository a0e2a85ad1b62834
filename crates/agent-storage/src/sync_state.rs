//! Persisted per-chain sync state.
//!
//! One row per chain. `save` replaces the whole set: chains present are
//! upserted and persisted chains absent from the map are deleted, in a
//! single atomic write. Read failures are logged and reported as "no prior
//! state" so a sync can start fresh.

use std::sync::Arc;

use agent_types::{ChainSyncState, SyncState};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::db::Storage;
use crate::error::StorageError;

/// Durable store of [`SyncState`].
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    /// Every chain's state; `None` when nothing is stored or the read failed.
    async fn load(&self) -> Option<SyncState>;

    /// Replace the stored state with `state`.
    async fn save(&self, state: &SyncState) -> Result<(), StorageError>;

    /// Delete every chain's state.
    async fn clear(&self) -> Result<(), StorageError>;

    /// One chain's state; `None` when absent or unreadable.
    async fn load_chain(&self, chain_id: u64) -> Option<ChainSyncState>;

    /// Upsert one chain's state, leaving other chains untouched.
    async fn save_chain(&self, chain_id: u64, state: &ChainSyncState)
        -> Result<(), StorageError>;
}

/// [`SyncStateStore`] over the `sync_state` column family.
pub struct RocksSyncStateStore {
    storage: Arc<Storage>,
}

impl RocksSyncStateStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    fn read_all(&self) -> Result<SyncState, StorageError> {
        let mut state = SyncState::new();
        for (chain_id, bytes) in self.storage.get_all_chain_states()? {
            state.insert(chain_id, serde_json::from_slice(&bytes)?);
        }
        Ok(state)
    }

    fn read_chain(&self, chain_id: u64) -> Result<Option<ChainSyncState>, StorageError> {
        match self.storage.get_chain_state(chain_id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SyncStateStore for RocksSyncStateStore {
    async fn load(&self) -> Option<SyncState> {
        match self.read_all() {
            Ok(state) if state.is_empty() => None,
            Ok(state) => Some(state),
            Err(e) => {
                warn!(error = %e, "Failed to load sync state, starting fresh");
                None
            }
        }
    }

    async fn save(&self, state: &SyncState) -> Result<(), StorageError> {
        let mut puts = Vec::with_capacity(state.len());
        for (chain_id, chain_state) in state {
            puts.push((*chain_id, serde_json::to_vec(chain_state)?));
        }

        let deletes: Vec<u64> = self
            .storage
            .get_all_chain_states()?
            .into_iter()
            .map(|(chain_id, _)| chain_id)
            .filter(|chain_id| !state.contains_key(chain_id))
            .collect();

        self.storage.write_chain_states(&puts, &deletes)?;
        debug!(chains = puts.len(), removed = deletes.len(), "Saved sync state");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.save(&SyncState::new()).await
    }

    async fn load_chain(&self, chain_id: u64) -> Option<ChainSyncState> {
        match self.read_chain(chain_id) {
            Ok(state) => state,
            Err(e) => {
                warn!(chain_id, error = %e, "Failed to load chain sync state, starting fresh");
                None
            }
        }
    }

    async fn save_chain(
        &self,
        chain_id: u64,
        state: &ChainSyncState,
    ) -> Result<(), StorageError> {
        self.storage
            .put_chain_state(chain_id, &serde_json::to_vec(state)?)?;
        debug!(chain_id, agents = state.agent_count(), "Saved chain sync state");
        Ok(())
    }
}
