//! Scheduled sync trigger.
//!
//! One run: validate the configuration, prune state of chains no longer
//! configured, open a sync log entry, enqueue one `chain-sync` message per
//! chain and record that they were queued.

use std::sync::Arc;

use agent_storage::{SyncLogger, SyncStateStore};
use agent_types::{
    ChainSettings, ChainSyncMessage, QueueMessage, SyncEventKind, SyncLogEvent, SyncSettings,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::IndexingError;
use crate::queue::SyncQueue;

/// Producer of sync runs.
pub struct SyncTrigger {
    chains: Vec<ChainSettings>,
    batch_size: usize,
    queue: SyncQueue,
    logger: Arc<SyncLogger>,
    state: Arc<dyn SyncStateStore>,
}

impl SyncTrigger {
    pub fn new(
        settings: &SyncSettings,
        queue: SyncQueue,
        logger: Arc<SyncLogger>,
        state: Arc<dyn SyncStateStore>,
    ) -> Self {
        Self {
            chains: settings.chains.clone(),
            batch_size: settings.batch_size,
            queue,
            logger,
            state,
        }
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.chains.iter().map(|c| c.chain_id).collect()
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    fn validate(&self) -> Result<(), IndexingError> {
        if self.chains.is_empty() {
            return Err(IndexingError::Config(
                "no chains configured for sync".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(IndexingError::Config(
                "sync batch size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sync every configured chain. Returns the run's log id.
    pub async fn run(&self) -> Result<u64, IndexingError> {
        info!("Sync triggered");
        self.validate()?;
        self.prune_state().await;
        self.enqueue(&self.chains).await
    }

    /// Sync a subset of the configured chains.
    pub async fn run_for(&self, chain_ids: &[u64]) -> Result<u64, IndexingError> {
        info!(chains = ?chain_ids, "Sync triggered for selected chains");
        self.validate()?;

        let mut selected = Vec::with_capacity(chain_ids.len());
        for id in chain_ids {
            let chain = self
                .chains
                .iter()
                .find(|c| c.chain_id == *id)
                .ok_or_else(|| IndexingError::Config(format!("chain {} is not configured", id)))?;
            selected.push(chain.clone());
        }
        if selected.is_empty() {
            return Err(IndexingError::Config("no chains selected".to_string()));
        }

        self.enqueue(&selected).await
    }

    /// Drop persisted state of chains that are no longer configured.
    async fn prune_state(&self) {
        let Some(mut state) = self.state.load().await else {
            return;
        };
        let before = state.len();
        state.retain(|chain_id, _| self.chains.iter().any(|c| c.chain_id == *chain_id));
        if state.len() == before {
            return;
        }

        match self.state.save(&state).await {
            Ok(()) => info!(pruned = before - state.len(), "Pruned sync state of removed chains"),
            Err(e) => warn!(error = %e, "Could not prune sync state"),
        }
    }

    async fn enqueue(&self, chains: &[ChainSettings]) -> Result<u64, IndexingError> {
        let chain_ids: Vec<u64> = chains.iter().map(|c| c.chain_id).collect();
        let log_id = self.logger.start(&chain_ids)?;

        for chain in chains {
            let mut message = ChainSyncMessage::new(chain.chain_id)
                .with_batch_size(self.batch_size)
                .with_log_id(log_id);
            if !chain.subgraph_url.is_empty() {
                message = message.with_subgraph_url(chain.subgraph_url.clone());
            }

            if let Err(e) = self.queue.send(&QueueMessage::ChainSync(message)).await {
                error!(log_id, chain_id = chain.chain_id, error = %e, "Could not enqueue chain sync");
                if let Err(log_err) = self.logger.fail(log_id, &e.to_string()) {
                    error!(log_id, error = %log_err, "Could not record failed sync run");
                }
                return Err(e);
            }
        }

        let event = SyncLogEvent::new(
            log_id,
            SyncEventKind::Queued,
            format!("queued {} chain(s)", chains.len()),
        )
        .with_data(json!({ "chains": chain_ids }));
        if let Err(e) = self.logger.record_event(&event) {
            warn!(log_id, error = %e, "Could not append sync log event");
        }

        info!(log_id, chains = ?chain_ids, "Chain syncs queued");
        Ok(log_id)
    }
}
