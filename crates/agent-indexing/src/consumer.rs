//! Chain sync consumer.
//!
//! Handles one `chain-sync` message: pages the chain's subgraph, diffs each
//! agent's content hash against the stored state, indexes new and changed
//! agents in batches, deletes agents that disappeared, then persists the
//! chain's state and reports to the sync log.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use agent_search::SemanticSearchManager;
use agent_storage::{ChainOutcome, SyncLogger, SyncStateStore};
use agent_types::{
    AgentRecord, ChainSyncMessage, ChainSyncReport, ChainSyncState, QueueMessage, SyncEventKind,
    SyncLogEvent,
};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::diff::{classify, removed_agents, ChangeKind};
use crate::error::IndexingError;
use crate::hash::content_hash;
use crate::queue::MessageHandler;
use crate::subgraph::SubgraphClient;

/// Syncs one chain per message.
pub struct ChainSyncConsumer {
    subgraph: Arc<dyn SubgraphClient>,
    manager: Arc<SemanticSearchManager>,
    state: Arc<dyn SyncStateStore>,
    logger: Arc<SyncLogger>,
}

impl ChainSyncConsumer {
    pub fn new(
        subgraph: Arc<dyn SubgraphClient>,
        manager: Arc<SemanticSearchManager>,
        state: Arc<dyn SyncStateStore>,
        logger: Arc<SyncLogger>,
    ) -> Self {
        Self {
            subgraph,
            manager,
            state,
            logger,
        }
    }

    /// Handle a message end to end. Never fails: errors are logged and
    /// recorded on the message's sync log entry.
    pub async fn process(&self, message: &ChainSyncMessage) {
        let chain_id = message.chain_id;

        let log_id = match message.log_id {
            Some(id) => id,
            None => match self.logger.start(&[chain_id]) {
                Ok(id) => id,
                Err(e) => {
                    error!(chain_id, error = %e, "Could not open sync log entry");
                    return;
                }
            },
        };

        let outcome = match self.sync_chain(message, log_id).await {
            Ok(report) => {
                info!(
                    chain_id,
                    log_id,
                    seen = report.agents_seen,
                    indexed = report.agents_indexed,
                    failed = report.agents_failed,
                    deleted = report.agents_deleted,
                    "Chain sync completed"
                );
                ChainOutcome::Success(report)
            }
            Err(e) => {
                error!(chain_id, log_id, error = %e, "Chain sync failed");
                ChainOutcome::Failed(e.to_string())
            }
        };

        if let Err(e) = self.logger.record_chain_result(log_id, chain_id, outcome) {
            error!(chain_id, log_id, error = %e, "Could not record chain sync result");
        }
    }

    /// Sync one chain and return its counters.
    pub async fn sync_chain(
        &self,
        message: &ChainSyncMessage,
        log_id: u64,
    ) -> Result<ChainSyncReport, IndexingError> {
        let chain_id = message.chain_id;
        let batch_size = message.batch_size.max(1);

        let previous = self.state.load_chain(chain_id).await;
        let previous_hashes = previous.as_ref().and_then(|s| s.agent_hashes.as_ref());
        debug!(
            chain_id,
            known_agents = previous.as_ref().map_or(0, ChainSyncState::agent_count),
            "Loaded chain state"
        );

        let mut report = ChainSyncReport {
            chain_id,
            ..Default::default()
        };
        let mut hashes: HashMap<String, String> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut last_updated_at = previous.as_ref().map_or(0, |s| s.last_updated_at);
        let mut after: Option<String> = None;

        loop {
            let page = self
                .subgraph
                .fetch_page(
                    chain_id,
                    message.subgraph_url.as_deref(),
                    after.as_deref(),
                    batch_size,
                )
                .await?;

            let mut to_index: Vec<AgentRecord> = Vec::new();
            let mut pending_hashes: HashMap<String, String> = HashMap::new();

            for agent in page.agents {
                let agent_id = agent.record.agent_id.clone();
                if !seen.insert(agent_id.clone()) {
                    warn!(chain_id, agent_id = %agent_id, "Agent served twice, ignoring repeat");
                    continue;
                }
                report.agents_seen += 1;
                last_updated_at = last_updated_at.max(agent.updated_at);

                let hash = content_hash(&agent.record)?;
                let previous_hash = previous_hashes.and_then(|h| h.get(&agent_id).map(String::as_str));
                match classify(previous_hash, &hash) {
                    ChangeKind::Unchanged => {
                        report.agents_unchanged += 1;
                        hashes.insert(agent_id, hash);
                    }
                    kind => {
                        if kind == ChangeKind::New {
                            report.agents_new += 1;
                        } else {
                            report.agents_changed += 1;
                        }
                        pending_hashes.insert(agent_id, hash);
                        to_index.push(agent.record);
                    }
                }
            }

            if !to_index.is_empty() {
                let batch = self.manager.index_agents_batch(&to_index).await?;
                report.agents_indexed += batch.indexed_count() as u64;
                report.agents_failed += batch.skipped_count() as u64;

                // A failed agent keeps its previous hash, if any: the next run
                // retries it and removal still reaches its old vector.
                for record in &to_index {
                    let vector_id = record.vector_id().to_string();
                    if batch.is_skipped(&vector_id) {
                        pending_hashes.remove(&record.agent_id);
                        if let Some(old) = previous_hashes.and_then(|h| h.get(&record.agent_id)) {
                            hashes.insert(record.agent_id.clone(), old.clone());
                        }
                        continue;
                    }
                    if let Some(hash) = pending_hashes.remove(&record.agent_id) {
                        hashes.insert(record.agent_id.clone(), hash);
                    }
                }
            }

            report.batches_processed += 1;
            self.event(
                SyncLogEvent::new(log_id, SyncEventKind::BatchProcessed, "batch processed")
                    .for_chain(chain_id)
                    .with_data(json!({
                        "batch": report.batches_processed,
                        "submitted": to_index.len(),
                        "indexed": report.agents_indexed,
                        "failed": report.agents_failed,
                    })),
            );
            debug!(
                chain_id,
                batch = report.batches_processed,
                submitted = to_index.len(),
                "Processed agent batch"
            );

            match page.next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        let removed = removed_agents(previous_hashes, &seen);
        if !removed.is_empty() {
            let pairs: Vec<(u64, String)> =
                removed.iter().map(|id| (chain_id, id.clone())).collect();
            let deleted = self.manager.delete_agents_batch(&pairs).await?;
            report.agents_deleted = deleted as u64;
            self.event(
                SyncLogEvent::new(
                    log_id,
                    SyncEventKind::AgentsDeleted,
                    format!("deleted {} agent(s)", deleted),
                )
                .for_chain(chain_id)
                .with_data(json!({ "agentIds": removed })),
            );
        }

        self.manager.store().persist().await?;
        self.state
            .save_chain(chain_id, &ChainSyncState::new(last_updated_at, hashes))
            .await?;

        Ok(report)
    }

    fn event(&self, event: SyncLogEvent) {
        if let Err(e) = self.logger.record_event(&event) {
            warn!(log_id = event.log_id, error = %e, "Could not append sync log event");
        }
    }
}

#[async_trait]
impl MessageHandler for ChainSyncConsumer {
    async fn handle(&self, message: QueueMessage) {
        match message {
            QueueMessage::ChainSync(msg) => self.process(&msg).await,
        }
    }
}
