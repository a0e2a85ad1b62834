//! Sync pipeline types: persisted per-chain state, audit log rows and the
//! queue message contract.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;

/// Default number of agents fetched and indexed per subgraph page.
pub const DEFAULT_SYNC_BATCH_SIZE: usize = 50;

/// Persisted checkpoint for one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSyncState {
    /// Highest subgraph `updatedAt` (unix seconds) seen by the last sync
    pub last_updated_at: u64,
    /// Content hash per agent id, as of the last sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_hashes: Option<HashMap<String, String>>,
}

impl ChainSyncState {
    pub fn new(last_updated_at: u64, agent_hashes: HashMap<String, String>) -> Self {
        Self {
            last_updated_at,
            agent_hashes: Some(agent_hashes),
        }
    }

    /// Stored hash for an agent, if any.
    pub fn hash_of(&self, agent_id: &str) -> Option<&str> {
        self.agent_hashes
            .as_ref()
            .and_then(|hashes| hashes.get(agent_id))
            .map(String::as_str)
    }

    pub fn agent_count(&self) -> usize {
        self.agent_hashes.as_ref().map_or(0, HashMap::len)
    }
}

/// Sync state of every chain, keyed by chain id.
pub type SyncState = BTreeMap<u64, ChainSyncState>;

/// Status of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Success,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

/// One row of the sync audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub id: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub chains: Vec<u64>,
    pub agents_indexed: u64,
    pub agents_deleted: u64,
    pub batches_processed: u64,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Chains that have reported a result for this run
    #[serde(default)]
    pub reported_chains: Vec<u64>,
}

impl SyncLogEntry {
    pub fn new(id: u64, chains: Vec<u64>) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            completed_at: None,
            status: SyncStatus::Pending,
            chains,
            agents_indexed: 0,
            agents_deleted: 0,
            batches_processed: 0,
            error_message: None,
            reported_chains: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// True once every chain of the run has reported.
    pub fn all_chains_reported(&self) -> bool {
        self.chains
            .iter()
            .all(|chain| self.reported_chains.contains(chain))
    }
}

/// Kind of a sync log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventKind {
    Started,
    Queued,
    BatchProcessed,
    AgentsDeleted,
    ChainCompleted,
    ChainFailed,
    Completed,
    Failed,
}

/// Child row of a [`SyncLogEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEvent {
    pub log_id: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: SyncEventKind,
    #[serde(default)]
    pub chain_id: Option<u64>,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl SyncLogEvent {
    pub fn new(log_id: u64, kind: SyncEventKind, message: impl Into<String>) -> Self {
        Self {
            log_id,
            timestamp: Utc::now(),
            kind,
            chain_id: None,
            message: message.into(),
            data: None,
        }
    }

    pub fn for_chain(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Counters reported by a finished chain sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSyncReport {
    pub chain_id: u64,
    pub agents_seen: u64,
    pub agents_new: u64,
    pub agents_changed: u64,
    pub agents_unchanged: u64,
    pub agents_indexed: u64,
    pub agents_failed: u64,
    pub agents_deleted: u64,
    pub batches_processed: u64,
}

fn default_batch_size() -> usize {
    DEFAULT_SYNC_BATCH_SIZE
}

/// Work item asking a consumer to sync one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSyncMessage {
    /// Chain id; a string on the wire
    #[serde(with = "chain_id_string")]
    pub chain_id: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgraph_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<u64>,
}

impl ChainSyncMessage {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            batch_size: DEFAULT_SYNC_BATCH_SIZE,
            subgraph_url: None,
            log_id: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_subgraph_url(mut self, url: impl Into<String>) -> Self {
        self.subgraph_url = Some(url.into());
        self
    }

    pub fn with_log_id(mut self, log_id: u64) -> Self {
        self.log_id = Some(log_id);
        self
    }
}

/// Messages carried by the sync queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueMessage {
    #[serde(rename = "chain-sync")]
    ChainSync(ChainSyncMessage),
}

impl QueueMessage {
    pub fn to_json(&self) -> Result<String, AgentError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, AgentError> {
        Ok(serde_json::from_str(json)?)
    }
}

mod chain_id_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(chain_id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&chain_id.to_string())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(u64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid chainId '{}'", s))),
        }
    }
}
