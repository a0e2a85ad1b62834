//! # agent-indexing
//!
//! Multi-chain sync pipeline for agent-search.
//!
//! A [`SyncTrigger`] run enqueues one `chain-sync` message per configured
//! chain on a [`SyncQueue`]. A [`ConsumerPool`] hands each message to a
//! [`ChainSyncConsumer`], which pages the chain's subgraph, diffs content
//! hashes against the stored [`agent_types::ChainSyncState`], indexes and
//! deletes through the search manager, and reports to the sync log.

pub mod consumer;
pub mod diff;
pub mod error;
pub mod hash;
pub mod queue;
pub mod subgraph;
pub mod trigger;

pub use consumer::ChainSyncConsumer;
pub use diff::{classify, removed_agents, ChangeKind};
pub use error::IndexingError;
pub use hash::content_hash;
pub use queue::{
    sync_queue, ConsumerPool, MessageHandler, QueueReceiver, SyncQueue, DEFAULT_QUEUE_CAPACITY,
};
pub use subgraph::{
    AgentPage, GraphQlSubgraphClient, StaticSubgraphClient, SubgraphAgent, SubgraphClient,
    SubgraphConfig,
};
pub use trigger::SyncTrigger;
