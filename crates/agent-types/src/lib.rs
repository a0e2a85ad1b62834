//! # agent-types
//!
//! Shared domain types for agent-search.
//!
//! - Agent records and vector ids
//! - Standard search filters, requests and responses
//! - Sync state, sync log rows and queue messages
//! - Settings

pub mod agent;
pub mod config;
pub mod error;
pub mod filters;
pub mod search;
pub mod sync;

pub use agent::{format_vector_id, parse_vector_id, AgentRecord, VectorId};
pub use config::{
    ChainSettings, EmbeddingProviderKind, EmbeddingSettings, SchedulerSettings, SearchSettings,
    Settings, SyncSettings, VectorBackend, VectorSettings, DEFAULT_SEARCH_CHAINS,
};
pub use error::AgentError;
pub use filters::{FilterClause, FilterValue, StandardFilters};
pub use search::{
    ChainSelection, PaginationInfo, ProviderInfo, SemanticSearchResult, SortDirection, SortKey,
    StandardSearchRequest, StandardSearchResponse, StandardSearchResult,
};
pub use sync::{
    ChainSyncMessage, ChainSyncReport, ChainSyncState, QueueMessage, SyncEventKind, SyncLogEntry,
    SyncLogEvent, SyncState, SyncStatus, DEFAULT_SYNC_BATCH_SIZE,
};
