//! Storage layer for agent-search.
//!
//! Provides RocksDB-backed storage with:
//! - Per-chain sync state rows, replaced atomically via WriteBatch
//! - Sync run entries with append-only child events
//! - Zero-padded keys so range scans follow numeric order

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod sync_log;
pub mod sync_state;

pub use db::Storage;
pub use error::StorageError;
pub use keys::{ChainStateKey, SyncEventKey, SyncLogKey};
pub use sync_log::{ChainOutcome, SyncLogger};
pub use sync_state::{RocksSyncStateStore, SyncStateStore};
