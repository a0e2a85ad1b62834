//! Column family definitions for RocksDB.
//!
//! - sync_state: one row per chain, replaced on every save
//! - sync_log: one row per sync run
//! - sync_log_events: append-only child rows of sync runs

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for per-chain sync state
pub const CF_SYNC_STATE: &str = "sync_state";

/// Column family name for sync run entries
pub const CF_SYNC_LOG: &str = "sync_log";

/// Column family name for sync run events
pub const CF_SYNC_EVENTS: &str = "sync_log_events";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_SYNC_STATE, CF_SYNC_LOG, CF_SYNC_EVENTS];

/// Events are append-only; compress them
fn events_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_SYNC_STATE, Options::default()),
        ColumnFamilyDescriptor::new(CF_SYNC_LOG, Options::default()),
        ColumnFamilyDescriptor::new(CF_SYNC_EVENTS, events_options()),
    ]
}
