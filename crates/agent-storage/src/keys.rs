//! Key encoding and decoding for the storage layer.
//!
//! Numbers are zero-padded to 20 digits so lexicographic order matches
//! numeric order.

use crate::error::StorageError;

fn parse_u64(part: &str, what: &str) -> Result<u64, StorageError> {
    part.parse()
        .map_err(|e| StorageError::Key(format!("Invalid {}: {}", what, e)))
}

fn utf8(bytes: &[u8]) -> Result<&str, StorageError> {
    std::str::from_utf8(bytes).map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))
}

/// Key for a chain's sync state.
/// Format: chain:{chain_id:020}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStateKey {
    pub chain_id: u64,
}

impl ChainStateKey {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("chain:{:020}", self.chain_id).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = utf8(bytes)?;
        let id = s
            .strip_prefix("chain:")
            .ok_or_else(|| StorageError::Key(format!("Invalid chain key format: {}", s)))?;
        Ok(Self::new(parse_u64(id, "chain id")?))
    }
}

/// Key for a sync run entry.
/// Format: log:{log_id:020}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLogKey {
    pub log_id: u64,
}

impl SyncLogKey {
    pub fn new(log_id: u64) -> Self {
        Self { log_id }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("log:{:020}", self.log_id).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = utf8(bytes)?;
        let id = s
            .strip_prefix("log:")
            .ok_or_else(|| StorageError::Key(format!("Invalid log key format: {}", s)))?;
        Ok(Self::new(parse_u64(id, "log id")?))
    }
}

/// Key for a sync run event.
/// Format: evt:{log_id:020}:{sequence:020}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncEventKey {
    pub log_id: u64,
    /// Global, monotonic event sequence
    pub sequence: u64,
}

impl SyncEventKey {
    pub fn new(log_id: u64, sequence: u64) -> Self {
        Self { log_id, sequence }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("evt:{:020}:{:020}", self.log_id, self.sequence).into_bytes()
    }

    /// Prefix shared by every event of a run.
    pub fn prefix(log_id: u64) -> Vec<u8> {
        format!("evt:{:020}:", log_id).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = utf8(bytes)?;
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 || parts[0] != "evt" {
            return Err(StorageError::Key(format!("Invalid event key format: {}", s)));
        }
        Ok(Self::new(
            parse_u64(parts[1], "log id")?,
            parse_u64(parts[2], "sequence")?,
        ))
    }
}
