//! Content hashing of agent records.

use agent_types::AgentRecord;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::IndexingError;

/// SHA-256 hex digest of the record's canonical JSON.
///
/// Equal records hash equally regardless of how their metadata map was built.
pub fn content_hash(record: &AgentRecord) -> Result<String, IndexingError> {
    let canonical = canonicalize(serde_json::to_value(record)?).to_string();
    Ok(format!("{:x}", Sha256::digest(canonical.as_bytes())))
}

/// Rebuild objects with keys in sorted order, recursively.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
