//! Change detection against a chain's stored content hashes.

use std::collections::{HashMap, HashSet};

/// How an agent compares to the last sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Changed,
    Unchanged,
}

/// Classify one agent by its previous and current hash.
pub fn classify(previous: Option<&str>, current: &str) -> ChangeKind {
    match previous {
        None => ChangeKind::New,
        Some(prev) if prev == current => ChangeKind::Unchanged,
        Some(_) => ChangeKind::Changed,
    }
}

/// Agents with a stored hash that the subgraph no longer serves, sorted.
pub fn removed_agents(
    previous: Option<&HashMap<String, String>>,
    seen: &HashSet<String>,
) -> Vec<String> {
    let mut removed: Vec<String> = previous
        .map(|hashes| {
            hashes
                .keys()
                .filter(|id| !seen.contains(*id))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    removed.sort();
    removed
}
