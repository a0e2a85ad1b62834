//! Request and response types for agent search.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;
use crate::filters::StandardFilters;

/// Which chains a v1 search covers.
///
/// Accepts `"all"`, a single chain id, or a list of chain ids on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChainsRepr", into = "ChainsRepr")]
pub enum ChainSelection {
    All,
    One(u64),
    Many(Vec<u64>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ChainsRepr {
    One(u64),
    Many(Vec<u64>),
    Keyword(String),
}

impl TryFrom<ChainsRepr> for ChainSelection {
    type Error = String;

    fn try_from(repr: ChainsRepr) -> Result<Self, Self::Error> {
        match repr {
            ChainsRepr::One(id) => Ok(ChainSelection::One(id)),
            ChainsRepr::Many(ids) => Ok(ChainSelection::Many(ids)),
            ChainsRepr::Keyword(k) if k.eq_ignore_ascii_case("all") => Ok(ChainSelection::All),
            ChainsRepr::Keyword(k) => k
                .parse::<u64>()
                .map(ChainSelection::One)
                .map_err(|_| format!("invalid chains value '{}'", k)),
        }
    }
}

impl From<ChainSelection> for ChainsRepr {
    fn from(selection: ChainSelection) -> Self {
        match selection {
            ChainSelection::All => ChainsRepr::Keyword("all".to_string()),
            ChainSelection::One(id) => ChainsRepr::One(id),
            ChainSelection::Many(ids) => ChainsRepr::Many(ids),
        }
    }
}

/// Sort direction for a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One parsed `field:direction` sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    /// Parse `"field"` or `"field:asc|desc"`.
    pub fn parse(expr: &str) -> Result<Self, AgentError> {
        let (field, direction) = match expr.split_once(':') {
            Some((field, dir)) => {
                let direction = match dir.trim().to_ascii_lowercase().as_str() {
                    "asc" => SortDirection::Asc,
                    "desc" => SortDirection::Desc,
                    other => {
                        return Err(AgentError::InvalidSort(format!(
                            "unknown direction '{}' in '{}'",
                            other, expr
                        )))
                    }
                };
                (field.trim(), direction)
            }
            None => (expr.trim(), SortDirection::Asc),
        };

        if field.is_empty() {
            return Err(AgentError::InvalidSort(format!("empty field in '{}'", expr)));
        }

        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{}:{}", self.field, dir)
    }
}

fn default_include_metadata() -> bool {
    true
}

/// Body of a v1 standard search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSearchRequest {
    pub query: String,

    #[serde(default)]
    pub limit: Option<usize>,

    #[serde(default)]
    pub offset: Option<usize>,

    /// Opaque pagination cursor; wins over `offset` when both are present
    #[serde(default)]
    pub cursor: Option<String>,

    #[serde(default)]
    pub filters: Option<StandardFilters>,

    #[serde(default)]
    pub min_score: Option<f32>,

    #[serde(default = "default_include_metadata")]
    pub include_metadata: bool,

    /// Case-insensitive substring match on the agent name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub chains: Option<ChainSelection>,

    /// Sort keys in priority order, each `field:direction`
    #[serde(default)]
    pub sort: Vec<String>,
}

impl StandardSearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
            offset: None,
            cursor: None,
            filters: None,
            min_score: None,
            include_metadata: true,
            name: None,
            chains: None,
            sort: Vec::new(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn with_filters(mut self, filters: StandardFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_chains(mut self, chains: ChainSelection) -> Self {
        self.chains = Some(chains);
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort.push(sort.into());
        self
    }

    pub fn without_metadata(mut self) -> Self {
        self.include_metadata = false;
        self
    }
}

/// Pagination block of a v1 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

/// Name and version of the search provider answering a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub version: String,
}

impl ProviderInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// One ranked hit of a v1 search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSearchResult {
    /// 1-based global rank
    pub rank: usize,
    pub vector_id: String,
    pub agent_id: String,
    pub chain_id: u64,
    pub name: String,
    pub description: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Body of a v1 standard search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSearchResponse {
    pub query: String,
    pub results: Vec<StandardSearchResult>,
    /// Number of matches left after score, post-filter and name filtering
    pub total: usize,
    pub pagination: PaginationInfo,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub provider: ProviderInfo,
}

/// One ranked hit of a legacy search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSearchResult {
    pub rank: usize,
    pub vector_id: String,
    pub chain_id: u64,
    pub agent_id: String,
    pub name: String,
    pub description: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}
