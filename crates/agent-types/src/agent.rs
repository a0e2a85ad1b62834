//! Agent registration records and their vector ids.
//!
//! An agent is identified by `(chain_id, agent_id)`. Its embedding lives in
//! the vector store under the id `"{chain_id}-{agent_id}"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;

/// An agent registration as ingested from a chain's subgraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    /// Numeric EVM chain id
    pub chain_id: u64,
    /// Registry-assigned agent id (may contain dashes)
    pub agent_id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub default_input_modes: Vec<String>,
    #[serde(default)]
    pub default_output_modes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Extra searchable metadata (endpoints, flags, owner, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AgentRecord {
    /// Create a record with the required fields and empty collections.
    pub fn new(
        chain_id: u64,
        agent_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            chain_id,
            agent_id: agent_id.into(),
            name: name.into(),
            description: description.into(),
            capabilities: Vec::new(),
            default_input_modes: Vec::new(),
            default_output_modes: Vec::new(),
            tags: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_modes<I, O>(mut self, input: I, output: O) -> Self
    where
        I: IntoIterator<Item = String>,
        O: IntoIterator<Item = String>,
    {
        self.default_input_modes = input.into_iter().collect();
        self.default_output_modes = output.into_iter().collect();
        self
    }

    /// Add one extra metadata entry (builder pattern).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The vector id this record is stored under.
    pub fn vector_id(&self) -> VectorId {
        VectorId::new(self.chain_id, self.agent_id.clone())
    }
}

/// Composite key of an agent's embedding record.
///
/// Wire format: `{chain_id}-{agent_id}`. Only the first `-` separates the two
/// parts, so `agent_id` may itself contain dashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VectorId {
    pub chain_id: u64,
    pub agent_id: String,
}

impl VectorId {
    pub fn new(chain_id: u64, agent_id: impl Into<String>) -> Self {
        Self {
            chain_id,
            agent_id: agent_id.into(),
        }
    }

    /// Parse a vector id string. Everything after the first `-` is the agent
    /// id, including an empty one.
    pub fn parse(s: &str) -> Result<Self, AgentError> {
        let (chain, agent) = s
            .split_once('-')
            .ok_or_else(|| AgentError::InvalidVectorId(format!("missing '-' in '{}'", s)))?;

        let chain_id: u64 = chain
            .parse()
            .map_err(|_| AgentError::InvalidVectorId(format!("non-numeric chain id in '{}'", s)))?;

        Ok(Self::new(chain_id, agent))
    }
}

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.chain_id, self.agent_id)
    }
}

impl FromStr for VectorId {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Format a vector id from its parts.
pub fn format_vector_id(chain_id: u64, agent_id: &str) -> String {
    VectorId::new(chain_id, agent_id).to_string()
}

/// Parse a vector id into `(chain_id, agent_id)`.
pub fn parse_vector_id(id: &str) -> Result<(u64, String), AgentError> {
    let parsed = VectorId::parse(id)?;
    Ok((parsed.chain_id, parsed.agent_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_id_format() {
        assert_eq!(format_vector_id(84532, "123"), "84532-123");
        assert_eq!(VectorId::new(1, "abc").to_string(), "1-abc");
    }

    #[test]
    fn test_vector_id_roundtrip_with_dashes() {
        let cases = [
            (11155111, "42"),
            (84532, "84532:7"),
            (80002, "agent-with-dashes"),
            (1, "-leading"),
            (137, "trailing-"),
            (5, ""),
        ];

        for (chain_id, agent_id) in cases {
            let formatted = format_vector_id(chain_id, agent_id);
            let (c, a) = parse_vector_id(&formatted).unwrap();
            assert_eq!(c, chain_id);
            assert_eq!(a, agent_id);
        }
    }

    #[test]
    fn test_vector_id_parse_errors() {
        assert!(VectorId::parse("nodash").is_err());
        assert!(VectorId::parse("abc-123").is_err());
        assert!(VectorId::parse("-123").is_err());
    }

    #[test]
    fn test_vector_id_empty_agent_id() {
        let id = VectorId::parse("123-").unwrap();
        assert_eq!(id, VectorId::new(123, ""));
        assert_eq!(id.to_string(), "123-");
    }

    #[test]
    fn test_vector_id_from_str() {
        let id: VectorId = "84532-a-b-c".parse().unwrap();
        assert_eq!(id.chain_id, 84532);
        assert_eq!(id.agent_id, "a-b-c");
    }

    #[test]
    fn test_record_builder() {
        let record = AgentRecord::new(84532, "7", "Trader", "Trades on DEXes")
            .with_capabilities(["swap", "quote"])
            .with_tags(["defi"])
            .with_metadata("mcpEndpoint", "https://mcp.example");

        assert_eq!(record.capabilities, vec!["swap", "quote"]);
        assert_eq!(record.tags, vec!["defi"]);
        assert_eq!(record.vector_id().to_string(), "84532-7");
        assert_eq!(
            record.metadata.get("mcpEndpoint"),
            Some(&Value::from("https://mcp.example"))
        );
    }

    #[test]
    fn test_record_json_is_camel_case() {
        let record = AgentRecord::new(1, "2", "n", "d");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"chainId\":1"));
        assert!(json.contains("\"agentId\":\"2\""));
        assert!(json.contains("\"defaultInputModes\""));
    }
}
