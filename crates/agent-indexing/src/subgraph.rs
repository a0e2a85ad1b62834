//! Subgraph clients.
//!
//! A subgraph serves a chain's agent registrations in pages ordered by id.
//! The client hides the transport; the consumer only sees [`AgentPage`]s.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use agent_types::AgentRecord;
use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use crate::error::IndexingError;

/// One agent as served by a subgraph.
#[derive(Debug, Clone, PartialEq)]
pub struct SubgraphAgent {
    pub record: AgentRecord,
    /// Last registry update, unix seconds
    pub updated_at: u64,
}

impl SubgraphAgent {
    pub fn new(record: AgentRecord, updated_at: u64) -> Self {
        Self { record, updated_at }
    }
}

/// One page of agents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentPage {
    pub agents: Vec<SubgraphAgent>,
    /// Cursor for the following page; `None` on the last page
    pub next: Option<String>,
}

/// Source of agent registrations.
#[async_trait]
pub trait SubgraphClient: Send + Sync {
    /// Fetch up to `first` agents of `chain_id` with ids after `after`.
    ///
    /// `subgraph_url` overrides the client's configured endpoint.
    async fn fetch_page(
        &self,
        chain_id: u64,
        subgraph_url: Option<&str>,
        after: Option<&str>,
        first: usize,
    ) -> Result<AgentPage, IndexingError>;
}

const AGENTS_QUERY: &str = r#"query Agents($first: Int!, $after: String!) {
  agents(first: $first, where: { id_gt: $after }, orderBy: id, orderDirection: asc) {
    id
    agentId
    name
    description
    capabilities
    defaultInputModes
    defaultOutputModes
    tags
    owner
    mcpEndpoint
    a2aEndpoint
    active
    updatedAt
  }
}"#;

/// Configuration for [`GraphQlSubgraphClient`].
#[derive(Debug, Clone)]
pub struct SubgraphConfig {
    /// Endpoint per chain id
    pub endpoints: HashMap<u64, String>,
    pub timeout: Duration,
    /// Maximum attempts per page
    pub max_retries: u32,
}

impl Default for SubgraphConfig {
    fn default() -> Self {
        Self {
            endpoints: HashMap::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl SubgraphConfig {
    pub fn with_endpoint(mut self, chain_id: u64, url: impl Into<String>) -> Self {
        self.endpoints.insert(chain_id, url.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<AgentsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct AgentsData {
    agents: Vec<RawAgent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAgent {
    id: String,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    capabilities: Option<Vec<String>>,
    #[serde(default)]
    default_input_modes: Option<Vec<String>>,
    #[serde(default)]
    default_output_modes: Option<Vec<String>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_u64")]
    updated_at: u64,
    /// Remaining fields become searchable metadata
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl RawAgent {
    fn into_agent(self, chain_id: u64) -> SubgraphAgent {
        let agent_id = self.agent_id.unwrap_or_else(|| self.id.clone());
        let mut record = AgentRecord::new(
            chain_id,
            agent_id,
            self.name.unwrap_or_default(),
            self.description.unwrap_or_default(),
        );
        record.capabilities = self.capabilities.unwrap_or_default();
        record.default_input_modes = self.default_input_modes.unwrap_or_default();
        record.default_output_modes = self.default_output_modes.unwrap_or_default();
        record.tags = self.tags.unwrap_or_default();
        record.metadata = self
            .extra
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect();

        SubgraphAgent::new(record, self.updated_at)
    }
}

/// Subgraph timestamps arrive as numbers or numeric strings.
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {}", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid timestamp '{}'", s))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid timestamp {}",
            other
        ))),
    }
}

/// GraphQL subgraph client over HTTP.
pub struct GraphQlSubgraphClient {
    client: Client,
    config: SubgraphConfig,
}

impl GraphQlSubgraphClient {
    pub fn new(config: SubgraphConfig) -> Result<Self, IndexingError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IndexingError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint<'a>(
        &'a self,
        chain_id: u64,
        subgraph_url: Option<&'a str>,
    ) -> Result<&'a str, IndexingError> {
        subgraph_url
            .or_else(|| self.config.endpoints.get(&chain_id).map(String::as_str))
            .ok_or_else(|| {
                IndexingError::Config(format!("no subgraph endpoint for chain {}", chain_id))
            })
    }

    async fn request_with_retry(
        &self,
        url: &str,
        chain_id: u64,
        after: &str,
        first: usize,
    ) -> Result<Vec<RawAgent>, IndexingError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(chain_id, attempt = attempts, after, first, "Fetching subgraph page");

            match self.request(url, after, first).await {
                Ok(agents) => return Ok(agents),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if attempts >= self.config.max_retries {
                        error!(chain_id, error = %e, "Max retries exceeded");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                chain_id,
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Subgraph request failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(chain_id, error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn request(
        &self,
        url: &str,
        after: &str,
        first: usize,
    ) -> Result<Vec<RawAgent>, IndexingError> {
        let body = GraphQlRequest {
            query: AGENTS_QUERY,
            variables: json!({ "first": first, "after": after }),
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexingError::Subgraph {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IndexingError::Subgraph {
                status: Some(status.as_u16()),
                message: text,
            });
        }

        let parsed: GraphQlResponse = response.json().await.map_err(|e| IndexingError::Subgraph {
            status: Some(status.as_u16()),
            message: format!("invalid response body: {}", e),
        })?;

        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(IndexingError::Subgraph {
                status: Some(status.as_u16()),
                message: messages.join("; "),
            });
        }

        parsed
            .data
            .map(|d| d.agents)
            .ok_or_else(|| IndexingError::Subgraph {
                status: Some(status.as_u16()),
                message: "response has no data".to_string(),
            })
    }
}

#[async_trait]
impl SubgraphClient for GraphQlSubgraphClient {
    async fn fetch_page(
        &self,
        chain_id: u64,
        subgraph_url: Option<&str>,
        after: Option<&str>,
        first: usize,
    ) -> Result<AgentPage, IndexingError> {
        let url = self.endpoint(chain_id, subgraph_url)?;
        let raw = self
            .request_with_retry(url, chain_id, after.unwrap_or(""), first)
            .await?;

        let next = if raw.len() >= first {
            raw.last().map(|a| a.id.clone())
        } else {
            None
        };
        let agents = raw.into_iter().map(|a| a.into_agent(chain_id)).collect();

        Ok(AgentPage { agents, next })
    }
}

/// In-process subgraph serving fixed agents, for tests and offline runs.
#[derive(Default)]
pub struct StaticSubgraphClient {
    chains: Mutex<HashMap<u64, Vec<SubgraphAgent>>>,
    failures: Mutex<HashMap<u64, String>>,
}

impl StaticSubgraphClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the agents served for a chain.
    pub fn set_agents(&self, chain_id: u64, mut agents: Vec<SubgraphAgent>) {
        agents.sort_by(|a, b| a.record.agent_id.cmp(&b.record.agent_id));
        if let Ok(mut chains) = self.chains.lock() {
            chains.insert(chain_id, agents);
        }
    }

    /// Make every fetch for a chain fail with `message`.
    pub fn fail_chain(&self, chain_id: u64, message: impl Into<String>) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(chain_id, message.into());
        }
    }

    pub fn heal_chain(&self, chain_id: u64) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(&chain_id);
        }
    }
}

#[async_trait]
impl SubgraphClient for StaticSubgraphClient {
    async fn fetch_page(
        &self,
        chain_id: u64,
        _subgraph_url: Option<&str>,
        after: Option<&str>,
        first: usize,
    ) -> Result<AgentPage, IndexingError> {
        let failure = self
            .failures
            .lock()
            .map_err(|_| IndexingError::Config("static subgraph lock poisoned".into()))?
            .get(&chain_id)
            .cloned();
        if let Some(message) = failure {
            return Err(IndexingError::Subgraph {
                status: Some(500),
                message,
            });
        }

        let chains = self
            .chains
            .lock()
            .map_err(|_| IndexingError::Config("static subgraph lock poisoned".into()))?;
        let all = chains.get(&chain_id).map(Vec::as_slice).unwrap_or_default();

        let agents: Vec<SubgraphAgent> = all
            .iter()
            .filter(|a| after.map_or(true, |cursor| a.record.agent_id.as_str() > cursor))
            .take(first)
            .cloned()
            .collect();

        let next = if agents.len() >= first && first > 0 {
            agents.last().map(|a| a.record.agent_id.clone())
        } else {
            None
        };

        Ok(AgentPage { agents, next })
    }
}
