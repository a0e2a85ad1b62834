//! Configuration loading for agent-search.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/agent-search/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::AgentError;

const APP_NAME: &str = "agent-search";

/// Chains searched when a request asks for `all` and no chains are configured.
pub const DEFAULT_SEARCH_CHAINS: [u64; 3] = [11155111, 84532, 80002];

/// Which embedding provider to construct.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint
    #[default]
    Openai,
    /// Deterministic local embedder, no network
    Mock,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// API key (usually from AGENT_SEARCH_EMBEDDING__API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Max texts per batch embedding request
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Inputs above this many tokens are rejected before any request
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_embedding_batch_size() -> usize {
    100
}

fn default_max_input_tokens() -> usize {
    8191
}

fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
            api_key: None,
            dimensions: default_dimensions(),
            batch_size: default_embedding_batch_size(),
            max_input_tokens: default_max_input_tokens(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Which vector store backend to construct.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    /// usearch HNSW index persisted under `vector_index_path`
    #[default]
    Hnsw,
    /// Process-local brute-force store
    Memory,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSettings {
    #[serde(default)]
    pub backend: VectorBackend,

    /// Largest topK the store accepts
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Initial HNSW capacity
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_max_top_k() -> usize {
    1000
}

fn default_capacity() -> usize {
    10_000
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            max_top_k: default_max_top_k(),
            capacity: default_capacity(),
        }
    }
}

/// Search API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Largest accepted request body, in bytes
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,

    #[serde(default = "default_provider_name")]
    pub provider_name: String,

    #[serde(default = "default_provider_version")]
    pub provider_version: String,

    /// Chains used for `chains: "all"` when no sync chains are configured
    #[serde(default = "default_search_chains")]
    pub default_chains: Vec<u64>,
}

fn default_limit() -> usize {
    10
}

fn default_max_request_bytes() -> usize {
    64 * 1024
}

fn default_provider_name() -> String {
    APP_NAME.to_string()
}

fn default_provider_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_search_chains() -> Vec<u64> {
    DEFAULT_SEARCH_CHAINS.to_vec()
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_request_bytes: default_max_request_bytes(),
            provider_name: default_provider_name(),
            provider_version: default_provider_version(),
            default_chains: default_search_chains(),
        }
    }
}

/// One chain the sync pipeline indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSettings {
    pub chain_id: u64,
    pub subgraph_url: String,
}

/// Sync pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 6-field cron expression (sec min hour day month weekday)
    #[serde(default = "default_sync_cron")]
    pub cron: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Max random delay before each run, in seconds
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,

    /// Number of queue consumers
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_sync_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub chains: Vec<ChainSettings>,
}

fn default_true() -> bool {
    true
}

fn default_sync_cron() -> String {
    "0 */15 * * * *".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_jitter_secs() -> u64 {
    30
}

fn default_workers() -> usize {
    2
}

fn default_sync_batch_size() -> usize {
    crate::sync::DEFAULT_SYNC_BATCH_SIZE
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: default_sync_cron(),
            timezone: default_timezone(),
            jitter_secs: default_jitter_secs(),
            workers: default_workers(),
            batch_size: default_sync_batch_size(),
            chains: Vec::new(),
        }
    }
}

impl SyncSettings {
    /// Ids of the configured chains, in config order.
    pub fn chain_ids(&self) -> Vec<u64> {
        self.chains.iter().map(|c| c.chain_id).collect()
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainSettings> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the RocksDB directory (sync state, sync log, vector metadata)
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Path to the HNSW vector index directory
    #[serde(default = "default_vector_index_path")]
    pub vector_index_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub vector: VectorSettings,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

fn data_dir(leaf: &str) -> String {
    ProjectDirs::from("", "", APP_NAME)
        .map(|p| p.data_local_dir().join(leaf))
        .unwrap_or_else(|| PathBuf::from(format!("./{}", leaf)))
        .to_string_lossy()
        .to_string()
}

fn default_db_path() -> String {
    data_dir("db")
}

fn default_vector_index_path() -> String {
    data_dir("vector-index")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            vector_index_path: default_vector_index_path(),
            log_level: default_log_level(),
            embedding: EmbeddingSettings::default(),
            vector: VectorSettings::default(),
            search: SearchSettings::default(),
            sync: SyncSettings::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/agent-search/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (AGENT_SEARCH_*, `__` between sections)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, AgentError> {
        let config_dir = ProjectDirs::from("", "", APP_NAME)
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| AgentError::Config(e.to_string()))?
            .set_default("vector_index_path", default_vector_index_path())
            .map_err(|e| AgentError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| AgentError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // AGENT_SEARCH_LOG_LEVEL, AGENT_SEARCH_EMBEDDING__API_KEY, ...
        builder = builder.add_source(
            Environment::with_prefix("AGENT_SEARCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| AgentError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that cannot produce a working pipeline.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.embedding.dimensions == 0 {
            return Err(AgentError::Config("embedding.dimensions must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(AgentError::Config("embedding.batch_size must be > 0".into()));
        }
        if self.vector.max_top_k == 0 {
            return Err(AgentError::Config("vector.max_top_k must be > 0".into()));
        }
        if self.sync.workers == 0 {
            return Err(AgentError::Config("sync.workers must be > 0".into()));
        }
        if self.sync.batch_size == 0 {
            return Err(AgentError::Config("sync.batch_size must be > 0".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for chain in &self.sync.chains {
            if !seen.insert(chain.chain_id) {
                return Err(AgentError::Config(format!(
                    "chain {} configured twice",
                    chain.chain_id
                )));
            }
        }
        Ok(())
    }

    /// Chains that `chains: "all"` expands to.
    pub fn search_chains(&self) -> Vec<u64> {
        if self.sync.chains.is_empty() {
            self.search.default_chains.clone()
        } else {
            self.sync.chain_ids()
        }
    }

    /// Expand ~ in db_path to the home directory.
    pub fn expanded_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }

    pub fn expanded_vector_index_path(&self) -> PathBuf {
        expand_home(&self.vector_index_path)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
