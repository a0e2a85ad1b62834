//! End-to-end test infrastructure for agent-search.
//!
//! Provides a shared TestHarness and helpers for tests covering the
//! subgraph-to-search pipeline.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::seq::SliceRandom;

use agent_embeddings::MockEmbedder;
use agent_indexing::{
    sync_queue, ChainSyncConsumer, ConsumerPool, StaticSubgraphClient, SubgraphAgent,
    SyncTrigger, DEFAULT_QUEUE_CAPACITY,
};
use agent_search::SemanticSearchManager;
use agent_storage::{RocksSyncStateStore, Storage, SyncLogger, SyncStateStore};
use agent_types::{AgentRecord, ChainSettings, SyncSettings};
use agent_vector::{
    BatchVectorStore, InMemoryVectorStore, QueryMatch, VectorError, VectorQuery, VectorRecord,
    VectorStore,
};
use tokio_util::sync::CancellationToken;

/// Embedding width used across the e2e suite.
pub const TEST_DIMENSIONS: usize = 128;

/// Shared test harness for E2E tests.
///
/// Owns a temp directory with a sync database and a vector index path.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub storage: Arc<Storage>,
    pub vector_index_path: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage = Arc::new(
            Storage::open(&temp_dir.path().join("db")).expect("Failed to open test storage"),
        );
        let vector_index_path = temp_dir.path().join("vector-index");
        std::fs::create_dir_all(&vector_index_path).expect("Failed to create vector index dir");

        Self {
            _temp_dir: temp_dir,
            storage,
            vector_index_path,
        }
    }

    pub fn logger(&self) -> Arc<SyncLogger> {
        Arc::new(SyncLogger::new(self.storage.clone()))
    }

    pub fn state_store(&self) -> Arc<dyn SyncStateStore> {
        Arc::new(RocksSyncStateStore::new(self.storage.clone()))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Search manager over the mock embedder and an in-memory store.
pub fn in_memory_manager() -> Arc<SemanticSearchManager> {
    let embedder = Arc::new(MockEmbedder::new(TEST_DIMENSIONS));
    let store = Arc::new(InMemoryVectorStore::new(TEST_DIMENSIONS, 1000));
    Arc::new(SemanticSearchManager::new(embedder, store).expect("Failed to build manager"))
}

/// Sync settings for `chains` with empty subgraph URLs.
pub fn sync_settings(chains: &[u64]) -> SyncSettings {
    SyncSettings {
        chains: chains
            .iter()
            .map(|id| ChainSettings {
                chain_id: *id,
                subgraph_url: String::new(),
            })
            .collect(),
        jitter_secs: 0,
        ..Default::default()
    }
}

const CAPABILITIES: &[&str] = &["trading", "swaps", "lending", "oracles", "analytics", "nft"];
const TOPICS: &[&str] = &[
    "decentralized exchange routing",
    "lending market liquidations",
    "price oracle aggregation",
    "portfolio analytics dashboards",
    "nft marketplace listings",
];

/// Create `count` agents on `chain_id` with ids `1..=count`.
///
/// Descriptions rotate through a handful of topics so searches have
/// several clusters to rank.
pub fn create_test_agents(chain_id: u64, count: usize) -> Vec<AgentRecord> {
    (1..=count)
        .map(|i| {
            let topic = TOPICS[i % TOPICS.len()];
            AgentRecord::new(
                chain_id,
                i.to_string(),
                format!("Agent {:03}", i),
                format!("Autonomous agent specialised in {}", topic),
            )
            .with_capabilities([CAPABILITIES[i % CAPABILITIES.len()]])
            .with_tags(["test"])
        })
        .collect()
}

/// Wrap records as subgraph rows, shuffled so nothing relies on input order.
pub fn as_subgraph_agents(records: Vec<AgentRecord>, updated_at: u64) -> Vec<SubgraphAgent> {
    let mut agents: Vec<SubgraphAgent> = records
        .into_iter()
        .map(|record| SubgraphAgent::new(record, updated_at))
        .collect();
    agents.shuffle(&mut rand::rng());
    agents
}

/// A running sync pipeline: trigger, queue, consumer pool.
pub struct SyncRig {
    pub trigger: Arc<SyncTrigger>,
    pub logger: Arc<SyncLogger>,
    pub state: Arc<dyn SyncStateStore>,
    pub manager: Arc<SemanticSearchManager>,
    pool: ConsumerPool,
}

impl SyncRig {
    pub fn start(
        harness: &TestHarness,
        settings: &SyncSettings,
        subgraph: Arc<StaticSubgraphClient>,
        manager: Arc<SemanticSearchManager>,
        workers: usize,
    ) -> Self {
        let logger = harness.logger();
        let state = harness.state_store();
        let (queue, receiver) = sync_queue(DEFAULT_QUEUE_CAPACITY);
        let consumer = Arc::new(ChainSyncConsumer::new(
            subgraph,
            manager.clone(),
            state.clone(),
            logger.clone(),
        ));
        let trigger = Arc::new(SyncTrigger::new(
            settings,
            queue,
            logger.clone(),
            state.clone(),
        ));
        let pool = ConsumerPool::start(receiver, consumer, workers, CancellationToken::new());

        Self {
            trigger,
            logger,
            state,
            manager,
            pool,
        }
    }

    /// Trigger a full run and wait until every queued chain is handled.
    pub async fn sync_all(&self) -> u64 {
        let log_id = self.trigger.run().await.expect("Sync trigger failed");
        self.trigger.queue().wait_idle().await;
        log_id
    }

    pub async fn stop(self) {
        self.pool.shutdown().await;
    }
}

/// In-memory store that remembers every query it served.
pub struct RecordingVectorStore {
    inner: InMemoryVectorStore,
    queries: Mutex<Vec<VectorQuery>>,
}

impl RecordingVectorStore {
    pub fn new(dimensions: usize, max_top_k: usize) -> Self {
        Self {
            inner: InMemoryVectorStore::new(dimensions, max_top_k),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<VectorQuery> {
        self.queries.lock().expect("queries lock poisoned").clone()
    }

    pub fn last_query(&self) -> Option<VectorQuery> {
        self.queries().pop()
    }
}

#[async_trait]
impl VectorStore for RecordingVectorStore {
    fn name(&self) -> &str {
        "recording"
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn max_top_k(&self) -> usize {
        self.inner.max_top_k()
    }

    async fn upsert(&self, record: VectorRecord) -> Result<(), VectorError> {
        self.inner.upsert(record).await
    }

    async fn query(&self, query: &VectorQuery) -> Result<Vec<QueryMatch>, VectorError> {
        self.queries
            .lock()
            .expect("queries lock poisoned")
            .push(query.clone());
        self.inner.query(query).await
    }

    async fn delete(&self, id: &str) -> Result<bool, VectorError> {
        self.inner.delete(id).await
    }

    async fn count(&self) -> Result<usize, VectorError> {
        self.inner.count().await
    }

    fn as_batch(&self) -> Option<&dyn BatchVectorStore> {
        self.inner.as_batch()
    }
}
