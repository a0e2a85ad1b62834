//! Wiring of storage, index and sync pipeline from [`Settings`].

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use agent_embeddings::create_provider;
use agent_indexing::{
    sync_queue, ChainSyncConsumer, ConsumerPool, GraphQlSubgraphClient, QueueReceiver,
    SubgraphConfig, SubgraphClient, SyncTrigger, DEFAULT_QUEUE_CAPACITY,
};
use agent_search::SemanticSearchManager;
use agent_storage::{RocksSyncStateStore, Storage, SyncLogger, SyncStateStore};
use agent_types::{Settings, VectorBackend};
use agent_vector::{HnswConfig, HnswVectorStore, InMemoryVectorStore, VectorStore};

/// Open the sync database, creating its directory if needed.
pub fn open_storage(settings: &Settings) -> Result<Arc<Storage>> {
    let db_path = settings.expanded_db_path();
    fs::create_dir_all(&db_path).context("Failed to create database directory")?;
    info!("Opening storage at {:?}", db_path);
    let storage = Storage::open(&db_path).context("Failed to open storage")?;
    Ok(Arc::new(storage))
}

/// Build the embedder and vector store and check they agree on dimensions.
pub fn open_search_manager(settings: &Settings) -> Result<Arc<SemanticSearchManager>> {
    let embedder =
        create_provider(&settings.embedding).context("Failed to create embedding provider")?;
    let dimensions = settings.embedding.dimensions;

    let store: Arc<dyn VectorStore> = match settings.vector.backend {
        VectorBackend::Hnsw => {
            let index_path = settings.expanded_vector_index_path();
            fs::create_dir_all(&index_path).context("Failed to create vector index directory")?;
            let config =
                HnswConfig::new(dimensions, index_path).with_capacity(settings.vector.capacity);
            Arc::new(
                HnswVectorStore::open(config, settings.vector.max_top_k)
                    .context("Failed to open vector index")?,
            )
        }
        VectorBackend::Memory => {
            warn!("Using the in-memory vector store; the index is lost on exit");
            Arc::new(InMemoryVectorStore::new(
                dimensions,
                settings.vector.max_top_k,
            ))
        }
    };

    let manager = SemanticSearchManager::new(embedder, store)
        .context("Embedding provider and vector store are incompatible")?;
    Ok(Arc::new(manager))
}

/// Subgraph client with one endpoint per configured chain.
pub fn subgraph_client(settings: &Settings) -> Result<Arc<dyn SubgraphClient>> {
    let config = settings
        .sync
        .chains
        .iter()
        .filter(|chain| !chain.subgraph_url.is_empty())
        .fold(SubgraphConfig::default(), |config, chain| {
            config.with_endpoint(chain.chain_id, chain.subgraph_url.clone())
        });
    let client = GraphQlSubgraphClient::new(config).context("Failed to build subgraph client")?;
    Ok(Arc::new(client))
}

/// Everything the `start` and `sync` commands run on.
pub struct SyncPipeline {
    pub manager: Arc<SemanticSearchManager>,
    pub logger: Arc<SyncLogger>,
    pub state: Arc<dyn SyncStateStore>,
    pub trigger: Arc<SyncTrigger>,
    consumer: Arc<ChainSyncConsumer>,
    receiver: Option<QueueReceiver>,
}

impl SyncPipeline {
    pub fn open(settings: &Settings) -> Result<Self> {
        let storage = open_storage(settings)?;
        let manager = open_search_manager(settings)?;
        Self::assemble(settings, storage, manager, subgraph_client(settings)?)
    }

    /// Assemble a pipeline from already opened parts.
    pub fn assemble(
        settings: &Settings,
        storage: Arc<Storage>,
        manager: Arc<SemanticSearchManager>,
        subgraph: Arc<dyn SubgraphClient>,
    ) -> Result<Self> {
        let logger = Arc::new(SyncLogger::new(storage.clone()));
        let state: Arc<dyn SyncStateStore> = Arc::new(RocksSyncStateStore::new(storage));
        let (queue, receiver) = sync_queue(DEFAULT_QUEUE_CAPACITY);

        let consumer = Arc::new(ChainSyncConsumer::new(
            subgraph,
            manager.clone(),
            state.clone(),
            logger.clone(),
        ));
        let trigger = Arc::new(SyncTrigger::new(
            &settings.sync,
            queue,
            logger.clone(),
            state.clone(),
        ));

        Ok(Self {
            manager,
            logger,
            state,
            trigger,
            consumer,
            receiver: Some(receiver),
        })
    }

    /// Start the consumer pool. Only one pool can drain the queue.
    pub fn start_consumers(
        &mut self,
        workers: usize,
        cancel: CancellationToken,
    ) -> Result<ConsumerPool> {
        let receiver = self
            .receiver
            .take()
            .context("Sync consumers already started")?;
        Ok(ConsumerPool::start(
            receiver,
            self.consumer.clone(),
            workers,
            cancel,
        ))
    }

    /// Flush the vector index to disk.
    pub async fn persist(&self) {
        if let Err(e) = self.manager.store().persist().await {
            warn!(error = %e, "Failed to persist vector index");
        }
    }
}
