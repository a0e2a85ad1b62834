//! End-to-end sync pipeline tests.
//!
//! Subgraph pages -> queue -> consumer -> vector index + sync state + sync
//! log, then searched through the standard API.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use agent_indexing::StaticSubgraphClient;
use agent_search::SemanticSearchManager;
use agent_types::{
    AgentRecord, ChainSelection, ProviderInfo, StandardSearchRequest, SyncEventKind, SyncStatus,
};
use agent_embeddings::MockEmbedder;
use agent_vector::{HnswConfig, HnswVectorStore, VectorStore};
use e2e_tests::{
    as_subgraph_agents, create_test_agents, in_memory_manager, sync_settings, SyncRig, TestHarness,
    TEST_DIMENSIONS,
};

const BASE_SEPOLIA: u64 = 84532;
const SEPOLIA: u64 = 11155111;

fn provider() -> ProviderInfo {
    ProviderInfo::new("agent-search", "test")
}

/// Two chains synced by two workers land in one log entry that completes once.
#[tokio::test]
async fn test_multi_chain_sync_indexes_every_agent() {
    let harness = TestHarness::new();
    let subgraph = Arc::new(StaticSubgraphClient::new());
    subgraph.set_agents(BASE_SEPOLIA, as_subgraph_agents(create_test_agents(BASE_SEPOLIA, 30), 100));
    subgraph.set_agents(SEPOLIA, as_subgraph_agents(create_test_agents(SEPOLIA, 12), 200));

    let settings = sync_settings(&[BASE_SEPOLIA, SEPOLIA]);
    let rig = SyncRig::start(&harness, &settings, subgraph, in_memory_manager(), 2);

    let log_id = rig.sync_all().await;

    let entry = rig.logger.get(log_id).unwrap().unwrap();
    assert_eq!(entry.status, SyncStatus::Success);
    assert_eq!(entry.agents_indexed, 42);
    assert_eq!(entry.agents_deleted, 0);
    assert!(entry.completed_at.is_some());

    let completions = rig
        .logger
        .events(log_id)
        .unwrap()
        .iter()
        .filter(|e| e.kind == SyncEventKind::Completed)
        .count();
    assert_eq!(completions, 1, "run must complete exactly once");

    let base = rig.state.load_chain(BASE_SEPOLIA).await.unwrap();
    assert_eq!(base.last_updated_at, 100);
    assert_eq!(base.agent_count(), 30);
    let sepolia = rig.state.load_chain(SEPOLIA).await.unwrap();
    assert_eq!(sepolia.last_updated_at, 200);
    assert_eq!(sepolia.agent_count(), 12);

    assert_eq!(rig.manager.store().count().await.unwrap(), 42);

    let request = StandardSearchRequest::new("price oracle aggregation")
        .with_limit(50)
        .with_chains(ChainSelection::All);
    let response = rig
        .manager
        .search_agents_v1(&request, &provider(), Some(&[BASE_SEPOLIA, SEPOLIA][..]))
        .await
        .unwrap();
    let chains: std::collections::HashSet<u64> =
        response.results.iter().map(|r| r.chain_id).collect();
    assert!(chains.contains(&BASE_SEPOLIA));
    assert!(chains.contains(&SEPOLIA));

    rig.stop().await;
}

/// A second run reindexes only changed agents and deletes removed ones.
#[tokio::test]
async fn test_resync_applies_changes_and_removals() {
    let harness = TestHarness::new();
    let subgraph = Arc::new(StaticSubgraphClient::new());
    let agents = create_test_agents(BASE_SEPOLIA, 10);
    subgraph.set_agents(BASE_SEPOLIA, as_subgraph_agents(agents.clone(), 100));

    let rig = SyncRig::start(
        &harness,
        &sync_settings(&[BASE_SEPOLIA]),
        subgraph.clone(),
        in_memory_manager(),
        1,
    );
    rig.sync_all().await;

    // Agent 3 is rewritten, agent 10 disappears from the registry.
    let mut next: Vec<AgentRecord> = agents.into_iter().filter(|a| a.agent_id != "10").collect();
    next[2].description = "Cross-chain bridge relayer for stablecoins".to_string();
    subgraph.set_agents(BASE_SEPOLIA, as_subgraph_agents(next, 150));

    let log_id = rig.sync_all().await;
    let entry = rig.logger.get(log_id).unwrap().unwrap();
    assert_eq!(entry.status, SyncStatus::Success);
    assert_eq!(entry.agents_indexed, 1);
    assert_eq!(entry.agents_deleted, 1);

    let state = rig.state.load_chain(BASE_SEPOLIA).await.unwrap();
    assert_eq!(state.last_updated_at, 150);
    assert_eq!(state.agent_count(), 9);
    assert!(state.hash_of("10").is_none());
    assert_eq!(rig.manager.store().count().await.unwrap(), 9);

    let response = rig
        .manager
        .search_agents_v1(
            &StandardSearchRequest::new("stablecoins bridge relayer").with_chains(ChainSelection::One(BASE_SEPOLIA)),
            &provider(),
            None,
        )
        .await
        .unwrap();
    assert_eq!(response.results[0].agent_id, "3");
    assert_eq!(response.results[0].rank, 1);

    rig.stop().await;
}

/// One failing chain turns the run into an error without losing the other.
#[tokio::test]
async fn test_failed_chain_marks_run_error() {
    let harness = TestHarness::new();
    let subgraph = Arc::new(StaticSubgraphClient::new());
    subgraph.set_agents(BASE_SEPOLIA, as_subgraph_agents(create_test_agents(BASE_SEPOLIA, 5), 100));
    subgraph.fail_chain(SEPOLIA, "subgraph returned 502");

    let rig = SyncRig::start(
        &harness,
        &sync_settings(&[BASE_SEPOLIA, SEPOLIA]),
        subgraph.clone(),
        in_memory_manager(),
        2,
    );
    let log_id = rig.sync_all().await;

    let entry = rig.logger.get(log_id).unwrap().unwrap();
    assert_eq!(entry.status, SyncStatus::Error);
    assert_eq!(entry.agents_indexed, 5);
    let message = entry.error_message.unwrap();
    assert!(message.contains(&format!("chain {}", SEPOLIA)), "got: {}", message);
    assert!(rig.state.load_chain(SEPOLIA).await.is_none());
    assert!(rig.state.load_chain(BASE_SEPOLIA).await.is_some());

    // The chain recovers on the next run.
    subgraph.heal_chain(SEPOLIA);
    subgraph.set_agents(SEPOLIA, as_subgraph_agents(create_test_agents(SEPOLIA, 2), 300));
    let log_id = rig.sync_all().await;
    let entry = rig.logger.get(log_id).unwrap().unwrap();
    assert_eq!(entry.status, SyncStatus::Success);
    assert_eq!(entry.agents_indexed, 2);

    rig.stop().await;
}

/// Index and sync state survive a restart; an unchanged registry reindexes nothing.
#[tokio::test]
async fn test_restart_keeps_index_and_state() {
    let harness = TestHarness::new();
    let subgraph = Arc::new(StaticSubgraphClient::new());
    subgraph.set_agents(BASE_SEPOLIA, as_subgraph_agents(create_test_agents(BASE_SEPOLIA, 8), 100));
    let settings = sync_settings(&[BASE_SEPOLIA]);

    let open_manager = |path: &std::path::Path| {
        let store = HnswVectorStore::open(HnswConfig::new(TEST_DIMENSIONS, path), 1000).unwrap();
        Arc::new(
            SemanticSearchManager::new(Arc::new(MockEmbedder::new(TEST_DIMENSIONS)), Arc::new(store))
                .unwrap(),
        )
    };

    {
        let rig = SyncRig::start(
            &harness,
            &settings,
            subgraph.clone(),
            open_manager(&harness.vector_index_path),
            1,
        );
        rig.sync_all().await;
        rig.stop().await;
    }

    let manager = open_manager(&harness.vector_index_path);
    assert_eq!(manager.store().count().await.unwrap(), 8);

    let rig = SyncRig::start(&harness, &settings, subgraph, manager, 1);
    let log_id = rig.sync_all().await;
    let entry = rig.logger.get(log_id).unwrap().unwrap();
    assert_eq!(entry.status, SyncStatus::Success);
    assert_eq!(entry.agents_indexed, 0);
    assert_eq!(entry.agents_deleted, 0);

    rig.stop().await;
}

/// Runs over chains that are no longer configured drop their state.
#[tokio::test]
async fn test_unconfigured_chain_state_is_pruned() {
    let harness = TestHarness::new();
    let subgraph = Arc::new(StaticSubgraphClient::new());
    subgraph.set_agents(BASE_SEPOLIA, as_subgraph_agents(create_test_agents(BASE_SEPOLIA, 3), 100));
    subgraph.set_agents(SEPOLIA, as_subgraph_agents(create_test_agents(SEPOLIA, 3), 100));

    let rig = SyncRig::start(
        &harness,
        &sync_settings(&[BASE_SEPOLIA, SEPOLIA]),
        subgraph.clone(),
        in_memory_manager(),
        1,
    );
    rig.sync_all().await;
    rig.stop().await;

    let rig = SyncRig::start(&harness, &sync_settings(&[BASE_SEPOLIA]), subgraph, in_memory_manager(), 1);
    rig.sync_all().await;

    let state = rig.state.load().await.unwrap();
    assert_eq!(state.keys().copied().collect::<Vec<_>>(), vec![BASE_SEPOLIA]);

    rig.stop().await;
}
