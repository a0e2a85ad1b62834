//! End-to-end standard search tests: filtering, over-fetch, pagination,
//! sorting and batch indexing degradation.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::Value;

use agent_embeddings::MockEmbedder;
use agent_search::SemanticSearchManager;
use agent_types::{
    AgentRecord, FilterValue, ProviderInfo, StandardFilters, StandardSearchRequest,
    StandardSearchResponse,
};
use agent_vector::{NativeFilter, VectorStore};
use e2e_tests::{create_test_agents, RecordingVectorStore, TEST_DIMENSIONS};

const BASE_SEPOLIA: u64 = 84532;
const SEPOLIA: u64 = 11155111;

fn provider() -> ProviderInfo {
    ProviderInfo::new("agent-search", "test")
}

/// Trading agents on two chains; on Base Sepolia some expose an MCP endpoint,
/// some carry an explicit null and some have none.
fn trading_agents() -> Vec<AgentRecord> {
    let mut agents = Vec::new();
    for i in 1..=16u32 {
        let mut agent = AgentRecord::new(
            BASE_SEPOLIA,
            i.to_string(),
            format!("Trader {:02}", i),
            format!("DeFi trading bot number {} executing swaps and arbitrage", i),
        )
        .with_capabilities(["trading"])
        .with_tags(["defi"]);
        agent = match i % 4 {
            0 | 1 => agent.with_metadata("mcpEndpoint", format!("https://mcp.example/{}", i)),
            2 => agent.with_metadata("mcpEndpoint", Value::Null),
            _ => agent,
        };
        agents.push(agent);
    }
    for i in 1..=6u32 {
        agents.push(
            AgentRecord::new(
                SEPOLIA,
                i.to_string(),
                format!("Sepolia Trader {}", i),
                "DeFi trading bot for testnet liquidity".to_string(),
            )
            .with_metadata("mcpEndpoint", format!("https://sepolia.mcp.example/{}", i)),
        );
    }
    agents
}

async fn indexed(agents: &[AgentRecord]) -> (Arc<SemanticSearchManager>, Arc<RecordingVectorStore>) {
    let store = Arc::new(RecordingVectorStore::new(TEST_DIMENSIONS, 1000));
    let manager = Arc::new(
        SemanticSearchManager::new(Arc::new(MockEmbedder::new(TEST_DIMENSIONS)), store.clone())
            .unwrap(),
    );
    let report = manager.index_agents_batch(agents).await.unwrap();
    assert_eq!(report.indexed_count(), agents.len());
    (manager, store)
}

async fn search(manager: &SemanticSearchManager, request: &StandardSearchRequest) -> StandardSearchResponse {
    manager
        .search_agents_v1(request, &provider(), None)
        .await
        .unwrap()
}

/// Native chain filter, post-filter over-fetch (topK = 0 + 5 * 3) and ranks from 1.
#[tokio::test]
async fn test_defi_trading_bot_with_filters() {
    let (manager, store) = indexed(&trading_agents()).await;

    let filters = StandardFilters::new()
        .with_equals("chainId", BASE_SEPOLIA)
        .with_exists("mcpEndpoint");
    let request = StandardSearchRequest::new("defi trading bot")
        .with_limit(5)
        .with_filters(filters);

    let response = search(&manager, &request).await;

    let query = store.last_query().unwrap();
    assert_eq!(query.top_k, 15);
    assert_eq!(
        query.filter,
        Some(NativeFilter::Eq {
            field: "chainId".to_string(),
            value: FilterValue::Integer(BASE_SEPOLIA as i64),
        })
    );

    assert_eq!(response.results.len(), 5);
    for (i, result) in response.results.iter().enumerate() {
        assert_eq!(result.rank, i + 1);
        assert_eq!(result.chain_id, BASE_SEPOLIA);
        let metadata = result.metadata.as_ref().unwrap();
        assert!(
            matches!(metadata.get("mcpEndpoint"), Some(Value::String(_))),
            "{} has no endpoint",
            result.vector_id
        );
    }
    assert!(response
        .results
        .windows(2)
        .all(|w| w[0].score >= w[1].score));
    assert!(response.pagination.has_more);
    assert_eq!(response.pagination.offset, Some(0));
    assert_eq!(response.query, "defi trading bot");
    assert_eq!(response.provider, provider());
}

/// Without post-filter or score threshold the store is asked for 2x the page.
#[tokio::test]
async fn test_plain_query_uses_default_multiplier() {
    let (manager, store) = indexed(&trading_agents()).await;

    search(&manager, &StandardSearchRequest::new("defi trading bot").with_limit(4)).await;
    assert_eq!(store.last_query().unwrap().top_k, 8);

    search(
        &manager,
        &StandardSearchRequest::new("defi trading bot")
            .with_limit(4)
            .with_offset(4),
    )
    .await;
    assert_eq!(store.last_query().unwrap().top_k, 12);
    assert_eq!(store.queries().len(), 2);
}

/// A name filter alone is applied after retrieval, so it over-fetches 3x.
#[tokio::test]
async fn test_name_filter_alone_uses_filtered_multiplier() {
    let (manager, store) = indexed(&trading_agents()).await;

    let response = search(
        &manager,
        &StandardSearchRequest::new("defi trading bot")
            .with_limit(4)
            .with_name("sepolia"),
    )
    .await;

    let query = store.last_query().unwrap();
    assert_eq!(query.top_k, 12);
    assert_eq!(query.filter, None);
    assert!(response
        .results
        .iter()
        .all(|r| r.name.to_lowercase().contains("sepolia")));
}

/// Following `nextCursor` continues ranks without repeating agents.
#[tokio::test]
async fn test_cursor_pagination_walks_pages() {
    let (manager, _store) = indexed(&trading_agents()).await;

    let first = search(&manager, &StandardSearchRequest::new("defi trading bot").with_limit(3)).await;
    let cursor = first.pagination.next_cursor.clone().unwrap();
    assert_eq!(cursor, r#"{"offset":3}"#);

    let second = search(
        &manager,
        &StandardSearchRequest::new("defi trading bot")
            .with_limit(3)
            .with_cursor(cursor),
    )
    .await;

    assert_eq!(
        second.results.iter().map(|r| r.rank).collect::<Vec<_>>(),
        vec![4, 5, 6]
    );
    assert_eq!(second.pagination.offset, None);
    for result in &second.results {
        assert!(first.results.iter().all(|r| r.vector_id != result.vector_id));
    }
}

/// Sorting by name reorders the window; missing metadata is excluded from the page.
#[tokio::test]
async fn test_sort_by_name_and_exclude_metadata() {
    let (manager, _store) = indexed(&trading_agents()).await;

    let request = StandardSearchRequest::new("defi trading bot")
        .with_limit(6)
        .with_sort("name:asc")
        .without_metadata();
    let response = search(&manager, &request).await;

    let names: Vec<&str> = response.results.iter().map(|r| r.name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert!(response.results.iter().all(|r| r.metadata.is_none()));
}

/// Name substring, notIn and notExists narrow the result set.
#[tokio::test]
async fn test_name_and_negative_filters() {
    let (manager, _store) = indexed(&trading_agents()).await;

    let by_name = search(
        &manager,
        &StandardSearchRequest::new("defi trading bot")
            .with_limit(20)
            .with_name("SEPOLIA trader"),
    )
    .await;
    assert_eq!(by_name.results.len(), 6);
    assert!(by_name.results.iter().all(|r| r.chain_id == SEPOLIA));

    let filters = StandardFilters::new()
        .with_not_in("chainId", [SEPOLIA])
        .with_not_exists("mcpEndpoint");
    let without_endpoint = search(
        &manager,
        &StandardSearchRequest::new("defi trading bot")
            .with_limit(20)
            .with_filters(filters),
    )
    .await;
    // i % 4 == 2 (null) and i % 4 == 3 (absent) on Base Sepolia
    assert_eq!(without_endpoint.results.len(), 8);
    assert!(without_endpoint
        .results
        .iter()
        .all(|r| r.chain_id == BASE_SEPOLIA));
}

/// A batch with one oversized agent degrades to per-agent indexing: 99 of
/// 100 agents are indexed and no error escapes.
#[tokio::test]
async fn test_batch_index_with_oversized_agent() {
    let embedder = Arc::new(MockEmbedder::new(TEST_DIMENSIONS).with_token_limit(64));
    let store = Arc::new(RecordingVectorStore::new(TEST_DIMENSIONS, 1000));
    let manager = SemanticSearchManager::new(embedder.clone(), store.clone()).unwrap();

    let mut agents = create_test_agents(BASE_SEPOLIA, 100);
    agents[56].description = "very long description ".repeat(100);
    assert_eq!(agents[56].agent_id, "57");

    let report = manager.index_agents_batch(&agents).await.unwrap();

    assert_eq!(report.indexed_count(), 99);
    assert_eq!(report.skipped_count(), 1);
    assert!(report.is_skipped("84532-57"));
    assert_eq!(store.count().await.unwrap(), 99);
    assert_eq!(embedder.batch_calls(), 1);
    assert_eq!(embedder.single_calls(), 100);
}
