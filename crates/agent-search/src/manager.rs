//! Semantic search manager.
//!
//! Owns the embedding provider and vector store handles and implements
//! agent indexing plus the legacy and standard (v1) search flows. Both
//! providers are ready before construction; batch capabilities are probed
//! once here and never again.

use std::cmp::Ordering;
use std::sync::Arc;

use agent_embeddings::{Embedding, EmbeddingProvider};
use agent_types::{
    parse_vector_id, AgentRecord, ChainSelection, FilterValue, PaginationInfo, ProviderInfo,
    SemanticSearchResult, SortDirection, SortKey, StandardFilters, StandardSearchRequest,
    StandardSearchResponse, StandardSearchResult, DEFAULT_SEARCH_CHAINS,
};
use agent_vector::{NativeFilter, QueryMatch, VectorQuery, VectorRecord, VectorStore};
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::error::SearchError;
use crate::filter::FilterTransformer;
use crate::limits::{
    DEFAULT_FETCH_MULTIPLIER, DEFAULT_LIMIT, FILTERED_FETCH_MULTIPLIER, MAX_TOPK,
};
use crate::pagination::{calculate_cursor_pagination, calculate_offset_pagination, get_offset};
use crate::validation::validate_request;

const CHAIN_FIELD: &str = "chainId";

/// An agent left out of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAgent {
    pub vector_id: String,
    pub reason: String,
}

/// Outcome of [`SemanticSearchManager::index_agents_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Vector ids written, in input order
    pub indexed: Vec<String>,
    pub skipped: Vec<SkippedAgent>,
}

impl IndexReport {
    pub fn indexed_count(&self) -> usize {
        self.indexed.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_skipped(&self, vector_id: &str) -> bool {
        self.skipped.iter().any(|s| s.vector_id == vector_id)
    }
}

/// Indexes agents into a vector store and answers searches over it.
pub struct SemanticSearchManager {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    transformer: FilterTransformer,
    batch_embed: bool,
    batch_store: bool,
    max_top_k: usize,
}

impl SemanticSearchManager {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, SearchError> {
        let embedder_dims = embedder.info().dimensions;
        if embedder_dims != store.dimensions() {
            return Err(SearchError::DimensionMismatch {
                embedder: embedder_dims,
                store: store.dimensions(),
            });
        }

        let batch_embed = embedder.as_batch().is_some();
        let batch_store = store.as_batch().is_some();
        let max_top_k = MAX_TOPK.min(store.max_top_k());

        info!(
            embedder = %embedder.info().provider,
            model = %embedder.info().model,
            store = store.name(),
            dimensions = embedder_dims,
            batch_embed,
            batch_store,
            "Semantic search manager ready"
        );

        Ok(Self {
            embedder,
            store,
            transformer: FilterTransformer::new(),
            batch_embed,
            batch_store,
            max_top_k,
        })
    }

    /// Replace the default identity field mapping.
    pub fn with_transformer(mut self, transformer: FilterTransformer) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn supports_batch_embedding(&self) -> bool {
        self.batch_embed
    }

    pub fn supports_batch_store(&self) -> bool {
        self.batch_store
    }

    /// Text embedded for an agent.
    pub fn embedding_text(record: &AgentRecord) -> String {
        let mut parts = vec![record.name.clone(), record.description.clone()];

        if !record.capabilities.is_empty() {
            parts.push(format!("Capabilities: {}", record.capabilities.join(", ")));
        }
        if !record.tags.is_empty() {
            parts.push(format!("Tags: {}", record.tags.join(", ")));
        }
        if !record.default_input_modes.is_empty() {
            parts.push(format!("Input: {}", record.default_input_modes.join(", ")));
        }
        if !record.default_output_modes.is_empty() {
            parts.push(format!("Output: {}", record.default_output_modes.join(", ")));
        }

        parts
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Metadata stored beside an agent's embedding.
    ///
    /// Extra record metadata is copied first; the core fields always win.
    pub fn build_metadata(record: &AgentRecord) -> Map<String, Value> {
        let mut metadata = record.metadata.clone();
        metadata.insert("name".into(), Value::from(record.name.clone()));
        metadata.insert("description".into(), Value::from(record.description.clone()));
        metadata.insert("capabilities".into(), Value::from(record.capabilities.clone()));
        metadata.insert(
            "defaultInputModes".into(),
            Value::from(record.default_input_modes.clone()),
        );
        metadata.insert(
            "defaultOutputModes".into(),
            Value::from(record.default_output_modes.clone()),
        );
        metadata.insert("tags".into(), Value::from(record.tags.clone()));
        metadata.insert(CHAIN_FIELD.into(), Value::from(record.chain_id));
        metadata.insert("agentId".into(), Value::from(record.agent_id.clone()));
        metadata.insert("updatedAt".into(), Value::from(Utc::now().to_rfc3339()));
        metadata
    }

    fn vector_record(record: &AgentRecord, embedding: Embedding) -> VectorRecord {
        VectorRecord::new(
            record.vector_id().to_string(),
            embedding.into_vec(),
            Self::build_metadata(record),
        )
    }

    /// Embed and upsert one agent. Re-indexing replaces the previous record.
    pub async fn index_agent(&self, record: &AgentRecord) -> Result<(), SearchError> {
        let text = Self::embedding_text(record);
        let embedding = self.embedder.embed(&text).await?;
        self.store
            .upsert(Self::vector_record(record, embedding))
            .await?;
        debug!(vector_id = %record.vector_id(), "Indexed agent");
        Ok(())
    }

    /// Index many agents with one embedding call.
    ///
    /// A token-limit failure of the batch call degrades to per-agent
    /// indexing, where agents that fail on their own are skipped. Any other
    /// batch failure is returned.
    pub async fn index_agents_batch(
        &self,
        records: &[AgentRecord],
    ) -> Result<IndexReport, SearchError> {
        if records.is_empty() {
            return Ok(IndexReport::default());
        }

        let batch = match self.embedder.as_batch() {
            Some(batch) if self.batch_embed => batch,
            _ => return self.index_individually(records, false).await,
        };

        let texts: Vec<String> = records.iter().map(Self::embedding_text).collect();
        match batch.embed_batch(&texts).await {
            Ok(embeddings) => {
                let vectors: Vec<VectorRecord> = records
                    .iter()
                    .zip(embeddings)
                    .map(|(record, embedding)| Self::vector_record(record, embedding))
                    .collect();
                let indexed = vectors.iter().map(|v| v.id.clone()).collect();
                self.upsert_all(vectors).await?;

                debug!(count = records.len(), "Indexed agent batch");
                Ok(IndexReport {
                    indexed,
                    skipped: Vec::new(),
                })
            }
            Err(e) if e.is_token_limit() => {
                warn!(
                    count = records.len(),
                    error = %e,
                    "Batch embedding hit token limit, falling back to per-agent indexing"
                );
                self.index_individually(records, true).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Per-agent indexing. Lenient mode skips every failure; otherwise only
    /// token-limit failures are skipped.
    async fn index_individually(
        &self,
        records: &[AgentRecord],
        lenient: bool,
    ) -> Result<IndexReport, SearchError> {
        let mut report = IndexReport::default();

        for record in records {
            let vector_id = record.vector_id().to_string();
            match self.index_agent(record).await {
                Ok(()) => report.indexed.push(vector_id),
                Err(e) if lenient || is_token_limit(&e) => {
                    warn!(vector_id = %vector_id, error = %e, "Skipping agent that failed to index");
                    report.skipped.push(SkippedAgent {
                        vector_id,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    async fn upsert_all(&self, records: Vec<VectorRecord>) -> Result<(), SearchError> {
        match self.store.as_batch() {
            Some(batch) if self.batch_store => batch.upsert_batch(records).await?,
            _ => {
                for record in records {
                    self.store.upsert(record).await?;
                }
            }
        }
        Ok(())
    }

    /// Delete one agent. Returns false when it was not indexed.
    pub async fn delete_agent(&self, chain_id: u64, agent_id: &str) -> Result<bool, SearchError> {
        let id = agent_types::format_vector_id(chain_id, agent_id);
        Ok(self.store.delete(&id).await?)
    }

    /// Delete many agents. Returns how many were indexed.
    pub async fn delete_agents_batch(&self, agents: &[(u64, String)]) -> Result<usize, SearchError> {
        let ids: Vec<String> = agents
            .iter()
            .map(|(chain_id, agent_id)| agent_types::format_vector_id(*chain_id, agent_id))
            .collect();

        match self.store.as_batch() {
            Some(batch) if self.batch_store => Ok(batch.delete_many(&ids).await?),
            _ => {
                let mut deleted = 0;
                for id in &ids {
                    if self.store.delete(id).await? {
                        deleted += 1;
                    }
                }
                Ok(deleted)
            }
        }
    }

    /// Legacy search with a raw native filter.
    pub async fn search_agents(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<NativeFilter>,
        min_score: Option<f32>,
    ) -> Result<Vec<SemanticSearchResult>, SearchError> {
        let embedding = self.embedder.embed(query).await?;
        let matches = self
            .store
            .query(&VectorQuery::new(embedding.into_vec(), top_k).with_filter(filter))
            .await?;

        Ok(matches
            .into_iter()
            .filter(|m| min_score.map_or(true, |min| m.score >= min))
            .enumerate()
            .map(|(i, m)| {
                let (chain_id, agent_id) = identity_of(&m);
                SemanticSearchResult {
                    rank: i + 1,
                    vector_id: m.id.clone(),
                    chain_id,
                    agent_id,
                    name: text_field(&m.metadata, "name"),
                    description: text_field(&m.metadata, "description"),
                    score: m.score,
                    metadata: m.metadata,
                }
            })
            .collect())
    }

    /// Standard (v1) search.
    ///
    /// `configured_chains` backs `chains: "all"`; the static default list is
    /// used when it is absent or empty.
    pub async fn search_agents_v1(
        &self,
        request: &StandardSearchRequest,
        provider: &ProviderInfo,
        configured_chains: Option<&[u64]>,
    ) -> Result<StandardSearchResponse, SearchError> {
        validate_request(request)?;
        let sort_keys = request
            .sort
            .iter()
            .map(|s| SortKey::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        let filters = merge_chains(
            request.filters.clone().unwrap_or_default(),
            request.chains.as_ref(),
            configured_chains,
        );
        let transformed = self.transformer.transform(&filters);

        let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
        let offset = get_offset(request.cursor.as_deref(), request.offset)?;

        let filtered_after_query = transformed.requires_post_filter()
            || request.min_score.is_some()
            || request.name.is_some();
        let multiplier = if filtered_after_query {
            FILTERED_FETCH_MULTIPLIER
        } else {
            DEFAULT_FETCH_MULTIPLIER
        };

        if offset >= self.max_top_k {
            debug!(offset, max_top_k = self.max_top_k, "Offset beyond reachable results");
            return self.envelope(request, provider, Vec::new(), 0, limit, offset, 0);
        }
        let top_k = offset
            .saturating_add(limit.saturating_mul(multiplier))
            .min(self.max_top_k);

        let embedding = self.embedder.embed(&request.query).await?;
        let matches = self
            .store
            .query(
                &VectorQuery::new(embedding.into_vec(), top_k)
                    .with_filter(transformed.native.clone()),
            )
            .await?;
        let fetched = matches.len();

        let name_needle = request.name.as_ref().map(|n| n.to_lowercase());
        let mut filtered: Vec<QueryMatch> = matches
            .into_iter()
            .filter(|m| request.min_score.map_or(true, |min| m.score >= min))
            .filter(|m| {
                transformed
                    .post_filter
                    .as_ref()
                    .map_or(true, |post| post.matches(&m.metadata))
            })
            .filter(|m| {
                name_needle.as_ref().map_or(true, |needle| {
                    text_field(&m.metadata, "name").to_lowercase().contains(needle)
                })
            })
            .collect();

        if !sort_keys.is_empty() {
            filtered.sort_by(|a, b| compare_matches(a, b, &sort_keys));
        }

        let total = filtered.len();
        debug!(top_k, fetched, total, offset, limit, "Search candidates filtered");

        let results: Vec<StandardSearchResult> = filtered
            .into_iter()
            .skip(offset)
            .take(limit)
            .enumerate()
            .map(|(i, m)| {
                let (chain_id, agent_id) = identity_of(&m);
                StandardSearchResult {
                    rank: offset + i + 1,
                    vector_id: m.id.clone(),
                    agent_id,
                    chain_id,
                    name: text_field(&m.metadata, "name"),
                    description: text_field(&m.metadata, "description"),
                    score: m.score,
                    metadata: request.include_metadata.then_some(m.metadata),
                }
            })
            .collect();

        let returned = results.len();
        self.envelope(request, provider, results, total, limit, offset, returned)
    }

    #[allow(clippy::too_many_arguments)]
    fn envelope(
        &self,
        request: &StandardSearchRequest,
        provider: &ProviderInfo,
        results: Vec<StandardSearchResult>,
        total: usize,
        limit: usize,
        offset: usize,
        returned: usize,
    ) -> Result<StandardSearchResponse, SearchError> {
        let pagination: PaginationInfo = match request.cursor.as_deref() {
            Some(cursor) => calculate_cursor_pagination(limit, Some(cursor), total, returned)?,
            None => calculate_offset_pagination(limit, offset, total, returned),
        };

        Ok(StandardSearchResponse {
            query: request.query.clone(),
            results,
            total,
            pagination,
            request_id: Ulid::new().to_string(),
            timestamp: Utc::now(),
            provider: provider.clone(),
        })
    }
}

fn is_token_limit(error: &SearchError) -> bool {
    matches!(error, SearchError::Embedding(e) if e.is_token_limit())
}

/// Fold a chain selection into the `chainId` filters it replaces.
fn merge_chains(
    mut filters: StandardFilters,
    chains: Option<&ChainSelection>,
    configured: Option<&[u64]>,
) -> StandardFilters {
    let ids: Vec<u64> = match chains {
        None => return filters,
        Some(ChainSelection::One(id)) => {
            filters.in_values.remove(CHAIN_FIELD);
            filters
                .equals
                .insert(CHAIN_FIELD.to_string(), FilterValue::from(*id));
            return filters;
        }
        Some(ChainSelection::Many(ids)) if !ids.is_empty() => ids.clone(),
        Some(_) => match configured {
            Some(ids) if !ids.is_empty() => ids.to_vec(),
            _ => DEFAULT_SEARCH_CHAINS.to_vec(),
        },
    };

    filters.equals.remove(CHAIN_FIELD);
    filters.in_values.insert(
        CHAIN_FIELD.to_string(),
        ids.into_iter().map(FilterValue::from).collect(),
    );
    filters
}

/// Chain and agent id of a match, from metadata or else the vector id.
fn identity_of(m: &QueryMatch) -> (u64, String) {
    let from_meta = m.metadata.get(CHAIN_FIELD).and_then(Value::as_u64).zip(
        m.metadata
            .get("agentId")
            .and_then(Value::as_str)
            .map(str::to_string),
    );
    match from_meta {
        Some(identity) => identity,
        None => parse_vector_id(&m.id).unwrap_or_else(|_| (0, m.id.clone())),
    }
}

fn text_field(metadata: &Map<String, Value>, field: &str) -> String {
    metadata
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn sort_value(m: &QueryMatch, field: &str) -> Option<Value> {
    if field == "score" {
        return Some(Value::from(f64::from(m.score)));
    }
    match m.metadata.get(field) {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.clone()),
    }
}

/// Multi-key comparison; missing and null values sort last either way.
fn compare_matches(a: &QueryMatch, b: &QueryMatch, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = match (sort_value(a, &key.field), sort_value(b, &key.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let natural = compare_values(&x, &y);
                match key.direction {
                    SortDirection::Asc => natural,
                    SortDirection::Desc => natural.reverse(),
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{decode_cursor, encode_cursor};
    use agent_embeddings::MockEmbedder;
    use agent_vector::InMemoryVectorStore;
    use serde_json::json;

    const DIMS: usize = 256;

    fn provider() -> ProviderInfo {
        ProviderInfo::new("agent-search", "test")
    }

    fn manager_with(embedder: MockEmbedder) -> (SemanticSearchManager, Arc<MockEmbedder>) {
        let embedder = Arc::new(embedder);
        let store = Arc::new(InMemoryVectorStore::new(DIMS, MAX_TOPK));
        let manager = SemanticSearchManager::new(embedder.clone(), store).unwrap();
        (manager, embedder)
    }

    fn manager() -> SemanticSearchManager {
        manager_with(MockEmbedder::new(DIMS)).0
    }

    fn agent(chain_id: u64, id: &str, name: &str, description: &str) -> AgentRecord {
        AgentRecord::new(chain_id, id, name, description)
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let result = SemanticSearchManager::new(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(InMemoryVectorStore::new(16, 100)),
        );
        assert!(matches!(
            result,
            Err(SearchError::DimensionMismatch {
                embedder: 8,
                store: 16
            })
        ));
    }

    #[test]
    fn test_capabilities_probed() {
        let (m, _) = manager_with(MockEmbedder::new(DIMS).without_batch());
        assert!(!m.supports_batch_embedding());
        assert!(m.supports_batch_store());
    }

    #[test]
    fn test_metadata_core_fields_win() {
        let record = agent(84532, "7", "Trader", "Trades")
            .with_tags(["defi"])
            .with_metadata("chainId", 1)
            .with_metadata("mcpEndpoint", "https://mcp.example");
        let meta = SemanticSearchManager::build_metadata(&record);

        assert_eq!(meta["chainId"], json!(84532));
        assert_eq!(meta["agentId"], json!("7"));
        assert_eq!(meta["tags"], json!(["defi"]));
        assert_eq!(meta["mcpEndpoint"], json!("https://mcp.example"));
        assert!(meta["updatedAt"].is_string());
    }

    #[test]
    fn test_embedding_text() {
        let record = agent(1, "1", "Swapper", "Swaps tokens").with_capabilities(["swap", "quote"]);
        let text = SemanticSearchManager::embedding_text(&record);
        assert_eq!(text, "Swapper\nSwaps tokens\nCapabilities: swap, quote");
    }

    #[tokio::test]
    async fn test_index_is_idempotent() {
        let m = manager();
        let record = agent(1, "a-1", "Weather", "Forecasts");
        m.index_agent(&record).await.unwrap();
        m.index_agent(&record).await.unwrap();
        assert_eq!(m.store().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_uses_single_call() {
        let (m, embedder) = manager_with(MockEmbedder::new(DIMS));
        let records: Vec<AgentRecord> = (0..5)
            .map(|i| agent(1, &i.to_string(), "Agent", "does things"))
            .collect();

        let report = m.index_agents_batch(&records).await.unwrap();
        assert_eq!(report.indexed_count(), 5);
        assert_eq!(embedder.batch_calls(), 1);
        assert_eq!(embedder.single_calls(), 0);
    }

    #[tokio::test]
    async fn test_batch_token_limit_falls_back() {
        let (m, embedder) = manager_with(MockEmbedder::new(DIMS).with_token_limit(20));
        let mut records: Vec<AgentRecord> = (0..4)
            .map(|i| agent(1, &i.to_string(), "Agent", "short text"))
            .collect();
        records[2].description = "word ".repeat(50);

        let report = m.index_agents_batch(&records).await.unwrap();
        assert_eq!(report.indexed, vec!["1-0", "1-1", "1-3"]);
        assert!(report.is_skipped("1-2"));
        assert_eq!(embedder.batch_calls(), 1);
        assert_eq!(embedder.single_calls(), 4);
        assert_eq!(m.store().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_batch_other_errors_propagate() {
        let m = manager();
        let records = vec![agent(1, "1", "Agent", "ok"), agent(1, "2", "", "")];
        let err = m.index_agents_batch(&records).await.unwrap_err();
        assert!(matches!(err, SearchError::Embedding(_)));
        assert_eq!(m.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let m = manager();
        m.index_agent(&agent(1, "1", "A", "one")).await.unwrap();
        m.index_agent(&agent(1, "2", "B", "two")).await.unwrap();
        m.index_agent(&agent(2, "1", "C", "three")).await.unwrap();

        assert!(m.delete_agent(1, "1").await.unwrap());
        assert!(!m.delete_agent(1, "1").await.unwrap());

        let deleted = m
            .delete_agents_batch(&[(1, "2".into()), (2, "1".into()), (9, "9".into())])
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(m.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_legacy_search_min_score_and_ranks() {
        let m = manager();
        m.index_agent(&agent(1, "1", "Defi trader", "automated defi trading"))
            .await
            .unwrap();
        m.index_agent(&agent(1, "2", "Weather", "forecast summaries"))
            .await
            .unwrap();

        let all = m.search_agents("defi trading", 10, None, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].agent_id, "1");
        assert_eq!(all[0].rank, 1);
        assert_eq!(all[1].rank, 2);

        let strict = m
            .search_agents("defi trading", 10, None, Some(0.5))
            .await
            .unwrap();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].vector_id, "1-1");
    }

    async fn seeded(count: usize) -> SemanticSearchManager {
        let m = manager();
        let records: Vec<AgentRecord> = (0..count)
            .map(|i| {
                let r = agent(84532, &format!("{:03}", i), &format!("Agent {}", i), "defi trading bot");
                if i % 2 == 0 {
                    r.with_metadata("mcpEndpoint", format!("https://mcp/{}", i))
                } else {
                    r
                }
            })
            .collect();
        m.index_agents_batch(&records).await.unwrap();
        m
    }

    #[tokio::test]
    async fn test_v1_offset_beyond_total() {
        let m = seeded(5).await;
        let request = StandardSearchRequest::new("defi").with_offset(10);
        let response = m.search_agents_v1(&request, &provider(), None).await.unwrap();

        assert!(response.results.is_empty());
        assert_eq!(response.total, 5);
        assert!(!response.pagination.has_more);
        assert!(response.pagination.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_v1_cursor_and_offset_agree() {
        let m = seeded(12).await;
        let by_offset = m
            .search_agents_v1(
                &StandardSearchRequest::new("defi trading").with_limit(5).with_offset(5),
                &provider(),
                None,
            )
            .await
            .unwrap();
        let by_cursor = m
            .search_agents_v1(
                &StandardSearchRequest::new("defi trading")
                    .with_limit(5)
                    .with_cursor(encode_cursor(5)),
                &provider(),
                None,
            )
            .await
            .unwrap();

        let ids = |r: &StandardSearchResponse| {
            r.results.iter().map(|x| x.vector_id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&by_offset), ids(&by_cursor));
        assert_eq!(by_offset.results[0].rank, 6);
        assert_eq!(by_offset.pagination.offset, Some(5));
        assert_eq!(by_cursor.pagination.offset, None);
        assert_eq!(
            decode_cursor(by_cursor.pagination.next_cursor.as_deref().unwrap()).unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn test_v1_exists_filter_and_sort() {
        let m = seeded(10).await;
        let request = StandardSearchRequest::new("defi trading bot")
            .with_filters(StandardFilters::new().with_exists("mcpEndpoint"))
            .with_sort("agentId:desc");
        let response = m.search_agents_v1(&request, &provider(), None).await.unwrap();

        assert_eq!(response.total, 5);
        let ids: Vec<&str> = response.results.iter().map(|r| r.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["008", "006", "004", "002", "000"]);
        assert!(response.results[0].metadata.is_some());
    }

    #[tokio::test]
    async fn test_v1_null_sorts_last_both_directions() {
        let m = seeded(4).await;
        for dir in ["asc", "desc"] {
            let request =
                StandardSearchRequest::new("defi").with_sort(format!("mcpEndpoint:{}", dir));
            let response = m.search_agents_v1(&request, &provider(), None).await.unwrap();
            let tail: Vec<bool> = response
                .results
                .iter()
                .map(|r| r.metadata.as_ref().unwrap().contains_key("mcpEndpoint"))
                .collect();
            assert_eq!(tail, vec![true, true, false, false], "direction {}", dir);
        }
    }

    #[tokio::test]
    async fn test_v1_chains_and_name() {
        let m = manager();
        m.index_agent(&agent(1, "1", "Alpha Trader", "defi")).await.unwrap();
        m.index_agent(&agent(2, "1", "Beta Trader", "defi")).await.unwrap();
        m.index_agent(&agent(3, "1", "Gamma", "defi")).await.unwrap();

        let request = StandardSearchRequest::new("defi").with_chains(ChainSelection::One(2));
        let response = m.search_agents_v1(&request, &provider(), None).await.unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.results[0].chain_id, 2);

        let request = StandardSearchRequest::new("defi").with_chains(ChainSelection::All);
        let response = m
            .search_agents_v1(&request, &provider(), Some(&[1u64, 3][..]))
            .await
            .unwrap();
        assert_eq!(response.total, 2);

        let request = StandardSearchRequest::new("defi")
            .with_chains(ChainSelection::Many(vec![1, 2, 3]))
            .with_name("TRADER");
        let response = m.search_agents_v1(&request, &provider(), None).await.unwrap();
        assert_eq!(response.total, 2);
        assert!(response.results.iter().all(|r| r.name.contains("Trader")));
    }

    #[tokio::test]
    async fn test_v1_metadata_omitted_on_request() {
        let m = seeded(2).await;
        let request = StandardSearchRequest::new("defi").without_metadata();
        let response = m.search_agents_v1(&request, &provider(), None).await.unwrap();
        assert!(response.results.iter().all(|r| r.metadata.is_none()));
        assert_eq!(response.provider, provider());
        assert_eq!(response.request_id.len(), 26);
    }

    #[tokio::test]
    async fn test_v1_validation_before_embedding() {
        let (m, embedder) = manager_with(MockEmbedder::new(DIMS));
        let err = m
            .search_agents_v1(&StandardSearchRequest::new(""), &provider(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Validation(_)));
        assert_eq!(embedder.single_calls(), 0);
    }

    #[test]
    fn test_merge_chains_overrides_filters() {
        let filters = StandardFilters::new()
            .with_equals("chainId", 5i64)
            .with_equals("active", true);
        let merged = merge_chains(filters, Some(&ChainSelection::Many(vec![1, 2])), None);
        assert!(!merged.equals.contains_key("chainId"));
        assert!(merged.equals.contains_key("active"));
        assert_eq!(merged.in_values["chainId"].len(), 2);

        let merged = merge_chains(StandardFilters::new(), Some(&ChainSelection::All), None);
        assert_eq!(merged.in_values["chainId"].len(), DEFAULT_SEARCH_CHAINS.len());

        let untouched = merge_chains(StandardFilters::new(), None, Some(&[1u64][..]));
        assert!(untouched.is_empty());
    }
}
