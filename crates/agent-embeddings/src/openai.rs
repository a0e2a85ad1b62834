//! Embedder for OpenAI-compatible `/embeddings` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;
use tracing::{debug, error, warn};

use crate::embedding::{EmbedderInfo, Embedding};
use crate::error::EmbeddingError;
use crate::provider::{BatchEmbeddingProvider, EmbeddingProvider};

/// Configuration for [`OpenAiEmbedder`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// Model to use (e.g., "text-embedding-3-small")
    pub model: String,

    pub api_key: SecretString,

    /// Output dimensions requested from the model
    pub dimensions: usize,

    /// Max inputs per request
    pub batch_size: usize,

    /// Token window of a single input
    pub max_input_tokens: usize,

    /// Request timeout
    pub timeout: Duration,

    /// Maximum attempts per request
    pub max_retries: u32,
}

impl OpenAiConfig {
    /// Config for the OpenAI API with text-embedding-3-small defaults.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: SecretString::from(api_key.into()),
            dimensions: 1536,
            batch_size: 100,
            max_input_tokens: 8191,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_input_tokens(mut self, max_input_tokens: usize) -> Self {
        self.max_input_tokens = max_input_tokens;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// OpenAI-compatible embedding client.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiConfig,
    info: EmbedderInfo,
    bpe: Option<CoreBPE>,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiConfig) -> Result<Self, EmbeddingError> {
        if config.batch_size == 0 {
            return Err(EmbeddingError::Config("batch_size must be > 0".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        let bpe = match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                warn!(error = %e, "cl100k tokenizer unavailable, estimating token counts");
                None
            }
        };

        let info = EmbedderInfo {
            provider: "openai".to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            max_input_tokens: config.max_input_tokens,
        };

        Ok(Self {
            client,
            config,
            info,
            bpe,
        })
    }

    /// Count tokens the way the model will.
    pub fn count_tokens(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            // ~4 chars per token
            None => (text.len() / 4).max(1),
        }
    }

    fn check_input(&self, text: &str) -> Result<(), EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("empty text".to_string()));
        }
        let tokens = self.count_tokens(text);
        if tokens > self.config.max_input_tokens {
            return Err(EmbeddingError::TokenLimit {
                tokens,
                limit: self.config.max_input_tokens,
            });
        }
        Ok(())
    }

    /// Call the API with retry logic.
    async fn call_api(&self, input: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, inputs = input.len(), "Calling embeddings API");

            match self.make_request(input).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if attempts >= self.config.max_retries {
                        error!(error = %e, "Max retries exceeded");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Embeddings call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Make a single API request.
    async fn make_request(&self, input: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input,
            dimensions: self.config.dimensions,
        };

        let url = format!("{}/embeddings", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Api {
                status: None,
                message: e.to_string(),
            })?;

        if response.status() == 429 {
            return Err(EmbeddingError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Parse(e.to_string()))?;

        if body.data.len() != input.len() {
            return Err(EmbeddingError::Parse(format!(
                "expected {} embeddings, got {}",
                input.len(),
                body.data.len()
            )));
        }

        body.data.sort_by_key(|d| d.index);
        body.data
            .into_iter()
            .map(|d| {
                if d.embedding.len() != self.config.dimensions {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.config.dimensions,
                        actual: d.embedding.len(),
                    });
                }
                Ok(Embedding::new(d.embedding))
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn info(&self) -> &EmbedderInfo {
        &self.info
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.check_input(text)?;
        let input = [text.to_string()];
        self.call_api(&input)
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::Parse("no embedding returned".to_string()))
    }

    fn as_batch(&self) -> Option<&dyn BatchEmbeddingProvider> {
        Some(self)
    }
}

#[async_trait]
impl BatchEmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        for (i, text) in texts.iter().enumerate() {
            self.check_input(text).inspect_err(|e| {
                debug!(index = i, error = %e, "Batch input rejected before request");
            })?;
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            embeddings.extend(self.call_api(chunk).await?);
        }
        Ok(embeddings)
    }
}
