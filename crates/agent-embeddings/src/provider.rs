//! Embedding provider traits and factory.

use std::sync::Arc;
use std::time::Duration;

use agent_types::{EmbeddingProviderKind, EmbeddingSettings};
use async_trait::async_trait;
use secrecy::SecretString;

use crate::embedding::{EmbedderInfo, Embedding};
use crate::error::EmbeddingError;
use crate::mock::MockEmbedder;
use crate::openai::{OpenAiConfig, OpenAiEmbedder};

/// Trait for embedding providers.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn info(&self) -> &EmbedderInfo;

    /// Generate the embedding of one text.
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Batch capability, if the provider has one.
    ///
    /// Callers probe this once and keep the answer.
    fn as_batch(&self) -> Option<&dyn BatchEmbeddingProvider> {
        None
    }
}

/// Providers that embed many texts in one call.
#[async_trait]
pub trait BatchEmbeddingProvider: EmbeddingProvider {
    /// Embed `texts`, returning one embedding per input, in input order.
    ///
    /// Fails as a whole when any input is rejected.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError>;
}

/// Create an embedding provider from settings.
pub fn create_provider(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match settings.provider {
        EmbeddingProviderKind::Mock => Ok(Arc::new(
            MockEmbedder::new(settings.dimensions).with_token_limit(settings.max_input_tokens),
        )),
        EmbeddingProviderKind::Openai => {
            let api_key = settings.api_key.clone().ok_or_else(|| {
                EmbeddingError::Config(
                    "embedding.api_key is required for the openai provider".to_string(),
                )
            })?;
            let config = OpenAiConfig {
                base_url: settings.base_url.trim_end_matches('/').to_string(),
                model: settings.model.clone(),
                api_key: SecretString::from(api_key),
                dimensions: settings.dimensions,
                batch_size: settings.batch_size,
                max_input_tokens: settings.max_input_tokens,
                timeout: Duration::from_secs(settings.timeout_secs),
                max_retries: 3,
            };
            Ok(Arc::new(OpenAiEmbedder::new(config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_provider() {
        let settings = EmbeddingSettings {
            provider: EmbeddingProviderKind::Mock,
            dimensions: 64,
            ..Default::default()
        };

        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.info().provider, "mock");
        assert_eq!(provider.info().dimensions, 64);
        assert!(provider.as_batch().is_some());
    }

    #[test]
    fn test_openai_requires_api_key() {
        let settings = EmbeddingSettings::default();
        let result = create_provider(&settings);
        assert!(matches!(result, Err(EmbeddingError::Config(_))));
    }

    #[test]
    fn test_create_openai_provider() {
        let settings = EmbeddingSettings {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.info().provider, "openai");
        assert_eq!(provider.info().model, "text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let settings = EmbeddingSettings {
            provider: EmbeddingProviderKind::Mock,
            dimensions: 32,
            ..Default::default()
        };
        let provider = create_provider(&settings).unwrap();

        let embedding = provider.embed("token swap agent").await.unwrap();
        assert_eq!(embedding.dimension(), 32);
    }
}
