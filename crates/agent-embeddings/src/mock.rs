//! Deterministic local embedder.
//!
//! Hashes lowercase words into a fixed number of buckets. Texts that share
//! words get similar vectors, which is enough for tests and offline runs.
//! Weights are non-negative, so cosine scores stay in [0, 1].

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embedding::{EmbedderInfo, Embedding};
use crate::error::EmbeddingError;
use crate::provider::{BatchEmbeddingProvider, EmbeddingProvider};

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "on", "a", "an", "as", "are", "for", "to", "of", "in", "and", "or", "with",
    "by", "from", "this", "that", "it",
];

/// Hashed bag-of-words embedder.
#[derive(Debug)]
pub struct MockEmbedder {
    info: EmbedderInfo,
    batch_enabled: bool,
    single_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            info: EmbedderInfo {
                provider: "mock".to_string(),
                model: "hashed-bow-v1".to_string(),
                dimensions: dimensions.max(1),
                max_input_tokens: usize::MAX,
            },
            batch_enabled: true,
            single_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// Reject inputs with more than `limit` whitespace-separated tokens.
    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.info.max_input_tokens = limit;
        self
    }

    /// Hide the batch capability.
    pub fn without_batch(mut self) -> Self {
        self.batch_enabled = false;
        self
    }

    /// Number of `embed` calls so far.
    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    /// Number of `embed_batch` calls so far.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn check(&self, text: &str) -> Result<(), EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("empty text".to_string()));
        }
        let tokens = text.split_whitespace().count();
        if tokens > self.info.max_input_tokens {
            return Err(EmbeddingError::TokenLimit {
                tokens,
                limit: self.info.max_input_tokens,
            });
        }
        Ok(())
    }

    fn generate(&self, text: &str) -> Embedding {
        let dims = self.info.dimensions;
        let mut values = vec![0.0f32; dims];

        let lower = text.to_lowercase();
        let words = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1 && !STOP_WORDS.contains(w));

        for word in words {
            let bucket = (fnv1a(word.as_bytes()) % dims as u64) as usize;
            values[bucket] += 1.0;
        }

        Embedding::new(values)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325u64, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    fn info(&self) -> &EmbedderInfo {
        &self.info
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.check(text)?;
        Ok(self.generate(text))
    }

    fn as_batch(&self) -> Option<&dyn BatchEmbeddingProvider> {
        if self.batch_enabled {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl BatchEmbeddingProvider for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        for text in texts {
            self.check(text)?;
        }
        Ok(texts.iter().map(|t| self.generate(t)).collect())
    }
}
