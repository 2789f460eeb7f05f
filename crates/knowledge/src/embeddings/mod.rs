//! Embedding client for the knowledge base.
//!
//! [`EmbeddingClient`] wraps a single-attempt [`EmbeddingProvider`] with
//! input validation, batching, bounded retries and dimension checks. Every
//! failure that survives the retry budget surfaces as `AppError::Embedding`.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use estate_core::{AppError, AppResult};
use estate_llm::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Batching, retrying front end over an embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    /// Build the provider named in `config` and wrap it.
    pub fn from_config(
        config: &EmbeddingConfig,
        api_key: Option<&str>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> AppResult<Self> {
        let provider = create_provider(config, api_key, timeout)?;
        if provider.dimensions() != config.dimensions {
            return Err(AppError::Config(format!(
                "Provider reports {} dimensions, configured {}",
                provider.dimensions(),
                config.dimensions
            )));
        }
        Ok(Self::new(provider, config.batch_size, retry))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// The settings this client embeds with, for snapshot compatibility checks.
    pub fn config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: self.provider_name().to_string(),
            model: self.model_name().to_string(),
            dimensions: self.dimensions(),
            endpoint: None,
            batch_size: self.batch_size,
        }
    }

    /// Embed one text.
    pub async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }

    /// Embed many texts, preserving input order.
    ///
    /// Blank texts are rejected before any request is made.
    pub async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if let Some(index) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(AppError::Embedding(format!(
                "Cannot embed empty text (input {})",
                index
            )));
        }

        tracing::info!(
            "Embedding {} texts using provider '{}' (model: {})",
            texts.len(),
            self.provider_name(),
            self.model_name()
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            let label = format!("embedding batch {}", batch_index + 1);
            let embedded = self
                .retry
                .run(&label, || self.provider.embed_batch(batch))
                .await
                .map_err(|e| {
                    AppError::Embedding(format!(
                        "{} failed after {} attempts: {}",
                        label, self.retry.max_attempts, e
                    ))
                })?;

            if embedded.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "{} returned {} vectors for {} texts",
                    label,
                    embedded.len(),
                    batch.len()
                )));
            }
            if let Some(bad) = embedded.iter().find(|v| v.len() != self.dimensions()) {
                return Err(AppError::Embedding(format!(
                    "{} returned a {}-dimensional vector, expected {}",
                    label,
                    bad.len(),
                    self.dimensions()
                )));
            }

            vectors.extend(embedded);
        }

        tracing::debug!(
            "Generated {} embeddings of dimension {}",
            vectors.len(),
            self.dimensions()
        );

        Ok(vectors)
    }
}
