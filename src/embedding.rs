//! Concrete embedding providers.
//!
//! - **[`DisabledProvider`]**: every `embed` call fails; indexing skips the
//!   embedding step and search degrades to keyword-only.
//! - **[`OpenAIProvider`]**: calls an OpenAI-compatible `/embeddings`
//!   endpoint with batching, retry, and backoff.
//!
//! Network errors, 429, and 5xx responses are retried up to
//! `embedding.max_retries` times with exponential backoff (1s doubling,
//! capped at 32s). Any other non-success status fails immediately.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use memory_harness_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;

/// A provider that refuses to embed.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

/// Embedding provider for the OpenAI embeddings API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    api_key: String,
    endpoint: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            api_key,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let mut attempt = 0;
        loop {
            let failure = match self.send(&request).await {
                Ok(vectors) => return Ok(vectors),
                Err(Failure::Fatal(e)) => return Err(e),
                Err(Failure::Transient(e)) => e,
            };
            if attempt >= self.max_retries {
                return Err(failure.context(format!(
                    "embedding request failed after {} attempts",
                    attempt + 1
                )));
            }
            attempt += 1;
            let delay = backoff(attempt);
            warn!(
                error = %failure,
                attempt,
                delay_secs = delay.as_secs(),
                "retrying embedding request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send(&self, request: &EmbeddingsRequest<'_>) -> Result<Vec<Vec<f32>>, Failure> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| Failure::Transient(e.into()))?;

        let status = response.status();
        if status.is_success() {
            let body: EmbeddingsResponse = response
                .json()
                .await
                .map_err(|e| Failure::Fatal(anyhow!("Invalid embeddings response: {}", e)))?;
            return Ok(body.into_vectors());
        }

        let detail = response.text().await.unwrap_or_default();
        let err = anyhow!("embeddings API returned {}: {}", status, detail);
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(Failure::Transient(err))
        } else {
            Err(Failure::Fatal(err))
        }
    }
}

/// Delay before retry number `attempt` (1-based): 1s doubling to 32s.
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

enum Failure {
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl EmbeddingsResponse {
    /// Vectors in input order; items without an `index` keep their position.
    fn into_vectors(self) -> Vec<Vec<f32>> {
        let mut items: Vec<(usize, Vec<f32>)> = self
            .data
            .into_iter()
            .enumerate()
            .map(|(pos, item)| (item.index.unwrap_or(pos), item.embedding))
            .collect();
        items.sort_by_key(|(index, _)| *index);
        items.into_iter().map(|(_, v)| v).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                bail!(
                    "embeddings API returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                );
            }
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// `"disabled"` or `"openai"`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        other => bail!("unknown embedding provider '{}'", other),
    }
}
