//! Vector retriever over the persisted embedding cache.

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use memory_harness_core::embedding::{cosine_similarity, embed_one, EmbeddingProvider};
use memory_harness_core::models::RetrievedDocument;
use memory_harness_core::retriever::VectorRetriever;

use crate::store::IndexStore;

/// Embeds the query and brute-force scans cached chunk vectors.
///
/// Only vectors produced by the provider's current model are considered.
/// A disabled provider yields no candidates.
pub struct CachedEmbeddingRetriever {
    store: Arc<dyn IndexStore>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl CachedEmbeddingRetriever {
    pub fn new(store: Arc<dyn IndexStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, provider }
    }
}

#[async_trait]
impl VectorRetriever for CachedEmbeddingRetriever {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedDocument>> {
        if !self.provider.is_enabled() || limit == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_one(self.provider.as_ref(), query).await?;
        let model = self.provider.model_name();

        let mut hits: Vec<RetrievedDocument> = self
            .store
            .all_embeddings()
            .await?
            .into_iter()
            .filter(|e| e.model == model)
            .map(|e| {
                let mut metadata = Map::new();
                metadata.insert("relative_path".into(), Value::String(e.relative_path));
                RetrievedDocument {
                    score: cosine_similarity(&query_vec, &e.vector) as f64,
                    id: e.chunk_id,
                    content: e.content,
                    metadata,
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}
