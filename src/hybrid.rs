//! Hybrid keyword + vector search with reciprocal rank fusion.
//!
//! The engine owns the BM25 index and borrows an injected
//! [`VectorRetriever`]. Each search runs both concurrently, the retriever
//! under a timeout, and fuses the two ranked lists with
//! [`rrf_fuse`](memory_harness_core::fusion::rrf_fuse).
//!
//! # Degradation
//!
//! A retriever error or timeout is logged at `warn` and the search returns
//! BM25-only results. [`HybridSearchEngine::last_degraded`] reports whether
//! the most recent search fell back.
//!
//! # Sharing
//!
//! `index_documents` and `update_weights` take `&mut self`. Share the engine
//! as `Arc<tokio::sync::RwLock<HybridSearchEngine>>` so writers serialize
//! while concurrent searches hold read guards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use memory_harness_core::bm25::{Bm25Params, Bm25Search};
use memory_harness_core::fusion::{rrf_fuse, FusionWeights};
use memory_harness_core::models::{Document, FusionResult};
use memory_harness_core::retriever::VectorRetriever;

use crate::config::RetrievalConfig;
use crate::error::MemoryError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridConfig {
    pub weights: FusionWeights,
    pub bm25: Bm25Params,
    /// Minimum candidate depth requested from each retriever.
    pub candidate_k: usize,
    pub vector_timeout: Duration,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            bm25: Bm25Params::default(),
            candidate_k: 50,
            vector_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&RetrievalConfig> for HybridConfig {
    fn from(r: &RetrievalConfig) -> Self {
        Self {
            weights: r.fusion_weights(),
            bm25: r.bm25_params(),
            candidate_k: r.candidate_k,
            vector_timeout: Duration::from_millis(r.vector_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HybridStats {
    pub document_count: usize,
    pub avg_doc_length: f64,
    pub vector_weight: f64,
    pub text_weight: f64,
    pub rrf_k: f64,
}

pub struct HybridSearchEngine {
    bm25: Bm25Search,
    retriever: Arc<dyn VectorRetriever>,
    config: HybridConfig,
    degraded: AtomicBool,
}

impl HybridSearchEngine {
    pub fn new(retriever: Arc<dyn VectorRetriever>, config: HybridConfig) -> Self {
        Self {
            bm25: Bm25Search::new(config.bm25),
            retriever,
            config,
            degraded: AtomicBool::new(false),
        }
    }

    /// Rebuild the keyword index from `documents`.
    ///
    /// The vector side is owned by the retriever and is not touched.
    pub fn index_documents(&mut self, documents: Vec<Document>) {
        self.bm25.index_documents(documents);
        debug!(documents = self.bm25.len(), "rebuilt keyword index");
    }

    /// Fused results, best first, at most `limit`.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<FusionResult> {
        if limit == 0 || query.trim().is_empty() {
            self.degraded.store(false, Ordering::Relaxed);
            return Vec::new();
        }

        let depth = self.config.candidate_k.max(limit);
        let timeout = self.config.vector_timeout;

        let keyword = async { self.bm25.search(query, depth) };
        let semantic = tokio::time::timeout(timeout, self.retriever.search(query, depth));
        let (bm25_hits, vector_outcome) = tokio::join!(keyword, semantic);

        let (vector_hits, degraded) = match vector_outcome {
            Ok(Ok(hits)) => (hits, false),
            Ok(Err(e)) => {
                warn!(error = %e, "vector retriever failed, using keyword results only");
                (Vec::new(), true)
            }
            Err(_) => {
                let err = MemoryError::RetrieverTimeout(timeout.as_millis() as u64);
                warn!(error = %err, "using keyword results only");
                (Vec::new(), true)
            }
        };
        self.degraded.store(degraded, Ordering::Relaxed);

        debug!(
            bm25 = bm25_hits.len(),
            vector = vector_hits.len(),
            "fusing candidates"
        );

        let mut results = rrf_fuse(&bm25_hits, &vector_hits, self.config.weights);
        results.truncate(limit);
        results
    }

    /// New weights apply from the next search on.
    pub fn update_weights(&mut self, vector_weight: f64, text_weight: f64) {
        self.config.weights.vector_weight = vector_weight;
        self.config.weights.text_weight = text_weight;
    }

    pub fn stats(&self) -> HybridStats {
        let bm25 = self.bm25.stats();
        HybridStats {
            document_count: bm25.document_count,
            avg_doc_length: bm25.avg_doc_length,
            vector_weight: self.config.weights.vector_weight,
            text_weight: self.config.weights.text_weight,
            rrf_k: self.config.weights.rrf_k,
        }
    }

    pub fn last_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use memory_harness_core::models::{ResultSource, RetrievedDocument};
    use memory_harness_core::retriever::NullRetriever;

    /// Returns a fixed list and records the requested depth.
    struct StaticRetriever {
        hits: Vec<RetrievedDocument>,
        requested: Mutex<Vec<usize>>,
    }

    impl StaticRetriever {
        fn new(ids: &[&str]) -> Self {
            Self {
                hits: ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| RetrievedDocument {
                        id: id.to_string(),
                        content: format!("vector content {id}"),
                        score: 1.0 - i as f64 * 0.1,
                        metadata: Default::default(),
                    })
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VectorRetriever for StaticRetriever {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<RetrievedDocument>> {
            self.requested.lock().unwrap().push(limit);
            Ok(self.hits.iter().take(limit).cloned().collect())
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl VectorRetriever for FailingRetriever {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<RetrievedDocument>> {
            bail!("embedding backend unavailable")
        }
    }

    struct SlowRetriever;

    #[async_trait]
    impl VectorRetriever for SlowRetriever {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<RetrievedDocument>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![RetrievedDocument {
                id: "late".into(),
                content: query.into(),
                score: 1.0,
                metadata: Default::default(),
            }])
        }
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("d1", "memory file watcher debounce"),
            Document::new("d2", "unrelated cooking recipe"),
            Document::new("d3", "memory memory index memory"),
            Document::new("d9", "memory notes"),
        ]
    }

    fn ids(results: &[FusionResult]) -> Vec<&str> {
        results.iter().map(|r| r.document.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_keyword_only_with_null_retriever() {
        let mut engine = HybridSearchEngine::new(Arc::new(NullRetriever), HybridConfig::default());
        engine.index_documents(corpus());
        let results = engine.search("memory", 10).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.source == ResultSource::Bm25));
        assert!(!engine.last_degraded());
    }

    #[tokio::test]
    async fn test_fuses_both_lists() {
        let retriever = Arc::new(StaticRetriever::new(&["d1", "d3", "v-only"]));
        let mut engine = HybridSearchEngine::new(retriever, HybridConfig::default());
        engine.index_documents(corpus());

        let results = engine.search("memory", 10).await;
        let got = ids(&results);
        assert_eq!(got.len(), 4);
        assert!(got.contains(&"v-only"));
        let hybrid: Vec<&str> = results
            .iter()
            .filter(|r| r.source == ResultSource::Hybrid)
            .map(|r| r.document.id.as_str())
            .collect();
        assert_eq!(hybrid.len(), 2);
        // Present in both lists beats present in one.
        assert!(hybrid.contains(&got[0]));
    }

    #[tokio::test]
    async fn test_retriever_error_degrades_to_keyword() {
        let mut engine =
            HybridSearchEngine::new(Arc::new(FailingRetriever), HybridConfig::default());
        engine.index_documents(corpus());
        let results = engine.search("memory", 10).await;
        assert_eq!(results.len(), 3);
        assert!(engine.last_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retriever_timeout_degrades_to_keyword() {
        let config = HybridConfig {
            vector_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let mut engine = HybridSearchEngine::new(Arc::new(SlowRetriever), config);
        engine.index_documents(corpus());
        let results = engine.search("memory", 10).await;
        assert!(!ids(&results).contains(&"late"));
        assert_eq!(results.len(), 3);
        assert!(engine.last_degraded());
    }

    #[tokio::test]
    async fn test_candidate_depth_and_limit() {
        let retriever = Arc::new(StaticRetriever::new(&["a", "b", "c", "d"]));
        let config = HybridConfig {
            candidate_k: 2,
            ..Default::default()
        };
        let mut engine = HybridSearchEngine::new(retriever.clone(), config);
        engine.index_documents(corpus());

        let results = engine.search("memory", 3).await;
        assert_eq!(results.len(), 3);
        assert_eq!(*retriever.requested.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_update_weights_changes_next_search() {
        let retriever = Arc::new(StaticRetriever::new(&["v1", "v2"]));
        let mut engine = HybridSearchEngine::new(retriever, HybridConfig::default());
        engine.index_documents(corpus());

        engine.update_weights(1.0, 0.0);
        let results = engine.search("memory", 2).await;
        assert_eq!(ids(&results), vec!["v1", "v2"]);

        engine.update_weights(0.0, 1.0);
        let results = engine.search("memory", 1).await;
        assert_eq!(results[0].source, ResultSource::Bm25);

        let stats = engine.stats();
        assert_eq!(stats.vector_weight, 0.0);
        assert_eq!(stats.text_weight, 1.0);
        assert_eq!(stats.document_count, 4);
    }

    #[tokio::test]
    async fn test_empty_query_or_zero_limit() {
        let retriever = Arc::new(StaticRetriever::new(&["v1"]));
        let mut engine = HybridSearchEngine::new(retriever, HybridConfig::default());
        engine.index_documents(corpus());
        assert!(engine.search("   ", 5).await.is_empty());
        assert!(engine.search("memory", 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_shared_behind_rwlock() {
        let engine = Arc::new(tokio::sync::RwLock::new(HybridSearchEngine::new(
            Arc::new(NullRetriever),
            HybridConfig::default(),
        )));
        engine.write().await.index_documents(corpus());

        let a = engine.clone();
        let b = engine.clone();
        let (ra, rb) = tokio::join!(
            async move { a.read().await.search("memory", 5).await },
            async move { b.read().await.search("cooking", 5).await },
        );
        assert_eq!(ra.len(), 3);
        assert_eq!(ids(&rb), vec!["d2"]);
    }
}
