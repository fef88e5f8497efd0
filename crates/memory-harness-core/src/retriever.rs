//! The vector retriever contract consumed by hybrid search.
//!
//! Embedding production is the retriever's business; hybrid search only
//! sees ranked `{id, content, score, metadata}` candidates. Two
//! implementations live here:
//!
//! - [`NullRetriever`]: always empty, for keyword-only operation.
//! - [`InMemoryVectorRetriever`]: brute-force cosine over inserted
//!   vectors, for tests and small ephemeral corpora.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, embed_one, EmbeddingProvider};
use crate::models::{Document, RetrievedDocument};

/// Supplies semantically ranked candidates for a query.
#[async_trait]
pub trait VectorRetriever: Send + Sync {
    /// Return at most `limit` candidates, best first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedDocument>>;
}

/// A retriever with nothing indexed.
pub struct NullRetriever;

#[async_trait]
impl VectorRetriever for NullRetriever {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<RetrievedDocument>> {
        Ok(Vec::new())
    }
}

/// In-memory vector retriever.
pub struct InMemoryVectorRetriever {
    provider: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<(Document, Vec<f32>)>>,
}

impl InMemoryVectorRetriever {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Insert or replace a document with a precomputed vector.
    pub fn insert(&self, document: Document, vector: Vec<f32>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|(d, _)| d.id != document.id);
        entries.push((document, vector));
    }

    /// Embed and insert a batch of documents.
    pub async fn insert_documents(&self, documents: Vec<Document>) -> Result<()> {
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.provider.embed(&texts).await?;
        for (doc, vector) in documents.into_iter().zip(vectors) {
            self.insert(doc, vector);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorRetriever for InMemoryVectorRetriever {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedDocument>> {
        let query_vec = embed_one(self.provider.as_ref(), query).await?;
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("retriever lock poisoned"))?;

        let mut hits: Vec<RetrievedDocument> = entries
            .iter()
            .map(|(doc, vector)| RetrievedDocument {
                id: doc.id.clone(),
                content: doc.content.clone(),
                score: cosine_similarity(&query_vec, vector) as f64,
                metadata: doc.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Embeds text as `[count of 'a', count of 'b']`.
    struct LetterProvider;

    #[async_trait]
    impl EmbeddingProvider for LetterProvider {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    vec![
                        t.matches('a').count() as f32,
                        t.matches('b').count() as f32,
                    ]
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_null_retriever_is_empty() {
        assert!(NullRetriever.search("q", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_ranks_by_cosine() {
        let retriever = InMemoryVectorRetriever::new(Arc::new(LetterProvider));
        retriever
            .insert_documents(vec![
                Document::new("mostly-b", "bbbb a"),
                Document::new("mostly-a", "aaaa b"),
                Document::new("only-a", "aaaa"),
            ])
            .await
            .unwrap();

        let hits = retriever.search("aa", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "only-a");
        assert_eq!(hits[1].id, "mostly-a");
    }

    #[tokio::test]
    async fn test_insert_replaces_same_id() {
        let retriever = InMemoryVectorRetriever::new(Arc::new(LetterProvider));
        retriever.insert(Document::new("x", "a"), vec![1.0, 0.0]);
        retriever.insert(Document::new("x", "b"), vec![0.0, 1.0]);
        assert_eq!(retriever.len(), 1);
        let hits = retriever.search("b", 5).await.unwrap();
        assert_eq!(hits[0].content, "b");
    }
}
