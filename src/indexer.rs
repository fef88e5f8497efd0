//! Bridges memory files to the search engine.
//!
//! ```text
//! watcher ──index-needed──▶ MemoryIndexer::index_file
//!                              ├─ chunk → per-file corpus → BM25 rebuild
//!                              ├─ hash unchanged & indexed? → skip embedding
//!                              └─ embed → embedding_cache, memory_files
//! ```
//!
//! The corpus is keyed by relative path, so the keyword index is rebuilt in
//! a stable order after every change.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use memory_harness_core::chunk::{chunk_text, sha256_hex};
use memory_harness_core::embedding::EmbeddingProvider;
use memory_harness_core::models::{Chunk, Document, FusionResult};

use crate::hybrid::HybridSearchEngine;
use crate::memory::{PermanentMemoryManager, DAILY_DIR, MEMORY_FILE};
use crate::store::{EmbeddingRecord, IndexStatus};
use crate::watcher::{scan_directory, PathFilter, WatchEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IndexOutcome {
    /// Re-chunked and (if enabled) re-embedded.
    Indexed { chunks: usize, embedded: usize },
    /// Hash matched an indexed record; only the keyword corpus was refreshed.
    Unchanged { chunks: usize },
    /// Keyword corpus refreshed but embedding failed.
    EmbedFailed { chunks: usize, error: String },
    /// The file is gone; corpus entry, record, and embeddings dropped.
    Removed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub scanned: usize,
    pub indexed: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub errors: usize,
}

pub struct MemoryIndexer {
    manager: Arc<PermanentMemoryManager>,
    engine: Arc<RwLock<HybridSearchEngine>>,
    provider: Arc<dyn EmbeddingProvider>,
    filter: PathFilter,
    max_tokens: usize,
    corpus: Mutex<BTreeMap<String, Vec<Document>>>,
}

impl MemoryIndexer {
    pub fn new(
        manager: Arc<PermanentMemoryManager>,
        engine: Arc<RwLock<HybridSearchEngine>>,
        provider: Arc<dyn EmbeddingProvider>,
        filter: PathFilter,
        max_tokens: usize,
    ) -> Self {
        Self {
            manager,
            engine,
            provider,
            filter,
            max_tokens,
            corpus: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<RwLock<HybridSearchEngine>> {
        &self.engine
    }

    /// Index one file and rebuild the keyword index.
    pub async fn index_file(&self, relative_path: &str) -> Result<IndexOutcome> {
        let outcome = self.index_one(relative_path, false).await?;
        self.rebuild().await;
        Ok(outcome)
    }

    /// Cold-start bulk index. Records for files that no longer exist are
    /// dropped. `force` re-embeds even when hashes match.
    pub async fn index_all(&self, force: bool) -> Result<IndexSummary> {
        let files = scan_directory(self.manager.memory_dir(), &self.filter)?;
        let mut summary = IndexSummary {
            scanned: files.len(),
            ..Default::default()
        };

        let present: HashSet<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        for file in &files {
            match self.index_one(&file.relative_path, force).await {
                Ok(IndexOutcome::Indexed { .. }) => summary.indexed += 1,
                Ok(IndexOutcome::Unchanged { .. }) => summary.unchanged += 1,
                Ok(IndexOutcome::EmbedFailed { .. }) => summary.errors += 1,
                Ok(IndexOutcome::Removed) => summary.removed += 1,
                Err(e) => {
                    warn!(path = %file.relative_path, error = %e, "failed to index file");
                    summary.errors += 1;
                }
            }
        }

        let store = self.manager.store();
        for record in store.list_records().await? {
            if present.contains(record.relative_path.as_str()) {
                continue;
            }
            store.remove_embeddings(&record.relative_path).await?;
            store.remove_record(&record.relative_path).await?;
            self.corpus.lock().await.remove(&record.relative_path);
            debug!(path = %record.relative_path, "dropped stale index record");
            summary.removed += 1;
        }
        self.corpus
            .lock()
            .await
            .retain(|path, _| present.contains(path.as_str()));

        self.rebuild().await;
        info!(
            scanned = summary.scanned,
            indexed = summary.indexed,
            unchanged = summary.unchanged,
            removed = summary.removed,
            errors = summary.errors,
            "index pass complete"
        );
        Ok(summary)
    }

    /// Consume `index-needed` events until the channel closes.
    pub fn spawn(self: Arc<Self>, mut events: broadcast::Receiver<WatchEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match self.index_file(&event.relative_path).await {
                        Ok(outcome) => {
                            debug!(path = %event.relative_path, ?outcome, "reindexed")
                        }
                        Err(e) => {
                            warn!(path = %event.relative_path, error = %e, "reindex failed")
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "indexer lagged behind watcher, running full pass");
                        if let Err(e) = self.index_all(false).await {
                            warn!(error = %e, "full index pass failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn search(&self, query: &str, limit: usize) -> Vec<FusionResult> {
        self.engine.read().await.search(query, limit).await
    }

    pub async fn document_count(&self) -> usize {
        self.corpus.lock().await.values().map(Vec::len).sum()
    }

    async fn index_one(&self, relative_path: &str, force: bool) -> Result<IndexOutcome> {
        let store = self.manager.store();
        let path = self.manager.absolute_path(relative_path);

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.corpus.lock().await.remove(relative_path);
                store.remove_embeddings(relative_path).await?;
                store.remove_record(relative_path).await?;
                return Ok(IndexOutcome::Removed);
            }
            Err(e) => return Err(e.into()),
        };

        let hash = sha256_hex(&text);
        let chunks = chunk_text(relative_path, &text, self.max_tokens);
        let documents: Vec<Document> = chunks
            .iter()
            .map(|c| to_document(relative_path, c))
            .collect();
        let chunk_count = documents.len();
        self.corpus
            .lock()
            .await
            .insert(relative_path.to_string(), documents);

        let previous = store.get_record(relative_path).await?;
        let unchanged = previous
            .as_ref()
            .map(|r| r.content_hash == hash && r.status == IndexStatus::Indexed)
            .unwrap_or(false);
        if unchanged && !force {
            return Ok(IndexOutcome::Unchanged {
                chunks: chunk_count,
            });
        }

        let file_size = text.len() as i64;
        if !self.provider.is_enabled() {
            self.manager
                .update_index_status_with(
                    relative_path,
                    IndexStatus::Indexed,
                    chunk_count as i64,
                    file_size,
                    &hash,
                )
                .await?;
            return Ok(IndexOutcome::Indexed {
                chunks: chunk_count,
                embedded: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Ok(Vec::new())
        } else {
            self.provider.embed(&texts).await
        };

        let vectors = vectors.and_then(|vectors| {
            if vectors.len() == chunks.len() {
                Ok(vectors)
            } else {
                Err(anyhow!(
                    "provider returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                ))
            }
        });

        match vectors {
            Ok(vectors) => {
                let model = self.provider.model_name().to_string();
                let records: Vec<EmbeddingRecord> = chunks
                    .iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| EmbeddingRecord {
                        chunk_id: chunk.id.clone(),
                        relative_path: relative_path.to_string(),
                        content: chunk.text.clone(),
                        content_hash: chunk.hash.clone(),
                        model: model.clone(),
                        vector,
                    })
                    .collect();
                let embedded = records.len();
                store.replace_embeddings(relative_path, &records).await?;
                self.manager
                    .update_index_status_with(
                        relative_path,
                        IndexStatus::Indexed,
                        chunk_count as i64,
                        file_size,
                        &hash,
                    )
                    .await?;
                Ok(IndexOutcome::Indexed {
                    chunks: chunk_count,
                    embedded,
                })
            }
            Err(e) => {
                let error = format!("{:#}", e);
                warn!(
                    path = %relative_path,
                    error = %error,
                    "embedding failed, keyword index only"
                );
                self.manager.mark_index_error(relative_path, &error).await?;
                Ok(IndexOutcome::EmbedFailed {
                    chunks: chunk_count,
                    error,
                })
            }
        }
    }

    async fn rebuild(&self) {
        let documents: Vec<Document> = self
            .corpus
            .lock()
            .await
            .values()
            .flat_map(|docs| docs.iter().cloned())
            .collect();
        self.engine.write().await.index_documents(documents);
    }
}

fn to_document(relative_path: &str, chunk: &Chunk) -> Document {
    let kind = if relative_path == MEMORY_FILE {
        "memory"
    } else if relative_path.starts_with(&format!("{}/", DAILY_DIR)) {
        "daily"
    } else {
        "note"
    };

    let mut doc = Document::new(chunk.id.clone(), chunk.text.clone())
        .with_meta("relative_path", relative_path)
        .with_meta("chunk_index", chunk.chunk_index)
        .with_meta("kind", kind);
    if kind == "daily" {
        if let Some(date) = relative_path
            .rsplit('/')
            .next()
            .and_then(|name| name.strip_suffix(".md"))
        {
            doc = doc.with_meta("date", date);
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::bail;
    use async_trait::async_trait;
    use tempfile::TempDir;

    use memory_harness_core::models::ResultSource;

    use crate::config::{MemoryConfig, WatcherConfig};
    use crate::embedding::DisabledProvider;
    use crate::hybrid::HybridConfig;
    use crate::store::{IndexRecord, IndexStore, InMemoryIndexStore};
    use crate::vector::CachedEmbeddingRetriever;
    use crate::watcher::{MemoryFileWatcher, WatchEventKind};

    /// Counts "rust" / "python" occurrences and embed calls.
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("rate limited");
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![t.matches("rust").count() as f32, t.matches("python").count() as f32]
                })
                .collect())
        }
    }

    struct Fixture {
        _tmp: TempDir,
        manager: Arc<PermanentMemoryManager>,
        store: Arc<dyn IndexStore>,
        indexer: Arc<MemoryIndexer>,
    }

    async fn fixture(provider: Arc<dyn EmbeddingProvider>) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn IndexStore> = Arc::new(InMemoryIndexStore::new());
        let config = MemoryConfig {
            dir: tmp.path().join("memory"),
            ..Default::default()
        };
        let manager = Arc::new(PermanentMemoryManager::new(config, store.clone()));
        manager.initialize().await.unwrap();

        let retriever = Arc::new(CachedEmbeddingRetriever::new(store.clone(), provider.clone()));
        let engine = Arc::new(RwLock::new(HybridSearchEngine::new(
            retriever,
            HybridConfig::default(),
        )));
        let filter = PathFilter::new(&WatcherConfig::default()).unwrap();
        let indexer = Arc::new(MemoryIndexer::new(
            manager.clone(),
            engine,
            provider,
            filter,
            700,
        ));
        Fixture {
            _tmp: tmp,
            manager,
            store,
            indexer,
        }
    }

    fn note_path(f: &Fixture, name: &str) -> std::path::PathBuf {
        f.manager.memory_dir().join(name)
    }

    #[tokio::test]
    async fn test_unchanged_file_is_not_reembedded() {
        let provider = Arc::new(CountingProvider::default());
        let f = fixture(provider.clone()).await;
        std::fs::write(
            note_path(&f, "daily/2026-01-02.md"),
            "Learned rust lifetimes today",
        )
        .unwrap();

        let first = f.indexer.index_file("daily/2026-01-02.md").await.unwrap();
        assert_eq!(first, IndexOutcome::Indexed { chunks: 1, embedded: 1 });
        let second = f.indexer.index_file("daily/2026-01-02.md").await.unwrap();
        assert_eq!(second, IndexOutcome::Unchanged { chunks: 1 });
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        std::fs::write(note_path(&f, "daily/2026-01-02.md"), "Switched to python").unwrap();
        let third = f.indexer.index_file("daily/2026-01-02.md").await.unwrap();
        assert!(matches!(third, IndexOutcome::Indexed { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        let record = f.store.get_record("daily/2026-01-02.md").await.unwrap().unwrap();
        assert_eq!(record.status, IndexStatus::Indexed);
        assert_eq!(record.content_hash, sha256_hex("Switched to python"));
    }

    /// Overwrites a file the first time it is asked to embed, like an editor
    /// save landing mid-request.
    struct RewritingProvider {
        path: std::path::PathBuf,
        replacement: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for RewritingProvider {
        fn model_name(&self) -> &str {
            "rewriting"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::fs::write(&self.path, self.replacement).unwrap();
            }
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_write_during_embed_is_picked_up_next_pass() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("memory/daily/2026-01-02.md");
        let provider = Arc::new(RewritingProvider {
            path: path.clone(),
            replacement: "version two",
            calls: AtomicUsize::new(0),
        });
        let store: Arc<dyn IndexStore> = Arc::new(InMemoryIndexStore::new());
        let manager = Arc::new(PermanentMemoryManager::new(
            MemoryConfig {
                dir: tmp.path().join("memory"),
                ..Default::default()
            },
            store.clone(),
        ));
        manager.initialize().await.unwrap();
        let engine = Arc::new(RwLock::new(HybridSearchEngine::new(
            Arc::new(memory_harness_core::retriever::NullRetriever),
            HybridConfig::default(),
        )));
        let indexer = MemoryIndexer::new(
            manager,
            engine,
            provider.clone(),
            PathFilter::new(&WatcherConfig::default()).unwrap(),
            700,
        );
        std::fs::write(&path, "version one").unwrap();

        indexer.index_file("daily/2026-01-02.md").await.unwrap();
        let record = store.get_record("daily/2026-01-02.md").await.unwrap().unwrap();
        assert_eq!(record.content_hash, sha256_hex("version one"));
        assert_eq!(record.file_size, "version one".len() as i64);

        let second = indexer.index_file("daily/2026-01-02.md").await.unwrap();
        assert_eq!(second, IndexOutcome::Indexed { chunks: 1, embedded: 1 });
        let cached: Vec<String> = store
            .all_embeddings()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(cached, vec!["version two"]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    /// Returns one vector no matter how many texts it gets.
    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }
    }

    #[tokio::test]
    async fn test_vector_count_mismatch_is_embed_failure() {
        let f = fixture(Arc::new(ShortProvider)).await;
        let text = (0..3)
            .map(|i| format!("paragraph {i} {}", "x".repeat(2000)))
            .collect::<Vec<_>>()
            .join("\n\n");
        std::fs::write(note_path(&f, "daily/2026-01-03.md"), text).unwrap();

        let outcome = f.indexer.index_file("daily/2026-01-03.md").await.unwrap();
        match outcome {
            IndexOutcome::EmbedFailed { chunks, error } => {
                assert_eq!(chunks, 3);
                assert!(error.contains("1 vectors for 3 chunks"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(f.store.embedding_count().await.unwrap(), 0);
        let record = f.store.get_record("daily/2026-01-03.md").await.unwrap().unwrap();
        assert_eq!(record.status, IndexStatus::Error);
    }

    #[tokio::test]
    async fn test_removed_file_leaves_index() {
        let f = fixture(Arc::new(CountingProvider::default())).await;
        let path = note_path(&f, "daily/2026-01-02.md");
        std::fs::write(&path, "ephemeral rust note").unwrap();
        f.indexer.index_file("daily/2026-01-02.md").await.unwrap();
        assert!(!f.indexer.search("ephemeral", 5).await.is_empty());

        std::fs::remove_file(&path).unwrap();
        let outcome = f.indexer.index_file("daily/2026-01-02.md").await.unwrap();
        assert_eq!(outcome, IndexOutcome::Removed);
        assert!(f.indexer.search("ephemeral", 5).await.is_empty());
        assert!(f.store.get_record("daily/2026-01-02.md").await.unwrap().is_none());
        assert_eq!(f.store.embedding_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_keyword_search() {
        let provider = Arc::new(CountingProvider {
            fail: true,
            ..Default::default()
        });
        let f = fixture(provider).await;
        std::fs::write(note_path(&f, "daily/2026-01-02.md"), "sqlite wal checkpoint").unwrap();

        let outcome = f.indexer.index_file("daily/2026-01-02.md").await.unwrap();
        assert!(matches!(outcome, IndexOutcome::EmbedFailed { chunks: 1, .. }));
        let record = f.store.get_record("daily/2026-01-02.md").await.unwrap().unwrap();
        assert_eq!(record.status, IndexStatus::Error);
        assert!(record.error.unwrap().contains("rate limited"));

        let results = f.indexer.search("checkpoint", 5).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, ResultSource::Bm25);
    }

    #[tokio::test]
    async fn test_index_all_and_stale_records() {
        let f = fixture(Arc::new(DisabledProvider)).await;
        std::fs::write(note_path(&f, "daily/2026-01-01.md"), "first note").unwrap();
        std::fs::write(note_path(&f, "daily/2026-01-02.md"), "second note").unwrap();
        std::fs::write(note_path(&f, "daily/ignored.txt"), "not markdown").unwrap();
        f.store
            .upsert_record(&IndexRecord::pending("daily/2025-12-31.md", 3, "gone"))
            .await
            .unwrap();

        let summary = f.indexer.index_all(false).await.unwrap();
        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.indexed, 3);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.errors, 0);

        let again = f.indexer.index_all(false).await.unwrap();
        assert_eq!(again.unchanged, 3);
        assert_eq!(again.indexed, 0);

        let forced = f.indexer.index_all(true).await.unwrap();
        assert_eq!(forced.indexed, 3);

        let paths: Vec<String> = f
            .manager
            .get_indexed_files()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.relative_path)
            .collect();
        assert_eq!(paths, vec!["MEMORY.md", "daily/2026-01-01.md", "daily/2026-01-02.md"]);
    }

    #[tokio::test]
    async fn test_hybrid_results_from_cached_embeddings() {
        let f = fixture(Arc::new(CountingProvider::default())).await;
        std::fs::write(note_path(&f, "daily/2026-01-01.md"), "rust borrow checker notes").unwrap();
        std::fs::write(note_path(&f, "daily/2026-01-02.md"), "python packaging notes").unwrap();
        f.indexer.index_all(false).await.unwrap();

        let results = f.indexer.search("rust", 5).await;
        assert_eq!(results[0].document.id, "daily/2026-01-01.md#0");
        assert_eq!(results[0].source, ResultSource::Hybrid);
        assert_eq!(results[0].document.metadata["kind"], "daily");
        assert_eq!(results[0].document.metadata["date"], "2026-01-01");
    }

    #[tokio::test]
    async fn test_spawned_indexer_follows_watcher() {
        let f = fixture(Arc::new(DisabledProvider)).await;
        let config = WatcherConfig {
            debounce_ms: 20,
            ..Default::default()
        };
        let watcher = MemoryFileWatcher::new(f.manager.memory_dir(), config, None).unwrap();
        let task = f.indexer.clone().spawn(watcher.subscribe());

        let path = note_path(&f, "daily/2026-02-02.md");
        std::fs::write(&path, "watcher driven reindex").unwrap();
        watcher.ingest_event(WatchEventKind::Add, &path);

        let found = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if !f.indexer.search("reindex", 5).await.is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(found.is_ok());

        drop(watcher);
        task.abort();
    }
}
