//! Wiring of store, manager, embedding provider, engine, and indexer.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::hybrid::{HybridConfig, HybridSearchEngine};
use crate::indexer::MemoryIndexer;
use crate::memory::PermanentMemoryManager;
use crate::store::{IndexStore, SqliteIndexStore};
use crate::vector::CachedEmbeddingRetriever;
use crate::watcher::{MemoryFileWatcher, PathFilter};

pub struct MemoryHarness {
    pub config: Config,
    pub store: Arc<SqliteIndexStore>,
    pub manager: Arc<PermanentMemoryManager>,
    pub indexer: Arc<MemoryIndexer>,
}

impl MemoryHarness {
    /// Open the database and build every component. Does not touch the
    /// memory directory; call [`PermanentMemoryManager::initialize`] for that.
    pub async fn open(config: &Config) -> Result<Self> {
        let store = Arc::new(SqliteIndexStore::open(&config.db).await?);
        let dyn_store: Arc<dyn IndexStore> = store.clone();

        let manager = Arc::new(PermanentMemoryManager::new(
            config.memory.clone(),
            dyn_store.clone(),
        ));
        let provider = create_provider(&config.embedding)?;
        let retriever = Arc::new(CachedEmbeddingRetriever::new(dyn_store, provider.clone()));
        let engine = Arc::new(RwLock::new(HybridSearchEngine::new(
            retriever,
            HybridConfig::from(&config.retrieval),
        )));
        let indexer = Arc::new(MemoryIndexer::new(
            manager.clone(),
            engine,
            provider,
            PathFilter::new(&config.watcher)?,
            config.chunking.max_tokens,
        ));

        Ok(Self {
            config: config.clone(),
            store,
            manager,
            indexer,
        })
    }

    pub fn watcher(&self) -> Result<MemoryFileWatcher> {
        MemoryFileWatcher::new(
            self.manager.memory_dir(),
            self.config.watcher.clone(),
            None,
        )
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
