//! Index-status and embedding-cache persistence.
//!
//! The [`IndexStore`] trait is the key-value layer behind the permanent
//! memory manager and the cached-embedding retriever. Two backends:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteIndexStore`] | Default; tables `memory_files` and `embedding_cache` |
//! | [`InMemoryIndexStore`] | Tests and throwaway sessions |

pub mod memory;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::error::MemoryError;

pub use memory::InMemoryIndexStore;
pub use sqlite::SqliteIndexStore;

/// Lifecycle of a memory file in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Pending,
    Indexed,
    Stale,
    Error,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::Pending => "pending",
            IndexStatus::Indexed => "indexed",
            IndexStatus::Stale => "stale",
            IndexStatus::Error => "error",
        }
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for IndexStatus {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(IndexStatus::Pending),
            "indexed" => Ok(IndexStatus::Indexed),
            "stale" => Ok(IndexStatus::Stale),
            "error" => Ok(IndexStatus::Error),
            other => Err(MemoryError::UnknownIndexStatus(other.to_string())),
        }
    }
}

/// One row of `memory_files`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexRecord {
    /// Path relative to the memory directory, `/`-separated.
    pub relative_path: String,
    pub file_size: i64,
    pub content_hash: String,
    pub status: IndexStatus,
    /// Chunks (or entries) produced by the last successful index pass.
    pub metadata_count: i64,
    /// Unix seconds.
    pub last_indexed_at: Option<i64>,
    pub error: Option<String>,
}

impl IndexRecord {
    pub fn pending(
        relative_path: impl Into<String>,
        file_size: i64,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            file_size,
            content_hash: content_hash.into(),
            status: IndexStatus::Pending,
            metadata_count: 0,
            last_indexed_at: None,
            error: None,
        }
    }
}

/// One cached chunk embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub chunk_id: String,
    pub relative_path: String,
    pub content: String,
    pub content_hash: String,
    pub model: String,
    pub vector: Vec<f32>,
}

/// Persistence for index status and cached embeddings.
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn get_record(&self, relative_path: &str) -> Result<Option<IndexRecord>>;

    /// Insert or fully replace the record for `record.relative_path`.
    async fn upsert_record(&self, record: &IndexRecord) -> Result<()>;

    /// Returns whether a record existed.
    async fn remove_record(&self, relative_path: &str) -> Result<bool>;

    /// All records ordered by path.
    async fn list_records(&self) -> Result<Vec<IndexRecord>>;

    /// Drop every cached embedding for a file and store `records` instead.
    async fn replace_embeddings(
        &self,
        relative_path: &str,
        records: &[EmbeddingRecord],
    ) -> Result<()>;

    async fn remove_embeddings(&self, relative_path: &str) -> Result<()>;

    /// Every cached embedding, ordered by chunk id.
    async fn all_embeddings(&self) -> Result<Vec<EmbeddingRecord>>;

    async fn embedding_count(&self) -> Result<i64>;
}
