//! In-memory [`IndexStore`] for tests and throwaway sessions.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{EmbeddingRecord, IndexRecord, IndexStore};

#[derive(Default)]
pub struct InMemoryIndexStore {
    records: RwLock<BTreeMap<String, IndexRecord>>,
    embeddings: RwLock<BTreeMap<String, EmbeddingRecord>>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("index store lock poisoned")
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn get_record(&self, relative_path: &str) -> Result<Option<IndexRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(relative_path).cloned())
    }

    async fn upsert_record(&self, record: &IndexRecord) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(record.relative_path.clone(), record.clone());
        Ok(())
    }

    async fn remove_record(&self, relative_path: &str) -> Result<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(records.remove(relative_path).is_some())
    }

    async fn list_records(&self) -> Result<Vec<IndexRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.values().cloned().collect())
    }

    async fn replace_embeddings(
        &self,
        relative_path: &str,
        records: &[EmbeddingRecord],
    ) -> Result<()> {
        let mut embeddings = self.embeddings.write().map_err(poisoned)?;
        embeddings.retain(|_, e| e.relative_path != relative_path);
        for record in records {
            let mut record = record.clone();
            record.relative_path = relative_path.to_string();
            embeddings.insert(record.chunk_id.clone(), record);
        }
        Ok(())
    }

    async fn remove_embeddings(&self, relative_path: &str) -> Result<()> {
        let mut embeddings = self.embeddings.write().map_err(poisoned)?;
        embeddings.retain(|_, e| e.relative_path != relative_path);
        Ok(())
    }

    async fn all_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        let embeddings = self.embeddings.read().map_err(poisoned)?;
        Ok(embeddings.values().cloned().collect())
    }

    async fn embedding_count(&self) -> Result<i64> {
        let embeddings = self.embeddings.read().map_err(poisoned)?;
        Ok(embeddings.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;

    #[tokio::test]
    async fn test_records() {
        conformance::records(&InMemoryIndexStore::new()).await;
    }

    #[tokio::test]
    async fn test_embeddings() {
        conformance::embeddings(&InMemoryIndexStore::new()).await;
    }
}
