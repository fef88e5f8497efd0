//! SQLite-backed [`IndexStore`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use memory_harness_core::embedding::{blob_to_vec, vec_to_blob};

use super::{EmbeddingRecord, IndexRecord, IndexStatus, IndexStore};
use crate::config::DbConfig;
use crate::{db, migrate};

pub struct SqliteIndexStore {
    pool: SqlitePool,
}

impl SqliteIndexStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists.
    pub async fn open(config: &DbConfig) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_record(row: &SqliteRow) -> Result<IndexRecord> {
    let status: String = row.get("status");
    Ok(IndexRecord {
        relative_path: row.get("relative_path"),
        file_size: row.get("file_size"),
        content_hash: row.get("content_hash"),
        status: status.parse::<IndexStatus>()?,
        metadata_count: row.get("metadata_count"),
        last_indexed_at: row.get("last_indexed_at"),
        error: row.get("error"),
    })
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn get_record(&self, relative_path: &str) -> Result<Option<IndexRecord>> {
        let row = sqlx::query(
            r#"
            SELECT relative_path, file_size, content_hash, status, metadata_count,
                   last_indexed_at, error
            FROM memory_files WHERE relative_path = ?
            "#,
        )
        .bind(relative_path)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn upsert_record(&self, record: &IndexRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO memory_files (relative_path, file_size, content_hash, status,
                                      metadata_count, last_indexed_at, error)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(relative_path) DO UPDATE SET
                file_size = excluded.file_size,
                content_hash = excluded.content_hash,
                status = excluded.status,
                metadata_count = excluded.metadata_count,
                last_indexed_at = excluded.last_indexed_at,
                error = excluded.error
            "#,
        )
        .bind(&record.relative_path)
        .bind(record.file_size)
        .bind(&record.content_hash)
        .bind(record.status.as_str())
        .bind(record.metadata_count)
        .bind(record.last_indexed_at)
        .bind(&record.error)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to store index record for {}", record.relative_path))?;

        Ok(())
    }

    async fn remove_record(&self, relative_path: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM memory_files WHERE relative_path = ?")
            .bind(relative_path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_records(&self) -> Result<Vec<IndexRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT relative_path, file_size, content_hash, status, metadata_count,
                   last_indexed_at, error
            FROM memory_files ORDER BY relative_path
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn replace_embeddings(
        &self,
        relative_path: &str,
        records: &[EmbeddingRecord],
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM embedding_cache WHERE relative_path = ?")
            .bind(relative_path)
            .execute(&mut *tx)
            .await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO embedding_cache (chunk_id, relative_path, content, content_hash,
                                             model, dims, vector, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    relative_path = excluded.relative_path,
                    content = excluded.content,
                    content_hash = excluded.content_hash,
                    model = excluded.model,
                    dims = excluded.dims,
                    vector = excluded.vector,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&record.chunk_id)
            .bind(relative_path)
            .bind(&record.content)
            .bind(&record.content_hash)
            .bind(&record.model)
            .bind(record.vector.len() as i64)
            .bind(vec_to_blob(&record.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove_embeddings(&self, relative_path: &str) -> Result<()> {
        sqlx::query("DELETE FROM embedding_cache WHERE relative_path = ?")
            .bind(relative_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn all_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT chunk_id, relative_path, content, content_hash, model, vector
            FROM embedding_cache ORDER BY chunk_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                EmbeddingRecord {
                    chunk_id: row.get("chunk_id"),
                    relative_path: row.get("relative_path"),
                    content: row.get("content"),
                    content_hash: row.get("content_hash"),
                    model: row.get("model"),
                    vector: blob_to_vec(&blob),
                }
            })
            .collect())
    }

    async fn embedding_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embedding_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
