use crate::database::pool::DbPool;
use crate::models::document::{Chunk, PiiCategory};
use crate::services::chunk_store::{ChunkStore, MAX_SUB_BATCH};
use crate::utils::error::{ApiError, Dependency};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, Row};
use tracing::error;

pub struct PgChunkStore {
    pool: DbPool,
}

impl PgChunkStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ChunkRow {
    chunk_id: String,
    doc_id: String,
    ordinal: i32,
    text: String,
    embedding_ref: Option<String>,
    pii_categories: Value,
    restricts: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChunkRow> for Chunk {
    type Error = ApiError;

    fn try_from(row: ChunkRow) -> Result<Self, Self::Error> {
        let pii_categories: Vec<PiiCategory> = serde_json::from_value(row.pii_categories)
            .map_err(|e| ApiError::Internal(format!("corrupt pii_categories column: {e}")))?;
        let restricts = serde_json::from_value(row.restricts)
            .map_err(|e| ApiError::Internal(format!("corrupt restricts column: {e}")))?;

        Ok(Chunk {
            chunk_id: row.chunk_id,
            doc_id: row.doc_id,
            ordinal: row.ordinal,
            text: row.text,
            embedding_ref: row.embedding_ref,
            pii_categories,
            restricts,
            created_at: row.created_at,
        })
    }
}

fn map_sqlx_err(e: sqlx::Error) -> ApiError {
    error!("chunk store query failed: {}", e);
    ApiError::dependency(Dependency::ChunkStore, true, e.to_string())
}

#[async_trait::async_trait]
impl ChunkStore for PgChunkStore {
    async fn upsert_many(&self, chunks: &[Chunk]) -> Result<Vec<String>, ApiError> {
        for chunk in chunks {
            if chunk.text.trim().is_empty() {
                return Err(ApiError::InvalidInput(format!(
                    "chunk {} has empty text",
                    chunk.chunk_id
                )));
            }
        }

        let mut inserted = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(MAX_SUB_BATCH) {
            let mut tx = self.pool.get_pool().begin().await.map_err(map_sqlx_err)?;
            for chunk in batch {
                let pii_json = serde_json::to_value(&chunk.pii_categories)
                    .map_err(|e| ApiError::Internal(format!("failed to serialize pii_categories: {e}")))?;
                let restricts_json = serde_json::to_value(&chunk.restricts)
                    .map_err(|e| ApiError::Internal(format!("failed to serialize restricts: {e}")))?;

                sqlx::query(
                    r#"
                    INSERT INTO chunks (chunk_id, doc_id, ordinal, text, embedding_ref, pii_categories, restricts, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (chunk_id) DO UPDATE SET
                        text = EXCLUDED.text,
                        embedding_ref = EXCLUDED.embedding_ref,
                        pii_categories = EXCLUDED.pii_categories,
                        restricts = EXCLUDED.restricts
                    "#,
                )
                .bind(&chunk.chunk_id)
                .bind(&chunk.doc_id)
                .bind(chunk.ordinal)
                .bind(&chunk.text)
                .bind(&chunk.embedding_ref)
                .bind(pii_json)
                .bind(restricts_json)
                .bind(chunk.created_at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;

                inserted.push(chunk.chunk_id.clone());
            }
            tx.commit().await.map_err(map_sqlx_err)?;
        }

        Ok(inserted)
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<Option<Chunk>>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<ChunkRow> = sqlx::query_as(
            r#"
            SELECT chunk_id, doc_id, ordinal, text, embedding_ref, pii_categories, restricts, created_at
            FROM chunks
            WHERE chunk_id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(self.pool.get_pool())
        .await
        .map_err(map_sqlx_err)?;

        let mut by_id = std::collections::HashMap::with_capacity(rows.len());
        for row in rows {
            let chunk_id = row.chunk_id.clone();
            by_id.insert(chunk_id, Chunk::try_from(row)?);
        }

        Ok(ids.iter().map(|id| by_id.remove(id)).collect())
    }

    async fn delete_by_doc(&self, doc_id: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM chunks WHERE doc_id = $1")
            .bind(doc_id)
            .execute(self.pool.get_pool())
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn count_by_doc(&self, doc_id: &str) -> Result<usize, ApiError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM chunks WHERE doc_id = $1")
            .bind(doc_id)
            .fetch_one(self.pool.get_pool())
            .await
            .map_err(map_sqlx_err)?;
        let n: i64 = row.try_get("n").map_err(map_sqlx_err)?;
        Ok(n as usize)
    }
}
