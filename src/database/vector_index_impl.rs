use crate::database::pool::DbPool;
use crate::services::vector_index::{ScoredRef, VectorIndex};
use crate::utils::error::{ApiError, Dependency};
use pgvector::Vector;
use serde_json::Value;
use sqlx::Row;
use std::collections::HashMap;
use tracing::error;

/// C5, pgvector-backed. Restricts are stored as a JSONB column and matched
/// with `@>` containment; cosine distance ordering comes from the
/// `<=>` operator over an IVFFlat/HNSW index on `embedding`.
pub struct PgVectorIndex {
    pool: DbPool,
}

impl PgVectorIndex {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx_err(e: sqlx::Error) -> ApiError {
    error!("vector index query failed: {}", e);
    ApiError::dependency(Dependency::VectorIndex, true, e.to_string())
}

#[async_trait::async_trait]
impl VectorIndex for PgVectorIndex {
    async fn upsert(
        &self,
        embedding_ref: &str,
        vector: &[f32],
        restricts: HashMap<String, String>,
    ) -> Result<(), ApiError> {
        let restricts_json = serde_json::to_value(&restricts)
            .map_err(|e| ApiError::Internal(format!("failed to serialize restricts: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO vector_index (embedding_ref, embedding, restricts)
            VALUES ($1, $2, $3)
            ON CONFLICT (embedding_ref) DO UPDATE SET
                embedding = EXCLUDED.embedding,
                restricts = EXCLUDED.restricts
            "#,
        )
        .bind(embedding_ref)
        .bind(Vector::from(vector.to_vec()))
        .bind(restricts_json)
        .execute(self.pool.get_pool())
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        restricts: Option<HashMap<String, String>>,
    ) -> Result<Vec<ScoredRef>, ApiError> {
        let vec = Vector::from(vector.to_vec());
        let limit = top_k as i64;

        let rows = if let Some(restricts) = restricts {
            let restricts_json: Value = serde_json::to_value(&restricts)
                .map_err(|e| ApiError::Internal(format!("failed to serialize restricts: {e}")))?;
            sqlx::query(
                r#"
                SELECT embedding_ref, 1 - (embedding <=> $1) AS score
                FROM vector_index
                WHERE restricts @> $2
                ORDER BY embedding <=> $1, embedding_ref ASC
                LIMIT $3
                "#,
            )
            .bind(&vec)
            .bind(restricts_json)
            .bind(limit)
            .fetch_all(self.pool.get_pool())
            .await
            .map_err(map_sqlx_err)?
        } else {
            sqlx::query(
                r#"
                SELECT embedding_ref, 1 - (embedding <=> $1) AS score
                FROM vector_index
                ORDER BY embedding <=> $1, embedding_ref ASC
                LIMIT $2
                "#,
            )
            .bind(&vec)
            .bind(limit)
            .fetch_all(self.pool.get_pool())
            .await
            .map_err(map_sqlx_err)?
        };

        rows.into_iter()
            .map(|row| {
                let embedding_ref: String = row.try_get("embedding_ref").map_err(map_sqlx_err)?;
                let score: f64 = row.try_get("score").map_err(map_sqlx_err)?;
                Ok(ScoredRef {
                    embedding_ref,
                    score: score as f32,
                })
            })
            .collect()
    }
}
