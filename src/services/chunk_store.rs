use crate::models::document::Chunk;
use crate::utils::error::ApiError;

pub const MAX_SUB_BATCH: usize = 500;

/// C3. Durable mapping from chunk-id to {text, doc-id, offsets,
/// embedding-ref, pii-flag, created-at}. Exclusively owned by this
/// component; everyone else reads by chunk-id.
#[async_trait::async_trait]
pub trait ChunkStore: Send + Sync {
    /// Idempotent on chunk-id; batched into sub-batches of at most
    /// `MAX_SUB_BATCH`, each atomic from the caller's perspective. Returns
    /// the list of inserted chunk-ids. Rejects empty-text chunks with
    /// `InvalidInput` (I-3).
    async fn upsert_many(&self, chunks: &[Chunk]) -> Result<Vec<String>, ApiError>;

    /// Preserves request order; a missing id yields `None` at that
    /// position rather than an error.
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Option<Chunk>>, ApiError>;

    async fn delete_by_doc(&self, doc_id: &str) -> Result<(), ApiError>;

    /// Counts existing chunks for a doc-id, used by the ingest orchestrator
    /// to make re-ingestion idempotent (S5 / property 3).
    async fn count_by_doc(&self, doc_id: &str) -> Result<usize, ApiError>;
}
