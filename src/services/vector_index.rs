use crate::utils::error::ApiError;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ScoredRef {
    pub embedding_ref: String,
    pub score: f32,
}

/// C5. Approximate nearest-neighbor search over vectors; streaming upserts;
/// top-k query with optional metadata restricts. Exclusively owns vector
/// storage.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(
        &self,
        embedding_ref: &str,
        vector: &[f32],
        restricts: HashMap<String, String>,
    ) -> Result<(), ApiError>;

    /// Returns up to `top_k` entries sorted by descending cosine
    /// similarity over L2-normalized vectors; ties broken by
    /// `embedding_ref` lexicographic order.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        restricts: Option<HashMap<String, String>>,
    ) -> Result<Vec<ScoredRef>, ApiError>;
}
