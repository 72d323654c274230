//! End-to-end coverage over the ingest and query orchestrators, wired with
//! in-memory fakes for the storage collaborators so the pipeline's own
//! contracts (chunk contiguity, doc-id idempotency, no-evidence refusal) are
//! exercised without a live Postgres/Redis/LLM endpoint.

use async_trait::async_trait;
use ragcore_server::config::settings::{ChunkingConfig, DeadlineConfig, GeneratorConfig, RetrievalConfig, SessionConfig};
use ragcore_server::models::document::Chunk;
use ragcore_server::services::chunk_store::ChunkStore;
use ragcore_server::services::embedding::Embedder;
use ragcore_server::services::object_store::FsObjectStore;
use ragcore_server::services::session_store::NullSessionStore;
use ragcore_server::services::vector_index::{ScoredRef, VectorIndex};
use ragcore_server::services::{IngestFile, IngestOrchestrator, QueryOrchestrator};
use ragcore_server::services::query_orchestrator::QueryRequest;
use ragcore_server::utils::error::ApiError;
use ragcore_server::utils::limiters::Limiters;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Deterministic bag-of-character-codes embedder: stable across calls and
/// sensitive to content, which is all these tests need from an embedder.
struct FakeEmbedder {
    dim: usize,
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(texts.iter().map(|t| embed_text(t, self.dim)).collect())
    }
}

fn embed_text(text: &str, dim: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    for (i, b) in text.bytes().enumerate() {
        v[i % dim] += b as f32;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

#[derive(Default)]
struct FakeVectorIndex {
    entries: Mutex<HashMap<String, Vec<f32>>>,
}

#[async_trait]
impl VectorIndex for FakeVectorIndex {
    async fn upsert(
        &self,
        embedding_ref: &str,
        vector: &[f32],
        _restricts: HashMap<String, String>,
    ) -> Result<(), ApiError> {
        self.entries
            .lock()
            .unwrap()
            .insert(embedding_ref.to_string(), vector.to_vec());
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        _restricts: Option<HashMap<String, String>>,
    ) -> Result<Vec<ScoredRef>, ApiError> {
        let entries = self.entries.lock().unwrap();
        let mut scored: Vec<ScoredRef> = entries
            .iter()
            .map(|(r, v)| ScoredRef {
                embedding_ref: r.clone(),
                score: cosine(vector, v),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then(a.embedding_ref.cmp(&b.embedding_ref)));
        scored.truncate(top_k);
        Ok(scored)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[derive(Default)]
struct FakeChunkStore {
    by_id: Mutex<HashMap<String, Chunk>>,
}

#[async_trait]
impl ChunkStore for FakeChunkStore {
    async fn upsert_many(&self, chunks: &[Chunk]) -> Result<Vec<String>, ApiError> {
        let mut by_id = self.by_id.lock().unwrap();
        let mut ids = Vec::with_capacity(chunks.len());
        for c in chunks {
            if c.text.is_empty() {
                return Err(ApiError::InvalidInput("empty chunk text".to_string()));
            }
            ids.push(c.chunk_id.clone());
            by_id.insert(c.chunk_id.clone(), c.clone());
        }
        Ok(ids)
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<Option<Chunk>>, ApiError> {
        let by_id = self.by_id.lock().unwrap();
        Ok(ids.iter().map(|id| by_id.get(id).cloned()).collect())
    }

    async fn delete_by_doc(&self, doc_id: &str) -> Result<(), ApiError> {
        self.by_id.lock().unwrap().retain(|_, c| c.doc_id != doc_id);
        Ok(())
    }

    async fn count_by_doc(&self, doc_id: &str) -> Result<usize, ApiError> {
        Ok(self.by_id.lock().unwrap().values().filter(|c| c.doc_id == doc_id).count())
    }
}

fn chunking_config() -> ChunkingConfig {
    ChunkingConfig {
        max_chars: 2800,
        min_chars: 500,
        overlap_chars: 256,
        similarity_threshold: 0.75,
        use_semantic: true,
    }
}

fn deadlines() -> DeadlineConfig {
    DeadlineConfig {
        query_deadline_seconds: 5,
        ingest_deadline_seconds: 5,
    }
}

fn limits() -> ragcore_server::config::settings::LimitsConfig {
    ragcore_server::config::settings::LimitsConfig {
        embedding_concurrency: 4,
        db_search_concurrency: 4,
        llm_generate_concurrency: 4,
        fan_out_limit: 4,
        acquire_timeout_ms: 2000,
    }
}

fn tempdir() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("ragcore-it-{}", uuid::Uuid::new_v4()));
    p
}

fn build_ingest_orchestrator(
    chunk_store: Arc<FakeChunkStore>,
    vector_index: Arc<FakeVectorIndex>,
) -> IngestOrchestrator {
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder { dim: 16 });
    let object_store = Arc::new(FsObjectStore::new(tempdir()));
    let limiters = Arc::new(Limiters::new(&limits()));

    IngestOrchestrator::new(
        embedder,
        chunk_store,
        object_store,
        vector_index,
        chunking_config(),
        &deadlines(),
        limiters,
    )
}

#[tokio::test]
async fn ingest_is_idempotent_on_doc_id_and_chunk_count() {
    let chunk_store = Arc::new(FakeChunkStore::default());
    let vector_index = Arc::new(FakeVectorIndex::default());
    let orchestrator = build_ingest_orchestrator(chunk_store.clone(), vector_index.clone());

    let body = b"Our support hours are 9am to 5pm, Monday to Friday. Contact support@example.com for help.".to_vec();

    let first = orchestrator
        .ingest("uploader-1", vec![IngestFile { filename: "faq.txt".to_string(), bytes: body.clone() }])
        .await
        .unwrap();
    let second = orchestrator
        .ingest("uploader-1", vec![IngestFile { filename: "faq.txt".to_string(), bytes: body }])
        .await
        .unwrap();

    assert_eq!(first.doc_ids, second.doc_ids, "re-ingesting identical bytes must reuse the doc-id");
    assert!(!first.chunk_ids.is_empty());

    let doc_id = &first.doc_ids[0];
    let count = chunk_store.count_by_doc(doc_id).await.unwrap();
    assert_eq!(count, first.chunk_ids.len(), "no duplicate chunks after re-ingest");
}

#[tokio::test]
async fn ingest_produces_contiguous_ordinals_and_coupled_vector_refs() {
    let chunk_store = Arc::new(FakeChunkStore::default());
    let vector_index = Arc::new(FakeVectorIndex::default());
    let orchestrator = build_ingest_orchestrator(chunk_store.clone(), vector_index.clone());

    let long_text = "Paragraph one about onboarding steps for new engineers. ".repeat(40)
        + "Paragraph two about deployment procedures and rollback safety. ".repeat(40).as_str();

    let response = orchestrator
        .ingest("uploader-1", vec![IngestFile { filename: "handbook.txt".to_string(), bytes: long_text.into_bytes() }])
        .await
        .unwrap();

    assert!(response.chunk_ids.len() >= 1);

    let chunks = chunk_store.get_many(&response.chunk_ids).await.unwrap();
    let mut ordinals: Vec<i32> = chunks.iter().flatten().map(|c| c.ordinal).collect();
    ordinals.sort();
    let expected: Vec<i32> = (0..ordinals.len() as i32).collect();
    assert_eq!(ordinals, expected, "ordinals must form 0..n-1 with no gaps or duplicates");

    for chunk in chunks.into_iter().flatten() {
        let embedding_ref = chunk.embedding_ref.expect("embedded chunk must carry a vector ref");
        let query_vec = embed_text(&chunk.text, 16);
        let top = vector_index.query(&query_vec, 1, None).await.unwrap();
        assert_eq!(top[0].embedding_ref, embedding_ref, "vector index must surface the chunk's own ref as its top match");
    }
}

fn build_query_orchestrator(
    chunk_store: Arc<FakeChunkStore>,
    vector_index: Arc<FakeVectorIndex>,
) -> QueryOrchestrator {
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder { dim: 16 });
    let session_store = Arc::new(NullSessionStore);

    let retrieval = RetrievalConfig {
        topk_default: 5,
        topk_max: 20,
        candidate_multiplier: 3,
        context_token_budget: 4000,
        rerank_weight_retrieval: 0.5,
        rerank_weight_semantic: 0.3,
        rerank_weight_length: 0.2,
    };
    let generator_cfg = GeneratorConfig {
        base_url: "http://localhost:9/unused".to_string(),
        model: "unused".to_string(),
        api_key: None,
        max_tokens: 8000,
        timeout_seconds: 60,
    };

    let session = SessionConfig { ttl_days: 30, recent_messages: 6 };

    QueryOrchestrator::new(
        embedder,
        vector_index,
        chunk_store,
        session_store,
        &retrieval,
        generator_cfg,
        &deadlines(),
        &session,
    )
}

#[tokio::test]
async fn query_against_empty_index_refuses_safely_with_no_citations() {
    let chunk_store = Arc::new(FakeChunkStore::default());
    let vector_index = Arc::new(FakeVectorIndex::default());
    let orchestrator = build_query_orchestrator(chunk_store, vector_index);

    let result = orchestrator
        .query(QueryRequest {
            user_id: "user-1".to_string(),
            question: "What is the speed of light?".to_string(),
            session_id: None,
            top_k: None,
            use_history: false,
        })
        .await
        .unwrap();

    assert!(
        result.answer.to_lowercase().contains("cannot answer") && result.answer.to_lowercase().contains("available evidence"),
        "got answer: {}",
        result.answer
    );
    assert!(result.citations.is_empty());
    assert!(result.contexts_used.is_empty());
}

#[tokio::test]
async fn query_rejects_empty_question() {
    let chunk_store = Arc::new(FakeChunkStore::default());
    let vector_index = Arc::new(FakeVectorIndex::default());
    let orchestrator = build_query_orchestrator(chunk_store, vector_index);

    let result = orchestrator
        .query(QueryRequest {
            user_id: "user-1".to_string(),
            question: "   ".to_string(),
            session_id: None,
            top_k: None,
            use_history: false,
        })
        .await;

    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}
