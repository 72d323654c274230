use crate::config::settings::{DeadlineConfig, GeneratorConfig, RetrievalConfig, SessionConfig};
use crate::models::query::{LatencyBreakdown, QueryResult, TokenUsage};
use crate::models::session::{Message, MessageMetadata};
use crate::services::chunk_store::ChunkStore;
use crate::services::embedding::Embedder;
use crate::services::generator::Generator;
use crate::services::reranker::{RerankCandidate, Reranker, RerankWeights};
use crate::services::session_store::{SessionStore, NO_SESSION};
use crate::services::vector_index::VectorIndex;
use crate::services::compressor::ContextCompressor;
use crate::utils::error::ApiError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub struct QueryRequest {
    pub user_id: String,
    pub question: String,
    pub session_id: Option<String>,
    pub top_k: Option<usize>,
    pub use_history: bool,
}

/// C13. Drives one query through
/// ADMITTED → HISTORY_LOADED → QUERY_EMBEDDED → RETRIEVED → RERANKED
///          → COMPRESSED → GENERATED → RECORDED → RESPONDED.
/// Admission (C11) happens before this orchestrator is invoked.
pub struct QueryOrchestrator {
    embedder: Arc<dyn Embedder>,
    vector_index: Arc<dyn VectorIndex>,
    chunk_store: Arc<dyn ChunkStore>,
    session_store: Arc<dyn SessionStore>,
    reranker: Reranker,
    generator: Generator,
    topk_default: usize,
    topk_max: usize,
    candidate_multiplier: usize,
    max_context_tokens: usize,
    recent_messages: usize,
    deadline: Duration,
}

impl QueryOrchestrator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector_index: Arc<dyn VectorIndex>,
        chunk_store: Arc<dyn ChunkStore>,
        session_store: Arc<dyn SessionStore>,
        retrieval: &RetrievalConfig,
        generator_cfg: GeneratorConfig,
        deadlines: &DeadlineConfig,
        session: &SessionConfig,
    ) -> Self {
        let max_context_tokens = generator_cfg.max_tokens / 2;
        let reranker = Reranker::new(RerankWeights::from(retrieval));
        let generator = Generator::new(generator_cfg);

        Self {
            embedder,
            vector_index,
            chunk_store,
            session_store,
            reranker,
            generator,
            topk_default: retrieval.topk_default,
            topk_max: retrieval.topk_max,
            candidate_multiplier: retrieval.candidate_multiplier,
            max_context_tokens,
            recent_messages: session.recent_messages,
            deadline: Duration::from_secs(deadlines.query_deadline_seconds),
        }
    }

    pub async fn query(&self, request: QueryRequest) -> Result<QueryResult, ApiError> {
        if request.question.trim().is_empty() {
            return Err(ApiError::InvalidInput("question must not be empty".to_string()));
        }

        match tokio::time::timeout(self.deadline, self.query_inner(request)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::DeadlineExceeded {
                stage: "query".to_string(),
            }),
        }
    }

    async fn query_inner(&self, request: QueryRequest) -> Result<QueryResult, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let top_k = request.top_k.unwrap_or(self.topk_default).clamp(1, self.topk_max);
        let candidates_n = (self.candidate_multiplier * top_k).max(15);

        let mut latency = LatencyBreakdown::default();

        // HISTORY_LOADED
        let start = Instant::now();
        let session_id = match &request.session_id {
            Some(id) => id.clone(),
            None => self
                .session_store
                .create_session(&request.user_id, Some(&request.question))
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "session store unavailable, proceeding without a session");
                    NO_SESSION.to_string()
                }),
        };
        let history: Vec<Message> = if request.use_history && session_id != NO_SESSION {
            self.session_store
                .recent(&session_id, self.recent_messages)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "session store unavailable, proceeding without history");
                    Vec::new()
                })
        } else {
            Vec::new()
        };
        latency.history_loaded_ms = start.elapsed().as_millis() as u64;

        // QUERY_EMBEDDED
        let start = Instant::now();
        let query_embedding = self.embedder.embed_one(&request.question).await?;
        latency.query_embedded_ms = start.elapsed().as_millis() as u64;

        // RETRIEVED
        let start = Instant::now();
        let raw_candidates = self.vector_index.query(&query_embedding, candidates_n, None).await?;
        latency.retrieved_ms = start.elapsed().as_millis() as u64;

        if raw_candidates.is_empty() {
            return self
                .generate_and_record(
                    request_id,
                    &request.question,
                    &session_id,
                    &history,
                    Vec::new(),
                    latency,
                )
                .await;
        }

        // Hydrate, dropping orphans (vector present, chunk missing).
        let ids: Vec<String> = raw_candidates.iter().map(|c| c.embedding_ref.clone()).collect();
        let hydrated = self.chunk_store.get_many(&ids).await?;
        let mut rerank_candidates = Vec::with_capacity(raw_candidates.len());
        for (scored, chunk) in raw_candidates.into_iter().zip(hydrated.into_iter()) {
            match chunk {
                Some(chunk) => rerank_candidates.push(RerankCandidate {
                    chunk_id: chunk.chunk_id,
                    doc_id: chunk.doc_id,
                    text: chunk.text,
                    retrieval_score: scored.score,
                    pii_categories: chunk.pii_categories,
                }),
                None => {
                    tracing::warn!(embedding_ref = %scored.embedding_ref, "dropping orphan candidate, no chunk record");
                }
            }
        }

        if rerank_candidates.is_empty() {
            return self
                .generate_and_record(
                    request_id,
                    &request.question,
                    &session_id,
                    &history,
                    Vec::new(),
                    latency,
                )
                .await;
        }

        // RERANKED
        let start = Instant::now();
        let ranked = self
            .reranker
            .rerank(&query_embedding, rerank_candidates, top_k, self.embedder.as_ref())
            .await?;
        latency.reranked_ms = start.elapsed().as_millis() as u64;

        // COMPRESSED
        let start = Instant::now();
        let contexts = ContextCompressor::compress(&request.question, &ranked, self.max_context_tokens);
        latency.compressed_ms = start.elapsed().as_millis() as u64;

        self.generate_and_record(request_id, &request.question, &session_id, &history, contexts, latency)
            .await
    }

    async fn generate_and_record(
        &self,
        request_id: String,
        question: &str,
        session_id: &str,
        history: &[Message],
        contexts: Vec<crate::services::compressor::CompressedChunk>,
        mut latency: LatencyBreakdown,
    ) -> Result<QueryResult, ApiError> {
        // GENERATED
        let start = Instant::now();
        let result = self.generator.generate(question, &contexts, history).await?;
        latency.generated_ms = start.elapsed().as_millis() as u64;

        // RECORDED
        let start = Instant::now();
        if session_id != NO_SESSION {
            let user_message = Message::user(question);
            if let Err(e) = self.session_store.append(session_id, user_message).await {
                tracing::warn!(error = %e, "failed to record user message");
            }
            let assistant_message = Message::assistant(
                result.answer.clone(),
                MessageMetadata {
                    prompt_tokens: Some(result.prompt_tokens),
                    completion_tokens: Some(result.completion_tokens),
                    citations: result.citations.clone(),
                    latency_ms: Some(latency.generated_ms),
                },
            );
            if let Err(e) = self.session_store.append(session_id, assistant_message).await {
                tracing::warn!(error = %e, "failed to record assistant message");
            }
        }
        latency.recorded_ms = start.elapsed().as_millis() as u64;

        let contexts_used: Vec<String> = contexts.iter().map(|c| c.chunk_id.clone()).collect();

        Ok(QueryResult {
            answer: result.answer,
            citations: result.citations,
            contexts_used,
            token_usage: TokenUsage {
                prompt_tokens: result.prompt_tokens,
                completion_tokens: result.completion_tokens,
            },
            latency_ms_breakdown: latency,
            request_id,
            session_id: session_id.to_string(),
            blocked: result.blocked,
        })
    }
}
