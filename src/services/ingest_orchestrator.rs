use crate::config::settings::{ChunkingConfig, DeadlineConfig};
use crate::document::chunker::{ChunkerOptions, TextChunker};
use crate::document::parser::{normalize_text, DocumentParser};
use crate::document::pii::PiiRedactor;
use crate::models::document::{Chunk, ContentType};
use crate::models::ingest::{DocStatus, IngestResponse};
use crate::services::chunk_store::ChunkStore;
use crate::services::embedding::Embedder;
use crate::services::object_store::{sha256_hex, ObjectMetadata, ObjectStore};
use crate::services::vector_index::VectorIndex;
use crate::utils::error::{ApiError, Dependency};
use crate::utils::limiters::Limiters;
use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const VECTOR_UPSERT_MAX_RETRIES: u32 = 3;

pub struct IngestFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// C12. Drives one ingest submission through
/// RECEIVED → PARSED → CHUNKED → PII_TAGGED → EMBEDDED → PERSISTED → INDEXED → COMPLETE,
/// with THROTTLED/REJECTED/PARTIAL_FAILURE branches per document. Admission
/// (rate limit, size/file-count) happens before this orchestrator is
/// invoked; this component owns only the per-submission pipeline.
pub struct IngestOrchestrator {
    embedder: Arc<dyn Embedder>,
    chunk_store: Arc<dyn ChunkStore>,
    object_store: Arc<dyn ObjectStore>,
    vector_index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
    limiters: Arc<Limiters>,
    deadline: Duration,
}

struct ParsedFile {
    filename: String,
    doc_id: String,
    sha256: String,
    bytes: Vec<u8>,
    content_type: ContentType,
    chunks: Vec<Chunk>,
}

enum FileOutcome {
    Parsed(ParsedFile),
    Rejected { filename: String, reason: String },
}

impl IngestOrchestrator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chunk_store: Arc<dyn ChunkStore>,
        object_store: Arc<dyn ObjectStore>,
        vector_index: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
        deadlines: &DeadlineConfig,
        limiters: Arc<Limiters>,
    ) -> Self {
        Self {
            embedder,
            chunk_store,
            object_store,
            vector_index,
            chunking,
            limiters,
            deadline: Duration::from_secs(deadlines.ingest_deadline_seconds),
        }
    }

    pub async fn ingest(&self, uploader_id: &str, files: Vec<IngestFile>) -> Result<IngestResponse, ApiError> {
        match tokio::time::timeout(self.deadline, self.ingest_inner(uploader_id, files)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::DeadlineExceeded {
                stage: "ingest".to_string(),
            }),
        }
    }

    async fn ingest_inner(&self, uploader_id: &str, files: Vec<IngestFile>) -> Result<IngestResponse, ApiError> {
        use futures::stream::{self, StreamExt};

        let fan_out = self.limiters.fan_out.clone();
        let concurrency = fan_out.available_permits().max(1);
        let outcomes: Vec<FileOutcome> = stream::iter(files)
            .map(|file| {
                let fan_out = fan_out.clone();
                async move {
                    let _permit = fan_out.acquire_owned().await.ok();
                    self.parse_and_chunk(file).await
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut response = IngestResponse::default();
        let mut to_persist: Vec<ParsedFile> = Vec::new();

        for outcome in outcomes {
            match outcome {
                FileOutcome::Rejected { filename, reason } => {
                    response.per_doc_status.push(DocStatus::Rejected { filename, reason });
                }
                FileOutcome::Parsed(parsed) => to_persist.push(parsed),
            }
        }

        if to_persist.is_empty() {
            return Ok(response);
        }

        let all_texts: Vec<String> = to_persist
            .iter()
            .flat_map(|f| f.chunks.iter().map(|c| c.text.clone()))
            .collect();

        let embeddings = if all_texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed(&all_texts).await?
        };

        let mut cursor = 0usize;
        for mut parsed in to_persist {
            let n = parsed.chunks.len();
            let doc_embeddings = &embeddings[cursor..cursor + n];
            cursor += n;

            for chunk in parsed.chunks.iter_mut() {
                chunk.embedding_ref = Some(chunk.chunk_id.clone());
            }

            match self.persist_and_index(uploader_id, &parsed, doc_embeddings).await {
                Ok(chunk_ids) => {
                    response.doc_ids.push(parsed.doc_id.clone());
                    response.chunk_ids.extend(chunk_ids.clone());
                    response.per_doc_status.push(DocStatus::Complete {
                        doc_id: parsed.doc_id,
                        filename: parsed.filename,
                        chunk_ids,
                    });
                }
                Err((chunk_ids, reason)) => {
                    response.doc_ids.push(parsed.doc_id.clone());
                    response.chunk_ids.extend(chunk_ids.clone());
                    response.per_doc_status.push(DocStatus::PartialFailure {
                        doc_id: parsed.doc_id,
                        filename: parsed.filename,
                        chunk_ids,
                        reason,
                    });
                }
            }
        }

        Ok(response)
    }

    async fn parse_and_chunk(&self, file: IngestFile) -> FileOutcome {
        let content_type = match ContentType::from_filename(&file.filename) {
            Some(ct) => ct,
            None => {
                return FileOutcome::Rejected {
                    filename: file.filename,
                    reason: "unrecognized file extension".to_string(),
                }
            }
        };

        let parsed = match DocumentParser::parse(&file.bytes, content_type) {
            Ok(p) => p,
            Err(e) => {
                return FileOutcome::Rejected {
                    filename: file.filename,
                    reason: format!("parse failed: {e}"),
                }
            }
        };

        let normalized = normalize_text(&parsed.content);
        if normalized.is_empty() {
            return FileOutcome::Rejected {
                filename: file.filename,
                reason: "document is empty after extraction".to_string(),
            };
        }

        let chunker = TextChunker::new(ChunkerOptions {
            max_chunk_size: self.chunking.max_chars,
            min_chunk_size: self.chunking.min_chars,
            overlap: self.chunking.overlap_chars,
            use_semantic: self.chunking.use_semantic,
            similarity_threshold: self.chunking.similarity_threshold,
        });

        let sentence_embedder: &dyn crate::document::chunker::SentenceEmbedder = self.embedder.as_ref();
        let raw_chunks = match chunker.chunk(&normalized, Some(sentence_embedder)).await {
            Ok(chunks) => chunks,
            Err(e) => {
                return FileOutcome::Rejected {
                    filename: file.filename,
                    reason: format!("chunking failed: {e}"),
                }
            }
        };

        let sha256 = sha256_hex(&file.bytes);
        let doc_id = derive_doc_id(&sha256);
        let now = Utc::now();

        let chunks: Vec<Chunk> = raw_chunks
            .into_iter()
            .enumerate()
            .map(|(ordinal, raw)| {
                let detection = PiiRedactor::detect(&raw.content);
                let mut restricts = HashMap::new();
                restricts.insert("doc_id".to_string(), doc_id.clone());

                Chunk {
                    chunk_id: format!("{doc_id}_{ordinal}"),
                    doc_id: doc_id.clone(),
                    ordinal: ordinal as i32,
                    text: raw.content,
                    embedding_ref: None,
                    pii_categories: detection.categories,
                    restricts,
                    created_at: now,
                }
            })
            .collect();

        FileOutcome::Parsed(ParsedFile {
            filename: file.filename,
            doc_id,
            sha256,
            bytes: file.bytes,
            content_type,
            chunks,
        })
    }

    async fn persist_and_index(
        &self,
        uploader_id: &str,
        parsed: &ParsedFile,
        vectors: &[Vec<f32>],
    ) -> Result<Vec<String>, (Vec<String>, String)> {
        let object_meta = ObjectMetadata {
            uploader_id: uploader_id.to_string(),
            original_filename: parsed.filename.clone(),
            content_type: parsed.content_type.as_str().to_string(),
            sha256: parsed.sha256.clone(),
        };

        if let Err(e) = self.object_store.put(&parsed.doc_id, &parsed.bytes, object_meta).await {
            return Err((Vec::new(), format!("object store write failed: {e}")));
        }

        let chunk_ids = match self.chunk_store.upsert_many(&parsed.chunks).await {
            Ok(ids) => ids,
            Err(e) => return Err((Vec::new(), format!("chunk store write failed: {e}"))),
        };

        // Atomicity: C3 before C5. A C5 failure here leaves an orphan chunk
        // record (still retrievable by id) rather than rolling back C3.
        let mut indexed = Vec::with_capacity(chunk_ids.len());
        for (chunk, vector) in parsed.chunks.iter().zip(vectors.iter()) {
            match self.upsert_vector_with_retry(&chunk.chunk_id, vector, chunk.restricts.clone()).await {
                Ok(()) => indexed.push(chunk.chunk_id.clone()),
                Err(e) => {
                    tracing::warn!(chunk_id = %chunk.chunk_id, error = %e, "vector upsert failed, chunk is an orphan");
                    return Err((indexed, format!("vector index upsert failed: {e}")));
                }
            }
        }

        Ok(indexed)
    }

    async fn upsert_vector_with_retry(
        &self,
        embedding_ref: &str,
        vector: &[f32],
        restricts: HashMap<String, String>,
    ) -> Result<(), ApiError> {
        let mut attempt = 0u32;
        loop {
            match self.vector_index.upsert(embedding_ref, vector, restricts.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < VECTOR_UPSERT_MAX_RETRIES => {
                    attempt += 1;
                    let base_ms = 100u64 * 4u64.pow(attempt - 1);
                    let jitter = rand::rng().random_range(-0.2..=0.2);
                    let delay_ms = (base_ms as f64 * (1.0 + jitter)).max(1.0) as u64;
                    tracing::warn!(attempt, %err, delay_ms, "vector upsert failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(err) => {
                    return Err(ApiError::dependency(Dependency::VectorIndex, true, err.to_string()));
                }
            }
        }
    }
}

fn derive_doc_id(sha256: &str) -> String {
    format!("doc_{}", &sha256[..16.min(sha256.len())])
}
