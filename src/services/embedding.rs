use crate::config::settings::EmbeddingConfig;
use crate::document::chunker::SentenceEmbedder;
use crate::utils::error::{ApiError, Dependency};
use crate::utils::limiters::Limiters;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;

/// C2. Turns text into fixed-dimension vectors; batches; retries on
/// transient upstream failures. Deliberately carries no response cache —
/// per its contract, callers that want caching wrap this trait.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let mut v = self.embed(std::slice::from_ref(&text.to_string())).await?;
        Ok(v.remove(0))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    batch_max: usize,
    limiters: Arc<Limiters>,
}

impl HttpEmbedder {
    pub fn new(cfg: EmbeddingConfig, limiters: Arc<Limiters>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()
            .expect("embedder http client");

        Self {
            client,
            base_url: cfg.base_url,
            model: cfg.model,
            api_key: cfg.api_key,
            dimension: cfg.dimension,
            batch_max: cfg.batch_max.max(1),
            limiters,
        }
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let mut attempt = 0u32;
        loop {
            match self.try_embed_batch(batch).await {
                Ok(v) => return Ok(v),
                Err(err) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    let base_ms = 100u64 * 4u64.pow(attempt - 1); // 100, 400, 1600
                    let jitter = rand::rng().random_range(-0.2..=0.2);
                    let delay_ms = (base_ms as f64 * (1.0 + jitter)).max(1.0) as u64;
                    tracing::warn!(attempt, %err, delay_ms, "embedding call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(err) => {
                    return Err(ApiError::dependency(
                        Dependency::Embedding,
                        true,
                        format!("embedder unavailable after {MAX_RETRIES} retries: {err}"),
                    ));
                }
            }
        }
    }

    async fn try_embed_batch(&self, batch: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let (_permit, _waited) =
            Limiters::acquire_timed(self.limiters.embedding.clone(), self.limiters.acquire_timeout, "embed")
                .await?;

        let request = EmbeddingRequest {
            input: batch,
            model: &self.model,
        };

        let mut req = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?.error_for_status()?;
        let parsed: EmbeddingResponse = response.json().await?;

        if parsed.data.len() != batch.len() {
            anyhow::bail!(
                "embedding response length mismatch: expected {}, got {}",
                batch.len(),
                parsed.data.len()
            );
        }
        for d in &parsed.data {
            if d.embedding.len() != self.dimension {
                anyhow::bail!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    d.embedding.len()
                );
            }
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait::async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(ApiError::InvalidInput("empty string in embedding input".into()));
        }

        let mut results = Vec::with_capacity(texts.len());
        for sub_batch in texts.chunks(self.batch_max) {
            let vectors = self.embed_batch(sub_batch).await?;
            results.extend(vectors);
        }
        Ok(results)
    }
}

#[async_trait::async_trait]
impl<T: Embedder + ?Sized> SentenceEmbedder for T {
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.embed(texts).await.map_err(|e| anyhow::anyhow!(e.to_string()))
    }
}
