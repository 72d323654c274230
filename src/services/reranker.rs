use crate::config::settings::RetrievalConfig;
use crate::services::embedding::Embedder;
use crate::utils::error::ApiError;
use crate::utils::similarity::cosine_similarity;

#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub chunk_id: String,
    pub doc_id: String,
    pub text: String,
    pub retrieval_score: f32,
    pub pii_categories: Vec<crate::models::document::PiiCategory>,
}

#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub candidate: RerankCandidate,
    pub combined_score: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RerankWeights {
    pub retrieval: f32,
    pub semantic: f32,
    pub length: f32,
}

impl From<&RetrievalConfig> for RerankWeights {
    fn from(cfg: &RetrievalConfig) -> Self {
        Self {
            retrieval: cfg.rerank_weight_retrieval,
            semantic: cfg.rerank_weight_semantic,
            length: cfg.rerank_weight_length,
        }
    }
}

/// C7. Re-scores a candidate list against a query using a combined signal:
/// lexical/retrieval strength, fresh semantic similarity, and a length
/// prior rewarding substantive chunks.
pub struct Reranker {
    weights: RerankWeights,
}

impl Reranker {
    pub fn new(weights: RerankWeights) -> Self {
        Self { weights }
    }

    pub async fn rerank(
        &self,
        query_embedding: &[f32],
        candidates: Vec<RerankCandidate>,
        top_k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<RankedChunk>, ApiError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let prefixes: Vec<String> = candidates
            .iter()
            .map(|c| c.text.chars().take(1000).collect())
            .collect();
        let candidate_embeddings = embedder.embed(&prefixes).await?;

        let max_score = candidates
            .iter()
            .map(|c| c.retrieval_score)
            .fold(f32::MIN, f32::max);
        let min_score = candidates
            .iter()
            .map(|c| c.retrieval_score)
            .fold(f32::MAX, f32::min);
        let spread = max_score - min_score;

        let mut ranked: Vec<RankedChunk> = candidates
            .into_iter()
            .zip(candidate_embeddings.iter())
            .map(|(candidate, cand_emb)| {
                let normalized_retrieval = if spread.abs() < f32::EPSILON {
                    1.0
                } else {
                    (candidate.retrieval_score - min_score) / spread
                };
                let semantic_sim = cosine_similarity(query_embedding, cand_emb).unwrap_or(0.0);
                let length_prior = (candidate.text.chars().count() as f32 / 1500.0).min(1.0);

                let combined = self.weights.retrieval * normalized_retrieval
                    + self.weights.semantic * semantic_sim
                    + self.weights.length * length_prior;

                RankedChunk {
                    candidate,
                    combined_score: combined,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.candidate
                        .retrieval_score
                        .partial_cmp(&a.candidate.retrieval_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.candidate.chunk_id.cmp(&b.candidate.chunk_id))
        });

        ranked.truncate(top_k.min(ranked.len()));
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubEmbedder {
        dim: usize,
    }

    #[async_trait::async_trait]
    impl Embedder for StubEmbedder {
        fn dimension(&self) -> usize {
            self.dim
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(texts.iter().map(|_| vec![1.0; self.dim]).collect())
        }
    }

    #[tokio::test]
    async fn longer_extension_never_scores_lower() {
        let reranker = Reranker::new(RerankWeights {
            retrieval: 0.50,
            semantic: 0.35,
            length: 0.15,
        });
        let embedder = StubEmbedder { dim: 4 };
        let query_embedding = vec![1.0; 4];

        let a = RerankCandidate {
            chunk_id: "a".into(),
            doc_id: "d".into(),
            text: "short text".into(),
            retrieval_score: 0.5,
            pii_categories: vec![],
        };
        let b = RerankCandidate {
            chunk_id: "b".into(),
            doc_id: "d".into(),
            text: "short text that is much longer and extends the original".into(),
            retrieval_score: 0.5,
            pii_categories: vec![],
        };

        let ranked = reranker
            .rerank(&query_embedding, vec![a.clone(), b.clone()], 2, &embedder)
            .await
            .unwrap();

        let score_a = ranked.iter().find(|r| r.candidate.chunk_id == "a").unwrap().combined_score;
        let score_b = ranked.iter().find(|r| r.candidate.chunk_id == "b").unwrap().combined_score;
        assert!(score_b >= score_a);
    }

    #[tokio::test]
    async fn returns_min_of_top_k_and_len() {
        let reranker = Reranker::new(RerankWeights {
            retrieval: 0.50,
            semantic: 0.35,
            length: 0.15,
        });
        let embedder = StubEmbedder { dim: 4 };
        let candidates = vec![
            RerankCandidate { chunk_id: "a".into(), doc_id: "d".into(), text: "x".into(), retrieval_score: 0.1, pii_categories: vec![] },
            RerankCandidate { chunk_id: "b".into(), doc_id: "d".into(), text: "y".into(), retrieval_score: 0.2, pii_categories: vec![] },
        ];
        let ranked = reranker.rerank(&vec![1.0; 4], candidates, 10, &embedder).await.unwrap();
        assert_eq!(ranked.len(), 2);
    }
}
