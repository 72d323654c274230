use crate::services::embedding::Embedder;
use crate::utils::error::ApiError;
use crate::utils::similarity::cosine_similarity;
use once_cell::sync::Lazy;
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const WEIGHT_FAITHFULNESS: f32 = 0.30;
const WEIGHT_CORRECTNESS: f32 = 0.25;
const WEIGHT_PRECISION: f32 = 0.25;
const WEIGHT_RECALL: f32 = 0.15;
const WEIGHT_SAFETY: f32 = 0.05;

/// Deliberately small and conservative; flags only unambiguous slurs/threats
/// rather than attempting general content moderation.
static TOXIC_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)\bkill yourself\b",
        r"(?i)\bi hate (you|all)\b",
        r"(?i)\bidiot\b",
        r"(?i)\bstupid\b",
    ])
    .unwrap()
});

#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub question: String,
    pub answer: String,
    pub contexts: Vec<String>,
    pub ground_truth: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationScores {
    pub faithfulness: f32,
    pub correctness: f32,
    pub precision: f32,
    pub recall: f32,
    pub safety: f32,
    pub composite: f32,
}

/// RAGAS-adjacent scoring for `/evaluate`, built on C2's embeddings rather
/// than a dedicated NLI model. Each dimension is a cosine similarity against
/// an evidence anchor; `ground_truth`-dependent dimensions fall back to a
/// neutral 0.5 when it is absent, since there is nothing to compare against.
pub struct Evaluator {
    embedder: Arc<dyn Embedder>,
}

impl Evaluator {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub async fn evaluate(&self, input: EvaluationInput) -> Result<EvaluationScores, ApiError> {
        if input.answer.trim().is_empty() {
            return Err(ApiError::InvalidInput("answer must not be empty".to_string()));
        }

        let answer_embedding = self.embedder.embed_one(&input.answer).await?;

        let context_embeddings = if input.contexts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed(&input.contexts).await?
        };
        let context_centroid = centroid(&context_embeddings);

        let faithfulness = match &context_centroid {
            Some(c) => similarity_or_zero(&answer_embedding, c),
            None => 0.0,
        };

        let precision = if context_embeddings.is_empty() {
            0.0
        } else {
            let sum: f32 = context_embeddings
                .iter()
                .map(|c| similarity_or_zero(&answer_embedding, c))
                .sum();
            sum / context_embeddings.len() as f32
        };

        let (correctness, recall) = match &input.ground_truth {
            Some(gt) if !gt.trim().is_empty() => {
                let gt_embedding = self.embedder.embed_one(gt).await?;
                let correctness = similarity_or_zero(&answer_embedding, &gt_embedding);
                let recall = match &context_centroid {
                    Some(c) => similarity_or_zero(&gt_embedding, c),
                    None => 0.0,
                };
                (correctness, recall)
            }
            _ => (0.5, 0.5),
        };

        let safety = 1.0 - toxicity_fraction(&input.answer);

        let composite = WEIGHT_FAITHFULNESS * faithfulness
            + WEIGHT_CORRECTNESS * correctness
            + WEIGHT_PRECISION * precision
            + WEIGHT_RECALL * recall
            + WEIGHT_SAFETY * safety;

        Ok(EvaluationScores {
            faithfulness,
            correctness,
            precision,
            recall,
            safety,
            composite,
        })
    }
}

fn similarity_or_zero(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity(a, b).unwrap_or(0.0).max(0.0)
}

fn centroid(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let dim = first.len();
    let mut sum = vec![0.0f32; dim];
    for v in vectors {
        for (s, x) in sum.iter_mut().zip(v.iter()) {
            *s += x;
        }
    }
    let n = vectors.len() as f32;
    Some(sum.into_iter().map(|x| x / n).collect())
}

fn toxicity_fraction(text: &str) -> f32 {
    let matches = TOXIC_PATTERNS.matches(text).iter().count();
    if matches == 0 {
        0.0
    } else {
        (matches as f32 / TOXIC_PATTERNS.len() as f32).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubEmbedder;

    #[async_trait::async_trait]
    impl Embedder for StubEmbedder {
        fn dimension(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("paris") {
                        vec![1.0, 0.0, 0.0]
                    } else {
                        vec![0.0, 1.0, 0.0]
                    }
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn grounded_answer_scores_high_faithfulness() {
        let evaluator = Evaluator::new(Arc::new(StubEmbedder));
        let scores = evaluator
            .evaluate(EvaluationInput {
                question: "what is the capital of France?".into(),
                answer: "paris is the capital".into(),
                contexts: vec!["paris is the capital of france".into()],
                ground_truth: None,
            })
            .await
            .unwrap();
        assert!(scores.faithfulness > 0.9);
    }

    #[tokio::test]
    async fn ungrounded_answer_scores_low_faithfulness() {
        let evaluator = Evaluator::new(Arc::new(StubEmbedder));
        let scores = evaluator
            .evaluate(EvaluationInput {
                question: "what is the capital of France?".into(),
                answer: "paris is the capital".into(),
                contexts: vec!["completely unrelated text".into()],
                ground_truth: None,
            })
            .await
            .unwrap();
        assert!(scores.faithfulness < 0.1);
    }

    #[tokio::test]
    async fn missing_ground_truth_is_neutral() {
        let evaluator = Evaluator::new(Arc::new(StubEmbedder));
        let scores = evaluator
            .evaluate(EvaluationInput {
                question: "q".into(),
                answer: "a".into(),
                contexts: vec![],
                ground_truth: None,
            })
            .await
            .unwrap();
        assert_eq!(scores.correctness, 0.5);
        assert_eq!(scores.recall, 0.5);
    }

    #[tokio::test]
    async fn flags_toxic_language() {
        let evaluator = Evaluator::new(Arc::new(StubEmbedder));
        let scores = evaluator
            .evaluate(EvaluationInput {
                question: "q".into(),
                answer: "you are an idiot".into(),
                contexts: vec![],
                ground_truth: None,
            })
            .await
            .unwrap();
        assert!(scores.safety < 1.0);
    }

    #[tokio::test]
    async fn empty_answer_rejected() {
        let evaluator = Evaluator::new(Arc::new(StubEmbedder));
        let result = evaluator
            .evaluate(EvaluationInput {
                question: "q".into(),
                answer: "".into(),
                contexts: vec![],
                ground_truth: None,
            })
            .await;
        assert!(result.is_err());
    }
}
