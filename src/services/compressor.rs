use crate::services::reranker::RankedChunk;
use crate::utils::token_estimator::estimate_tokens;

#[derive(Debug, Clone)]
pub struct CompressedChunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub text: String,
    pub score: f32,
    pub pii_categories: Vec<crate::models::document::PiiCategory>,
}

/// C8. Ranks candidates by reranker score (assumed pre-sorted), greedily
/// accepts in order until accepting the next would exceed `max_tokens`
/// (estimated as `ceil(len/4)` — pinned for reproducibility). The candidate
/// that would overflow the budget contributes a sentence-complete prefix of
/// itself instead of being dropped, when one fits.
pub struct ContextCompressor;

impl ContextCompressor {
    pub fn compress(query: &str, candidates: &[RankedChunk], max_tokens: usize) -> Vec<CompressedChunk> {
        let _ = query; // query is part of the public contract; this implementation ranks purely on pre-sorted order.
        let mut accepted = Vec::new();
        let mut used_tokens = 0usize;

        let mut iter = candidates.iter().peekable();
        while let Some(candidate) = iter.peek() {
            let cand_tokens = estimate_tokens(&candidate.candidate.text);
            if used_tokens + cand_tokens > max_tokens {
                let remaining = max_tokens.saturating_sub(used_tokens);
                if let Some(prefix) = sentence_prefix(&candidate.candidate.text, remaining) {
                    if !prefix.is_empty() {
                        accepted.push(CompressedChunk {
                            chunk_id: candidate.candidate.chunk_id.clone(),
                            doc_id: candidate.candidate.doc_id.clone(),
                            text: prefix,
                            score: candidate.combined_score,
                            pii_categories: candidate.candidate.pii_categories.clone(),
                        });
                    }
                } else if accepted.is_empty() {
                    // Guarantee at least one non-empty candidate is returned.
                    accepted.push(CompressedChunk {
                        chunk_id: candidate.candidate.chunk_id.clone(),
                        doc_id: candidate.candidate.doc_id.clone(),
                        text: candidate.candidate.text.clone(),
                        score: candidate.combined_score,
                        pii_categories: candidate.candidate.pii_categories.clone(),
                    });
                }
                break;
            }

            accepted.push(CompressedChunk {
                chunk_id: candidate.candidate.chunk_id.clone(),
                doc_id: candidate.candidate.doc_id.clone(),
                text: candidate.candidate.text.clone(),
                score: candidate.combined_score,
                pii_categories: candidate.candidate.pii_categories.clone(),
            });
            used_tokens += cand_tokens;
            iter.next();
        }

        accepted
    }
}

/// Returns the longest prefix of `text` that fits within `max_tokens` and
/// ends at a complete sentence boundary, or `None` if even the first
/// sentence does not fit.
fn sentence_prefix(text: &str, max_tokens: usize) -> Option<String> {
    if max_tokens == 0 {
        return None;
    }
    const TERMINATORS: [char; 3] = ['.', '!', '?'];
    let mut best: Option<String> = None;
    let mut cursor = 0usize;
    let chars: Vec<char> = text.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if TERMINATORS.contains(c) {
            let candidate: String = chars[..=i].iter().collect();
            if estimate_tokens(&candidate) <= max_tokens {
                best = Some(candidate);
                cursor = i + 1;
            } else {
                break;
            }
        }
    }
    let _ = cursor;
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::reranker::RerankCandidate;

    fn ranked(id: &str, text: &str, score: f32) -> RankedChunk {
        RankedChunk {
            candidate: RerankCandidate {
                chunk_id: id.into(),
                doc_id: "d".into(),
                text: text.into(),
                retrieval_score: score,
                pii_categories: vec![],
            },
            combined_score: score,
        }
    }

    #[test]
    fn never_exceeds_budget() {
        let candidates = vec![
            ranked("a", &"word ".repeat(200), 0.9),
            ranked("b", &"word ".repeat(200), 0.8),
        ];
        let result = ContextCompressor::compress("q", &candidates, 50);
        let total: usize = result.iter().map(|c| estimate_tokens(&c.text)).sum();
        assert!(total <= 50);
    }

    #[test]
    fn returns_at_least_one_for_nonempty_input() {
        let candidates = vec![ranked("a", &"word ".repeat(500), 0.9)];
        let result = ContextCompressor::compress("q", &candidates, 5);
        assert!(!result.is_empty());
    }

    #[test]
    fn order_preserved() {
        let candidates = vec![ranked("a", "short one.", 0.9), ranked("b", "short two.", 0.8)];
        let result = ContextCompressor::compress("q", &candidates, 1000);
        assert_eq!(result[0].chunk_id, "a");
        assert_eq!(result[1].chunk_id, "b");
    }
}
