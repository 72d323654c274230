use crate::utils::similarity::cosine_similarity;
use anyhow::Result;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub start_pos: usize,
    pub end_pos: usize,
}

#[derive(Debug, Clone)]
pub struct ChunkerOptions {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub overlap: usize,
    pub use_semantic: bool,
    pub similarity_threshold: f32,
}

impl Default for ChunkerOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 2800,
            min_chunk_size: 500,
            overlap: 256,
            use_semantic: true,
            similarity_threshold: 0.75,
        }
    }
}

/// Abstraction the chunker needs from C2 to do semantic, sentence-boundary
/// chunking. Kept narrow (batch embedding of plain strings) so the chunker
/// does not depend on the full embedder service.
#[async_trait::async_trait]
pub trait SentenceEmbedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub struct TextChunker {
    opts: ChunkerOptions,
}

impl TextChunker {
    pub fn new(opts: ChunkerOptions) -> Self {
        Self { opts }
    }

    pub async fn chunk(
        &self,
        text: &str,
        embedder: Option<&dyn SentenceEmbedder>,
    ) -> Result<Vec<Chunk>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let sentences: Vec<&str> = split_sentences(text);

        if self.opts.use_semantic && sentences.len() > 1 {
            if let Some(embedder) = embedder {
                let owned: Vec<String> = sentences.iter().map(|s| s.to_string()).collect();
                let embeddings = embedder.embed_batch(&owned).await?;
                return self.chunk_semantic(text, &sentences, &embeddings);
            }
        }

        Ok(self.chunk_fallback(text))
    }

    fn chunk_semantic(
        &self,
        text: &str,
        sentences: &[&str],
        embeddings: &[Vec<f32>],
    ) -> Result<Vec<Chunk>> {
        // boundary_sim[i] = similarity between sentence i and sentence i+1
        let mut boundary_sim = Vec::with_capacity(sentences.len().saturating_sub(1));
        for i in 0..sentences.len().saturating_sub(1) {
            let sim = cosine_similarity(&embeddings[i], &embeddings[i + 1]).unwrap_or(1.0);
            boundary_sim.push(sim);
        }

        // groups[i] = list of sentence indices composing raw chunk i
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = vec![0];
        let mut current_len = sentences[0].len();

        for i in 1..sentences.len() {
            let sim_drop = boundary_sim[i - 1] < self.opts.similarity_threshold;
            let would_exceed = current_len + sentences[i].len() > self.opts.max_chunk_size;
            if sim_drop || would_exceed {
                groups.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(i);
            current_len += sentences[i].len();
        }
        if !current.is_empty() {
            groups.push(current);
        }

        merge_small_groups(&mut groups, sentences, &boundary_sim, self.opts.min_chunk_size);

        // Materialize char offsets by walking the original text.
        let sentence_offsets = compute_offsets(text, sentences);

        let mut chunks = Vec::with_capacity(groups.len());
        let mut prev_tail = String::new();
        for group in &groups {
            let first_idx = *group.first().unwrap();
            let last_idx = *group.last().unwrap();
            let start_pos = sentence_offsets[first_idx].0;
            let end_pos = sentence_offsets[last_idx].1;

            let mut content = String::new();
            if !prev_tail.is_empty() {
                content.push_str(&prev_tail);
            }
            for (i, idx) in group.iter().enumerate() {
                if i > 0 {
                    content.push(' ');
                }
                content.push_str(sentences[*idx]);
            }

            prev_tail = tail_chars(&content, self.opts.overlap);

            chunks.push(Chunk {
                content,
                start_pos,
                end_pos,
            });
        }

        Ok(chunks)
    }

    fn chunk_fallback(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let total_len = chars.len();
        let mut chunks = Vec::new();

        if total_len == 0 {
            return chunks;
        }

        let step = self.opts.max_chunk_size.saturating_sub(self.opts.overlap).max(1);
        let mut start = 0;

        while start < total_len {
            let mut end = std::cmp::min(start + self.opts.max_chunk_size, total_len);

            if end < total_len {
                // Snap to the nearest sentence terminator within the last 10% of the window.
                let search_from = start + (self.opts.max_chunk_size * 9 / 10);
                if let Some(snap) = find_sentence_boundary(&chars, search_from.max(start), end) {
                    end = snap;
                }
            }

            let content: String = chars[start..end].iter().collect();
            chunks.push(Chunk {
                content,
                start_pos: start,
                end_pos: end,
            });

            if end >= total_len {
                break;
            }
            start += step;
        }

        chunks
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    let sentences: Vec<&str> = text
        .unicode_sentences()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !sentences.is_empty() {
        return sentences;
    }
    vec![text.trim()].into_iter().filter(|s| !s.is_empty()).collect()
}

fn merge_small_groups(
    groups: &mut Vec<Vec<usize>>,
    sentences: &[&str],
    boundary_sim: &[f32],
    min_chunk_size: usize,
) {
    let group_len = |g: &[usize]| -> usize { g.iter().map(|i| sentences[*i].len()).sum() };

    let mut i = 0;
    while i < groups.len() {
        if groups.len() <= 1 || group_len(&groups[i]) >= min_chunk_size {
            i += 1;
            continue;
        }

        let sim_to_prev = if i > 0 {
            let prev_last = *groups[i - 1].last().unwrap();
            boundary_sim.get(prev_last).copied().unwrap_or(0.0)
        } else {
            -2.0 // no previous neighbor
        };
        let sim_to_next = if i + 1 < groups.len() {
            let this_last = *groups[i].last().unwrap();
            boundary_sim.get(this_last).copied().unwrap_or(0.0)
        } else {
            -2.0 // no next neighbor
        };

        if sim_to_prev < -1.0 && sim_to_next < -1.0 {
            // only group left, nothing to merge with
            break;
        } else if sim_to_next > sim_to_prev {
            let next = groups.remove(i + 1);
            groups[i].extend(next);
        } else {
            // tie or prev wins -> merge with previous
            let this = groups.remove(i);
            groups[i - 1].extend(this);
            i -= 1;
        }
    }
}

fn compute_offsets(text: &str, sentences: &[&str]) -> Vec<(usize, usize)> {
    let mut offsets = Vec::with_capacity(sentences.len());
    let mut cursor = 0usize;
    for s in sentences {
        let rel = text[cursor..].find(s).unwrap_or(0);
        let start = cursor + rel;
        let end = start + s.chars().count();
        offsets.push((start, end));
        cursor = end;
    }
    offsets
}

fn tail_chars(s: &str, n: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= n {
        chars.into_iter().collect()
    } else {
        chars[chars.len() - n..].iter().collect()
    }
}

fn find_sentence_boundary(chars: &[char], from: usize, to: usize) -> Option<usize> {
    const TERMINATORS: [char; 3] = ['.', '!', '?'];
    for i in (from..to).rev() {
        if TERMINATORS.contains(&chars[i]) {
            return Some((i + 1).min(to));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_chunks_short_text_whole() {
        let chunker = TextChunker::new(ChunkerOptions {
            use_semantic: false,
            ..Default::default()
        });
        let chunks = chunker.chunk_fallback("hello world");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello world");
    }

    #[test]
    fn fallback_respects_overlap() {
        let chunker = TextChunker::new(ChunkerOptions {
            max_chunk_size: 10,
            overlap: 3,
            use_semantic: false,
            ..Default::default()
        });
        let text = "a".repeat(25);
        let chunks = chunker.chunk_fallback(&text);
        assert!(chunks.len() > 1);
        for w in chunks.windows(2) {
            assert!(w[1].start_pos < w[0].end_pos);
        }
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = TextChunker::new(ChunkerOptions::default());
        assert!(chunker.chunk_fallback("").is_empty());
    }
}
