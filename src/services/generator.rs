use crate::config::settings::GeneratorConfig;
use crate::models::query::Citation;
use crate::models::session::{Message, Role};
use crate::services::compressor::CompressedChunk;
use crate::utils::error::{ApiError, Dependency};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const NO_EVIDENCE_ANSWER: &str = "I cannot answer from the available evidence.";
const SAFETY_REFUSAL_ANSWER: &str = "<safety-refusal>";

static CITATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d+)\]").unwrap());

#[derive(Debug, Clone, Default)]
pub struct GenerateResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub blocked: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// C9. Builds a grounded prompt from (query, compressed contexts, recent
/// history), calls the LM, returns `{answer, citations, token counts}`.
/// Per the anti-hallucination invariant, this is never called without an
/// evidence hint — either real contexts or an explicit "no evidence found"
/// note.
pub struct Generator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: usize,
    timeout: Duration,
}

impl Generator {
    pub fn new(cfg: GeneratorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()
            .expect("generator http client");

        Self {
            client,
            base_url: cfg.base_url,
            model: cfg.model,
            api_key: cfg.api_key,
            max_tokens: cfg.max_tokens,
            timeout: Duration::from_secs(cfg.timeout_seconds),
        }
    }

    pub async fn generate(
        &self,
        query: &str,
        contexts: &[CompressedChunk],
        history: &[Message],
    ) -> Result<GenerateResult, ApiError> {
        if contexts.is_empty() {
            return Ok(GenerateResult {
                answer: NO_EVIDENCE_ANSWER.to_string(),
                citations: Vec::new(),
                prompt_tokens: 0,
                completion_tokens: 0,
                blocked: false,
            });
        }

        let system = build_system_instructions(contexts);
        let user = build_user_message(query, contexts, history);

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens: self.max_tokens,
            stream: false,
        };

        let call = self.call(&request);
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ApiError::dependency(
                    Dependency::Generation,
                    false,
                    format!("generation timed out after {}s", self.timeout.as_secs()),
                ));
            }
        };

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::dependency(Dependency::Generation, true, "empty completion response"))?;

        let usage = response.usage.unwrap_or_default();

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Ok(GenerateResult {
                answer: SAFETY_REFUSAL_ANSWER.to_string(),
                citations: Vec::new(),
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                blocked: true,
            });
        }

        let citations = extract_citations(&choice.message.content, contexts);

        Ok(GenerateResult {
            answer: choice.message.content,
            citations,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            blocked: false,
        })
    }

    async fn call(&self, request: &ChatCompletionRequest<'_>) -> Result<ChatCompletionResponse, ApiError> {
        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ApiError::dependency(Dependency::Generation, true, e.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|e| ApiError::dependency(Dependency::Generation, true, e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| ApiError::dependency(Dependency::Generation, true, format!("malformed completion: {e}")))
    }
}

fn build_system_instructions(contexts: &[CompressedChunk]) -> String {
    let mut instructions = String::new();
    instructions.push_str("Answer only from the evidence provided below; if the evidence is insufficient, say so explicitly. ");
    instructions.push_str("Cite evidence by its numeric index in square brackets, e.g. [1].");

    let contexts_pii: Vec<Vec<crate::models::document::PiiCategory>> =
        contexts.iter().map(|c| c.pii_categories.clone()).collect();
    if let Some(instr) = redaction_instruction(&contexts_pii) {
        instructions.push(' ');
        instructions.push_str(&instr);
    }

    instructions
}

fn build_user_message(query: &str, contexts: &[CompressedChunk], history: &[Message]) -> String {
    let mut out = String::new();

    out.push_str("RECENT DIALOG:\n");
    if history.is_empty() {
        out.push_str("(none)\n");
    } else {
        for m in history.iter().take(6) {
            let role = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            out.push_str(&format!("{role}: {}\n", m.content));
        }
    }

    out.push_str("\nEVIDENCE:\n");
    for (i, ctx) in contexts.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", i + 1, ctx.text));
    }

    out.push_str(&format!("\nQUESTION:\n{query}\n"));
    out
}

/// System instructions additionally call out PII categories present across
/// the contexts, per §4.9's redaction-instruction clause.
pub fn redaction_instruction(contexts_pii: &[Vec<crate::models::document::PiiCategory>]) -> Option<String> {
    let mut categories: Vec<&str> = contexts_pii
        .iter()
        .flatten()
        .map(|c| c.as_str())
        .collect();
    categories.sort_unstable();
    categories.dedup();
    if categories.is_empty() {
        None
    } else {
        Some(format!(
            "Some evidence contains personal data in these categories: {}. Redact these categories from your answer.",
            categories.join(", ")
        ))
    }
}

fn extract_citations(answer: &str, contexts: &[CompressedChunk]) -> Vec<Citation> {
    let mut seen = std::collections::HashSet::new();
    let mut citations = Vec::new();

    for cap in CITATION_RE.captures_iter(answer) {
        let k: usize = match cap[1].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        if k == 0 || k > contexts.len() {
            continue; // unresolvable, silently dropped
        }
        let ctx = &contexts[k - 1];
        if !seen.insert(ctx.chunk_id.clone()) {
            continue; // duplicate, first-seen order preserved
        }
        citations.push(Citation {
            doc_id: ctx.doc_id.clone(),
            chunk_id: ctx.chunk_id.clone(),
            excerpt: ctx.text.chars().take(300).collect(),
            score: ctx.score,
        });
    }

    citations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(id: &str, text: &str) -> CompressedChunk {
        CompressedChunk {
            chunk_id: id.into(),
            doc_id: "d1".into(),
            text: text.into(),
            score: 0.9,
            pii_categories: vec![],
        }
    }

    #[test]
    fn extracts_and_dedups_citations() {
        let contexts = vec![ctx("c1", "support hours are 9-5"), ctx("c2", "email us")];
        let citations = extract_citations("Our hours are 9-5 [1][1][2]", &contexts);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].chunk_id, "c1");
        assert_eq!(citations[1].chunk_id, "c2");
    }

    #[test]
    fn drops_out_of_range_citations() {
        let contexts = vec![ctx("c1", "text")];
        let citations = extract_citations("see [5]", &contexts);
        assert!(citations.is_empty());
    }

    #[test]
    fn redaction_instruction_names_categories() {
        use crate::models::document::PiiCategory;
        let instr = redaction_instruction(&[vec![PiiCategory::Email]]);
        assert!(instr.unwrap().contains("email"));
    }
}
