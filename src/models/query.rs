use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    pub chunk_id: String,
    pub excerpt: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyBreakdown {
    pub history_loaded_ms: u64,
    pub query_embedded_ms: u64,
    pub retrieved_ms: u64,
    pub reranked_ms: u64,
    pub compressed_ms: u64,
    pub generated_ms: u64,
    pub recorded_ms: u64,
}

/// Constructed by the Query Orchestrator (C13); optionally recorded into the
/// session's assistant message metadata and not persisted beyond that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub contexts_used: Vec<String>,
    pub token_usage: TokenUsage,
    pub latency_ms_breakdown: LatencyBreakdown,
    pub request_id: String,
    pub session_id: String,
    #[serde(default)]
    pub blocked: bool,
}
