use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub embedding: EmbeddingConfig,
    pub generator: GeneratorConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub admission: AdmissionConfig,
    pub deadlines: DeadlineConfig,
    pub session: SessionConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub pool_max_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// EMBED_DIM
    pub dimension: usize,
    /// EMBED_BATCH_MAX
    pub batch_max: usize,
    /// EMBED_TIMEOUT_S
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// MAX_GEN_TOKENS
    pub max_tokens: usize,
    /// GEN_TIMEOUT_S
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    /// CHUNK_MAX_CHARS
    pub max_chars: usize,
    /// CHUNK_MIN_CHARS
    pub min_chars: usize,
    /// CHUNK_OVERLAP_CHARS
    pub overlap_chars: usize,
    /// SEMANTIC_SIMILARITY_THRESHOLD
    pub similarity_threshold: f32,
    pub use_semantic: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    /// TOPK_DEFAULT
    pub topk_default: usize,
    /// TOPK_MAX
    pub topk_max: usize,
    /// CANDIDATE_MULTIPLIER
    pub candidate_multiplier: usize,
    /// CONTEXT_TOKEN_BUDGET
    pub context_token_budget: usize,
    pub rerank_weight_retrieval: f32,
    pub rerank_weight_semantic: f32,
    pub rerank_weight_length: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AdmissionConfig {
    pub max_request_bytes: u64,
    pub max_files_per_request: usize,
    pub rate_limit_per_minute: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeadlineConfig {
    pub query_deadline_seconds: u64,
    pub ingest_deadline_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub ttl_days: i64,
    pub recent_messages: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimitsConfig {
    pub embedding_concurrency: usize,
    pub db_search_concurrency: usize,
    pub llm_generate_concurrency: usize,
    /// per-task fan-out limit for parsing/embedding sub-steps
    pub fan_out_limit: usize,
    pub acquire_timeout_ms: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}
