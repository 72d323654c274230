use chrono::{DateTime, Utc};
use serde::Serialize;

/// The pipeline stage or endpoint an activity record describes. Deliberately
/// flat (not per-component) since this sink is for cross-cutting
/// observability, not a replacement for each component's own `tracing` spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    IngestReceived,
    IngestCompleted,
    IngestPartialFailure,
    QueryReceived,
    QueryCompleted,
    Throttled,
    DependencyDegraded,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IngestReceived => "ingest_received",
            Self::IngestCompleted => "ingest_completed",
            Self::IngestPartialFailure => "ingest_partial_failure",
            Self::QueryReceived => "query_received",
            Self::QueryCompleted => "query_completed",
            Self::Throttled => "throttled",
            Self::DependencyDegraded => "dependency_degraded",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
    pub request_id: String,
    pub user_id: String,
    pub kind: ActivityKind,
    pub detail: Option<String>,
    pub latency_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(request_id: impl Into<String>, user_id: impl Into<String>, kind: ActivityKind) -> Self {
        Self {
            request_id: request_id.into(),
            user_id: user_id.into(),
            kind,
            detail: None,
            latency_ms: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}
