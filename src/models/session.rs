use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// Optional metadata carried only on assistant messages, per §9's tagged
/// `Message = User{..} | Assistant{.., token_usage, citations, latency_ms_breakdown}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub citations: Vec<super::query::Citation>,
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "is_default_metadata")]
    pub metadata: MessageMetadata,
}

fn is_default_metadata(m: &MessageMetadata) -> bool {
    m.prompt_tokens.is_none() && m.completion_tokens.is_none() && m.citations.is_empty() && m.latency_ms.is_none()
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: MessageMetadata::default(),
        }
    }

    pub fn assistant(content: impl Into<String>, metadata: MessageMetadata) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub title: String,
    pub message_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: String,
    pub title: String,
    pub last_activity_at: DateTime<Utc>,
    pub message_count: u64,
}

impl From<Session> for SessionMeta {
    fn from(s: Session) -> Self {
        SessionMeta {
            session_id: s.session_id,
            title: s.title,
            last_activity_at: s.last_activity_at,
            message_count: s.message_count,
        }
    }
}

pub fn derive_title(first_message: &str) -> String {
    const MAX_LEN: usize = 60;
    let trimmed = first_message.trim();
    if trimmed.chars().count() <= MAX_LEN {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(MAX_LEN).collect();
        format!("{truncated}…")
    }
}
