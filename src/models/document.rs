use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed set of PII categories C6 can detect. See `document::pii`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Email,
    Phone,
    NationalId,
    CreditCard,
}

impl PiiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiCategory::Email => "email",
            PiiCategory::Phone => "phone",
            PiiCategory::NationalId => "national_id",
            PiiCategory::CreditCard => "credit_card",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Pdf,
    Docx,
    Html,
    Txt,
}

impl ContentType {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit('.').next()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(ContentType::Pdf),
            "docx" | "doc" => Some(ContentType::Docx),
            "html" | "htm" => Some(ContentType::Html),
            "txt" | "md" => Some(ContentType::Txt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Pdf => "pdf",
            ContentType::Docx => "docx",
            ContentType::Html => "html",
            ContentType::Txt => "txt",
        }
    }
}

/// A durable document record. Created exactly once per successful upload;
/// never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub original_filename: String,
    pub content_type: ContentType,
    pub byte_length: u64,
    pub uploader_id: String,
    pub created_at: DateTime<Utc>,
    pub sha256: String,
    pub object_ref: String,
}

/// A bounded, addressable fragment of a document's text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub ordinal: i32,
    pub text: String,
    /// Opaque reference to the vector in the Vector Index; absent if the
    /// embedding step failed and indexing was deferred.
    pub embedding_ref: Option<String>,
    pub pii_categories: Vec<PiiCategory>,
    pub restricts: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    pub fn has_pii(&self) -> bool {
        !self.pii_categories.is_empty()
    }
}
