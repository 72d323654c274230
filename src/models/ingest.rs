use serde::{Deserialize, Serialize};

/// One document's outcome within a (possibly partially-failed) ingest
/// submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocStatus {
    Complete {
        doc_id: String,
        filename: String,
        chunk_ids: Vec<String>,
    },
    Rejected {
        filename: String,
        reason: String,
    },
    PartialFailure {
        doc_id: String,
        filename: String,
        chunk_ids: Vec<String>,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IngestResponse {
    pub doc_ids: Vec<String>,
    pub chunk_ids: Vec<String>,
    pub per_doc_status: Vec<DocStatus>,
}
