use crate::middleware::AuthenticatedUser;
use crate::services::admission::Admission;
use crate::services::{IngestFile, IngestOrchestrator};
use crate::state::AppState;
use crate::utils::error::ApiError;
use axum::extract::{Multipart, State};
use axum::Json;
use std::sync::Arc;
use tracing::info;

use crate::models::ingest::IngestResponse;

pub async fn ingest_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ApiError> {
    match state.admission.admit(&user.user_id) {
        Admission::Ok => {}
        Admission::Throttled { retry_after_secs } => {
            return Err(ApiError::Throttled { retry_after_secs })
        }
    }

    let mut files: Vec<IngestFile> = Vec::new();
    let mut total_bytes: u64 = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidInput("file part is missing a filename".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidInput(format!("failed to read file body: {e}")))?;

        total_bytes += bytes.len() as u64;
        files.push(IngestFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(ApiError::InvalidInput("request must contain at least one file".to_string()));
    }

    state.admission.check_ingest_size(total_bytes, files.len())?;

    info!(user_id = %user.user_id, file_count = files.len(), total_bytes, "ingest request received");

    let orchestrator: Arc<IngestOrchestrator> = state.ingest_orchestrator.clone();
    let response = orchestrator.ingest(&user.user_id, files).await?;

    let failed = response
        .per_doc_status
        .iter()
        .filter(|s| matches!(s, crate::models::ingest::DocStatus::Rejected { .. } | crate::models::ingest::DocStatus::PartialFailure { .. }))
        .count();
    let total = response.per_doc_status.len();

    if failed > 0 && failed == total {
        return Err(ApiError::PartialFailure {
            any_succeeded: false,
            failed,
            total,
        });
    }

    Ok(Json(response))
}
