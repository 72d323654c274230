use crate::middleware::AuthenticatedUser;
use crate::models::session::Message;
use crate::state::AppState;
use crate::utils::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub total_count: usize,
}

pub async fn history_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let owner = state.session_store.owner(&session_id).await?;
    match owner {
        None => return Err(ApiError::NotFound(format!("no session {session_id}"))),
        Some(owner_id) if owner_id != user.user_id => {
            return Err(ApiError::Forbidden("session belongs to another user".to_string()))
        }
        Some(_) => {}
    }

    let limit = query.limit.clamp(1, 200);
    let all = state.session_store.recent(&session_id, limit + query.offset).await?;
    let total_count = all.len();
    let messages = all.into_iter().skip(query.offset).take(limit).collect();

    Ok(Json(HistoryResponse {
        session_id,
        messages,
        total_count,
    }))
}
