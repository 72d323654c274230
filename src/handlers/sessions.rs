use crate::middleware::AuthenticatedUser;
use crate::models::session::SessionMeta;
use crate::state::AppState;
use crate::utils::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionMeta>,
}

pub async fn list_sessions_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    let limit = query.limit.clamp(1, 100);
    let sessions = state
        .session_store
        .list_sessions(&user.user_id, limit, query.offset)
        .await?;
    Ok(Json(ListSessionsResponse { sessions }))
}

pub async fn delete_session_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let owner = state.session_store.owner(&session_id).await?;
    match owner {
        None => return Err(ApiError::NotFound(format!("no session {session_id}"))),
        Some(owner_id) if owner_id != user.user_id => {
            return Err(ApiError::Forbidden("session belongs to another user".to_string()))
        }
        Some(_) => {}
    }

    state.session_store.delete(&session_id, &user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
