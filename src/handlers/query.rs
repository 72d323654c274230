use crate::middleware::AuthenticatedUser;
use crate::models::query::QueryResult;
use crate::services::admission::Admission;
use crate::services::query_orchestrator::QueryRequest;
use crate::state::AppState;
use crate::utils::error::ApiError;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub question: String,
    pub top_k: Option<usize>,
    pub session_id: Option<String>,
    #[serde(default = "default_use_history")]
    pub use_history: bool,
}

fn default_use_history() -> bool {
    true
}

pub async fn query_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<QueryBody>,
) -> Result<Json<QueryResult>, ApiError> {
    if body.question.trim().is_empty() {
        return Err(ApiError::InvalidInput("question must not be empty".to_string()));
    }

    match state.admission.admit(&user.user_id) {
        Admission::Ok => {}
        Admission::Throttled { retry_after_secs } => {
            return Err(ApiError::Throttled { retry_after_secs })
        }
    }

    let result = state
        .query_orchestrator
        .query(QueryRequest {
            user_id: user.user_id,
            question: body.question,
            session_id: body.session_id,
            top_k: body.top_k,
            use_history: body.use_history,
        })
        .await?;

    Ok(Json(result))
}
