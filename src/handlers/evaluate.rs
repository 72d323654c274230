use crate::middleware::AuthenticatedUser;
use crate::services::evaluator::{EvaluationInput, EvaluationScores};
use crate::state::AppState;
use crate::utils::error::ApiError;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct EvaluateBody {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub contexts: Vec<String>,
    pub ground_truth: Option<String>,
}

pub async fn evaluate_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<EvaluateBody>,
) -> Result<Json<EvaluationScores>, ApiError> {
    let scores = state
        .evaluator
        .evaluate(EvaluationInput {
            question: body.question,
            answer: body.answer,
            contexts: body.contexts,
            ground_truth: body.ground_truth,
        })
        .await?;

    Ok(Json(scores))
}
