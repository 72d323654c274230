use crate::state::AppState;
use axum::extract::State;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: &'static str,
    dependencies: HashMap<&'static str, Value>,
}

/// Probes every externally-reachable dependency directly rather than relying
/// on cached degradation state, so `/readiness` reflects the current moment.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let mut dependencies = HashMap::new();
    let mut all_ok = true;

    let db_ok = sqlx::query("SELECT 1").execute(state.db_pool.get_pool()).await.is_ok();
    dependencies.insert("database", dependency_status(db_ok));
    all_ok &= db_ok;

    let session_ok = state.session_store.ping().await.is_ok();
    dependencies.insert("session_store", dependency_status(session_ok));
    all_ok &= session_ok;

    let status = if all_ok { "ready" } else { "degraded" };
    let code = if all_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (code, Json(ReadinessResponse { status, dependencies }))
}

fn dependency_status(ok: bool) -> Value {
    serde_json::json!({ "ok": ok })
}
