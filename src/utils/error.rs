use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Sub-kinds of `DependencyUnavailable`, each naming the external collaborator
/// that failed and carrying whether a retry is worth attempting upstream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    #[error("embedder unavailable")]
    Embedding,
    #[error("vector index unavailable")]
    VectorIndex,
    #[error("chunk store unavailable")]
    ChunkStore,
    #[error("object store unavailable")]
    ObjectStore,
    #[error("generation unavailable")]
    Generation,
    #[error("session store unavailable")]
    SessionStore,
}

impl Dependency {
    fn as_str(&self) -> &'static str {
        match self {
            Dependency::Embedding => "EmbeddingUnavailable",
            Dependency::VectorIndex => "VectorIndexUnavailable",
            Dependency::ChunkStore => "ChunkStoreUnavailable",
            Dependency::ObjectStore => "ObjectStoreUnavailable",
            Dependency::Generation => "GenerationUnavailable",
            Dependency::SessionStore => "SessionStoreUnavailable",
        }
    }
}

/// The error taxonomy a request can fail with. Orchestrators translate
/// component-local errors into one of these; no raw upstream error text
/// ever reaches the client.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("throttled, retry after {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    #[error("request too large: {0}")]
    RequestTooLarge(String),

    #[error("dependency unavailable: {dependency}")]
    DependencyUnavailable {
        dependency: Dependency,
        transient: bool,
        detail: String,
    },

    /// Ingest: some documents succeeded, some failed. `any_succeeded` decides
    /// whether the response is 200 (with per-doc statuses) or 507.
    #[error("partial failure: {failed} of {total} documents failed")]
    PartialFailure {
        any_succeeded: bool,
        failed: usize,
        total: usize,
    },

    #[error("deadline exceeded at stage {stage}")]
    DeadlineExceeded { stage: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn dependency(dependency: Dependency, transient: bool, detail: impl Into<String>) -> Self {
        ApiError::DependencyUnavailable {
            dependency,
            transient,
            detail: detail.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, retry_after): (StatusCode, &str, String, Option<u64>) =
            match self {
                ApiError::InvalidInput(msg) => {
                    tracing::warn!(error = %msg, "invalid input");
                    (StatusCode::BAD_REQUEST, "InvalidInput", msg, None)
                }
                ApiError::Unauthorized(msg) => {
                    tracing::warn!(error = %msg, "unauthorized");
                    (StatusCode::UNAUTHORIZED, "Unauthorized", msg, None)
                }
                ApiError::Forbidden(msg) => {
                    tracing::warn!(error = %msg, "forbidden");
                    (StatusCode::FORBIDDEN, "Forbidden", msg, None)
                }
                ApiError::NotFound(msg) => {
                    tracing::warn!(error = %msg, "not found");
                    (StatusCode::NOT_FOUND, "NotFound", msg, None)
                }
                ApiError::Throttled { retry_after_secs } => {
                    tracing::warn!(retry_after_secs, "throttled");
                    (
                        StatusCode::TOO_MANY_REQUESTS,
                        "Throttled",
                        format!("rate limit exceeded, retry after {retry_after_secs}s"),
                        Some(retry_after_secs),
                    )
                }
                ApiError::RequestTooLarge(msg) => {
                    tracing::warn!(error = %msg, "request too large");
                    (StatusCode::PAYLOAD_TOO_LARGE, "RequestTooLarge", msg, None)
                }
                ApiError::DependencyUnavailable {
                    dependency,
                    transient,
                    detail,
                } => {
                    tracing::error!(dependency = dependency.as_str(), transient, detail = %detail, "dependency unavailable");
                    let status = if dependency == Dependency::VectorIndex {
                        StatusCode::from_u16(424).unwrap()
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    (status, dependency.as_str(), detail, None)
                }
                ApiError::PartialFailure {
                    any_succeeded,
                    failed,
                    total,
                } => {
                    let msg = format!("{failed} of {total} documents failed to ingest");
                    tracing::warn!(failed, total, any_succeeded, "partial ingest failure");
                    let status = if any_succeeded {
                        StatusCode::OK
                    } else {
                        StatusCode::from_u16(507).unwrap()
                    };
                    (status, "PartialFailure", msg, None)
                }
                ApiError::DeadlineExceeded { stage } => {
                    tracing::warn!(stage = %stage, "deadline exceeded");
                    (
                        StatusCode::GATEWAY_TIMEOUT,
                        "DeadlineExceeded",
                        format!("deadline exceeded at stage {stage}"),
                        None,
                    )
                }
                ApiError::Internal(msg) => {
                    tracing::error!(error = %msg, "internal error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal", msg, None)
                }
            };

        let body = Json(ErrorBody {
            error: error_type.to_string(),
            message,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            let mut headers = HeaderMap::new();
            if let Ok(v) = HeaderValue::from_str(&secs.to_string()) {
                headers.insert("Retry-After", v);
            }
            response.headers_mut().extend(headers);
        }
        response
    }
}
