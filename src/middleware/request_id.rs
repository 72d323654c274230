use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Request identity extension attached to every request, echoed on the
/// response and threaded through every log line and metric label for that
/// request, per §6's "request IDs are invariant across the pipeline."
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let incoming = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let request_id = incoming.unwrap_or_else(|| Uuid::new_v4().to_string());
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let span = tracing::info_span!("request", request_id = %request_id);
    let _guard = span.enter();

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    async fn handler() -> &'static str {
        "ok"
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(handler))
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    #[tokio::test]
    async fn echoes_supplied_request_id() {
        let request = axum::http::Request::builder()
            .uri("/")
            .header(&REQUEST_ID_HEADER, "client-supplied-id")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        let got = response.headers().get(&REQUEST_ID_HEADER).unwrap().to_str().unwrap();
        assert_eq!(got, "client-supplied-id");
    }

    #[tokio::test]
    async fn generates_request_id_when_absent() {
        let request = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert!(response.headers().get(&REQUEST_ID_HEADER).is_some());
    }
}
