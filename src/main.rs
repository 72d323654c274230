use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::info;

use ragcore_server::config::Settings;
use ragcore_server::handlers;
use ragcore_server::middleware::request_id_middleware;
use ragcore_server::state::AppState;

const MAX_INGEST_BODY_BYTES: usize = 16 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,ragcore_server=debug".to_string()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("starting ragcore server");

    let settings = Settings::load()?;
    info!("configuration loaded");

    let state = AppState::build(settings).await?;
    info!("dependencies wired");

    let addr = SocketAddr::from((
        state.settings.server.host.parse::<std::net::IpAddr>()?,
        state.settings.server.port,
    ));

    let app = build_router(state);

    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/readiness", get(handlers::readiness_check))
        .route("/liveness", get(handlers::liveness_check));

    let api_routes = Router::new()
        .route("/ingest", post(handlers::ingest_handler))
        .route("/query", post(handlers::query_handler))
        .route("/history/{session_id}", get(handlers::history_handler))
        .route("/sessions", get(handlers::list_sessions_handler))
        .route("/sessions/{session_id}", delete(handlers::delete_session_handler))
        .route("/evaluate", post(handlers::evaluate_handler))
        .layer(DefaultBodyLimit::max(MAX_INGEST_BODY_BYTES));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(
            CorsLayer::permissive()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CatchPanicLayer::new())
}
