//! Web chat gateway for Snello.
//!
//! Serves the embedded chat page plus a small JSON API (see [`api_v1`]).
//! Every request reloads its session from disk, so the server holds no
//! per-browser state beyond the shared [`ChatService`].
//!
//! Built on Axum.

pub mod api_v1;
pub mod frontend;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    http::{Method, header},
    response::Json,
    routing::get,
};
use serde::Serialize;
use snello_agent::ChatService;
use snello_config::AppConfig;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application state for the gateway.
pub struct AppState {
    pub chat: Arc<ChatService>,
}

pub type SharedState = Arc<AppState>;

/// Build the full router: health check, v1 API and the chat page.
///
/// Layers applied:
/// - CORS limited to the methods the API uses
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let chat = ChatService::from_config(&config).await?;
    let state = Arc::new(AppState {
        chat: Arc::new(chat),
    });

    let app = build_router(state);

    info!(addr = %addr, model = %config.default_model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
