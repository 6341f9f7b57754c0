//! HTTP API server.
//!
//! ## Endpoints
//!
//! - `POST /api/query` - answer a question, creating a session if needed
//! - `GET /api/courses` - course count and titles
//! - `DELETE /api/session/:session_id` - forget a conversation
//! - `GET /` - static frontend, or a liveness message when none is configured
mod handlers;
pub mod types;

pub use handlers::ApiError;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::rag::RagSystem;

#[derive(Clone)]
pub struct AppState {
    pub rag: Arc<RagSystem>,
}

impl AppState {
    #[must_use]
    pub fn new(rag: Arc<RagSystem>) -> Self {
        Self { rag }
    }
}

/// `"*"` allows any origin; otherwise only the listed origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.trim().parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(e) => {
                warn!("CORS: Invalid origin '{o}': {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the router. `frontend_dir`, when it exists, is served for every
/// path not handled by the API.
pub fn create_router(state: AppState, cors_origins: &[String], frontend_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route("/api/query", post(handlers::query_handler))
        .route("/api/courses", get(handlers::courses_handler))
        .route(
            "/api/session/:session_id",
            delete(handlers::clear_session_handler),
        );

    match frontend_dir.filter(|dir| dir.is_dir()) {
        Some(dir) => {
            info!("Serving frontend from {}", dir.display());
            router = router
                .fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
        }
        None => {
            router = router.route("/", get(handlers::root_handler));
        }
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
        .layer(build_cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn run_server(
    addr: &str,
    state: AppState,
    cors_origins: &[String],
    frontend_dir: Option<PathBuf>,
) -> Result<()> {
    let router = create_router(state, cors_origins, frontend_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("HTTP server listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {e}");
            }
            info!("Shutting down");
        })
        .await
        .context("server error")
}
