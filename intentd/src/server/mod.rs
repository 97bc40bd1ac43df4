//! Inbound HTTP surface
//!
//! Exposes the pipeline over a small JSON API: `POST /analyze` (full
//! pipeline), `POST /clarify` (stages 1-3 pre-check), and `GET /health`.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use eyre::{Context, Result};
use tracing::info;

use crate::config::ServerConfig;
use crate::pipeline::Pipeline;

pub mod handlers;

/// Shared state handed to every handler
pub struct AppState {
    /// The staged analysis pipeline
    pub pipeline: Pipeline,
}

/// Build the axum router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/analyze", post(handlers::analyze))
        .route("/clarify", post(handlers::clarify))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Bind and serve until ctrl-c
pub async fn serve(config: &ServerConfig, state: Arc<AppState>) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {}", addr))?;

    info!(%addr, "HTTP server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
