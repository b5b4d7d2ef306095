//! HTTP API
//!
//! `POST /api/migrate`, `GET /api/pools/:address/progress`, `GET /health`.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use handlers::{error_response, AppState, MigrateRequest, MigrateResponse};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/migrate", post(handlers::migrate))
        .route("/api/pools/:address/progress", get(handlers::pool_progress))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(state: Arc<AppState>, bind_addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("HTTP API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
