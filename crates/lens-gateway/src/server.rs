// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the API.

use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use lens_core::LensError;
use lens_engine::Engine;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

/// Bind address of the API server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the API router.
///
/// - POST /campaigns/{id}/send
/// - GET /campaigns/{id}/stats
/// - POST /domains/{id}/subscribers
/// - GET, PATCH, DELETE /subscribers/{id}
/// - POST /notifications/click, /notifications/close
/// - GET /health
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/campaigns/{id}/send", post(handlers::send_campaign))
        .route("/campaigns/{id}/stats", get(handlers::campaign_stats))
        .route("/domains/{id}/subscribers", post(handlers::register_subscriber))
        .route(
            "/subscribers/{id}",
            get(handlers::get_subscriber)
                .patch(handlers::update_subscriber)
                .delete(handlers::delete_subscriber),
        )
        .route("/notifications/click", post(handlers::notification_clicked))
        .route("/notifications/close", post(handlers::notification_closed))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Service workers post engagement callbacks cross-origin.
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), LensError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LensError::Config(format!("failed to bind API server to {addr}: {e}")))?;

    tracing::info!("API server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| LensError::Internal(format!("API server error: {e}")))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8420,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
        assert!(debug.contains("8420"));
    }
}
