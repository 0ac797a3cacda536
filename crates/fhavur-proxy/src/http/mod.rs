//! HTTP server implementation using axum.
//!
//! Worker control endpoints live under `/_worker`; every other request is
//! handed to the offline controller as an intercepted fetch.

use crate::error::ProxyError;
use crate::server::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod handlers;

/// Create HTTP router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/_worker/message", post(handlers::handle_message))
        .route("/_worker/sync/{tag}", post(handlers::handle_sync))
        .route("/_worker/stats", get(handlers::handle_stats))
        .fallback(handlers::handle_fetch)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start HTTP server and run until `shutdown` resolves.
///
/// # Errors
///
/// Returns `ProxyError` if the server fails to bind or encounters a runtime error.
pub async fn start_server<F>(
    bind_addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ProxyError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|source| ProxyError::BindFailed {
            addr: bind_addr,
            source,
        })?;

    tracing::info!("HTTP server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ProxyError::Shutdown(format!("HTTP server error: {e}")))?;

    Ok(())
}
