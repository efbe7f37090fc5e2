//! HTTP server module for the host application.
//!
//! Exposes login/logout, activity intake and configuration over REST, and
//! pushes session notices to clients over a WebSocket.

pub mod routes;
pub mod state;
pub mod ws;

use crate::server::routes::{activity, config, health, session};
use crate::server::state::AppState;
use crate::server::ws::ws_handler;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Default server port.
pub const DEFAULT_PORT: u16 = 13235;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    // CORS layer for the dashboard frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Session API
        .route("/api/session", get(session::get_session))
        .route("/api/session/start", post(session::start_session))
        .route("/api/session/stop", post(session::stop_session))
        .route("/api/activity", post(activity::post_activity))
        // Config API
        .route("/api/config", get(config::get_config))
        .route("/api/config/:key", put(config::put_config))
        // WebSocket
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Runs the axum server until `shutdown` resolves.
pub async fn run_server<F>(state: Arc<AppState>, port: u16, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
