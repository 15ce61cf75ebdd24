//! Liveness endpoint
//!
//! Hosting platforms poll `GET /` or `GET /health`; everything else is a 404.
//! The server shares no state with the bot.

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::io;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

async fn ok() -> &'static str {
    "OK"
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Liveness routes
pub fn router() -> Router {
    Router::new()
        .route("/", get(ok))
        .route("/health", get(ok))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
}

/// Serve liveness checks on an already bound listener
///
/// # Errors
///
/// Returns an error if the server stops with an I/O failure.
pub async fn serve_on(listener: TcpListener) -> io::Result<()> {
    axum::serve(listener, router()).await
}

/// Bind `0.0.0.0:port` and serve liveness checks
///
/// # Errors
///
/// Returns an error if the port cannot be bound or serving fails.
pub async fn serve(port: u16) -> io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "Liveness server listening");
    serve_on(listener).await
}

/// Run the liveness server in the background for the life of the process.
///
/// A bind failure is logged and the bot keeps running.
pub fn spawn(port: u16) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = serve(port).await {
            error!(port, "Liveness server failed: {e}");
        }
    })
}
