//! HTTP surface
//!
//! Exposes the pipeline as a single streaming endpoint:
//!
//! - `GET /?series_url=<url>` streams the series archive as `application/zip`
//! - `GET /health` answers `ok`

mod error;
mod routes;

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::Result;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub(crate) pipeline: Pipeline,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }
}

/// Builds the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::series_archive))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured address and serves until Ctrl+C
pub async fn serve(config: &Config) -> Result<()> {
    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .map_err(|_| crate::ConfigError::InvalidAddress(config.server.bind_address.clone()))?;

    let state = AppState::new(Pipeline::new(config)?);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Listening on http://{}/", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutting down");
}
