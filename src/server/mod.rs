//! Axum HTTP surface
//!
//! Routes requests to the [`MarketDataService`] and owns the listener lifecycle.

mod error;
pub mod routes;

use crate::core::config::ServerConfig;
use crate::service::MarketDataService;
use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MarketDataService>,
}

/// Build the router with all routes and middleware
pub fn build_app(service: Arc<MarketDataService>) -> Router {
    routes::create_router(AppState { service })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serves until Ctrl-C is received.
pub async fn start_server(config: &ServerConfig, service: Arc<MarketDataService>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address: {}:{}", config.host, config.port))?;

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Stock API server running on http://{addr}");
    info!("Health check: http://{addr}/api/health");

    axum::serve(listener, build_app(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, stopping server...");
}
