pub mod core;
pub mod providers;
pub mod server;
pub mod service;
pub mod store;

use crate::core::config::AppConfig;
use crate::providers::AlphaVantageProvider;
use crate::service::MarketDataService;
use crate::store::MemoryStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Wires the provider, the cache store and the service for `config`.
pub fn build_service(config: &AppConfig) -> Result<Arc<MarketDataService>> {
    let provider = AlphaVantageProvider::new(&config.providers.alpha_vantage)?;
    let store = Arc::new(MemoryStore::new());
    Ok(Arc::new(MarketDataService::new(
        Arc::new(provider),
        store,
        config,
    )))
}

pub async fn run(config_path: Option<&str>) -> Result<()> {
    info!("Stock cache starting...");

    let config = AppConfig::resolve(config_path)?;
    debug!(
        server = ?config.server,
        news = ?config.news,
        batch = ?config.batch,
        base_url = %config.providers.alpha_vantage.base_url,
        "Loaded config"
    );

    let service = build_service(&config)?;
    server::start_server(&config.server, service).await
}
