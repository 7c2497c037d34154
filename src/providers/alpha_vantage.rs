use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::config::AlphaVantageConfig;
use crate::core::error::UpstreamError;
use crate::core::market::{MarketDataSource, UpstreamQuery};
use crate::providers::util::RetryPolicy;

// AlphaVantageProvider implementation for MarketDataSource
pub struct AlphaVantageProvider {
    endpoint: Url,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl AlphaVantageProvider {
    pub fn new(config: &AlphaVantageConfig) -> Result<Self> {
        let endpoint = Url::parse(&format!(
            "{}/query",
            config.base_url.trim_end_matches('/')
        ))
        .with_context(|| format!("Invalid provider base URL: {}", config.base_url))?;

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("stockcache/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(AlphaVantageProvider {
            endpoint,
            api_key: config.api_key.clone(),
            client,
            retry: RetryPolicy::from(config),
        })
    }

    fn url_for(&self, query: &UpstreamQuery) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .extend_pairs(query.pairs())
            .append_pair("apikey", &self.api_key);
        url
    }
}

#[async_trait]
impl MarketDataSource for AlphaVantageProvider {
    #[instrument(
        name = "AlphaVantageQuery",
        skip(self, query),
        fields(function = %query.function())
    )]
    async fn query(&self, query: &UpstreamQuery) -> Result<Value, UpstreamError> {
        let url = self.url_for(query);
        // The key is kept out of logs
        debug!("Requesting {} from {}", query, self.endpoint);

        let response = self
            .retry
            .run(|| self.client.get(url.clone()).send())
            .await
            .map_err(|e| UpstreamError::Unreachable(format!("Request error: {e} for {query}")))?;

        debug!(status = %response.status(), "Received provider response");

        if !response.status().is_success() {
            return Err(UpstreamError::Http(response.status().as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::Unreachable(format!("Failed to read body: {e}")))?;

        serde_json::from_str(&text).map_err(|e| {
            UpstreamError::Malformed(format!("Failed to parse JSON response for {query}: {e}"))
        })
    }
}
