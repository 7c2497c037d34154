//! Fetch-validate-store orchestration
//!
//! Every cached endpoint follows the same flow: serve a fresh cache hit, otherwise
//! fetch from the provider, validate the body against the endpoint contract and
//! store it. When the fetch or the validation fails the endpoint's fallback chain
//! decides between a stale entry, the synthetic dataset or an error.

pub mod sample;
pub mod validate;

use crate::core::cache::{CacheStore, Namespace, is_fresh};
use crate::core::config::{AppConfig, NewsCacheKey};
use crate::core::error::ApiError;
use crate::core::keys::{SINGLETON_KEY, news_key, series_key, symbol_key};
use crate::core::market::{
    Interval, MarketDataSource, NewsFilters, TimeSeriesFunction, UpstreamQuery,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use validate::{ShapeError, Validated};

/// Upper bound on symbols accepted by one batch quote request.
pub const MAX_BATCH_SYMBOLS: usize = 50;

/// Where a served payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Fresh cache entry.
    Hit,
    /// Fetched from the provider and stored.
    Miss,
    /// Expired entry served because the refresh failed.
    Stale,
    /// Built-in fallback dataset.
    Synthetic,
    /// Uncached passthrough.
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Stale => "stale",
            CacheStatus::Synthetic => "synthetic",
            CacheStatus::Bypass => "bypass",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Served {
    pub payload: Arc<Value>,
    pub status: CacheStatus,
}

impl Served {
    fn new(payload: Arc<Value>, status: CacheStatus) -> Self {
        Self { payload, status }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    #[default]
    PreferCache,
    /// Skip the freshness check and always ask the provider.
    ForceRefresh,
}

impl From<bool> for FetchMode {
    fn from(refresh: bool) -> Self {
        if refresh {
            FetchMode::ForceRefresh
        } else {
            FetchMode::PreferCache
        }
    }
}

/// What to do when the provider answers with a body that fails validation.
enum OnInvalidShape {
    /// Treat like an unreachable provider.
    Fallback,
    /// Report the content as absent; transient notices still fall back.
    NotFound(String),
}

/// Last step of the fallback chain, after the stale entry.
enum LastResort {
    Error,
    Synthetic(fn() -> Value),
}

struct Policy {
    on_invalid_shape: OnInvalidShape,
    last_resort: LastResort,
}

/// Outcome of one symbol in a batch quote request.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteOutcome {
    pub symbol: String,
    pub quote: Option<Arc<Value>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingletonStats {
    pub cached: bool,
    pub entries: usize,
    pub last_fetch: Option<DateTime<Utc>>,
}

/// Occupancy per namespace, as reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub top_gainers_losers: SingletonStats,
    pub news_sentiment: SingletonStats,
    pub company_overviews: usize,
    pub quotes: usize,
    pub time_series: usize,
}

pub struct MarketDataService {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn CacheStore>,
    news_cache_key: NewsCacheKey,
    batch_concurrency: usize,
}

impl MarketDataService {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn CacheStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            source,
            store,
            news_cache_key: config.news.cache_key,
            batch_concurrency: config.batch.concurrency.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub async fn top_gainers_losers(&self, mode: FetchMode) -> Result<Served, ApiError> {
        let policy = Policy {
            on_invalid_shape: OnInvalidShape::Fallback,
            last_resort: LastResort::Error,
        };
        self.resolve(
            Namespace::TopGainersLosers,
            SINGLETON_KEY,
            UpstreamQuery::top_gainers_losers(),
            mode,
            policy,
            validate::top_gainers_losers,
        )
        .await
    }

    pub async fn company_overview(&self, symbol: &str, mode: FetchMode) -> Result<Served, ApiError> {
        let symbol = symbol_key(symbol)?;
        let policy = Policy {
            on_invalid_shape: OnInvalidShape::NotFound(format!(
                "No data found for symbol {symbol}"
            )),
            last_resort: LastResort::Error,
        };
        self.resolve(
            Namespace::CompanyOverview,
            &symbol,
            UpstreamQuery::company_overview(&symbol),
            mode,
            policy,
            validate::company_overview,
        )
        .await
    }

    pub async fn quote(&self, symbol: &str, mode: FetchMode) -> Result<Served, ApiError> {
        let symbol = symbol_key(symbol)?;
        let policy = Policy {
            on_invalid_shape: OnInvalidShape::NotFound(format!(
                "No quote data found for symbol {symbol}"
            )),
            last_resort: LastResort::Error,
        };
        self.resolve(
            Namespace::Quote,
            &symbol,
            UpstreamQuery::global_quote(&symbol),
            mode,
            policy,
            validate::global_quote,
        )
        .await
    }

    /// Quotes for several symbols, looked up through the quote cache with at most
    /// `batch.concurrency` provider calls in flight. Results keep the input order.
    pub async fn quotes(&self, symbols: &[String], mode: FetchMode) -> Result<Vec<QuoteOutcome>, ApiError> {
        if symbols.is_empty() {
            return Err(ApiError::BadRequest(
                "At least one symbol is required".to_string(),
            ));
        }
        if symbols.len() > MAX_BATCH_SYMBOLS {
            return Err(ApiError::BadRequest(format!(
                "At most {MAX_BATCH_SYMBOLS} symbols per request"
            )));
        }

        let outcomes: Vec<QuoteOutcome> = stream::iter(symbols.iter().cloned())
            .map(|symbol: String| async move {
                match self.quote(&symbol, mode).await {
                    Ok(served) => QuoteOutcome {
                        symbol: symbol.trim().to_uppercase(),
                        quote: Some(served.payload),
                        error: None,
                    },
                    Err(e) => QuoteOutcome {
                        symbol: symbol.trim().to_uppercase(),
                        quote: None,
                        error: Some(e.to_string()),
                    },
                }
            })
            .buffered(self.batch_concurrency)
            .collect()
            .await;
        Ok(outcomes)
    }

    pub async fn time_series(
        &self,
        function: &str,
        symbol: &str,
        interval: Option<&str>,
        mode: FetchMode,
    ) -> Result<Served, ApiError> {
        let function: TimeSeriesFunction = function.parse()?;
        let symbol = symbol_key(symbol)?;
        let interval = if function.is_intraday() {
            let raw = interval
                .filter(|i| !i.trim().is_empty())
                .ok_or_else(|| {
                    ApiError::BadRequest(
                        "Interval parameter is required for intraday series".to_string(),
                    )
                })?;
            Some(raw.parse::<Interval>()?)
        } else {
            None
        };

        let key = series_key(function, &symbol, interval);
        let container = function.container_key(interval);
        let policy = Policy {
            on_invalid_shape: OnInvalidShape::NotFound(format!(
                "No time series data found for {key}"
            )),
            last_resort: LastResort::Error,
        };
        self.resolve(
            Namespace::TimeSeries,
            &key,
            UpstreamQuery::time_series(function, &symbol, interval),
            mode,
            policy,
            move |body| validate::time_series(body, &container),
        )
        .await
    }

    /// Never fails: falls back to a stale entry, then to the sample dataset.
    pub async fn news_sentiment(&self, filters: &NewsFilters, mode: FetchMode) -> Served {
        let key = news_key(filters, self.news_cache_key);
        let policy = Policy {
            on_invalid_shape: OnInvalidShape::Fallback,
            last_resort: LastResort::Synthetic(sample::sample_news),
        };
        let result = self
            .resolve(
                Namespace::NewsSentiment,
                &key,
                UpstreamQuery::news_sentiment(filters),
                mode,
                policy,
                validate::news_feed,
            )
            .await;
        match result {
            Ok(served) => served,
            Err(e) => {
                warn!(error = %e, "News lookup failed, serving sample news");
                Served::new(Arc::new(sample::sample_news()), CacheStatus::Synthetic)
            }
        }
    }

    /// Uncached symbol search.
    pub async fn search(&self, keywords: &str) -> Result<Served, ApiError> {
        let keywords = keywords.trim();
        if keywords.is_empty() {
            return Err(ApiError::BadRequest(
                "Keywords parameter is required".to_string(),
            ));
        }
        info!(keywords, "Searching symbols");

        let body = self
            .source
            .query(&UpstreamQuery::symbol_search(keywords))
            .await
            .map_err(|e| {
                error!(keywords, error = %e, "Symbol search failed");
                ApiError::from(e)
            })?;
        let matches = validate::search_matches(body);
        debug!(
            keywords,
            results = matches.as_array().map_or(0, Vec::len),
            "Symbol search finished"
        );
        Ok(Served::new(Arc::new(matches), CacheStatus::Bypass))
    }

    /// Drops every entry of `namespace` and returns how many were removed.
    pub fn clear_cache(&self, namespace: Namespace) -> usize {
        let dropped = self.store.len(namespace);
        self.store.clear(namespace);
        info!(%namespace, dropped, "Cleared cache namespace");
        dropped
    }

    pub fn cache_stats(&self) -> CacheStats {
        let singleton = |namespace: Namespace| SingletonStats {
            cached: self.store.len(namespace) > 0,
            entries: self.store.len(namespace),
            last_fetch: self.store.last_fetched(namespace),
        };
        CacheStats {
            top_gainers_losers: singleton(Namespace::TopGainersLosers),
            news_sentiment: singleton(Namespace::NewsSentiment),
            company_overviews: self.store.len(Namespace::CompanyOverview),
            quotes: self.store.len(Namespace::Quote),
            time_series: self.store.len(Namespace::TimeSeries),
        }
    }

    async fn resolve<V>(
        &self,
        namespace: Namespace,
        key: &str,
        query: UpstreamQuery,
        mode: FetchMode,
        policy: Policy,
        validate: V,
    ) -> Result<Served, ApiError>
    where
        V: FnOnce(Value) -> Validated,
    {
        if mode == FetchMode::PreferCache {
            if let Some(entry) = self.store.get(namespace, key) {
                if is_fresh(namespace, Some(entry.age())) {
                    debug!(%namespace, key, "Serving cached data");
                    return Ok(Served::new(entry.payload, CacheStatus::Hit));
                }
            }
        }

        info!(%namespace, key, "Fetching fresh data from provider");
        let failure = match self.source.query(&query).await {
            Ok(body) => match validate(body) {
                Ok(payload) => {
                    let payload = Arc::new(payload);
                    self.store.put(namespace, key, Arc::clone(&payload));
                    info!(%namespace, key, "Fresh data cached");
                    return Ok(Served::new(payload, CacheStatus::Miss));
                }
                Err(shape) => {
                    warn!(%namespace, key, error = %shape, "Invalid data from provider");
                    match policy.on_invalid_shape {
                        OnInvalidShape::NotFound(msg) if !shape.is_transient() => {
                            return Err(ApiError::NotFound(msg));
                        }
                        _ => shape_failure(shape),
                    }
                }
            },
            Err(e) => {
                error!(%namespace, key, error = %e, "Provider request failed");
                ApiError::from(e)
            }
        };

        // Re-read: a concurrent request may have stored something meanwhile
        if let Some(entry) = self.store.get(namespace, key) {
            info!(
                %namespace,
                key,
                age_secs = entry.age().as_secs(),
                "Serving stale cached data"
            );
            return Ok(Served::new(entry.payload, CacheStatus::Stale));
        }

        match policy.last_resort {
            LastResort::Synthetic(sample) => {
                info!(%namespace, key, "Serving sample data");
                Ok(Served::new(Arc::new(sample()), CacheStatus::Synthetic))
            }
            LastResort::Error => Err(failure),
        }
    }
}

fn shape_failure(shape: ShapeError) -> ApiError {
    ApiError::InvalidUpstreamShape(shape.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::UpstreamError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::advance;

    /// Replays scripted responses and records every query it receives.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Value, UpstreamError>>>,
        queries: Mutex<Vec<String>>,
        call_count: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Value, UpstreamError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                queries: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        async fn query(&self, query: &UpstreamQuery) -> Result<Value, UpstreamError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(UpstreamError::Unreachable("script exhausted".to_string())))
        }
    }

    fn service_with(source: Arc<ScriptedSource>) -> MarketDataService {
        service_with_config(source, &AppConfig::default())
    }

    fn service_with_config(source: Arc<ScriptedSource>, config: &AppConfig) -> MarketDataService {
        MarketDataService::new(source, Arc::new(MemoryStore::new()), config)
    }

    fn movers() -> Value {
        json!({"top_gainers": [{"ticker": "ABC"}], "top_losers": [], "most_actively_traded": []})
    }

    fn aapl_quote() -> Value {
        json!({"Global Quote": {"01. symbol": "AAPL", "05. price": "150.00"}})
    }

    fn down() -> Result<Value, UpstreamError> {
        Err(UpstreamError::Unreachable("connection refused".to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_top_movers_fetched_once_within_ttl() {
        let source = ScriptedSource::new(vec![Ok(movers())]);
        let service = service_with(source.clone());

        let first = service.top_gainers_losers(FetchMode::PreferCache).await.unwrap();
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(*first.payload, movers());

        advance(Duration::from_secs(5 * 60 * 60)).await;
        let second = service.top_gainers_losers(FetchMode::PreferCache).await.unwrap();
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(*second.payload, movers());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_top_movers_serves_stale_on_failure() {
        let source = ScriptedSource::new(vec![Ok(movers()), down()]);
        let service = service_with(source.clone());

        service.top_gainers_losers(FetchMode::PreferCache).await.unwrap();
        advance(Duration::from_secs(7 * 60 * 60)).await;

        let served = service.top_gainers_losers(FetchMode::PreferCache).await.unwrap();
        assert_eq!(served.status, CacheStatus::Stale);
        assert_eq!(*served.payload, movers());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_top_movers_serves_stale_on_invalid_shape() {
        let source = ScriptedSource::new(vec![
            Ok(movers()),
            Ok(json!({"Note": "rate limited"})),
        ]);
        let service = service_with(source.clone());

        service.top_gainers_losers(FetchMode::PreferCache).await.unwrap();
        advance(Duration::from_secs(7 * 60 * 60)).await;

        let served = service.top_gainers_losers(FetchMode::PreferCache).await.unwrap();
        assert_eq!(served.status, CacheStatus::Stale);
        assert_eq!(*served.payload, movers());
    }

    #[tokio::test(start_paused = true)]
    async fn test_top_movers_without_cache_errors() {
        let source = ScriptedSource::new(vec![down(), Ok(json!({"top_gainers": []}))]);
        let service = service_with(source);

        let err = service.top_gainers_losers(FetchMode::PreferCache).await.unwrap_err();
        assert!(matches!(err, ApiError::UpstreamUnreachable(_)));

        let err = service.top_gainers_losers(FetchMode::PreferCache).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::InvalidUpstreamShape("missing expected field `top_losers`".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_scenario() {
        let source = ScriptedSource::new(vec![Ok(aapl_quote()), Ok(aapl_quote())]);
        let service = service_with(source.clone());

        let served = service.quote("aapl", FetchMode::PreferCache).await.unwrap();
        assert_eq!(
            *served.payload,
            json!({"01. symbol": "AAPL", "05. price": "150.00"})
        );
        assert!(service.store().get(Namespace::Quote, "AAPL").is_some());
        assert_eq!(source.queries(), vec!["function=GLOBAL_QUOTE&symbol=AAPL"]);

        advance(Duration::from_secs(30)).await;
        let cached = service.quote("AAPL", FetchMode::PreferCache).await.unwrap();
        assert_eq!(cached.status, CacheStatus::Hit);
        assert_eq!(cached.payload, served.payload);
        assert_eq!(source.calls(), 1);

        advance(Duration::from_secs(60)).await;
        let refreshed = service.quote("AAPL", FetchMode::PreferCache).await.unwrap();
        assert_eq!(refreshed.status, CacheStatus::Miss);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_unknown_symbol_is_not_found_even_with_cache() {
        let source = ScriptedSource::new(vec![Ok(aapl_quote()), Ok(json!({"Global Quote": {}}))]);
        let service = service_with(source);

        service.quote("AAPL", FetchMode::PreferCache).await.unwrap();
        let err = service.quote("AAPL", FetchMode::ForceRefresh).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::NotFound("No quote data found for symbol AAPL".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_rate_limit_notice_falls_back_to_stale() {
        let source = ScriptedSource::new(vec![
            Ok(aapl_quote()),
            Ok(json!({"Note": "5 calls per minute"})),
            Ok(json!({"Note": "5 calls per minute"})),
        ]);
        let service = service_with(source);

        service.quote("AAPL", FetchMode::PreferCache).await.unwrap();
        advance(Duration::from_secs(120)).await;
        let served = service.quote("AAPL", FetchMode::PreferCache).await.unwrap();
        assert_eq!(served.status, CacheStatus::Stale);

        // No entry to fall back on
        let err = service.quote("MSFT", FetchMode::PreferCache).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidUpstreamShape(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overview_upstream_failure() {
        let source = ScriptedSource::new(vec![
            Err(UpstreamError::Http(500)),
            Ok(json!({"Symbol": "IBM"})),
            Err(UpstreamError::Http(500)),
        ]);
        let service = service_with(source);

        let err = service.company_overview("IBM", FetchMode::PreferCache).await.unwrap_err();
        assert_eq!(err, ApiError::UpstreamHttp(500));

        service.company_overview("IBM", FetchMode::PreferCache).await.unwrap();
        advance(Duration::from_secs(25 * 60 * 60)).await;
        let served = service.company_overview("ibm", FetchMode::PreferCache).await.unwrap();
        assert_eq!(served.status, CacheStatus::Stale);
        assert_eq!(*served.payload, json!({"Symbol": "IBM"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overview_empty_body_is_not_found() {
        let source = ScriptedSource::new(vec![Ok(json!({}))]);
        let service = service_with(source);

        let err = service.company_overview("NOPE", FetchMode::PreferCache).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::NotFound("No data found for symbol NOPE".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_overwrites_fresh_entry() {
        let source = ScriptedSource::new(vec![
            Ok(json!({"Symbol": "IBM", "Name": "old"})),
            Ok(json!({"Symbol": "IBM", "Name": "new"})),
        ]);
        let service = service_with(source.clone());

        service.company_overview("IBM", FetchMode::PreferCache).await.unwrap();
        let served = service.company_overview("IBM", FetchMode::ForceRefresh).await.unwrap();
        assert_eq!(served.status, CacheStatus::Miss);
        assert_eq!(served.payload["Name"], "new");
        assert_eq!(source.calls(), 2);

        let cached = service.company_overview("IBM", FetchMode::PreferCache).await.unwrap();
        assert_eq!(cached.payload["Name"], "new");
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_series_keys_by_interval_for_intraday() {
        let intraday = |interval: &str| {
            Ok(json!({"Meta Data": {}, format!("Time Series ({interval})"): {}}))
        };
        let source = ScriptedSource::new(vec![intraday("1min"), intraday("60min")]);
        let service = service_with(source.clone());

        service
            .time_series("TIME_SERIES_INTRADAY", "AAPL", Some("1min"), FetchMode::PreferCache)
            .await
            .unwrap();
        service
            .time_series("TIME_SERIES_INTRADAY", "AAPL", Some("60min"), FetchMode::PreferCache)
            .await
            .unwrap();
        let cached = service
            .time_series("time_series_intraday", "aapl", Some("1min"), FetchMode::PreferCache)
            .await
            .unwrap();

        assert_eq!(cached.status, CacheStatus::Hit);
        assert_eq!(source.calls(), 2);
        assert_eq!(service.store().len(Namespace::TimeSeries), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_series_daily_ignores_interval() {
        let daily = json!({"Meta Data": {}, "Time Series (Daily)": {"2024-01-02": {}}});
        let source = ScriptedSource::new(vec![Ok(daily)]);
        let service = service_with(source.clone());

        service
            .time_series("TIME_SERIES_DAILY", "AAPL", None, FetchMode::PreferCache)
            .await
            .unwrap();
        let cached = service
            .time_series("TIME_SERIES_DAILY", "AAPL", Some("5min"), FetchMode::PreferCache)
            .await
            .unwrap();

        assert_eq!(cached.status, CacheStatus::Hit);
        assert_eq!(source.queries(), vec!["function=TIME_SERIES_DAILY&symbol=AAPL"]);
        assert!(
            service
                .store()
                .get(Namespace::TimeSeries, "TIME_SERIES_DAILY_AAPL")
                .is_some()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_series_validation() {
        let source = ScriptedSource::new(vec![Ok(json!({"Meta Data": {}}))]);
        let service = service_with(source.clone());

        let err = service
            .time_series("TIME_SERIES_INTRADAY", "AAPL", None, FetchMode::PreferCache)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = service
            .time_series("TIME_SERIES_HOURLY", "AAPL", None, FetchMode::PreferCache)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(source.calls(), 0);

        let err = service
            .time_series("TIME_SERIES_WEEKLY", "AAPL", None, FetchMode::PreferCache)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::NotFound("No time series data found for TIME_SERIES_WEEKLY_AAPL".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_news_is_normalized_and_cached() {
        let source = ScriptedSource::new(vec![Ok(json!({
            "items": "1",
            "feed": [{"title": "Headline"}],
            "sentiment_score_definition": "legend"
        }))]);
        let service = service_with(source.clone());

        let served = service
            .news_sentiment(&NewsFilters::default(), FetchMode::PreferCache)
            .await;
        assert_eq!(served.status, CacheStatus::Miss);
        assert_eq!(
            *served.payload,
            json!({"items": [{"title": "Headline"}], "sentiment_score_definition": "legend"})
        );

        let cached = service
            .news_sentiment(&NewsFilters::default(), FetchMode::PreferCache)
            .await;
        assert_eq!(cached.status, CacheStatus::Hit);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_news_falls_back_to_sample_then_stale() {
        let source = ScriptedSource::new(vec![
            down(),
            Ok(json!({"feed": []})),
            Ok(json!({"Information": "premium"})),
        ]);
        let service = service_with(source);
        let filters = NewsFilters::default();

        let served = service.news_sentiment(&filters, FetchMode::PreferCache).await;
        assert_eq!(served.status, CacheStatus::Synthetic);
        assert_eq!(*served.payload, sample::sample_news());

        service.news_sentiment(&filters, FetchMode::PreferCache).await;
        let stale = service.news_sentiment(&filters, FetchMode::ForceRefresh).await;
        assert_eq!(stale.status, CacheStatus::Stale);
        assert_eq!(*stale.payload, json!({"items": []}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_news_filters_forwarded_and_keyed() {
        let feed = |title: &str| Ok(json!({"feed": [{"title": title}]}));
        let source = ScriptedSource::new(vec![feed("tech"), feed("earnings")]);
        let service = service_with(source.clone());

        let tech = NewsFilters {
            topics: Some("technology".to_string()),
            ..Default::default()
        };
        let earnings = NewsFilters {
            topics: Some("earnings".to_string()),
            ..Default::default()
        };

        service.news_sentiment(&tech, FetchMode::PreferCache).await;
        let served = service.news_sentiment(&earnings, FetchMode::PreferCache).await;
        assert_eq!(served.payload["items"][0]["title"], "earnings");
        assert_eq!(
            source.queries(),
            vec![
                "function=NEWS_SENTIMENT&topics=technology",
                "function=NEWS_SENTIMENT&topics=earnings"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_news_singleton_keying_shares_entry() {
        let source = ScriptedSource::new(vec![Ok(json!({"feed": [{"title": "tech"}]}))]);
        let mut config = AppConfig::default();
        config.news.cache_key = NewsCacheKey::Singleton;
        let service = service_with_config(source.clone(), &config);

        let tech = NewsFilters {
            topics: Some("technology".to_string()),
            ..Default::default()
        };
        let earnings = NewsFilters {
            topics: Some("earnings".to_string()),
            ..Default::default()
        };

        service.news_sentiment(&tech, FetchMode::PreferCache).await;
        let served = service.news_sentiment(&earnings, FetchMode::PreferCache).await;
        assert_eq!(served.status, CacheStatus::Hit);
        assert_eq!(served.payload["items"][0]["title"], "tech");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_is_uncached() {
        let results = json!({"bestMatches": [{"1. symbol": "TSLA"}]});
        let source = ScriptedSource::new(vec![Ok(results.clone()), Ok(json!({})), down()]);
        let service = service_with(source.clone());

        let served = service.search("tesla").await.unwrap();
        assert_eq!(served.status, CacheStatus::Bypass);
        assert_eq!(*served.payload, json!([{"1. symbol": "TSLA"}]));

        let served = service.search("tesla").await.unwrap();
        assert_eq!(*served.payload, json!([]));

        let err = service.search("tesla").await.unwrap_err();
        assert!(matches!(err, ApiError::UpstreamUnreachable(_)));
        assert_eq!(source.calls(), 3);

        let err = service.search("  ").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_quotes_keep_order_and_report_errors() {
        let msft = json!({"Global Quote": {"01. symbol": "MSFT", "05. price": "400.00"}});
        let source = ScriptedSource::new(vec![Ok(aapl_quote()), Ok(json!({"Global Quote": {}})), Ok(msft)]);
        let mut config = AppConfig::default();
        // Sequential lookups keep the scripted responses aligned with the symbols
        config.batch.concurrency = 1;
        let service = service_with_config(source.clone(), &config);

        let symbols = vec!["aapl".to_string(), "zzzz".to_string(), "MSFT".to_string()];
        let outcomes = service.quotes(&symbols, FetchMode::PreferCache).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].symbol, "AAPL");
        assert_eq!(outcomes[0].quote.as_deref().unwrap()["05. price"], "150.00");
        assert_eq!(outcomes[1].symbol, "ZZZZ");
        assert!(outcomes[1].quote.is_none());
        assert_eq!(
            outcomes[1].error.as_deref(),
            Some("No quote data found for symbol ZZZZ")
        );
        assert_eq!(outcomes[2].quote.as_deref().unwrap()["01. symbol"], "MSFT");

        // Shares the quote cache
        let cached = service.quote("AAPL", FetchMode::PreferCache).await.unwrap();
        assert_eq!(cached.status, CacheStatus::Hit);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_batch_quotes_run_on_spawned_task() {
        let source = ScriptedSource::new(vec![Ok(aapl_quote())]);
        let service = Arc::new(service_with(source.clone()));

        let handle = tokio::spawn(async move {
            let symbols = vec!["aapl".to_string()];
            service.quotes(&symbols, FetchMode::PreferCache).await
        });
        let outcomes = handle.await.unwrap().unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].symbol, "AAPL");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_quotes_limits() {
        let service = service_with(ScriptedSource::new(vec![]));
        let err = service.quotes(&[], FetchMode::PreferCache).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let too_many: Vec<String> = (0..=MAX_BATCH_SYMBOLS).map(|i| format!("S{i}")).collect();
        let err = service.quotes(&too_many, FetchMode::PreferCache).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache_forces_refetch() {
        let source = ScriptedSource::new(vec![Ok(aapl_quote()), Ok(aapl_quote())]);
        let service = service_with(source.clone());

        service.quote("AAPL", FetchMode::PreferCache).await.unwrap();
        assert_eq!(service.clear_cache(Namespace::Quote), 1);
        assert_eq!(service.clear_cache(Namespace::Quote), 0);

        let served = service.quote("AAPL", FetchMode::PreferCache).await.unwrap();
        assert_eq!(served.status, CacheStatus::Miss);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_stats() {
        let source = ScriptedSource::new(vec![Ok(movers()), Ok(aapl_quote())]);
        let service = service_with(source);

        service.top_gainers_losers(FetchMode::PreferCache).await.unwrap();
        service.quote("AAPL", FetchMode::PreferCache).await.unwrap();

        let stats = service.cache_stats();
        assert!(stats.top_gainers_losers.cached);
        assert!(stats.top_gainers_losers.last_fetch.is_some());
        assert!(!stats.news_sentiment.cached);
        assert_eq!(stats.quotes, 1);
        assert_eq!(stats.company_overviews, 0);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["topGainersLosers"]["cached"], true);
        assert_eq!(json["newsSentiment"]["lastFetch"], Value::Null);
        assert_eq!(json["timeSeries"], 0);
    }
}
