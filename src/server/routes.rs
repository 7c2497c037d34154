use crate::core::cache::Namespace;
use crate::core::error::ApiError;
use crate::core::market::NewsFilters;
use crate::server::AppState;
use crate::service::{CacheStats, FetchMode, Served};
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State, rejection::PathRejection},
    http::{HeaderName, HeaderValue, request::Parts},
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

/// Response header naming where the payload came from.
pub const CACHE_HEADER: HeaderName = HeaderName::from_static("x-cache");

/// Raw query pairs in request order. Parsing never depends on a fixed schema, so
/// repeated or unexpected parameters do not reject the request.
#[derive(Debug, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Last value given for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.all(name).last()
    }

    pub fn all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.0
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// `refresh=true`, `1`, `yes` or `on` skip the freshness check. Anything else is ignored.
    pub fn fetch_mode(&self) -> FetchMode {
        let refresh = self.get("refresh").is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )
        });
        FetchMode::from(refresh)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for QueryParams {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(QueryParams(pairs))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    cache_stats: CacheStats,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/cache/{namespace}", delete(clear_cache))
        .route("/api/stocks/top-gainers-losers", get(top_gainers_losers))
        .route("/api/stocks/overview/{symbol}", get(company_overview))
        .route("/api/stocks/quote/{symbol}", get(quote))
        .route("/api/stocks/quotes", get(quotes))
        .route("/api/stocks/timeseries/{function}/{symbol}", get(time_series))
        .route("/api/stocks/news-sentiment", get(news_sentiment))
        .route("/api/stocks/search", get(search))
        .with_state(state)
}

fn respond(served: Served) -> Response {
    let mut response = Json(served.payload).into_response();
    response.headers_mut().insert(
        CACHE_HEADER,
        HeaderValue::from_static(served.status.as_str()),
    );
    response
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        cache_stats: state.service.cache_stats(),
    })
}

async fn clear_cache(
    State(state): State<AppState>,
    namespace: Result<Path<String>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(namespace) = namespace?;
    let namespace: Namespace = namespace.parse()?;
    let cleared = state.service.clear_cache(namespace);
    Ok(Json(json!({ "namespace": namespace.to_string(), "cleared": cleared })))
}

async fn top_gainers_losers(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Response, ApiError> {
    let served = state
        .service
        .top_gainers_losers(params.fetch_mode())
        .await?;
    Ok(respond(served))
}

async fn company_overview(
    State(state): State<AppState>,
    symbol: Result<Path<String>, PathRejection>,
    params: QueryParams,
) -> Result<Response, ApiError> {
    let Path(symbol) = symbol?;
    let served = state
        .service
        .company_overview(&symbol, params.fetch_mode())
        .await?;
    Ok(respond(served))
}

async fn quote(
    State(state): State<AppState>,
    symbol: Result<Path<String>, PathRejection>,
    params: QueryParams,
) -> Result<Response, ApiError> {
    let Path(symbol) = symbol?;
    let served = state.service.quote(&symbol, params.fetch_mode()).await?;
    Ok(respond(served))
}

async fn quotes(State(state): State<AppState>, params: QueryParams) -> Result<Response, ApiError> {
    let symbols: Vec<String> = params
        .all("symbols")
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let outcomes = state.service.quotes(&symbols, params.fetch_mode()).await?;
    Ok(Json(outcomes).into_response())
}

async fn time_series(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
    params: QueryParams,
) -> Result<Response, ApiError> {
    let Path((function, symbol)) = path?;
    let served = state
        .service
        .time_series(
            &function,
            &symbol,
            params.get("interval"),
            params.fetch_mode(),
        )
        .await?;
    Ok(respond(served))
}

/// Never rejects: unreadable parameters degrade to the unfiltered feed.
async fn news_sentiment(
    State(state): State<AppState>,
    params: Result<QueryParams, ApiError>,
) -> Response {
    let params = params.unwrap_or_default();
    let filters = NewsFilters::from_pairs(params.pairs());
    let served = state
        .service
        .news_sentiment(&filters, params.fetch_mode())
        .await;
    respond(served)
}

async fn search(State(state): State<AppState>, params: QueryParams) -> Result<Response, ApiError> {
    let keywords = params.get("keywords").unwrap_or_default();
    let served = state.service.search(keywords).await?;
    Ok(respond(served))
}
