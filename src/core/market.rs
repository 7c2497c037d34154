//! Market data query types and the upstream source abstraction

use crate::core::error::{ApiError, UpstreamError};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeSeriesFunction {
    Intraday,
    Daily,
    DailyAdjusted,
    Weekly,
    WeeklyAdjusted,
    Monthly,
    MonthlyAdjusted,
}

impl TimeSeriesFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeSeriesFunction::Intraday => "TIME_SERIES_INTRADAY",
            TimeSeriesFunction::Daily => "TIME_SERIES_DAILY",
            TimeSeriesFunction::DailyAdjusted => "TIME_SERIES_DAILY_ADJUSTED",
            TimeSeriesFunction::Weekly => "TIME_SERIES_WEEKLY",
            TimeSeriesFunction::WeeklyAdjusted => "TIME_SERIES_WEEKLY_ADJUSTED",
            TimeSeriesFunction::Monthly => "TIME_SERIES_MONTHLY",
            TimeSeriesFunction::MonthlyAdjusted => "TIME_SERIES_MONTHLY_ADJUSTED",
        }
    }

    pub fn is_intraday(&self) -> bool {
        *self == TimeSeriesFunction::Intraday
    }

    /// Field the provider nests the series under for this function.
    pub fn container_key(&self, interval: Option<Interval>) -> String {
        match self {
            TimeSeriesFunction::Intraday => format!(
                "Time Series ({})",
                interval.map_or("", |interval| interval.as_str())
            ),
            TimeSeriesFunction::Daily | TimeSeriesFunction::DailyAdjusted => {
                "Time Series (Daily)".to_string()
            }
            TimeSeriesFunction::Weekly => "Weekly Time Series".to_string(),
            TimeSeriesFunction::WeeklyAdjusted => "Weekly Adjusted Time Series".to_string(),
            TimeSeriesFunction::Monthly => "Monthly Time Series".to_string(),
            TimeSeriesFunction::MonthlyAdjusted => "Monthly Adjusted Time Series".to_string(),
        }
    }
}

impl Display for TimeSeriesFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeSeriesFunction {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TIME_SERIES_INTRADAY" => Ok(TimeSeriesFunction::Intraday),
            "TIME_SERIES_DAILY" => Ok(TimeSeriesFunction::Daily),
            "TIME_SERIES_DAILY_ADJUSTED" => Ok(TimeSeriesFunction::DailyAdjusted),
            "TIME_SERIES_WEEKLY" => Ok(TimeSeriesFunction::Weekly),
            "TIME_SERIES_WEEKLY_ADJUSTED" => Ok(TimeSeriesFunction::WeeklyAdjusted),
            "TIME_SERIES_MONTHLY" => Ok(TimeSeriesFunction::Monthly),
            "TIME_SERIES_MONTHLY_ADJUSTED" => Ok(TimeSeriesFunction::MonthlyAdjusted),
            _ => Err(ApiError::BadRequest(format!(
                "Unsupported time series function: {s}"
            ))),
        }
    }
}

/// Bar width for intraday series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    OneMin,
    FiveMin,
    FifteenMin,
    ThirtyMin,
    SixtyMin,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMin => "1min",
            Interval::FiveMin => "5min",
            Interval::FifteenMin => "15min",
            Interval::ThirtyMin => "30min",
            Interval::SixtyMin => "60min",
        }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1min" => Ok(Interval::OneMin),
            "5min" => Ok(Interval::FiveMin),
            "15min" => Ok(Interval::FifteenMin),
            "30min" => Ok(Interval::ThirtyMin),
            "60min" => Ok(Interval::SixtyMin),
            _ => Err(ApiError::BadRequest(format!("Unsupported interval: {s}"))),
        }
    }
}

/// Optional filters accepted by the news & sentiment endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsFilters {
    pub tickers: Option<String>,
    pub topics: Option<String>,
    pub time_from: Option<String>,
    pub time_to: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<String>,
}

impl NewsFilters {
    /// Collects filters from raw query pairs. Repeated `tickers` and `topics` are
    /// merged into one comma-separated list; for the other filters the last value wins.
    /// Unknown names are ignored.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut filters = NewsFilters::default();
        for (name, value) in pairs {
            let slot = match name {
                "tickers" => &mut filters.tickers,
                "topics" => &mut filters.topics,
                "time_from" => &mut filters.time_from,
                "time_to" => &mut filters.time_to,
                "sort" => &mut filters.sort,
                "limit" => &mut filters.limit,
                _ => continue,
            };
            *slot = match (name, slot.take()) {
                ("tickers" | "topics", Some(prev)) if !prev.trim().is_empty() => {
                    Some(format!("{prev},{value}"))
                }
                _ => Some(value.to_string()),
            };
        }
        filters
    }

    /// Non-blank filters as provider query parameters, in a fixed order.
    pub fn params(&self) -> Vec<(&'static str, &str)> {
        [
            ("tickers", &self.tickers),
            ("topics", &self.topics),
            ("time_from", &self.time_from),
            ("time_to", &self.time_to),
            ("sort", &self.sort),
            ("limit", &self.limit),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        })
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.params().is_empty()
    }

    /// Order-insensitive representation used as a cache key.
    ///
    /// `AAPL,msft` and `MSFT, AAPL` describe the same ticker filter and map to the
    /// same key.
    pub fn canonical(&self) -> String {
        self.params()
            .into_iter()
            .map(|(name, value)| {
                let value = match name {
                    "tickers" | "sort" => value.to_uppercase(),
                    "topics" => value.to_lowercase(),
                    _ => value.to_string(),
                };
                let value = match name {
                    "tickers" | "topics" => {
                        let mut parts: Vec<&str> = value
                            .split(',')
                            .map(str::trim)
                            .filter(|p| !p.is_empty())
                            .collect();
                        parts.sort_unstable();
                        parts.dedup();
                        parts.join(",")
                    }
                    _ => value,
                };
                format!("{name}={value}")
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// A fully-formed provider request: one `function` plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamQuery {
    function: String,
    params: Vec<(String, String)>,
}

impl UpstreamQuery {
    pub fn new(function: &str) -> Self {
        Self {
            function: function.to_string(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// All query pairs including `function`, excluding credentials.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        std::iter::once(("function", self.function.as_str()))
            .chain(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn top_gainers_losers() -> Self {
        Self::new("TOP_GAINERS_LOSERS")
    }

    pub fn company_overview(symbol: &str) -> Self {
        Self::new("OVERVIEW").param("symbol", symbol)
    }

    pub fn global_quote(symbol: &str) -> Self {
        Self::new("GLOBAL_QUOTE").param("symbol", symbol)
    }

    pub fn time_series(
        function: TimeSeriesFunction,
        symbol: &str,
        interval: Option<Interval>,
    ) -> Self {
        let query = Self::new(function.as_str()).param("symbol", symbol);
        match interval {
            Some(interval) if function.is_intraday() => query.param("interval", interval.as_str()),
            _ => query,
        }
    }

    pub fn news_sentiment(filters: &NewsFilters) -> Self {
        filters
            .params()
            .into_iter()
            .fold(Self::new("NEWS_SENTIMENT"), |query, (name, value)| {
                query.param(name, value)
            })
    }

    pub fn symbol_search(keywords: &str) -> Self {
        Self::new("SYMBOL_SEARCH").param("keywords", keywords)
    }
}

impl Display for UpstreamQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self.pairs().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&pairs.join("&"))
    }
}

/// Source of raw provider JSON. Shape validation is left to the caller.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn query(&self, query: &UpstreamQuery) -> Result<Value, UpstreamError>;
}
