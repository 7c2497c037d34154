//! Cache-key derivation per namespace

use crate::core::config::NewsCacheKey;
use crate::core::error::ApiError;
use crate::core::market::{Interval, NewsFilters, TimeSeriesFunction};

/// Key used by namespaces that hold a single entry.
pub const SINGLETON_KEY: &str = "latest";

/// Normalizes a ticker symbol: trimmed and uppercased.
pub fn symbol_key(symbol: &str) -> Result<String, ApiError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ApiError::BadRequest("Symbol must not be empty".to_string()));
    }
    Ok(symbol.to_uppercase())
}

/// `FUNCTION_SYMBOL` or `FUNCTION_SYMBOL_INTERVAL`.
///
/// The interval only takes part for intraday series; daily, weekly and monthly
/// data do not vary by interval.
pub fn series_key(function: TimeSeriesFunction, symbol: &str, interval: Option<Interval>) -> String {
    match interval {
        Some(interval) if function.is_intraday() => format!("{function}_{symbol}_{interval}"),
        _ => format!("{function}_{symbol}"),
    }
}

pub fn news_key(filters: &NewsFilters, keying: NewsCacheKey) -> String {
    match keying {
        // Every filter combination shares one entry, so a `technology` request may be
        // answered with a cached `earnings` result inside the TTL window.
        NewsCacheKey::Singleton => SINGLETON_KEY.to_string(),
        NewsCacheKey::PerFilter if filters.is_empty() => SINGLETON_KEY.to_string(),
        NewsCacheKey::PerFilter => filters.canonical(),
    }
}
