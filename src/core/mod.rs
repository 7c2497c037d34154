//! Core abstractions: cache namespaces, keys, query types and errors

pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod log;
pub mod market;

// Re-export main types for cleaner imports
pub use cache::{CacheEntry, CacheStore, Namespace, is_fresh};
pub use error::{ApiError, UpstreamError};
pub use market::{Interval, MarketDataSource, NewsFilters, TimeSeriesFunction, UpstreamQuery};
