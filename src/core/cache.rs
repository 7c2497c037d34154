//! Cache namespaces, freshness policy and the store abstraction

use crate::core::error::ApiError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

/// Independent cache partition for one class of market data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    TopGainersLosers,
    CompanyOverview,
    Quote,
    TimeSeries,
    NewsSentiment,
}

impl Namespace {
    pub const ALL: [Namespace; 5] = [
        Namespace::TopGainersLosers,
        Namespace::CompanyOverview,
        Namespace::Quote,
        Namespace::TimeSeries,
        Namespace::NewsSentiment,
    ];

    /// Maximum age at which an entry is served without refetching.
    pub fn ttl(&self) -> Duration {
        match self {
            Namespace::TopGainersLosers => 6 * HOUR,
            Namespace::CompanyOverview => 24 * HOUR,
            Namespace::Quote => MINUTE,
            Namespace::TimeSeries => 15 * MINUTE,
            Namespace::NewsSentiment => 6 * HOUR,
        }
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Namespace::TopGainersLosers => "top-gainers-losers",
                Namespace::CompanyOverview => "company-overview",
                Namespace::Quote => "quote",
                Namespace::TimeSeries => "time-series",
                Namespace::NewsSentiment => "news-sentiment",
            }
        )
    }
}

impl FromStr for Namespace {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::ALL
            .into_iter()
            .find(|namespace| namespace.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown cache namespace: {s}")))
    }
}

/// Returns true when an entry of the given age may be served as fresh.
///
/// `None` stands for an absent entry (infinite age) and is never fresh. An entry
/// exactly `ttl` old is already stale.
pub fn is_fresh(namespace: Namespace, age: Option<Duration>) -> bool {
    age.is_some_and(|age| age < namespace.ttl())
}

/// Last known payload for a key, stamped with when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Arc<Value>,
    pub fetched_at: Instant,
    pub fetched_on: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(payload: Arc<Value>) -> Self {
        Self {
            payload,
            fetched_at: Instant::now(),
            fetched_on: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Namespaced storage for upstream payloads.
///
/// Implementations only ever replace whole entries; callers never hold a lock
/// across an upstream fetch.
pub trait CacheStore: Send + Sync {
    fn get(&self, namespace: Namespace, key: &str) -> Option<CacheEntry>;

    /// Stores `payload` under `key`, overwriting any previous entry.
    fn put(&self, namespace: Namespace, key: &str, payload: Arc<Value>);

    /// Age of the entry, `None` when nothing is stored for the key.
    fn age(&self, namespace: Namespace, key: &str) -> Option<Duration> {
        self.get(namespace, key).map(|entry| entry.age())
    }

    /// Drops every entry of a namespace.
    fn clear(&self, namespace: Namespace);

    fn len(&self, namespace: Namespace) -> usize;

    /// Wall-clock time of the most recent write into the namespace.
    fn last_fetched(&self, namespace: Namespace) -> Option<DateTime<Utc>>;
}
