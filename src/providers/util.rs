use crate::core::config::AlphaVantageConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How many times a failed upstream request is re-sent, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: usize, delay: Duration) -> Self {
        RetryPolicy { retries, delay }
    }

    /// Runs `operation` up to `1 + retries` times and returns the last error if every run fails.
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut remaining = self.retries;
        loop {
            match operation().await {
                Ok(val) => return Ok(val),
                Err(err) if remaining == 0 => return Err(err),
                Err(err) => {
                    warn!(
                        error = %err,
                        remaining,
                        "Upstream request failed, retrying in {:?}",
                        self.delay
                    );
                    remaining -= 1;
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

impl From<&AlphaVantageConfig> for RetryPolicy {
    fn from(config: &AlphaVantageConfig) -> Self {
        RetryPolicy::new(config.retries, Duration::from_millis(config.retry_delay_ms))
    }
}
