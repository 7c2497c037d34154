use thiserror::Error;

/// Failure while talking to the market-data provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),
    #[error("Upstream returned HTTP {0}")]
    Http(u16),
    #[error("Upstream returned malformed JSON: {0}")]
    Malformed(String),
}

/// Errors surfaced to API callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Symbol or content legitimately absent upstream.
    #[error("{0}")]
    NotFound(String),
    /// Missing or invalid request parameter.
    #[error("{0}")]
    BadRequest(String),
    #[error("Failed to reach market data provider: {0}")]
    UpstreamUnreachable(String),
    #[error("Market data provider returned HTTP {0}")]
    UpstreamHttp(u16),
    /// The provider answered 200 but the body does not match the endpoint contract.
    #[error("Invalid data from market data provider: {0}")]
    InvalidUpstreamShape(String),
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Unreachable(msg) => ApiError::UpstreamUnreachable(msg),
            UpstreamError::Http(status) => ApiError::UpstreamHttp(status),
            UpstreamError::Malformed(msg) => ApiError::InvalidUpstreamShape(msg),
        }
    }
}
