//! Error types for stock data operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single provider attempt.
///
/// These never reach the caller directly: the aggregator absorbs them inside
/// the tier that produced them and advances to the next provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Upstream answered but had no rows for the ticker
    #[error("{provider}: no data for {ticker}")]
    NoData { provider: String, ticker: String },

    /// Network failure, timeout or unreadable body
    #[error("{provider}: transport error: {reason}")]
    Transport { provider: String, reason: String },

    /// Upstream answered with a non-success status code
    #[error("{provider}: upstream returned status {status}")]
    Status { provider: String, status: u16 },

    /// Required field missing or unparseable
    #[error("{provider}: malformed response: {reason}")]
    Malformed { provider: String, reason: String },

    /// Local rate budget exhausted for this provider
    #[error("{provider}: rate limit exceeded")]
    RateLimited { provider: String },
}

impl ProviderError {
    pub fn no_data(provider: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self::NoData {
            provider: provider.into(),
            ticker: ticker.into(),
        }
    }

    pub fn transport(provider: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    pub fn status(provider: impl Into<String>, status: u16) -> Self {
        Self::Status {
            provider: provider.into(),
            status,
        }
    }

    pub fn malformed(provider: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    pub fn rate_limited(provider: impl Into<String>) -> Self {
        Self::RateLimited {
            provider: provider.into(),
        }
    }

    /// Name of the provider that failed.
    pub fn provider(&self) -> &str {
        match self {
            Self::NoData { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Status { provider, .. }
            | Self::Malformed { provider, .. }
            | Self::RateLimited { provider } => provider,
        }
    }

    /// True when the upstream simply has nothing for the ticker.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }
}

/// Stock data specific errors
#[derive(Debug, Error)]
pub enum StockError {
    /// No price source had any data for the ticker
    #[error("Không tìm thấy dữ liệu mã {ticker}")]
    NotFound { ticker: String },

    /// Every price source failed for a reason other than missing data.
    ///
    /// `reason` keeps the provider chain for logs and is not displayed.
    #[error("Không lấy được giá mã {ticker}")]
    PriceUnavailable { ticker: String, reason: String },

    /// Ticker rejected before any provider was contacted
    #[error("Mã chứng khoán không hợp lệ: {0}")]
    InvalidTicker(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A provider failure that escaped its tier
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl StockError {
    /// Whether re-running the whole fetch could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PriceUnavailable { .. } | Self::Other(_) => true,
            Self::Provider(err) => !err.is_no_data(),
            Self::NotFound { .. } | Self::InvalidTicker(_) | Self::ConfigError(_) => false,
        }
    }
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

/// Caller-visible failure of a fetch.
///
/// Carries only a short message; provider detail stays in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{ticker}: {error}")]
pub struct ErrorResult {
    pub ticker: String,
    pub error: String,
}

impl ErrorResult {
    pub fn new(ticker: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            error: error.into(),
        }
    }

    pub fn from_error(ticker: impl Into<String>, err: &StockError) -> Self {
        Self::new(ticker, err.to_string())
    }

    /// Convenience accessor mirroring the serialized `error` field.
    pub fn message(&self) -> &str {
        &self.error
    }
}
