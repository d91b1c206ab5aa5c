//! Provider seams used by the aggregator
//!
//! Each external source is wrapped in an adapter implementing one of these
//! traits. Adapters fail with [`ProviderError`]; the aggregator decides what
//! a failure means for the tier it happened in.

use crate::error::ProviderError;
use crate::models::{FundamentalsSnapshot, PriceSnapshot, Ticker};
use async_trait::async_trait;

/// Result of a single provider call
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Source of the latest trading-session price and volume
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Human-readable name recorded as `price_source`
    fn name(&self) -> &str;

    /// Latest close for the ticker, in VND.
    ///
    /// Returns [`ProviderError::NoData`] when the upstream has no rows.
    async fn latest(&self, ticker: &Ticker) -> ProviderResult<PriceSnapshot>;
}

/// Source of valuation ratios and classification
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    /// Human-readable name recorded as the snapshot `source`
    fn name(&self) -> &str;

    /// One attempt against this provider. The snapshot carries this
    /// provider's name as its source.
    async fn try_fetch(&self, ticker: &Ticker) -> ProviderResult<FundamentalsSnapshot>;
}
