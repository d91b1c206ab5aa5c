//! Ordered-fallback aggregation of price and fundamentals

use crate::api::{
    HttpSource, ScrapePriceProvider, TcbsFundamentals, VndirectFundamentals, YahooChart,
    YahooMetadataFundamentals, YahooPriceProvider,
};
use crate::api::{scrape::SCRAPE, tcbs::TCBS, vndirect::VNDIRECT};
use crate::cache::SnapshotCache;
use crate::config::StockConfig;
use crate::error::{ErrorResult, ProviderError, Result, StockError};
use crate::models::{FundamentalsSnapshot, PriceSnapshot, StockSnapshot, Ticker};
use crate::provider::{FundamentalsProvider, PriceProvider};
use crate::retry::RetryPolicy;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Provider names in the order they are consulted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceChain {
    pub price: Vec<String>,
    pub fundamentals: Vec<String>,
}

/// Resolves a ticker to a merged [`StockSnapshot`].
///
/// Price providers are tried in order and the first usable price wins. If
/// none has data the fetch fails. Fundamentals providers are then tried in
/// order; the first success supplies every fundamentals field, and when all
/// of them fail the snapshot carries sentinel values instead of an error.
/// Successful snapshots are cached per ticker, and the cache-miss path runs
/// under a bounded retry.
pub struct DataAggregator {
    price_providers: Vec<Arc<dyn PriceProvider>>,
    fundamentals_providers: Vec<Arc<dyn FundamentalsProvider>>,
    cache: SnapshotCache,
    retry: RetryPolicy,
}

impl DataAggregator {
    pub fn builder() -> DataAggregatorBuilder {
        DataAggregatorBuilder::default()
    }

    /// Wire the live adapters in their fixed priority order.
    ///
    /// Price: Yahoo chart history, then the HTML scraper when enabled.
    /// Fundamentals: TCBS, VNDirect, then Yahoo chart metadata.
    pub fn from_config(config: &StockConfig) -> Result<Self> {
        config.validate()?;

        let chart = YahooChart::new(
            config.exchange_suffix.clone(),
            config.lookback_days,
            config.request_timeout,
        )?;
        let http = |name: &str| {
            HttpSource::new(name, config.request_timeout, config.requests_per_minute)
        };

        let mut builder = Self::builder()
            .price_provider(Arc::new(YahooPriceProvider::new(chart.clone())))
            .fundamentals_provider(Arc::new(TcbsFundamentals::new(http(TCBS)?, &config.tcbs)))
            .fundamentals_provider(Arc::new(VndirectFundamentals::new(
                http(VNDIRECT)?,
                &config.vndirect,
            )))
            .fundamentals_provider(Arc::new(YahooMetadataFundamentals::new(chart)))
            .cache_ttl(config.cache_ttl)
            .retry_policy(RetryPolicy::from_config(config));

        if config.scrape.enabled {
            builder = builder.price_provider(Arc::new(ScrapePriceProvider::new(
                http(SCRAPE)?,
                &config.scrape,
            )?));
        }

        builder.build()
    }

    /// Fetch a snapshot, serving from cache while it is fresh.
    pub async fn fetch(&self, ticker: &str) -> std::result::Result<StockSnapshot, ErrorResult> {
        let ticker =
            Ticker::parse(ticker).map_err(|e| ErrorResult::from_error(ticker.trim(), &e))?;
        let ticker = &ticker;
        let operation = format!("fetch {ticker}");
        let operation = operation.as_str();

        self.cache
            .get_or_fetch(ticker, move || {
                self.retry
                    .execute(operation, move || self.fetch_uncached(ticker))
            })
            .await
            .map_err(|e| {
                warn!("Fetch for {} failed: {}", ticker, e);
                ErrorResult::from_error(ticker.as_str(), &e)
            })
    }

    async fn fetch_uncached(&self, ticker: &Ticker) -> Result<StockSnapshot> {
        let price = self.fetch_price(ticker).await?;
        let fundamentals = self.fetch_fundamentals(ticker).await;
        Ok(StockSnapshot::merge(price, fundamentals))
    }

    async fn fetch_price(&self, ticker: &Ticker) -> Result<PriceSnapshot> {
        let mut errors: Vec<ProviderError> = Vec::new();

        for (rank, provider) in self.price_providers.iter().enumerate() {
            debug!("Requesting price for {} from {}", ticker, provider.name());

            match provider.latest(ticker).await {
                Ok(mut snapshot) => {
                    if rank > 0 {
                        info!("Price for {} served by fallback {}", ticker, provider.name());
                    }
                    snapshot.source = provider.name().to_string();
                    return Ok(snapshot);
                }
                Err(e) if e.is_no_data() => {
                    debug!("{}", e);
                    errors.push(e);
                }
                Err(e) => {
                    warn!("Price provider failed for {}: {}", ticker, e);
                    errors.push(e);
                }
            }
        }

        if errors.iter().all(ProviderError::is_no_data) {
            return Err(StockError::NotFound {
                ticker: ticker.to_string(),
            });
        }

        let reason = errors
            .iter()
            .filter(|e| !e.is_no_data())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        warn!("No price for {}: {}", ticker, reason);

        Err(StockError::PriceUnavailable {
            ticker: ticker.to_string(),
            reason,
        })
    }

    async fn fetch_fundamentals(&self, ticker: &Ticker) -> FundamentalsSnapshot {
        for provider in &self.fundamentals_providers {
            debug!("Requesting fundamentals for {} from {}", ticker, provider.name());

            match provider.try_fetch(ticker).await {
                Ok(mut snapshot) => {
                    info!("Fundamentals for {} served by {}", ticker, provider.name());
                    snapshot.source = provider.name().to_string();
                    return snapshot;
                }
                Err(e) => warn!("Fundamentals provider failed for {}: {}", ticker, e),
            }
        }

        warn!("All fundamentals providers failed for {}; using sentinels", ticker);
        FundamentalsSnapshot::unavailable()
    }

    /// Drop the cached snapshot for a ticker, if any
    pub async fn invalidate(&self, ticker: &str) -> bool {
        match Ticker::parse(ticker) {
            Ok(ticker) => self.cache.invalidate(&ticker).await,
            Err(_) => false,
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.len().await
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }

    pub fn sources(&self) -> SourceChain {
        SourceChain {
            price: self.price_providers.iter().map(|p| p.name().to_string()).collect(),
            fundamentals: self
                .fundamentals_providers
                .iter()
                .map(|p| p.name().to_string())
                .collect(),
        }
    }
}

/// Builder for DataAggregator
pub struct DataAggregatorBuilder {
    price_providers: Vec<Arc<dyn PriceProvider>>,
    fundamentals_providers: Vec<Arc<dyn FundamentalsProvider>>,
    cache_ttl: Duration,
    retry: RetryPolicy,
}

impl Default for DataAggregatorBuilder {
    fn default() -> Self {
        Self {
            price_providers: Vec::new(),
            fundamentals_providers: Vec::new(),
            cache_ttl: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

impl DataAggregatorBuilder {
    /// Append a price provider; earlier providers take priority
    pub fn price_provider(mut self, provider: Arc<dyn PriceProvider>) -> Self {
        self.price_providers.push(provider);
        self
    }

    /// Append a fundamentals provider; earlier providers take priority
    pub fn fundamentals_provider(mut self, provider: Arc<dyn FundamentalsProvider>) -> Self {
        self.fundamentals_providers.push(provider);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Result<DataAggregator> {
        if self.price_providers.is_empty() {
            return Err(StockError::ConfigError(
                "at least one price provider is required".to_string(),
            ));
        }
        if self.fundamentals_providers.is_empty() {
            return Err(StockError::ConfigError(
                "at least one fundamentals provider is required".to_string(),
            ));
        }

        Ok(DataAggregator {
            price_providers: self.price_providers,
            fundamentals_providers: self.fundamentals_providers,
            cache: SnapshotCache::new(self.cache_ttl),
            retry: self.retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Industry, Metric};
    use crate::provider::{MockFundamentalsProvider, MockPriceProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn price_ok(name: &str, price: f64) -> MockPriceProvider {
        let mut mock = MockPriceProvider::new();
        mock.expect_name().return_const(name.to_string());
        let source = name.to_string();
        mock.expect_latest().returning(move |ticker| {
            Ok(PriceSnapshot {
                ticker: ticker.clone(),
                price,
                volume: Some(1_200_000),
                session: None,
                source: source.clone(),
            })
        });
        mock
    }

    fn fundamentals_ok(name: &str) -> MockFundamentalsProvider {
        let mut mock = MockFundamentalsProvider::new();
        mock.expect_name().return_const(name.to_string());
        let source = name.to_string();
        mock.expect_try_fetch().returning(move |_| {
            Ok(FundamentalsSnapshot {
                pe: Metric::Value(12.3),
                pb: Metric::Value(1.8),
                industry: Industry::Named("Technology".to_string()),
                industry_pe: 0.0,
                industry_pb: 0.0,
                market: "HOSE".to_string(),
                source: source.clone(),
            })
        });
        mock
    }

    fn fundamentals_failing(name: &str, times: usize) -> MockFundamentalsProvider {
        let mut mock = MockFundamentalsProvider::new();
        mock.expect_name().return_const(name.to_string());
        let provider = name.to_string();
        mock.expect_try_fetch()
            .times(times)
            .returning(move |_| Err(ProviderError::status(provider.clone(), 503)));
        mock
    }

    #[tokio::test]
    async fn test_not_found_skips_fundamentals() {
        let mut price = MockPriceProvider::new();
        price.expect_name().return_const("Primary".to_string());
        price
            .expect_latest()
            .times(1)
            .returning(|t| Err(ProviderError::no_data("Primary", t.as_str())));

        let mut fundamentals = MockFundamentalsProvider::new();
        fundamentals.expect_name().return_const("A".to_string());
        fundamentals.expect_try_fetch().times(0);

        let aggregator = DataAggregator::builder()
            .price_provider(Arc::new(price))
            .fundamentals_provider(Arc::new(fundamentals))
            .retry_policy(RetryPolicy::fast())
            .build()
            .unwrap();

        let err = aggregator.fetch("ZZZZ").await.unwrap_err();
        assert_eq!(err.ticker, "ZZZZ");
        assert_eq!(err.error, "Không tìm thấy dữ liệu mã ZZZZ");
        assert_eq!(aggregator.cached_len().await, 0);
    }

    #[tokio::test]
    async fn test_cache_hit_invokes_no_provider() {
        let mut price = MockPriceProvider::new();
        price.expect_name().return_const("Primary".to_string());
        price.expect_latest().times(1).returning(|t| {
            Ok(PriceSnapshot {
                ticker: t.clone(),
                price: 92_500.0,
                volume: Some(1_200_000),
                session: None,
                source: "Primary".to_string(),
            })
        });

        let mut fundamentals = MockFundamentalsProvider::new();
        fundamentals.expect_name().return_const("A".to_string());
        fundamentals
            .expect_try_fetch()
            .times(1)
            .returning(|_| Ok(FundamentalsSnapshot::unavailable()));

        let aggregator = DataAggregator::builder()
            .price_provider(Arc::new(price))
            .fundamentals_provider(Arc::new(fundamentals))
            .build()
            .unwrap();

        let first = aggregator.fetch("FPT").await.unwrap();
        let second = aggregator.fetch("fpt").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(aggregator.cached_len().await, 1);
    }

    #[tokio::test]
    async fn test_first_successful_fundamentals_provider_wins() {
        let aggregator = DataAggregator::builder()
            .price_provider(Arc::new(price_ok("Primary", 92.5)))
            .fundamentals_provider(Arc::new(fundamentals_failing("A", 1)))
            .fundamentals_provider(Arc::new(fundamentals_ok("B")))
            .build()
            .unwrap();

        let snapshot = aggregator.fetch("FPT").await.unwrap();
        assert_eq!(snapshot.source, "B");
        assert_eq!(snapshot.price, 92.5);
        assert_eq!(snapshot.pe, Metric::Value(12.3));
    }

    #[tokio::test]
    async fn test_all_fundamentals_failing_yields_sentinels() {
        let aggregator = DataAggregator::builder()
            .price_provider(Arc::new(price_ok("Primary", 92_500.0)))
            .fundamentals_provider(Arc::new(fundamentals_failing("A", 1)))
            .fundamentals_provider(Arc::new(fundamentals_failing("B", 1)))
            .build()
            .unwrap();

        let snapshot = aggregator.fetch("FPT").await.unwrap();
        assert_eq!(snapshot.pe, Metric::Unavailable);
        assert_eq!(snapshot.pb, Metric::Unavailable);
        assert_eq!(snapshot.industry, Industry::Unclassified);
        assert_eq!(snapshot.avg_pe, 0.0);
        assert_eq!(snapshot.avg_pb, 0.0);
        assert_eq!(snapshot.source, crate::models::NO_SOURCE);
    }

    #[tokio::test]
    async fn test_scrape_fallback_after_empty_primary() {
        let mut primary = MockPriceProvider::new();
        primary.expect_name().return_const("Primary".to_string());
        primary
            .expect_latest()
            .returning(|t| Err(ProviderError::no_data("Primary", t.as_str())));

        let aggregator = DataAggregator::builder()
            .price_provider(Arc::new(primary))
            .price_provider(Arc::new(price_ok("Scrape", 92_500.0)))
            .fundamentals_provider(Arc::new(fundamentals_ok("A")))
            .build()
            .unwrap();

        let snapshot = aggregator.fetch("FPT").await.unwrap();
        assert_eq!(snapshot.price_source, "Scrape");
        assert_eq!(snapshot.price, 92_500.0);
    }

    #[tokio::test]
    async fn test_transient_price_failure_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut price = MockPriceProvider::new();
        price.expect_name().return_const("Primary".to_string());
        price.expect_latest().times(2).returning(move |t| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProviderError::transport("Primary", "connection reset"))
            } else {
                Ok(PriceSnapshot {
                    ticker: t.clone(),
                    price: 61_000.0,
                    volume: Some(10),
                    session: None,
                    source: "Primary".to_string(),
                })
            }
        });

        let aggregator = DataAggregator::builder()
            .price_provider(Arc::new(price))
            .fundamentals_provider(Arc::new(fundamentals_ok("A")))
            .retry_policy(RetryPolicy::fast())
            .build()
            .unwrap();

        let snapshot = aggregator.fetch("VNM").await.unwrap();
        assert_eq!(snapshot.price, 61_000.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_price_unavailable_after_retries() {
        let mut price = MockPriceProvider::new();
        price.expect_name().return_const("Primary".to_string());
        price
            .expect_latest()
            .times(2)
            .returning(|_| Err(ProviderError::transport("Primary", "connection reset by peer")));

        let mut fundamentals = MockFundamentalsProvider::new();
        fundamentals.expect_name().return_const("A".to_string());
        fundamentals.expect_try_fetch().times(0);

        let aggregator = DataAggregator::builder()
            .price_provider(Arc::new(price))
            .fundamentals_provider(Arc::new(fundamentals))
            .retry_policy(RetryPolicy::fast())
            .build()
            .unwrap();

        let err = aggregator.fetch("VNM").await.unwrap_err();
        assert_eq!(err.error, "Không lấy được giá mã VNM");
        assert!(!err.error.contains("Primary"));
        assert!(!err.error.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_invalid_ticker_contacts_no_provider() {
        let mut price = MockPriceProvider::new();
        price.expect_name().return_const("Primary".to_string());
        price.expect_latest().times(0);

        let aggregator = DataAggregator::builder()
            .price_provider(Arc::new(price))
            .fundamentals_provider(Arc::new(fundamentals_failing("A", 0)))
            .build()
            .unwrap();

        let err = aggregator.fetch("  $$ ").await.unwrap_err();
        assert_eq!(err.ticker, "$$");
        assert!(!aggregator.invalidate("$$").await);
    }

    #[test]
    fn test_builder_requires_providers() {
        assert!(DataAggregator::builder().build().is_err());
        assert!(
            DataAggregator::builder()
                .price_provider(Arc::new(price_ok("Primary", 1.0)))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_sources_preserve_order() {
        let aggregator = DataAggregator::builder()
            .price_provider(Arc::new(price_ok("Primary", 1.0)))
            .fundamentals_provider(Arc::new(fundamentals_ok("A")))
            .fundamentals_provider(Arc::new(fundamentals_ok("B")))
            .build()
            .unwrap();

        let chain = aggregator.sources();
        assert_eq!(chain.price, vec!["Primary"]);
        assert_eq!(chain.fundamentals, vec!["A", "B"]);
    }
}
