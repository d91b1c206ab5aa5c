//! Yahoo Finance chart history: primary price source and terminal
//! fundamentals fallback

use crate::error::{ProviderError, Result, StockError};
use crate::models::{
    FundamentalsSnapshot, Industry, Metric, PriceSnapshot, Ticker, UNAVAILABLE, round_to,
};
use crate::provider::{FundamentalsProvider, PriceProvider, ProviderResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use yahoo_finance_api as yahoo;

pub const YAHOO_PRICE: &str = "Yahoo Finance";
pub const YAHOO_METADATA: &str = "Yahoo Finance (metadata)";

/// Chart-history access shared by both Yahoo adapters.
///
/// Clones share the connector and the exchange names seen in price
/// responses, so the metadata fallback can skip a second chart request.
#[derive(Clone)]
pub struct YahooChart {
    connector: Arc<yahoo::YahooConnector>,
    exchange_suffix: String,
    lookback_days: u32,
    timeout: Duration,
    exchanges: Arc<RwLock<HashMap<Ticker, String>>>,
}

impl YahooChart {
    pub fn new(
        exchange_suffix: impl Into<String>,
        lookback_days: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| StockError::ConfigError(format!("failed to build Yahoo client: {e}")))?;

        Ok(Self {
            connector: Arc::new(connector),
            exchange_suffix: exchange_suffix.into(),
            lookback_days,
            timeout,
            exchanges: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    async fn record_exchange(&self, ticker: &Ticker, exchange_name: String) {
        self.exchanges
            .write()
            .await
            .insert(ticker.clone(), exchange_name);
    }

    async fn known_exchange(&self, ticker: &Ticker) -> Option<String> {
        self.exchanges.read().await.get(ticker).cloned()
    }

    fn symbol(&self, ticker: &Ticker) -> String {
        ticker.with_suffix(&self.exchange_suffix)
    }

    async fn history(&self, provider: &str, ticker: &Ticker) -> ProviderResult<yahoo::YResponse> {
        let symbol = self.symbol(ticker);
        let end = OffsetDateTime::now_utc();
        let start = end - time::Duration::days(i64::from(self.lookback_days));

        tracing::debug!(
            provider,
            %symbol,
            lookback_days = self.lookback_days,
            "requesting chart history"
        );

        tokio::time::timeout(self.timeout, self.connector.get_quote_history(&symbol, start, end))
            .await
            .map_err(|_| ProviderError::transport(provider, "request timed out"))?
            .map_err(|e| classify(provider, ticker, &e))
    }
}

/// Map a client error to the provider taxonomy.
///
/// Unknown symbols come back as a chart error with code `Not Found`, or as
/// a chart with no result or no quotes. All three mean no data.
fn classify(provider: &str, ticker: &Ticker, err: &yahoo::YahooError) -> ProviderError {
    match err {
        yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult => {
            ProviderError::no_data(provider, ticker.as_str())
        }
        yahoo::YahooError::ApiError(msg) if is_not_found(msg.code.as_deref()) => {
            ProviderError::no_data(provider, ticker.as_str())
        }
        other => ProviderError::transport(provider, other),
    }
}

fn is_not_found(code: Option<&str>) -> bool {
    code.is_some_and(|c| c.trim().eq_ignore_ascii_case("not found"))
}

/// Latest usable bar in a chart series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LatestBar {
    pub close: f64,
    pub volume: u64,
    pub session: Option<NaiveDate>,
}

/// Pick the most recent bar with a positive close.
///
/// Yahoo pads missing sessions with zero closes, so those are skipped.
pub(crate) fn latest_bar(bars: &[(i64, f64, u64)]) -> Option<LatestBar> {
    bars.iter()
        .filter(|(_, close, _)| close.is_finite() && *close > 0.0)
        .max_by_key(|(ts, _, _)| *ts)
        .map(|&(ts, close, volume)| LatestBar {
            close,
            volume,
            session: DateTime::from_timestamp(ts, 0).map(|d| d.date_naive()),
        })
}

/// Primary price provider backed by Yahoo chart history
pub struct YahooPriceProvider {
    chart: YahooChart,
}

impl YahooPriceProvider {
    pub fn new(chart: YahooChart) -> Self {
        Self { chart }
    }
}

#[async_trait]
impl PriceProvider for YahooPriceProvider {
    fn name(&self) -> &str {
        YAHOO_PRICE
    }

    async fn latest(&self, ticker: &Ticker) -> ProviderResult<PriceSnapshot> {
        let response = self.chart.history(YAHOO_PRICE, ticker).await?;
        let quotes = response
            .quotes()
            .map_err(|e| classify(YAHOO_PRICE, ticker, &e))?;

        let bars: Vec<(i64, f64, u64)> = quotes
            .iter()
            .map(|q| (q.timestamp as i64, q.close, q.volume))
            .collect();

        let bar = latest_bar(&bars)
            .ok_or_else(|| ProviderError::no_data(YAHOO_PRICE, ticker.as_str()))?;

        if let Ok(metadata) = response.metadata() {
            self.chart.record_exchange(ticker, metadata.exchange_name).await;
        }

        Ok(PriceSnapshot {
            ticker: ticker.clone(),
            price: round_to(bar.close, 0),
            volume: Some(bar.volume),
            session: bar.session,
            source: YAHOO_PRICE.to_string(),
        })
    }
}

/// Last-resort fundamentals derived from chart metadata.
///
/// Yahoo publishes no Vietnamese ratios, so only the market is filled in.
pub struct YahooMetadataFundamentals {
    chart: YahooChart,
}

impl YahooMetadataFundamentals {
    pub fn new(chart: YahooChart) -> Self {
        Self { chart }
    }
}

pub(crate) fn metadata_snapshot(exchange_name: Option<&str>) -> FundamentalsSnapshot {
    let market = exchange_name
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNAVAILABLE);

    FundamentalsSnapshot {
        pe: Metric::Unavailable,
        pb: Metric::Unavailable,
        industry: Industry::Unclassified,
        industry_pe: 0.0,
        industry_pb: 0.0,
        market: market.to_string(),
        source: YAHOO_METADATA.to_string(),
    }
}

#[async_trait]
impl FundamentalsProvider for YahooMetadataFundamentals {
    fn name(&self) -> &str {
        YAHOO_METADATA
    }

    async fn try_fetch(&self, ticker: &Ticker) -> ProviderResult<FundamentalsSnapshot> {
        if let Some(exchange_name) = self.chart.known_exchange(ticker).await {
            tracing::debug!(ticker = %ticker, "reusing exchange name from price response");
            return Ok(metadata_snapshot(Some(exchange_name.as_str())));
        }

        let response = self.chart.history(YAHOO_METADATA, ticker).await?;
        let metadata = response
            .metadata()
            .map_err(|e| classify(YAHOO_METADATA, ticker, &e))?;

        Ok(metadata_snapshot(Some(metadata.exchange_name.as_str())))
    }
}
