//! VNDirect finfo: latest ratios joined with stock metadata

use super::http::HttpSource;
use crate::config::{VndirectConfig, render_template};
use crate::error::ProviderError;
use crate::models::{FundamentalsSnapshot, Industry, Metric, Ticker, UNAVAILABLE};
use crate::provider::{FundamentalsProvider, ProviderResult};
use async_trait::async_trait;
use serde::Deserialize;

pub const VNDIRECT: &str = "VNDirect";

const PRICE_TO_EARNINGS: &str = "PRICE_TO_EARNINGS";
const PRICE_TO_BOOK: &str = "PRICE_TO_BOOK";

/// `{"data": [...]}` envelope used by every finfo endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioRow {
    pub code: String,
    pub ratio_code: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRow {
    pub code: String,
    pub floor: Option<String>,
    pub industry_name: Option<String>,
}

/// Fundamentals provider joining the ratios and stocks endpoints
pub struct VndirectFundamentals {
    http: HttpSource,
    ratios_url: String,
    stocks_url: String,
}

impl VndirectFundamentals {
    pub fn new(http: HttpSource, config: &VndirectConfig) -> Self {
        Self {
            http,
            ratios_url: config.ratios_url.clone(),
            stocks_url: config.stocks_url.clone(),
        }
    }
}

fn ratio(rows: &[RatioRow], ticker: &Ticker, code: &str) -> Metric {
    let value = rows
        .iter()
        .find(|row| row.code.eq_ignore_ascii_case(ticker.as_str()) && row.ratio_code == code)
        .and_then(|row| row.value);
    Metric::from_option(value, 2)
}

/// Join ratio rows with the stock row for `ticker`.
///
/// The metadata row is mandatory; missing ratio rows degrade to N/A.
/// VNDirect publishes no industry averages.
pub fn join_rows(
    ticker: &Ticker,
    ratios: &[RatioRow],
    stocks: &[StockRow],
) -> ProviderResult<FundamentalsSnapshot> {
    let stock = stocks
        .iter()
        .find(|row| row.code.eq_ignore_ascii_case(ticker.as_str()))
        .ok_or_else(|| ProviderError::no_data(VNDIRECT, ticker.as_str()))?;

    Ok(FundamentalsSnapshot {
        pe: ratio(ratios, ticker, PRICE_TO_EARNINGS),
        pb: ratio(ratios, ticker, PRICE_TO_BOOK),
        industry: Industry::from_option(stock.industry_name.as_deref()),
        industry_pe: 0.0,
        industry_pb: 0.0,
        market: stock
            .floor
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNAVAILABLE)
            .to_string(),
        source: VNDIRECT.to_string(),
    })
}

#[async_trait]
impl FundamentalsProvider for VndirectFundamentals {
    fn name(&self) -> &str {
        VNDIRECT
    }

    async fn try_fetch(&self, ticker: &Ticker) -> ProviderResult<FundamentalsSnapshot> {
        let ratios: Envelope<RatioRow> = self
            .http
            .get_json(&render_template(&self.ratios_url, ticker.as_str()))
            .await?;
        let stocks: Envelope<StockRow> = self
            .http
            .get_json(&render_template(&self.stocks_url, ticker.as_str()))
            .await?;

        join_rows(ticker, &ratios.data, &stocks.data)
    }
}
