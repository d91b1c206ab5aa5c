//! TCBS ticker overview

use super::http::HttpSource;
use crate::config::{TcbsConfig, render_template};
use crate::error::ProviderError;
use crate::models::{FundamentalsSnapshot, Industry, Metric, Ticker, UNAVAILABLE};
use crate::provider::{FundamentalsProvider, ProviderResult};
use async_trait::async_trait;
use serde::Deserialize;

pub const TCBS: &str = "TCBS";

/// Fields read from the overview document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcbsOverview {
    pub ticker: Option<String>,
    pub exchange: Option<String>,
    pub industry: Option<String>,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub industry_pe: Option<f64>,
    pub industry_pb: Option<f64>,
}

/// Fundamentals provider backed by the TCBS overview endpoint
pub struct TcbsFundamentals {
    http: HttpSource,
    url_template: String,
}

impl TcbsFundamentals {
    pub fn new(http: HttpSource, config: &TcbsConfig) -> Self {
        Self {
            http: http.with_bearer(config.api_key.clone()),
            url_template: config.url.clone(),
        }
    }
}

/// Map an overview document to a snapshot.
///
/// A document naming a different ticker, or carrying none of the recognized
/// fields, is rejected so the chain can move on.
pub fn map_overview(
    ticker: &Ticker,
    overview: TcbsOverview,
) -> ProviderResult<FundamentalsSnapshot> {
    if let Some(reported) = overview.ticker.as_deref() {
        if !reported.eq_ignore_ascii_case(ticker.as_str()) {
            return Err(ProviderError::malformed(
                TCBS,
                format!("overview is for {reported}, expected {ticker}"),
            ));
        }
    }

    let recognized = overview.pe.is_some()
        || overview.pb.is_some()
        || overview.industry.is_some()
        || overview.exchange.is_some();
    if !recognized {
        return Err(ProviderError::no_data(TCBS, ticker.as_str()));
    }

    Ok(FundamentalsSnapshot {
        pe: Metric::from_option(overview.pe, 2),
        pb: Metric::from_option(overview.pb, 2),
        industry: Industry::from_option(overview.industry.as_deref()),
        industry_pe: overview.industry_pe.filter(|v| v.is_finite()).unwrap_or(0.0),
        industry_pb: overview.industry_pb.filter(|v| v.is_finite()).unwrap_or(0.0),
        market: overview
            .exchange
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNAVAILABLE.to_string()),
        source: TCBS.to_string(),
    })
}

#[async_trait]
impl FundamentalsProvider for TcbsFundamentals {
    fn name(&self) -> &str {
        TCBS
    }

    async fn try_fetch(&self, ticker: &Ticker) -> ProviderResult<FundamentalsSnapshot> {
        let url = render_template(&self.url_template, ticker.as_str());
        let overview: Option<TcbsOverview> = self.http.get_json(&url).await?;
        let overview = overview.ok_or_else(|| ProviderError::no_data(TCBS, ticker.as_str()))?;
        map_overview(ticker, overview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FPT_OVERVIEW: &str = r#"{
        "ticker": "FPT",
        "exchange": "HOSE",
        "shortName": "FPT Corp",
        "industry": "Công nghệ Thông tin",
        "pe": 19.876,
        "pb": 4.512,
        "industryPe": 21.4,
        "industryPb": null
    }"#;

    fn fpt() -> Ticker {
        Ticker::parse("FPT").unwrap()
    }

    #[test]
    fn test_map_full_overview() {
        let overview: TcbsOverview = serde_json::from_str(FPT_OVERVIEW).unwrap();
        let snapshot = map_overview(&fpt(), overview).unwrap();

        assert_eq!(snapshot.pe, Metric::Value(19.88));
        assert_eq!(snapshot.pb, Metric::Value(4.51));
        assert_eq!(snapshot.industry, Industry::Named("Công nghệ Thông tin".to_string()));
        assert_eq!(snapshot.industry_pe, 21.4);
        assert_eq!(snapshot.industry_pb, 0.0);
        assert_eq!(snapshot.market, "HOSE");
        assert_eq!(snapshot.source, TCBS);
    }

    #[test]
    fn test_null_fields_become_sentinels() {
        let overview: TcbsOverview =
            serde_json::from_str(r#"{"ticker":"FPT","exchange":"HOSE","pe":null,"industry":""}"#)
                .unwrap();
        let snapshot = map_overview(&fpt(), overview).unwrap();

        assert_eq!(snapshot.pe, Metric::Unavailable);
        assert_eq!(snapshot.pb, Metric::Unavailable);
        assert_eq!(snapshot.industry, Industry::Unclassified);
    }

    #[test]
    fn test_empty_document_is_no_data() {
        let err = map_overview(&fpt(), TcbsOverview::default()).unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_mismatched_ticker_is_rejected() {
        let overview: TcbsOverview =
            serde_json::from_str(r#"{"ticker":"VNM","pe":15.0}"#).unwrap();
        let err = map_overview(&fpt(), overview).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { .. }));
    }
}
