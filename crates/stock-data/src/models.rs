//! Snapshot types produced by providers and returned by the aggregator

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

use crate::error::StockError;

const MAX_TICKER_LEN: usize = 10;

/// Sentinel text for ratios a provider could not supply.
pub const UNAVAILABLE: &str = "N/A";

/// Sentinel text for a missing industry classification.
pub const UNCLASSIFIED: &str = "Unclassified";

/// Source name used when no fundamentals provider produced data.
pub const NO_SOURCE: &str = "none";

/// Validated, uppercased ticker symbol.
///
/// Exchange suffixes are not part of the ticker; each provider adapter adds
/// its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Parse and normalize a ticker to uppercase.
    pub fn parse(input: &str) -> Result<Self, StockError> {
        let normalized = input.trim().to_ascii_uppercase();
        if normalized.is_empty() || normalized.len() > MAX_TICKER_LEN {
            return Err(StockError::InvalidTicker(input.to_string()));
        }

        let mut chars = normalized.chars();
        let starts_with_letter = chars.next().is_some_and(|ch| ch.is_ascii_alphabetic());
        if !starts_with_letter || !chars.all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(StockError::InvalidTicker(input.to_string()));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ticker with an exchange marker appended, e.g. `FPT` -> `FPT.VN`.
    pub fn with_suffix(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.0)
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Ticker {
    type Error = StockError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

/// A valuation ratio, or the explicit "unavailable" sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Value(f64),
    Unavailable,
}

impl Metric {
    /// Map an upstream nullable number, rounding to `decimals` places.
    ///
    /// Non-finite values are treated as missing.
    pub fn from_option(value: Option<f64>, decimals: u32) -> Self {
        match value {
            Some(v) if v.is_finite() => Self::Value(round_to(v, decimals)),
            _ => Self::Unavailable,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Number(v)) => Ok(Self::from_option(Some(v), u32::MAX)),
            Some(Raw::Text(text)) => Ok(text
                .trim()
                .parse::<f64>()
                .map_or(Self::Unavailable, |v| Self::from_option(Some(v), u32::MAX))),
            None => Ok(Self::Unavailable),
        }
    }
}

/// Industry classification, or the explicit "unclassified" sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Industry {
    Named(String),
    Unclassified,
}

impl Industry {
    /// Blank or missing names become [`Industry::Unclassified`].
    pub fn from_option(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(name) if !name.is_empty() => Self::Named(name.to_string()),
            _ => Self::Unclassified,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Unclassified => UNCLASSIFIED,
        }
    }
}

impl Display for Industry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Industry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Industry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref() {
            Some(UNCLASSIFIED) => Self::Unclassified,
            other => Self::from_option(other),
        })
    }
}

/// Latest trading-session price and volume from one price source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub ticker: Ticker,
    pub price: f64,
    /// `None` for sources that only publish a price
    pub volume: Option<u64>,
    /// Session date of the bar the price was taken from, when known
    pub session: Option<NaiveDate>,
    pub source: String,
}

/// Valuation and classification data from one fundamentals provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsSnapshot {
    pub pe: Metric,
    pub pb: Metric,
    pub industry: Industry,
    /// Zero when upstream does not publish an industry average
    pub industry_pe: f64,
    pub industry_pb: f64,
    pub market: String,
    pub source: String,
}

impl FundamentalsSnapshot {
    /// Fully-defaulted value used when every fundamentals provider failed.
    pub fn unavailable() -> Self {
        Self {
            pe: Metric::Unavailable,
            pb: Metric::Unavailable,
            industry: Industry::Unclassified,
            industry_pe: 0.0,
            industry_pb: 0.0,
            market: UNAVAILABLE.to_string(),
            source: NO_SOURCE.to_string(),
        }
    }
}

/// Merged snapshot handed to report and display collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub ticker: Ticker,
    pub price: f64,
    pub volume: Option<u64>,
    pub session: Option<NaiveDate>,
    pub price_source: String,
    pub pe: Metric,
    pub pb: Metric,
    pub industry: Industry,
    pub avg_pe: f64,
    pub avg_pb: f64,
    pub market: String,
    /// Fundamentals provider whose data survived into this snapshot
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl StockSnapshot {
    pub fn merge(price: PriceSnapshot, fundamentals: FundamentalsSnapshot) -> Self {
        Self {
            ticker: price.ticker,
            price: price.price,
            volume: price.volume,
            session: price.session,
            price_source: price.source,
            pe: fundamentals.pe,
            pb: fundamentals.pb,
            industry: fundamentals.industry,
            avg_pe: fundamentals.industry_pe,
            avg_pb: fundamentals.industry_pb,
            market: fundamentals.market,
            source: fundamentals.source,
            fetched_at: Utc::now(),
        }
    }
}

/// Round half away from zero to `decimals` places.
///
/// Very large `decimals` leave the value untouched.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if decimals > 15 {
        return value;
    }
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}
