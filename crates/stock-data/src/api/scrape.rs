//! HTML quote-page price fallback

use super::http::HttpSource;
use crate::config::{ScrapeConfig, render_template};
use crate::error::{ProviderError, Result, StockError};
use crate::models::{PriceSnapshot, Ticker, round_to};
use crate::provider::{PriceProvider, ProviderResult};
use async_trait::async_trait;
use regex::Regex;

pub const SCRAPE: &str = "Web scrape";

/// Price-only provider that reads a rendered quote page.
///
/// The page shows prices in thousands of VND, hence `unit_multiplier`.
pub struct ScrapePriceProvider {
    http: HttpSource,
    url_template: String,
    pattern: Regex,
    unit_multiplier: f64,
}

impl ScrapePriceProvider {
    pub fn new(http: HttpSource, config: &ScrapeConfig) -> Result<Self> {
        let pattern = Regex::new(&config.pattern)
            .map_err(|e| StockError::ConfigError(format!("invalid scrape pattern: {e}")))?;

        Ok(Self {
            http,
            url_template: config.url.clone(),
            pattern,
            unit_multiplier: config.unit_multiplier,
        })
    }

    /// Extract and convert the price from a page body
    pub fn extract_price(&self, ticker: &Ticker, html: &str) -> ProviderResult<f64> {
        let raw = self
            .pattern
            .captures(html)
            .and_then(|c| c.get(1).or_else(|| c.get(0)))
            .map(|m| m.as_str())
            .ok_or_else(|| ProviderError::no_data(SCRAPE, ticker.as_str()))?;

        let value = parse_rendered_number(raw)
            .ok_or_else(|| ProviderError::malformed(SCRAPE, format!("unreadable price {raw:?}")))?;

        if value <= 0.0 {
            return Err(ProviderError::no_data(SCRAPE, ticker.as_str()));
        }

        Ok(round_to(value * self.unit_multiplier, 0))
    }
}

/// Parse a number rendered with either `.` or `,` as decimal separator.
///
/// With both present the later one is the decimal mark. A separator that
/// repeats is a thousands grouping.
pub fn parse_rendered_number(raw: &str) -> Option<f64> {
    let text: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if text.is_empty() {
        return None;
    }

    let last_dot = text.rfind('.');
    let last_comma = text.rfind(',');

    let decimal = match (last_dot, last_comma) {
        (Some(d), Some(c)) => Some(if d > c { '.' } else { ',' }),
        (Some(_), None) if text.matches('.').count() == 1 => Some('.'),
        (None, Some(_)) if text.matches(',').count() == 1 => Some(','),
        _ => None,
    };

    let normalized: String = text
        .chars()
        .filter_map(|c| match c {
            '.' | ',' if Some(c) == decimal => Some('.'),
            '.' | ',' => None,
            other => Some(other),
        })
        .collect();

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[async_trait]
impl PriceProvider for ScrapePriceProvider {
    fn name(&self) -> &str {
        SCRAPE
    }

    async fn latest(&self, ticker: &Ticker) -> ProviderResult<PriceSnapshot> {
        let url = render_template(&self.url_template, ticker.as_str());
        let html = self.http.get_text(&url).await?;
        let price = self.extract_price(ticker, &html)?;

        Ok(PriceSnapshot {
            ticker: ticker.clone(),
            price,
            volume: None,
            session: None,
            source: SCRAPE.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn provider() -> ScrapePriceProvider {
        let http = HttpSource::new(SCRAPE, Duration::from_secs(1), 60).unwrap();
        ScrapePriceProvider::new(http, &ScrapeConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_rendered_number() {
        assert_eq!(parse_rendered_number("92.5"), Some(92.5));
        assert_eq!(parse_rendered_number("92,5"), Some(92.5));
        assert_eq!(parse_rendered_number("1.234,5"), Some(1234.5));
        assert_eq!(parse_rendered_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_rendered_number("1.234.567"), Some(1_234_567.0));
        assert_eq!(parse_rendered_number(" 61 "), Some(61.0));
        assert_eq!(parse_rendered_number(""), None);
        assert_eq!(parse_rendered_number("--"), None);
    }

    #[test]
    fn test_extract_price_applies_unit_conversion() {
        let html =
            r#"<div class="dltl-price"><span id="price__value" class="up">92,5</span></div>"#;
        let price = provider()
            .extract_price(&Ticker::parse("FPT").unwrap(), html)
            .unwrap();
        assert_eq!(price, 92_500.0);
    }

    #[test]
    fn test_extract_price_missing_element() {
        let err = provider()
            .extract_price(&Ticker::parse("ZZZZ").unwrap(), "<html><body>Not found</body></html>")
            .unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let http = HttpSource::new(SCRAPE, Duration::from_secs(1), 60).unwrap();
        let config = ScrapeConfig {
            pattern: "([".to_string(),
            ..Default::default()
        };
        assert!(ScrapePriceProvider::new(http, &config).is_err());
    }
}
