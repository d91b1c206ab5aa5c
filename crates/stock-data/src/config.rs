//! Configuration for stock data aggregation

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Placeholder substituted with the ticker in endpoint templates.
pub const TICKER_PLACEHOLDER: &str = "{ticker}";

const DEFAULT_TCBS_URL: &str =
    "https://apipubaws.tcbs.com.vn/tcanalysis/v1/ticker/{ticker}/overview";
const DEFAULT_VNDIRECT_RATIOS_URL: &str =
    "https://api-finfo.vndirect.com.vn/v4/ratios/latest?filter=ratioCode:PRICE_TO_EARNINGS,PRICE_TO_BOOK&where=code:{ticker}";
const DEFAULT_VNDIRECT_STOCKS_URL: &str =
    "https://api-finfo.vndirect.com.vn/v4/stocks?q=code:{ticker}";
const DEFAULT_SCRAPE_URL: &str = "https://s.cafef.vn/hose/{ticker}.chn";
const DEFAULT_SCRAPE_PATTERN: &str = r#"id="price__value"[^>]*>\s*([0-9][0-9.,]*)"#;

/// TCBS overview endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcbsConfig {
    /// Endpoint template containing `{ticker}`
    pub url: String,
    /// Optional bearer token
    pub api_key: Option<String>,
}

impl Default for TcbsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TCBS_URL.to_string(),
            api_key: None,
        }
    }
}

/// VNDirect ratio and stock-metadata endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VndirectConfig {
    pub ratios_url: String,
    pub stocks_url: String,
}

impl Default for VndirectConfig {
    fn default() -> Self {
        Self {
            ratios_url: DEFAULT_VNDIRECT_RATIOS_URL.to_string(),
            stocks_url: DEFAULT_VNDIRECT_STOCKS_URL.to_string(),
        }
    }
}

/// HTML quote-page fallback for prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Whether the scraper joins the price chain after the primary provider
    pub enabled: bool,
    /// Page URL template containing `{ticker}`
    pub url: String,
    /// Regex whose first capture group is the rendered price
    pub pattern: String,
    /// Factor converting the rendered unit into VND
    pub unit_multiplier: f64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: DEFAULT_SCRAPE_URL.to_string(),
            pattern: DEFAULT_SCRAPE_PATTERN.to_string(),
            unit_multiplier: 1000.0,
        }
    }
}

/// Configuration for stock data aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// How long a merged snapshot is served from cache
    pub cache_ttl: Duration,

    /// Total attempts for the cache-miss path
    pub max_attempts: u32,

    /// Delay between attempts
    pub retry_delay: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Exchange marker appended for the primary price provider
    pub exchange_suffix: String,

    /// Calendar days of history requested to find the latest session
    pub lookback_days: u32,

    /// Per-provider outbound request budget
    pub requests_per_minute: u32,

    pub tcbs: TcbsConfig,

    pub vndirect: VndirectConfig,

    pub scrape: ScrapeConfig,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),      // 5 minutes
            max_attempts: 2,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
            exchange_suffix: ".VN".to_string(),
            lookback_days: 10,
            requests_per_minute: 60,
            tcbs: TcbsConfig::default(),
            vndirect: VndirectConfig::default(),
            scrape: ScrapeConfig::default(),
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Overlay values found in the process environment
    pub fn with_env(self) -> Result<Self> {
        Self::builder().base(self).load_env().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(StockError::ConfigError(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(StockError::ConfigError(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.requests_per_minute == 0 {
            return Err(StockError::ConfigError(
                "requests_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.lookback_days == 0 {
            return Err(StockError::ConfigError(
                "lookback_days must be greater than 0".to_string(),
            ));
        }

        validate_template("tcbs.url", &self.tcbs.url)?;
        validate_template("vndirect.ratios_url", &self.vndirect.ratios_url)?;
        validate_template("vndirect.stocks_url", &self.vndirect.stocks_url)?;

        if self.scrape.enabled {
            validate_template("scrape.url", &self.scrape.url)?;
            regex::Regex::new(&self.scrape.pattern).map_err(|e| {
                StockError::ConfigError(format!("scrape.pattern is not a valid regex: {e}"))
            })?;
            if !(self.scrape.unit_multiplier.is_finite() && self.scrape.unit_multiplier > 0.0) {
                return Err(StockError::ConfigError(
                    "scrape.unit_multiplier must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Substitute the ticker into an endpoint template.
pub fn render_template(template: &str, ticker: &str) -> String {
    template.replace(TICKER_PLACEHOLDER, ticker)
}

fn validate_template(field: &str, template: &str) -> Result<()> {
    if !template.contains(TICKER_PLACEHOLDER) {
        return Err(StockError::ConfigError(format!(
            "{field} must contain {TICKER_PLACEHOLDER}"
        )));
    }

    Url::parse(&render_template(template, "FPT"))
        .map_err(|e| StockError::ConfigError(format!("{field} is not a valid URL: {e}")))?;

    Ok(())
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    base: Option<StockConfig>,
    cache_ttl: Option<Duration>,
    max_attempts: Option<u32>,
    retry_delay: Option<Duration>,
    request_timeout: Option<Duration>,
    exchange_suffix: Option<String>,
    lookback_days: Option<u32>,
    requests_per_minute: Option<u32>,
    tcbs_url: Option<String>,
    tcbs_api_key: Option<String>,
    vndirect_ratios_url: Option<String>,
    vndirect_stocks_url: Option<String>,
    scrape_url: Option<String>,
    scrape_enabled: Option<bool>,
}

impl StockConfigBuilder {
    /// Start from an existing configuration instead of the defaults
    pub fn base(mut self, config: StockConfig) -> Self {
        self.base = Some(config);
        self
    }

    /// Set cache TTL for merged snapshots
    pub fn cache_ttl(mut self, duration: Duration) -> Self {
        self.cache_ttl = Some(duration);
        self
    }

    /// Set total attempts for the cache-miss path
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the delay between attempts
    pub fn retry_delay(mut self, duration: Duration) -> Self {
        self.retry_delay = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the exchange suffix for the primary price provider
    pub fn exchange_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.exchange_suffix = Some(suffix.into());
        self
    }

    pub fn lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = Some(days);
        self
    }

    pub fn requests_per_minute(mut self, rate: u32) -> Self {
        self.requests_per_minute = Some(rate);
        self
    }

    pub fn tcbs_url(mut self, url: impl Into<String>) -> Self {
        self.tcbs_url = Some(url.into());
        self
    }

    pub fn tcbs_api_key(mut self, key: impl Into<String>) -> Self {
        self.tcbs_api_key = Some(key.into());
        self
    }

    pub fn vndirect_ratios_url(mut self, url: impl Into<String>) -> Self {
        self.vndirect_ratios_url = Some(url.into());
        self
    }

    pub fn vndirect_stocks_url(mut self, url: impl Into<String>) -> Self {
        self.vndirect_stocks_url = Some(url.into());
        self
    }

    /// Enable the scraping price fallback with the given page template
    pub fn scrape_url(mut self, url: impl Into<String>) -> Self {
        self.scrape_url = Some(url.into());
        self.scrape_enabled = Some(true);
        self
    }

    pub fn scrape_enabled(mut self, enabled: bool) -> Self {
        self.scrape_enabled = Some(enabled);
        self
    }

    /// Load overrides from environment variables
    pub fn load_env(mut self) -> Self {
        if let Some(secs) = env_parse::<u64>("STOCK_CACHE_TTL_SECS") {
            self.cache_ttl = Some(Duration::from_secs(secs));
        }
        if let Some(attempts) = env_parse::<u32>("STOCK_MAX_ATTEMPTS") {
            self.max_attempts = Some(attempts);
        }
        if let Some(ms) = env_parse::<u64>("STOCK_RETRY_DELAY_MS") {
            self.retry_delay = Some(Duration::from_millis(ms));
        }
        if let Some(secs) = env_parse::<u64>("STOCK_REQUEST_TIMEOUT_SECS") {
            self.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Ok(suffix) = std::env::var("STOCK_EXCHANGE_SUFFIX") {
            self.exchange_suffix = Some(suffix);
        }
        if let Some(rate) = env_parse::<u32>("STOCK_REQUESTS_PER_MINUTE") {
            self.requests_per_minute = Some(rate);
        }
        if let Ok(url) = std::env::var("TCBS_API_URL") {
            self.tcbs_url = Some(url);
        }
        if let Ok(key) = std::env::var("TCBS_API_KEY") {
            self.tcbs_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("VNDIRECT_RATIOS_URL") {
            self.vndirect_ratios_url = Some(url);
        }
        if let Ok(url) = std::env::var("VNDIRECT_STOCKS_URL") {
            self.vndirect_stocks_url = Some(url);
        }
        if let Ok(url) = std::env::var("STOCK_SCRAPE_URL") {
            self = self.scrape_url(url);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = self.base.unwrap_or_default();

        let config = StockConfig {
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            exchange_suffix: self.exchange_suffix.unwrap_or(defaults.exchange_suffix),
            lookback_days: self.lookback_days.unwrap_or(defaults.lookback_days),
            requests_per_minute: self
                .requests_per_minute
                .unwrap_or(defaults.requests_per_minute),
            tcbs: TcbsConfig {
                url: self.tcbs_url.unwrap_or(defaults.tcbs.url),
                api_key: self.tcbs_api_key.or(defaults.tcbs.api_key),
            },
            vndirect: VndirectConfig {
                ratios_url: self
                    .vndirect_ratios_url
                    .unwrap_or(defaults.vndirect.ratios_url),
                stocks_url: self
                    .vndirect_stocks_url
                    .unwrap_or(defaults.vndirect.stocks_url),
            },
            scrape: ScrapeConfig {
                enabled: self.scrape_enabled.unwrap_or(defaults.scrape.enabled),
                url: self.scrape_url.unwrap_or(defaults.scrape.url),
                ..defaults.scrape
            },
        };

        config.validate()?;
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
