//! Vietnamese stock data aggregation
//!
//! This crate resolves a ticker to one merged snapshot of price, volume and
//! valuation ratios. It includes:
//!
//! - Latest price and volume from Yahoo Finance chart history, with an
//!   optional HTML quote-page fallback
//! - Fundamentals from TCBS, then VNDirect, then Yahoo chart metadata
//! - A per-ticker read-through cache with a fixed TTL
//! - A bounded retry around the cache-miss path
//!
//! # Example
//!
//! ```rust,ignore
//! use stock_data::{DataAggregator, StockConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StockConfig::default().with_env()?;
//!     let aggregator = DataAggregator::from_config(&config)?;
//!
//!     match aggregator.fetch("FPT").await {
//!         Ok(s) => println!("{} {} ({})", s.ticker, s.price, s.source),
//!         Err(err) => eprintln!("{}", err.error),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod provider;
pub mod retry;

pub use aggregator::{DataAggregator, DataAggregatorBuilder, SourceChain};
pub use cache::SnapshotCache;
pub use config::{ScrapeConfig, StockConfig, StockConfigBuilder, TcbsConfig, VndirectConfig};
pub use error::{ErrorResult, ProviderError, Result, StockError};
pub use models::{FundamentalsSnapshot, Industry, Metric, PriceSnapshot, StockSnapshot, Ticker};
pub use provider::{FundamentalsProvider, PriceProvider, ProviderResult};
pub use retry::RetryPolicy;
