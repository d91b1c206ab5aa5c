//! Provider adapters for Vietnamese market data sources

pub mod http;
pub mod scrape;
pub mod tcbs;
pub mod vndirect;
pub mod yahoo;

pub use http::HttpSource;
pub use scrape::ScrapePriceProvider;
pub use tcbs::TcbsFundamentals;
pub use vndirect::VndirectFundamentals;
pub use yahoo::{YahooChart, YahooMetadataFundamentals, YahooPriceProvider};
