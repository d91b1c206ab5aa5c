//! Terminal rendering for snapshots and provider chains

use comfy_table::Table;
use stock_data::{SourceChain, StockConfig, StockSnapshot};

const REDACTED: &str = "***";

pub fn snapshot_table(snapshots: &[StockSnapshot]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Ticker", "Price", "Volume", "P/E", "P/B", "Industry", "Avg P/E", "Avg P/B", "Market",
        "Source",
    ]);

    for s in snapshots {
        table.add_row(vec![
            s.ticker.to_string(),
            format!("{:.0}", s.price),
            format_volume(s.volume),
            s.pe.to_string(),
            s.pb.to_string(),
            s.industry.to_string(),
            s.avg_pe.to_string(),
            s.avg_pb.to_string(),
            s.market.clone(),
            s.source.clone(),
        ]);
    }

    table
}

pub fn sources_table(chain: &SourceChain) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Priority", "Price", "Fundamentals"]);

    let rows = chain.price.len().max(chain.fundamentals.len());
    for i in 0..rows {
        table.add_row(vec![
            (i + 1).to_string(),
            chain.price.get(i).cloned().unwrap_or_default(),
            chain.fundamentals.get(i).cloned().unwrap_or_default(),
        ]);
    }

    table
}

fn format_volume(volume: Option<u64>) -> String {
    let Some(volume) = volume else {
        return "-".to_string();
    };

    let digits = volume.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Copy of the configuration safe to print
pub fn redacted(config: &StockConfig) -> StockConfig {
    let mut config = config.clone();
    if config.tcbs.api_key.is_some() {
        config.tcbs.api_key = Some(REDACTED.to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use stock_data::{FundamentalsSnapshot, PriceSnapshot, Ticker};

    #[test]
    fn test_format_volume() {
        assert_eq!(format_volume(Some(1_200_000)), "1,200,000");
        assert_eq!(format_volume(Some(999)), "999");
        assert_eq!(format_volume(None), "-");
    }

    #[test]
    fn test_snapshot_table_shows_sentinels() {
        let snapshot = StockSnapshot::merge(
            PriceSnapshot {
                ticker: Ticker::parse("FPT").unwrap(),
                price: 92_500.0,
                volume: Some(1_200_000),
                session: None,
                source: "Yahoo Finance".to_string(),
            },
            FundamentalsSnapshot::unavailable(),
        );

        let rendered = snapshot_table(&[snapshot]).to_string();
        assert!(rendered.contains("FPT"));
        assert!(rendered.contains("92500"));
        assert!(rendered.contains("N/A"));
        assert!(rendered.contains("Unclassified"));
    }

    #[test]
    fn test_sources_table_pads_shorter_chain() {
        let chain = SourceChain {
            price: vec!["Yahoo Finance".to_string()],
            fundamentals: vec!["TCBS".to_string(), "VNDirect".to_string()],
        };
        let rendered = sources_table(&chain).to_string();
        assert!(rendered.contains("VNDirect"));
        assert!(rendered.contains('2'));
    }

    #[test]
    fn test_redacted_hides_api_key() {
        let config = StockConfig::builder().tcbs_api_key("secret").build().unwrap();
        let shown = redacted(&config);
        assert_eq!(shown.tcbs.api_key.as_deref(), Some(REDACTED));
    }
}
