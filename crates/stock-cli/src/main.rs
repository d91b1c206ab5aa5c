//! Command-line interface for stock-data-rs

mod render;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use stock_data::{DataAggregator, StockConfig};
use stock_utils::LogFormat;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stock-cli", version)]
#[command(
    about = "Fetch merged price and fundamentals snapshots for Vietnamese tickers",
    long_about = None
)]
struct Cli {
    /// Log line format (text or json)
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch snapshots for one or more tickers
    Fetch {
        #[arg(required = true)]
        tickers: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Fetch the same tickers this many times (later rounds hit the cache)
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Show provider priority order
    Sources,
    /// Load configuration from the environment and validate it
    CheckConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    stock_utils::init_tracing(cli.log_format);

    let config = StockConfig::default()
        .with_env()
        .context("invalid configuration")?;

    match cli.command {
        Command::Fetch {
            tickers,
            format,
            repeat,
        } => fetch(&config, &tickers, format, repeat).await,
        Command::Sources => {
            let aggregator = DataAggregator::from_config(&config)?;
            println!("{}", render::sources_table(&aggregator.sources()));
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&render::redacted(&config))?);
            println!("configuration OK");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn fetch(
    config: &StockConfig,
    tickers: &[String],
    format: OutputFormat,
    repeat: u32,
) -> anyhow::Result<ExitCode> {
    let aggregator = DataAggregator::from_config(config)?;
    let mut failed = false;

    for round in 1..=repeat.max(1) {
        info!("Fetch round {}", round);

        let mut snapshots = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            match aggregator.fetch(ticker).await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(err) => {
                    failed = true;
                    eprintln!("{}", serde_json::to_string(&err)?);
                }
            }
        }

        match format {
            OutputFormat::Json => {
                for snapshot in &snapshots {
                    println!("{}", serde_json::to_string_pretty(snapshot)?);
                }
            }
            OutputFormat::Table if !snapshots.is_empty() => {
                println!("{}", render::snapshot_table(&snapshots));
            }
            OutputFormat::Table => {}
        }
    }

    info!("{} snapshot(s) cached", aggregator.cached_len().await);

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
