//! Command-line arguments.
//!
//! ```bash
//! # Daily bars, brokerage first then exchange
//! tickerstore NSE:RELIANCE 01/12/2018 03/12/2018
//!
//! # 5-minute bars from the brokerage only, as CSV
//! tickerstore NSE:SBIN 2018-12-03 2018-12-03 --interval 5m --source upstox --format csv
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tickerstore_market_data::{ExhaustionPolicy, Interval, SourceId};

#[derive(Debug, Parser)]
#[command(
    name = "tickerstore",
    version,
    about = "Fetch historical OHLCV bars with ordered fallback across sources"
)]
pub struct Cli {
    /// Exchange-qualified ticker, e.g. NSE:RELIANCE (bare symbols default to NSE).
    pub ticker: String,

    /// First day of the range, DD/MM/YYYY or YYYY-MM-DD.
    pub from: String,

    /// Last day of the range (inclusive).
    pub to: String,

    /// Bar size: name (day_1), alias (1d, 5m) or numeric code (1-9).
    #[arg(long, short, default_value = "day_1", value_parser = parse_interval)]
    pub interval: Interval,

    /// Sources to try, in order. Repeat or comma-separate; defaults to the
    /// configured fetch order.
    #[arg(long = "source", short, value_delimiter = ',', value_parser = parse_source)]
    pub sources: Vec<SourceId>,

    /// Dotenv file with UPSTOX_* settings.
    #[arg(long)]
    pub dotenv: Option<PathBuf>,

    /// Where the access token record is kept.
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Behaviour once every source has failed.
    #[arg(long, value_enum)]
    pub on_exhaustion: Option<Exhaustion>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Exhaustion {
    Fail,
    ReturnEmpty,
}

impl From<Exhaustion> for ExhaustionPolicy {
    fn from(value: Exhaustion) -> Self {
        match value {
            Exhaustion::Fail => Self::Fail,
            Exhaustion::ReturnEmpty => Self::ReturnEmpty,
        }
    }
}

fn parse_interval(value: &str) -> Result<Interval, String> {
    value.parse().map_err(|e: tickerstore_market_data::ValidationError| e.to_string())
}

fn parse_source(value: &str) -> Result<SourceId, String> {
    value.parse().map_err(|e: tickerstore_market_data::ValidationError| e.to_string())
}
