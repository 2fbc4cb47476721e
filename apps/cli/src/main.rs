mod cli;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tickerstore_market_data::{
    ConfigOptions, InstrumentRequest, TickerStore, TickerStoreConfig, TickerStoreError,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;

const ENV_LOG_FORMAT: &str = "TICKERSTORE_LOG_FORMAT";

fn init_tracing() {
    let log_format = std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout carries only the series.
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if let Some(TickerStoreError::NoSourceProvidedData { attempts, .. }) =
                error.downcast_ref::<TickerStoreError>()
            {
                for attempt in attempts {
                    if let Some(message) = &attempt.error {
                        eprintln!("  {}: {}", attempt.source, message);
                    }
                }
            }
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let options = ConfigOptions {
        dotenv_path: cli.dotenv.clone(),
        access_token_file_path: cli.token_file.clone(),
        on_exhaustion: cli.on_exhaustion.map(Into::into),
        fetch_order: (!cli.sources.is_empty()).then(|| cli.sources.clone()),
        ..Default::default()
    };
    let config = TickerStoreConfig::resolve(options)?;
    tracing::debug!("Using access token file {}", config.access_token_file_path.display());

    let request = InstrumentRequest::parse(&cli.ticker, &cli.from, &cli.to, cli.interval)
        .map_err(TickerStoreError::from)?;
    let store = TickerStore::new(&config);
    tracing::debug!("On exhaustion: {:?}", store.on_exhaustion());

    let (result, diagnostics) = store.historical_data_with_diagnostics(&request).await;
    let series = result?;
    if !diagnostics.has_success() {
        // Every source failed but the policy asked for an empty series.
        for (source, message) in diagnostics.errors() {
            tracing::warn!("{} failed: {}", source, message);
        }
    }

    tracing::info!("Fetched {} rows for {}", series.len(), request.ticker);
    output::render(&series, cli.format, cli.pretty, std::io::stdout().lock())
}
