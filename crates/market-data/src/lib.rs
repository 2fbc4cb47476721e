//! TickerStore Market Data Crate
//!
//! This crate fetches historical OHLCV price series for exchange-listed
//! instruments from several upstream sources, trying them in a configurable
//! order and returning the first usable answer in one canonical shape.
//!
//! # Overview
//!
//! The crate supports:
//! - An authenticated brokerage source (Upstox) for every bar size, from
//!   ticks to monthly bars
//! - A public exchange source (NSE) for daily bars
//! - A file-backed access token that is renewed through an interactive
//!   browser login once the local calendar day rolls over
//! - Normalization of every vendor response into [`NormalizedSeries`]
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |   TickerStore    |  (fetch order, exhaustion policy)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  SourceAdapter   | --> | CredentialStore  |  (Upstox only)
//! +------------------+     |   Authorizer     |
//!          |               +------------------+
//!          v
//! +------------------+
//! |    normalize     |  (RawTable -> NormalizedSeries)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`InstrumentRequest`] - Ticker, inclusive date range and bar size
//! - [`Interval`] - Bar granularity (numeric codes `1..=9` accepted)
//! - [`NormalizedSeries`] - Ascending, timestamp-unique OHLCV rows
//! - [`TickerStoreConfig`] - Resolved settings (explicit, dotenv, environment)

pub mod config;
pub mod credentials;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod registry;

pub use config::{ConfigOptions, ExhaustionPolicy, TickerStoreConfig, UpstoxConfig};

pub use credentials::{
    is_stale_in, Authorizer, BrowserLauncher, Credential, CredentialStore, TokenExchange,
    UpstoxAuthorizer, UpstoxTokenExchange,
};

pub use errors::{
    AuthorizeError, ConfigError, CredentialError, SourceError, TickerStoreError, ValidationError,
};

pub use models::{
    default_fetch_order, parse_date, parse_fetch_order, FetchOrder, InstrumentRequest, Interval,
    NormalizedSeries, RawTable, SeriesRow, SourceId, Ticker, TimestampFormat,
};

pub use normalize::normalize;

pub use provider::{NseAdapter, SourceAdapter, UpstoxAdapter};

pub use registry::{FetchDiagnostics, SourceAttempt, TickerStore};
