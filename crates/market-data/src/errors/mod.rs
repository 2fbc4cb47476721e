//! Error types for the ticker store.
//!
//! This module provides:
//! - [`SourceError`]: a single source could not satisfy a request (recoverable,
//!   the orchestrator falls back to the next source)
//! - [`TickerStoreError`]: terminal failure surfaced to the caller
//! - [`ValidationError`]: malformed tickers, dates, intervals or source ids
//! - [`CredentialError`] / [`AuthorizeError`]: credential persistence and the
//!   interactive login exchange
//! - [`ConfigError`]: configuration resolution failures

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{Interval, SourceId};
use crate::registry::SourceAttempt;

/// Errors raised while parsing or validating caller input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Ticker must not be empty")]
    EmptyTicker,

    #[error("Invalid ticker '{0}', expected EXCHANGE:SYMBOL")]
    InvalidTicker(String),

    #[error("Invalid date '{0}', expected DD/MM/YYYY")]
    InvalidDate(String),

    #[error("Start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Unknown interval: {0}")]
    UnknownInterval(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// A single source could not satisfy the request.
///
/// Every underlying failure (HTTP, vendor payload, parsing, authorization) is
/// translated into one of these variants before it leaves an adapter, so the
/// orchestrator only ever has to deal with this type.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source has no data for this granularity.
    #[error("{source_id}: not available for requested time interval ({interval})")]
    UnsupportedInterval {
        source_id: SourceId,
        interval: Interval,
    },

    /// The source is listed in the fetch order but cannot be used.
    #[error("{source_id}: not configured - {message}")]
    NotConfigured { source_id: SourceId, message: String },

    /// The session or credential was rejected by the vendor.
    #[error("{source_id}: unauthorized - {message}")]
    Unauthorized { source_id: SourceId, message: String },

    /// The vendor does not know the requested symbol.
    #[error("{source_id}: symbol not found: {symbol}")]
    SymbolNotFound { source_id: SourceId, symbol: String },

    /// Timeout, connection failure or non-2xx response.
    #[error("{source_id}: transport error - {message}")]
    Transport { source_id: SourceId, message: String },

    /// The vendor rate limited the request (HTTP 429).
    #[error("{source_id}: rate limited")]
    RateLimited { source_id: SourceId },

    /// The vendor payload could not be decoded or normalized.
    #[error("{source_id}: failed to parse response - {message}")]
    Parse { source_id: SourceId, message: String },

    /// A fresh credential could not be obtained.
    #[error("{source_id}: authorization failed - {cause}")]
    Authorization {
        source_id: SourceId,
        #[source]
        cause: AuthorizeError,
    },
}

impl SourceError {
    /// The source that raised this error.
    pub fn source_id(&self) -> SourceId {
        match self {
            Self::UnsupportedInterval { source_id, .. }
            | Self::NotConfigured { source_id, .. }
            | Self::Unauthorized { source_id, .. }
            | Self::SymbolNotFound { source_id, .. }
            | Self::Transport { source_id, .. }
            | Self::RateLimited { source_id }
            | Self::Parse { source_id, .. }
            | Self::Authorization { source_id, .. } => *source_id,
        }
    }

    /// Translate a reqwest failure into a transport error, keeping the cause.
    pub fn transport(source_id: SourceId, error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            format!("request timeout: {}", error)
        } else if error.is_connect() {
            format!("connection failed: {}", error)
        } else {
            format!("request failed: {}", error)
        };
        Self::Transport { source_id, message }
    }

    pub fn parse(source_id: SourceId, message: impl Into<String>) -> Self {
        Self::Parse {
            source_id,
            message: message.into(),
        }
    }
}

/// Terminal errors surfaced by [`TickerStore`](crate::TickerStore).
#[derive(Error, Debug)]
pub enum TickerStoreError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// Every source in the fetch order failed.
    #[error("no source provided data for the requested interval ({interval})")]
    NoSourceProvidedData {
        interval: Interval,
        attempts: Vec<SourceAttempt>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures while persisting the credential record.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential record could not be encoded: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the interactive login exchange.
#[derive(Error, Debug)]
pub enum AuthorizeError {
    #[error("Invalid auth page URL '{0}'")]
    InvalidAuthPage(String),

    #[error("Failed to bind callback endpoint: {0}")]
    Bind(#[from] std::io::Error),

    #[error("Callback did not carry an authorization code")]
    MissingCode,

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("Login was not completed within {0:?}")]
    TimedOut(std::time::Duration),

    #[error("Callback endpoint stopped before delivering a token")]
    ChannelClosed,
}

/// Failures while resolving [`TickerStoreConfig`](crate::TickerStoreConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read dotenv file {path}: {message}")]
    Dotenv { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
