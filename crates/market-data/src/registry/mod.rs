//! Source orchestration.
//!
//! This module provides:
//! - [`TickerStore`]: ordered fallback across the configured sources
//! - [`FetchDiagnostics`]: which sources were tried and how each fared

mod diagnostics;
mod ticker_store;

pub use crate::config::ExhaustionPolicy;
pub use diagnostics::{FetchDiagnostics, SourceAttempt};
pub use ticker_store::TickerStore;
