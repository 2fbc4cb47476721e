//! Ticker store models
//!
//! This module contains the core data types:
//! - `types` - Source identifiers and the fetch order
//! - `interval` - Bar granularity (`Interval`)
//! - `request` - Exchange-qualified tickers and the canonical `InstrumentRequest`
//! - `raw` - A source's native tabular response (`RawTable`)
//! - `series` - The canonical `NormalizedSeries` returned to callers

mod interval;
mod raw;
mod request;
mod series;
mod types;

pub use interval::Interval;
pub use raw::{RawTable, TimestampFormat};
pub use request::{parse_date, InstrumentRequest, Ticker, DEFAULT_EXCHANGE};
pub use series::{NormalizedSeries, SeriesRow};
pub use types::{default_fetch_order, parse_fetch_order, FetchOrder, SourceId};
