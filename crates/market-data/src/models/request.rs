use std::fmt::{Display, Formatter};
use std::sync::Arc;

use chrono::NaiveDate;

use super::interval::Interval;
use crate::errors::ValidationError;

/// Exchange assumed for bare symbols such as `RELIANCE`.
pub const DEFAULT_EXCHANGE: &str = "NSE";

/// Exchange-qualified instrument identifier, e.g. `NSE:RELIANCE`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ticker {
    /// The ticker exactly as the caller wrote it (trimmed).
    raw: Arc<str>,
    exchange: Arc<str>,
    symbol: Arc<str>,
}

impl Ticker {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTicker);
        }

        let (exchange, symbol) = match trimmed.split_once(':') {
            Some((exchange, symbol)) => (exchange.trim(), symbol.trim()),
            None => (DEFAULT_EXCHANGE, trimmed),
        };

        if exchange.is_empty() || symbol.is_empty() || symbol.contains(':') {
            return Err(ValidationError::InvalidTicker(trimmed.to_string()));
        }

        Ok(Self {
            raw: Arc::from(trimmed),
            exchange: Arc::from(exchange.to_ascii_uppercase()),
            symbol: Arc::from(symbol.to_ascii_uppercase()),
        })
    }

    /// The caller's ticker string, attached to every normalized row.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Canonical historical data request handed to every source adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrumentRequest {
    pub ticker: Ticker,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub interval: Interval,
}

impl InstrumentRequest {
    pub fn new(
        ticker: Ticker,
        start_date: NaiveDate,
        end_date: NaiveDate,
        interval: Interval,
    ) -> Result<Self, ValidationError> {
        if start_date > end_date {
            return Err(ValidationError::InvalidRange {
                start: start_date,
                end: end_date,
            });
        }

        Ok(Self {
            ticker,
            start_date,
            end_date,
            interval,
        })
    }

    /// Build a request from loosely formatted caller input.
    ///
    /// Dates are `DD/MM/YYYY` (leading zeros optional) or ISO `YYYY-MM-DD`.
    pub fn parse(
        ticker: &str,
        from: &str,
        to: &str,
        interval: Interval,
    ) -> Result<Self, ValidationError> {
        Self::new(
            Ticker::parse(ticker)?,
            parse_date(from)?,
            parse_date(to)?,
            interval,
        )
    }
}

/// Parse a calendar date written as `DD/MM/YYYY` or `YYYY-MM-DD`.
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|_| ValidationError::InvalidDate(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_with_exchange() {
        let ticker = Ticker::parse(" nse:reliance ").unwrap();
        assert_eq!(ticker.exchange(), "NSE");
        assert_eq!(ticker.symbol(), "RELIANCE");
        assert_eq!(ticker.as_str(), "nse:reliance");
    }

    #[test]
    fn test_bare_symbol_defaults_to_nse() {
        let ticker = Ticker::parse("INFY").unwrap();
        assert_eq!(ticker.exchange(), DEFAULT_EXCHANGE);
        assert_eq!(ticker.symbol(), "INFY");
    }

    #[test]
    fn test_invalid_tickers() {
        assert_eq!(Ticker::parse("  "), Err(ValidationError::EmptyTicker));
        assert!(matches!(
            Ticker::parse("NSE:"),
            Err(ValidationError::InvalidTicker(_))
        ));
        assert!(matches!(
            Ticker::parse(":RELIANCE"),
            Err(ValidationError::InvalidTicker(_))
        ));
        assert!(matches!(
            Ticker::parse("NSE:A:B"),
            Err(ValidationError::InvalidTicker(_))
        ));
    }

    #[test]
    fn test_parse_dates() {
        assert_eq!(
            parse_date("01/12/2018").unwrap(),
            NaiveDate::from_ymd_opt(2018, 12, 1).unwrap()
        );
        assert_eq!(
            parse_date("3/12/2018").unwrap(),
            NaiveDate::from_ymd_opt(2018, 12, 3).unwrap()
        );
        assert_eq!(
            parse_date("2018-12-03").unwrap(),
            NaiveDate::from_ymd_opt(2018, 12, 3).unwrap()
        );
        assert!(matches!(
            parse_date("31/02/2018"),
            Err(ValidationError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_request_rejects_reversed_range() {
        let err = InstrumentRequest::parse("NSE:RELIANCE", "03/12/2018", "01/12/2018", Interval::Day1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRange { .. }));
    }

    #[test]
    fn test_request_allows_single_day() {
        let request =
            InstrumentRequest::parse("NSE:RELIANCE", "01/12/2018", "01/12/2018", Interval::Day1)
                .unwrap();
        assert_eq!(request.start_date, request.end_date);
    }
}
