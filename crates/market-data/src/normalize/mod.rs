//! Normalization of raw source responses into the canonical schema.
//!
//! Every adapter hands its [`RawTable`] to [`normalize`], which:
//! - keeps only `open`, `high`, `low`, `close` and `volume` (matched
//!   case-insensitively) and drops every other vendor column
//! - coerces prices to `f64` and volume to `i64`, whether the vendor sent
//!   numbers or numeric strings
//! - reconciles the timestamp column (epoch milliseconds or calendar dates)
//!   into a UTC instant used as the ascending, unique index
//! - attaches the requested ticker as the `Symbol` of every row
//!
//! Normalization is a pure function of its inputs.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use log::{debug, warn};
use serde_json::Value;

use crate::errors::SourceError;
use crate::models::{NormalizedSeries, RawTable, SeriesRow, SourceId, TimestampFormat};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%b-%Y", "%d-%m-%Y", "%d/%m/%Y"];

/// Column positions of the canonical fields inside a raw table.
struct ColumnMap {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl ColumnMap {
    fn resolve(raw: &RawTable, source: SourceId) -> Result<Self, SourceError> {
        let required = |name: &str| {
            raw.column_index(name)
                .ok_or_else(|| SourceError::parse(source, format!("missing column '{}'", name)))
        };

        Ok(Self {
            timestamp: required(raw.timestamp.column())?,
            open: required("open")?,
            high: required("high")?,
            low: required("low")?,
            close: required("close")?,
            volume: raw.column_index("volume"),
        })
    }
}

/// Convert a source's raw response into a [`NormalizedSeries`].
///
/// Zero input rows yield [`NormalizedSeries::empty`]. Rows with unusable
/// cells are skipped with a warning; if every row is unusable the whole
/// response is rejected.
pub fn normalize(
    raw: &RawTable,
    ticker: &str,
    source: SourceId,
) -> Result<NormalizedSeries, SourceError> {
    if raw.is_empty() {
        return Ok(NormalizedSeries::empty());
    }

    let columns = ColumnMap::resolve(raw, source)?;
    let dropped: Vec<&str> = raw
        .columns
        .iter()
        .enumerate()
        .filter(|(index, _)| {
            ![
                columns.timestamp,
                columns.open,
                columns.high,
                columns.low,
                columns.close,
            ]
            .contains(index)
                && Some(*index) != columns.volume
        })
        .map(|(_, name)| name.as_str())
        .collect();
    if !dropped.is_empty() {
        debug!("Dropping {} columns from '{}': {:?}", dropped.len(), source, dropped);
    }

    let mut rows = Vec::with_capacity(raw.rows.len());
    for (index, cells) in raw.rows.iter().enumerate() {
        match normalize_row(cells, &columns, &raw.timestamp, ticker) {
            Some(row) => rows.push(row),
            None => warn!(
                "Skipping row {} from '{}': unusable timestamp or price",
                index, source
            ),
        }
    }

    if rows.is_empty() {
        return Err(SourceError::parse(
            source,
            format!("all {} rows failed normalization", raw.rows.len()),
        ));
    }

    Ok(NormalizedSeries::from_rows(rows))
}

fn normalize_row(
    cells: &[Value],
    columns: &ColumnMap,
    format: &TimestampFormat,
    ticker: &str,
) -> Option<SeriesRow> {
    let cell = |index: usize| cells.get(index).unwrap_or(&Value::Null);

    let timestamp = match format {
        TimestampFormat::EpochMillis { .. } => epoch_millis_to_instant(cell(columns.timestamp))?,
        TimestampFormat::CalendarDate { .. } => calendar_date_to_instant(cell(columns.timestamp))?,
    };

    let volume = match columns.volume {
        Some(index) => coerce_volume(cell(index))?,
        None => 0,
    };

    Some(SeriesRow {
        timestamp,
        open: coerce_price(cell(columns.open))?,
        high: coerce_price(cell(columns.high))?,
        low: coerce_price(cell(columns.low))?,
        close: coerce_price(cell(columns.close))?,
        volume,
        symbol: ticker.to_string(),
    })
}

/// Parse a price cell: JSON number or numeric string (thousands separators allowed).
pub fn coerce_price(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => clean_numeric(text).parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Parse a volume cell. Missing volume counts as zero.
pub fn coerce_volume(value: &Value) -> Option<i64> {
    match value {
        Value::Null => Some(0),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(round_to_i64)),
        Value::String(text) => {
            let cleaned = clean_numeric(text);
            if cleaned.is_empty() {
                return Some(0);
            }
            cleaned
                .parse::<i64>()
                .ok()
                .or_else(|| cleaned.parse::<f64>().ok().and_then(round_to_i64))
        }
        _ => None,
    }
}

fn round_to_i64(value: f64) -> Option<i64> {
    let rounded = value.round();
    (rounded.is_finite() && rounded >= i64::MIN as f64 && rounded <= i64::MAX as f64)
        .then_some(rounded as i64)
}

fn clean_numeric(text: &str) -> String {
    text.trim().replace(',', "")
}

fn epoch_millis_to_instant(value: &Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(round_to_i64)),
        Value::String(text) => clean_numeric(text).parse::<i64>().ok(),
        _ => None,
    }?;

    let seconds = millis.div_euclid(1000);
    let nanos = (millis.rem_euclid(1000) * 1_000_000) as u32;
    Utc.timestamp_opt(seconds, nanos).single()
}

fn calendar_date_to_instant(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upstox_table(rows: Vec<Vec<Value>>) -> RawTable {
        let mut table = RawTable::new(
            ["timestamp", "open", "high", "low", "close", "volume", "cp"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            TimestampFormat::EpochMillis {
                column: "timestamp".to_string(),
            },
        );
        for row in rows {
            table.push_row(row);
        }
        table
    }

    fn nse_table(rows: Vec<Vec<Value>>) -> RawTable {
        let mut table = RawTable::new(
            [
                "Date",
                "Symbol",
                "Series",
                "Prev Close",
                "Open",
                "High",
                "Low",
                "Last",
                "Close",
                "VWAP",
                "Volume",
                "Turnover",
                "Trades",
                "Deliverable Volume",
                "%Deliverble",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            TimestampFormat::CalendarDate {
                column: "Date".to_string(),
            },
        );
        for row in rows {
            table.push_row(row);
        }
        table
    }

    fn nse_row(date: &str, close: f64) -> Vec<Value> {
        vec![
            json!(date),
            json!("RELIANCE"),
            json!("EQ"),
            json!(1100.0),
            json!(1110.0),
            json!(1125.5),
            json!(1101.0),
            json!(close),
            json!(close),
            json!(1115.2),
            json!(6_000_000),
            json!(6.7e14),
            json!(120_000),
            json!(3_000_000),
            json!(0.5),
        ]
    }

    #[test]
    fn test_epoch_millis_rows_are_converted_and_sorted() {
        let table = upstox_table(vec![
            vec![
                json!(1_543_795_200_000i64),
                json!("1110.5"),
                json!("1120"),
                json!("1100"),
                json!("1115.25"),
                json!("123456"),
                json!("0.42"),
            ],
            vec![
                json!("1543708800000"),
                json!(1100.0),
                json!(1105.0),
                json!(1090.0),
                json!(1101.0),
                json!(98765.0),
                json!(-0.1),
            ],
        ]);

        let series = normalize(&table, "NSE:RELIANCE", SourceId::Upstox).unwrap();

        assert_eq!(series.len(), 2);
        let first = series.first().unwrap();
        assert_eq!(
            first.timestamp,
            Utc.with_ymd_and_hms(2018, 12, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(first.close, 1101.0);
        assert_eq!(first.volume, 98765);
        let last = series.last().unwrap();
        assert_eq!(last.open, 1110.5);
        assert_eq!(last.volume, 123456);
        assert!(series.iter().all(|row| row.symbol == "NSE:RELIANCE"));
    }

    #[test]
    fn test_sub_second_millis_are_kept() {
        let table = upstox_table(vec![vec![
            json!(1_543_795_200_250i64),
            json!(1),
            json!(1),
            json!(1),
            json!(1),
            json!(1),
            json!(0),
        ]]);
        let series = normalize(&table, "NSE:RELIANCE", SourceId::Upstox).unwrap();
        assert_eq!(series.first().unwrap().timestamp.timestamp_millis(), 1_543_795_200_250);
    }

    #[test]
    fn test_calendar_dates_drop_vendor_columns() {
        let table = nse_table(vec![
            nse_row("2018-12-03", 1120.0),
            nse_row("03-Dec-2018", 1121.0),
            nse_row("2018-12-01", 1110.0),
        ]);

        let series = normalize(&table, "NSE:RELIANCE", SourceId::Nse).unwrap();

        // 03-Dec-2018 duplicates 2018-12-03; the later row wins.
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close, 1121.0);
        assert_eq!(series.first().unwrap().volume, 6_000_000);

        let json = serde_json::to_value(&series).unwrap();
        let keys: Vec<&String> = json[0].as_object().unwrap().keys().collect();
        for dropped in ["Series", "Turnover", "VWAP", "Prev Close", "Trades", "Last"] {
            assert!(!keys.iter().any(|k| k.as_str() == dropped));
        }
    }

    #[test]
    fn test_zero_rows_is_empty_not_error() {
        let series = normalize(&upstox_table(Vec::new()), "NSE:RELIANCE", SourceId::Upstox).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_missing_required_column_is_parse_error() {
        let mut table = RawTable::new(
            vec!["timestamp".into(), "open".into()],
            TimestampFormat::EpochMillis {
                column: "timestamp".into(),
            },
        );
        table.push_row(vec![json!(0), json!(1)]);
        let err = normalize(&table, "X", SourceId::Upstox).unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[test]
    fn test_bad_rows_skipped_all_bad_rejected() {
        let good = vec![
            json!(1_543_795_200_000i64),
            json!(1),
            json!(2),
            json!(0.5),
            json!(1.5),
            json!(null),
            json!(0),
        ];
        let bad = vec![
            json!("not-a-time"),
            json!(1),
            json!(2),
            json!(0.5),
            json!(1.5),
            json!(10),
            json!(0),
        ];

        let series =
            normalize(&upstox_table(vec![good, bad.clone()]), "X", SourceId::Upstox).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.first().unwrap().volume, 0);

        let err = normalize(&upstox_table(vec![bad]), "X", SourceId::Upstox).unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let table = nse_table(vec![nse_row("2018-12-03", 1120.0), nse_row("2018-12-04", 1130.0)]);
        let first = normalize(&table, "NSE:RELIANCE", SourceId::Nse).unwrap();
        let second = normalize(&table, "NSE:RELIANCE", SourceId::Nse).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_coercions() {
        assert_eq!(coerce_price(&json!("1,234.50")), Some(1234.5));
        assert_eq!(coerce_price(&json!(null)), None);
        assert_eq!(coerce_price(&json!("NaN")), None);
        assert_eq!(coerce_volume(&json!(12.6)), Some(13));
        assert_eq!(coerce_volume(&json!("1,000")), Some(1000));
        assert_eq!(coerce_volume(&json!("")), Some(0));
        assert_eq!(coerce_volume(&json!(true)), None);
    }
}
