use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One bar of the canonical schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    /// Index of the series.
    #[serde(rename = "Date")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "Open")]
    pub open: f64,

    #[serde(rename = "High")]
    pub high: f64,

    #[serde(rename = "Low")]
    pub low: f64,

    #[serde(rename = "Close")]
    pub close: f64,

    #[serde(rename = "Volume")]
    pub volume: i64,

    /// The ticker as requested by the caller.
    #[serde(rename = "Symbol")]
    pub symbol: String,
}

/// Canonical time-series returned by every successful retrieval.
///
/// Rows are keyed by timestamp: strictly ascending, no duplicates. The only
/// way to build a series is through [`NormalizedSeries::from_rows`] (or
/// [`NormalizedSeries::empty`]), which enforces that ordering. Deserialized
/// series go through the same path.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedSeries {
    rows: Vec<SeriesRow>,
}

impl NormalizedSeries {
    /// Column names of the canonical schema (the timestamp is the index).
    pub const COLUMNS: [&'static str; 6] = ["Open", "High", "Low", "Close", "Volume", "Symbol"];

    /// The defined "no trading data in this window" value.
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    /// Build a series, sorting ascending by timestamp.
    ///
    /// When two rows share a timestamp the one appearing later in `rows` wins.
    pub fn from_rows(rows: Vec<SeriesRow>) -> Self {
        let mut rows = rows;
        // Stable sort keeps input order among equal timestamps.
        rows.sort_by_key(|row| row.timestamp);

        let mut deduped: Vec<SeriesRow> = Vec::with_capacity(rows.len());
        for row in rows {
            match deduped.last_mut() {
                Some(last) if last.timestamp == row.timestamp => *last = row,
                _ => deduped.push(row),
            }
        }

        Self { rows: deduped }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[SeriesRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SeriesRow> {
        self.rows.iter()
    }

    pub fn first(&self) -> Option<&SeriesRow> {
        self.rows.first()
    }

    pub fn last(&self) -> Option<&SeriesRow> {
        self.rows.last()
    }

    pub fn into_rows(self) -> Vec<SeriesRow> {
        self.rows
    }
}

impl From<Vec<SeriesRow>> for NormalizedSeries {
    fn from(rows: Vec<SeriesRow>) -> Self {
        Self::from_rows(rows)
    }
}

impl<'de> Deserialize<'de> for NormalizedSeries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<SeriesRow>::deserialize(deserializer).map(Self::from_rows)
    }
}

impl<'a> IntoIterator for &'a NormalizedSeries {
    type Item = &'a SeriesRow;
    type IntoIter = std::slice::Iter<'a, SeriesRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
