use serde_json::Value;

/// How a source encodes the timestamp column of its response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimestampFormat {
    /// Integer milliseconds since the Unix epoch.
    EpochMillis { column: String },
    /// Calendar dates (`YYYY-MM-DD`, `DD-Mon-YYYY` or `DD-MM-YYYY`).
    CalendarDate { column: String },
}

impl TimestampFormat {
    pub fn column(&self) -> &str {
        match self {
            Self::EpochMillis { column } | Self::CalendarDate { column } => column,
        }
    }
}

/// A source's native tabular response, before normalization.
///
/// Cells keep the vendor's own encoding (numbers, numeric strings, nulls);
/// the normalizer is responsible for coercing them.
#[derive(Clone, Debug, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub timestamp: TimestampFormat,
}

impl RawTable {
    pub fn new(columns: Vec<String>, timestamp: TimestampFormat) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            timestamp,
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, compared case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }
}
