//! Upstox API response models.

use serde::Deserialize;
use serde_json::Value;

/// Envelope shared by every Upstox endpoint.
#[derive(Debug, Deserialize)]
pub struct UpstoxEnvelope<T> {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Master contract payload: CSV text, either as one string or one line per
/// array element.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MasterContractData {
    Text(String),
    Lines(Vec<String>),
}

impl MasterContractData {
    pub fn into_csv(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Lines(lines) => lines.join("\n"),
        }
    }
}

/// One instrument of the master contract. Extra CSV columns are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ContractEntry {
    pub exchange: String,
    #[serde(default)]
    pub token: Option<String>,
    pub symbol: String,
}

/// One OHLC bar. Numeric fields arrive as numbers or numeric strings.
#[derive(Debug, Deserialize)]
pub struct UpstoxCandle {
    #[serde(default)]
    pub timestamp: Value,
    #[serde(default)]
    pub open: Value,
    #[serde(default)]
    pub high: Value,
    #[serde(default)]
    pub low: Value,
    #[serde(default)]
    pub close: Value,
    #[serde(default)]
    pub volume: Value,
    #[serde(default)]
    pub cp: Value,
}

impl UpstoxCandle {
    pub const COLUMNS: [&'static str; 7] =
        ["timestamp", "open", "high", "low", "close", "volume", "cp"];

    pub fn into_row(self) -> Vec<Value> {
        vec![
            self.timestamp,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.cp,
        ]
    }
}
