//! NSE historical equity API response models.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct NseHistoricalResponse {
    #[serde(default)]
    pub data: Vec<NseHistoricalRow>,
}

/// One trading day as reported by the exchange.
#[derive(Debug, Deserialize)]
pub struct NseHistoricalRow {
    #[serde(rename = "CH_TIMESTAMP", default)]
    pub date: Option<String>,
    #[serde(rename = "mTIMESTAMP", default)]
    pub display_date: Option<String>,
    #[serde(rename = "CH_SYMBOL", default)]
    pub symbol: Value,
    #[serde(rename = "CH_SERIES", default)]
    pub series: Value,
    #[serde(rename = "CH_PREVIOUS_CLS_PRICE", default)]
    pub prev_close: Value,
    #[serde(rename = "CH_OPENING_PRICE", default)]
    pub open: Value,
    #[serde(rename = "CH_TRADE_HIGH_PRICE", default)]
    pub high: Value,
    #[serde(rename = "CH_TRADE_LOW_PRICE", default)]
    pub low: Value,
    #[serde(rename = "CH_LAST_TRADED_PRICE", default)]
    pub last: Value,
    #[serde(rename = "CH_CLOSING_PRICE", default)]
    pub close: Value,
    #[serde(rename = "VWAP", default)]
    pub vwap: Value,
    #[serde(rename = "CH_TOT_TRADED_QTY", default)]
    pub volume: Value,
    #[serde(rename = "CH_TOT_TRADED_VAL", default)]
    pub turnover: Value,
    #[serde(rename = "CH_TOTAL_TRADES", default)]
    pub trades: Value,
    #[serde(rename = "COP_DELIV_QTY", default)]
    pub deliverable_volume: Value,
    #[serde(rename = "COP_DELIV_PERC", default)]
    pub deliverable_percent: Value,
}

impl NseHistoricalRow {
    /// Column names of the classic NSE bhavcopy layout (typo included).
    pub const COLUMNS: [&'static str; 15] = [
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
    ];

    pub fn into_row(self) -> Vec<Value> {
        let date = self
            .date
            .or(self.display_date)
            .map(Value::String)
            .unwrap_or(Value::Null);
        vec![
            date,
            self.symbol,
            self.series,
            self.prev_close,
            self.open,
            self.high,
            self.low,
            self.last,
            self.close,
            self.vwap,
            self.volume,
            self.turnover,
            self.trades,
            self.deliverable_volume,
            self.deliverable_percent,
        ]
    }
}
