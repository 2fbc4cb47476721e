//! Rendering of a fetched series to stdout.

use std::io::Write;

use anyhow::Result;
use tickerstore_market_data::NormalizedSeries;

use crate::cli::OutputFormat;

pub fn render(
    series: &NormalizedSeries,
    format: OutputFormat,
    pretty: bool,
    out: impl Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => render_json(series, pretty, out),
        OutputFormat::Csv => render_csv(series, out),
    }
}

fn render_json(series: &NormalizedSeries, pretty: bool, mut out: impl Write) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut out, series)?;
    } else {
        serde_json::to_writer(&mut out, series)?;
    }
    writeln!(out)?;
    Ok(())
}

fn render_csv(series: &NormalizedSeries, out: impl Write) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    if series.is_empty() {
        writer.write_record(["Date", "Open", "High", "Low", "Close", "Volume", "Symbol"])?;
    }
    for row in series {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickerstore_market_data::SeriesRow;

    fn series() -> NormalizedSeries {
        NormalizedSeries::from_rows(vec![SeriesRow {
            timestamp: "2018-12-03T00:00:00Z".parse().unwrap(),
            open: 1172.0,
            high: 1182.95,
            low: 1162.0,
            close: 1174.8,
            volume: 6120734,
            symbol: "NSE:RELIANCE".to_string(),
        }])
    }

    fn rendered(series: &NormalizedSeries, format: OutputFormat) -> String {
        let mut buffer = Vec::new();
        render(series, format, false, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_csv_has_canonical_header() {
        let text = rendered(&series(), OutputFormat::Csv);
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Date,Open,High,Low,Close,Volume,Symbol")
        );
        assert_eq!(
            lines.next(),
            Some("2018-12-03T00:00:00Z,1172.0,1182.95,1162.0,1174.8,6120734,NSE:RELIANCE")
        );
    }

    #[test]
    fn test_empty_csv_still_has_header() {
        let text = rendered(&NormalizedSeries::empty(), OutputFormat::Csv);
        assert_eq!(text, "Date,Open,High,Low,Close,Volume,Symbol\n");
    }

    #[test]
    fn test_json_is_array_of_rows() {
        let text = rendered(&series(), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["Symbol"], "NSE:RELIANCE");
        assert_eq!(value[0]["Volume"], 6120734);
    }
}
