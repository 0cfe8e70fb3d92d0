// src/services/export.rs
use csv::Writer;
use serde::Serialize;

use crate::models::PriceSeries;

#[derive(Serialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: u64,
}

/// Writes the series as CSV with a `Date,Open,High,Low,Close,Volume` header.
pub fn series_to_csv(series: &PriceSeries) -> Result<String, csv::Error> {
    let mut wtr = Writer::from_writer(Vec::new());
    if series.is_empty() {
        wtr.write_record(["Date", "Open", "High", "Low", "Close", "Volume"])?;
    }
    for bar in series.bars() {
        wtr.serialize(CsvRow {
            date: bar.date.format("%Y-%m-%d").to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        })?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceBar;
    use chrono::NaiveDate;

    #[test]
    fn writes_header_and_rows() {
        let series = PriceSeries::from_bars(vec![PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: 187.15,
            high: 188.44,
            low: 183.89,
            close: 185.64,
            volume: 82488700,
        }]);
        let csv = series_to_csv(&series).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Date,Open,High,Low,Close,Volume"));
        assert_eq!(lines.next(), Some("2024-01-02,187.15,188.44,183.89,185.64,82488700"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_series_still_has_header() {
        assert_eq!(series_to_csv(&PriceSeries::empty()).unwrap(), "Date,Open,High,Low,Close,Volume\n");
    }
}
