//! Offline provider reading `{dir}/{SYMBOL}.csv`.
//!
//! Expected header: `date,open,high,low,close,volume` with ISO dates, oldest
//! row first. Only daily data is served; the window is measured back from the
//! last row so replayed files behave the same on any wall-clock date.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;

use super::provider::{non_empty, quote_from_bars, DataError, MarketDataProvider};
use crate::domain::{Bar, Quote, Resolution};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File backing `symbol`; `^VIX` is stored as `VIX.csv`.
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        let file = symbol.trim_start_matches('^').replace('/', "_");
        self.dir.join(format!("{file}.csv"))
    }

    fn read_all(&self, symbol: &str) -> Result<Vec<Bar>, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        read_bars(symbol, &path)
    }
}

/// Parse a bar file; rows must be sorted by date.
pub fn read_bars(symbol: &str, path: &Path) -> Result<Vec<Bar>, DataError> {
    let display = path.display().to_string();
    let mut reader = csv::Reader::from_path(path).map_err(|e| DataError::Io {
        path: display.clone(),
        source: std::io::Error::other(e.to_string()),
    })?;

    let mut bars: Vec<Bar> = Vec::new();
    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(|e| DataError::Malformed {
            path: display.clone(),
            reason: format!("row {}: {e}", line + 2),
        })?;
        let timestamp = Utc.from_utc_datetime(&row.date.and_time(chrono::NaiveTime::MIN));
        if bars.last().is_some_and(|prev| prev.timestamp >= timestamp) {
            return Err(DataError::Malformed {
                path: display,
                reason: format!("row {}: dates not strictly ascending", line + 2),
            });
        }
        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.map_or(0, |v| v.max(0.0) as u64),
        });
    }
    Ok(bars)
}

impl MarketDataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn get_bars(
        &self,
        symbol: &str,
        resolution: Resolution,
        window_days: u32,
    ) -> Result<Vec<Bar>, DataError> {
        if resolution != Resolution::Daily {
            return Err(DataError::Unsupported(format!(
                "csv provider serves daily bars only, {resolution:?} requested"
            )));
        }
        let bars = self.read_all(symbol)?;
        let Some(last) = bars.last() else {
            return non_empty(symbol, resolution, bars);
        };
        let cutoff = last.timestamp - chrono::Duration::days(i64::from(window_days));
        let start = bars.partition_point(|b| b.timestamp < cutoff);
        non_empty(symbol, resolution, bars[start..].to_vec())
    }

    fn get_last_price(&self, symbol: &str) -> Result<Quote, DataError> {
        quote_from_bars(symbol, &self.read_all(symbol)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn reads_window_and_quote() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write_file(
            dir,
            "VIX.csv",
            "date,open,high,low,close,volume\n\
             2024-01-02,13,14,12,13.5,0\n\
             2024-01-03,13.5,15,13,14.2,0\n\
             2024-01-10,14,16,14,15.1,0\n",
        );
        let p = CsvProvider::new(dir);
        let bars = p.get_bars("^VIX", Resolution::Daily, 7).unwrap();
        assert_eq!(bars.len(), 2);
        let q = p.get_last_price("^VIX").unwrap();
        assert_eq!(q.price, 15.1);
        assert_eq!(q.previous_close, 14.2);
    }

    #[test]
    fn missing_file_and_unsorted_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let p = CsvProvider::new(dir);
        assert!(matches!(
            p.get_bars("NOPE", Resolution::Daily, 30),
            Err(DataError::SymbolNotFound { .. })
        ));
        write_file(
            dir,
            "BAD.csv",
            "date,open,high,low,close,volume\n2024-01-03,1,1,1,1,1\n2024-01-02,1,1,1,1,1\n",
        );
        assert!(matches!(
            p.get_bars("BAD", Resolution::Daily, 30),
            Err(DataError::Malformed { .. })
        ));
    }
}
