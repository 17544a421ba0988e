//! Shared fixtures for runner integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use swinglab_core::data::{DataError, MarketDataProvider};
use swinglab_core::domain::{Bar, Quote, Resolution};

/// Provider with quotes the test can move between monitoring passes.
#[derive(Default)]
pub struct ScriptedProvider {
    quotes: Mutex<HashMap<String, Quote>>,
    bars: HashMap<String, Vec<Bar>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Daily bars whose true range is `range` around a flat close of `close`.
    pub fn with_flat_bars(mut self, symbol: &str, close: f64, range: f64, count: usize) -> Self {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 20, 0, 0).unwrap();
        let bars = (0..count)
            .map(|i| Bar {
                symbol: symbol.to_string(),
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close + range / 2.0,
                low: close - range / 2.0,
                close,
                volume: 1_000_000,
            })
            .collect();
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn set_quote(&self, symbol: &str, price: f64, previous_close: f64) {
        self.quotes.lock().insert(
            symbol.to_string(),
            Quote {
                price,
                previous_close,
            },
        );
    }

    pub fn drop_quote(&self, symbol: &str) {
        self.quotes.lock().remove(symbol);
    }
}

impl MarketDataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn get_bars(
        &self,
        symbol: &str,
        resolution: Resolution,
        _window_days: u32,
    ) -> Result<Vec<Bar>, DataError> {
        match (resolution, self.bars.get(symbol)) {
            (Resolution::Daily, Some(bars)) => Ok(bars.clone()),
            _ => Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn get_last_price(&self, symbol: &str) -> Result<Quote, DataError> {
        self.quotes
            .lock()
            .get(symbol)
            .copied()
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
    }
}

/// Monday 2024-06-03 11:00 New York, regular session.
pub fn monday_open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 15, 0, 0).unwrap()
}

pub fn days_later(days: i64) -> DateTime<Utc> {
    monday_open() + Duration::days(days)
}
