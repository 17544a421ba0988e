//! Seeded synthetic market data for offline runs and tests.
//!
//! Equities follow a drifting random walk; symbols starting with `^` (volatility
//! indices) mean-revert around a base level. Every series is a pure function of
//! `(seed, symbol, anchor)`, so a backtest over synthetic data is reproducible.

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use rand::Rng;

use super::provider::{non_empty, quote_from_bars, DataError, MarketDataProvider};
use crate::domain::{Bar, Quote, Resolution};
use crate::rng::SeedTree;

/// Trading days generated before trimming to the requested window.
const HISTORY_DAYS: usize = 1500;
const HOURS_PER_SESSION: usize = 7;

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seeds: SeedTree,
    /// Date of the last generated session.
    anchor: NaiveDate,
    drift: f64,
    volatility: f64,
}

impl SyntheticProvider {
    pub fn new(seed: u64, anchor: NaiveDate) -> Self {
        Self {
            seeds: SeedTree::new(seed),
            anchor,
            drift: 0.0006,
            volatility: 0.018,
        }
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility.max(0.0);
        self
    }

    /// Business days ending at the anchor, oldest first.
    fn sessions(&self) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(HISTORY_DAYS);
        let mut day = self.anchor;
        while days.len() < HISTORY_DAYS {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                days.push(day);
            }
            day -= Duration::days(1);
        }
        days.reverse();
        days
    }

    fn daily(&self, symbol: &str) -> Vec<Bar> {
        let mut rng = self.seeds.rng_for(symbol, "daily");
        let is_vol_index = symbol.starts_with('^');
        let base = if is_vol_index {
            18.0
        } else {
            rng.gen_range(40.0..400.0)
        };

        let mut prev_close: f64 = base;
        self.sessions()
            .into_iter()
            .map(|date| {
                let shock: f64 = rng.gen_range(-1.0..1.0) + rng.gen_range(-1.0..1.0);
                let close = if is_vol_index {
                    (prev_close + 0.08 * (base - prev_close) + shock * 1.2).max(9.0)
                } else {
                    (prev_close * (1.0 + self.drift + shock * self.volatility)).max(1.0)
                };
                let open = prev_close * (1.0 + rng.gen_range(-0.004..0.004));
                let span = close.max(open) * self.volatility * rng.gen_range(0.1..0.8);
                let bar = Bar {
                    symbol: symbol.to_string(),
                    timestamp: session_open(date, 0),
                    open,
                    high: close.max(open) + span,
                    low: (close.min(open) - span).max(0.01),
                    close,
                    volume: rng.gen_range(500_000..3_000_000),
                };
                prev_close = close;
                bar
            })
            .collect()
    }

    fn hourly(&self, symbol: &str, daily: &[Bar]) -> Vec<Bar> {
        let mut rng = self.seeds.rng_for(symbol, "hourly");
        let mut out = Vec::with_capacity(daily.len() * HOURS_PER_SESSION);
        for day in daily {
            let step = (day.close - day.open) / HOURS_PER_SESSION as f64;
            let mut open = day.open;
            for h in 0..HOURS_PER_SESSION {
                let close = if h + 1 == HOURS_PER_SESSION {
                    day.close
                } else {
                    (open + step + rng.gen_range(-0.5..0.5) * step.abs())
                        .clamp(day.low, day.high)
                };
                out.push(Bar {
                    symbol: symbol.to_string(),
                    timestamp: session_open(day.date(), h as u32),
                    open,
                    high: open.max(close).min(day.high),
                    low: open.min(close).max(day.low),
                    close,
                    volume: day.volume / HOURS_PER_SESSION as u64,
                });
                open = close;
            }
        }
        out
    }
}

fn session_open(date: NaiveDate, hour_offset: u32) -> chrono::DateTime<Utc> {
    let time = chrono::NaiveTime::from_hms_opt(14 + hour_offset, 30, 0).unwrap_or(chrono::NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(time))
}

fn weekly(daily: &[Bar]) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::new();
    for bar in daily {
        let week = bar.date().iso_week();
        match out.last_mut() {
            Some(w) if w.date().iso_week() == week => {
                w.high = w.high.max(bar.high);
                w.low = w.low.min(bar.low);
                w.close = bar.close;
                w.volume += bar.volume;
            }
            _ => out.push(bar.clone()),
        }
    }
    out
}

impl MarketDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn get_bars(
        &self,
        symbol: &str,
        resolution: Resolution,
        window_days: u32,
    ) -> Result<Vec<Bar>, DataError> {
        let daily = self.daily(symbol);
        let cutoff = self.anchor - Duration::days(i64::from(window_days));
        let start = daily.partition_point(|b| b.date() <= cutoff);
        let window = &daily[start..];
        let bars = match resolution {
            Resolution::Daily => window.to_vec(),
            Resolution::Weekly => weekly(window),
            Resolution::Hourly => self.hourly(symbol, window),
        };
        non_empty(symbol, resolution, bars)
    }

    fn get_last_price(&self, symbol: &str) -> Result<Quote, DataError> {
        quote_from_bars(symbol, &self.daily(symbol))
    }
}
