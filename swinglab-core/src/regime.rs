//! Market regime from a volatility proxy and a broad-market benchmark.
//!
//! Pure and uncached: every scan and every backtest replay step classifies
//! afresh, and the resulting [`Regime`] is embedded in whatever it influenced.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::numeric::round_dp;

/// Volatility level assumed when the proxy series is unavailable.
pub const FALLBACK_VOL: f64 = 20.0;

/// Regime labels in ascending order of stress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegimeLabel {
    TrendingBull,
    ChoppyRange,
    TrendingBear,
    HighVolEvent,
}

impl RegimeLabel {
    pub const ALL: [RegimeLabel; 4] = [
        RegimeLabel::TrendingBull,
        RegimeLabel::ChoppyRange,
        RegimeLabel::TrendingBear,
        RegimeLabel::HighVolEvent,
    ];

    pub fn from_vol(vol: f64) -> Self {
        if vol > 30.0 {
            RegimeLabel::HighVolEvent
        } else if vol > 25.0 {
            RegimeLabel::TrendingBear
        } else if vol > 20.0 {
            RegimeLabel::ChoppyRange
        } else {
            RegimeLabel::TrendingBull
        }
    }

    /// Minimum reward:risk a signal must clear under this regime.
    pub fn min_rr(self) -> f64 {
        match self {
            RegimeLabel::TrendingBull => 2.0,
            RegimeLabel::ChoppyRange => 2.5,
            RegimeLabel::TrendingBear | RegimeLabel::HighVolEvent => 3.0,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            RegimeLabel::TrendingBull => "Trending Bull",
            RegimeLabel::ChoppyRange => "Choppy / Range",
            RegimeLabel::TrendingBear => "Trending Bear",
            RegimeLabel::HighVolEvent => "High-Vol Event",
        }
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regime {
    pub vol: f64,
    pub label: RegimeLabel,
    pub min_rr: f64,
    pub benchmark_close: Option<f64>,
    pub benchmark_change_pct: Option<f64>,
}

impl Regime {
    pub fn from_vol(vol: f64) -> Self {
        let label = RegimeLabel::from_vol(vol);
        Self {
            vol: round_dp(vol, 2),
            label,
            min_rr: label.min_rr(),
            benchmark_close: None,
            benchmark_change_pct: None,
        }
    }

    /// Used when the volatility proxy is unavailable.
    pub fn fallback() -> Self {
        Self {
            vol: FALLBACK_VOL,
            label: RegimeLabel::ChoppyRange,
            min_rr: RegimeLabel::ChoppyRange.min_rr(),
            benchmark_close: None,
            benchmark_change_pct: None,
        }
    }

    /// One-line market header, e.g.
    /// `SPY up 0.42% at $512.30. VIX at 14.2 (Trending Bull regime). Min R:R requirement: 2.0:1.`
    pub fn header(&self, benchmark: &str, vol_symbol: &str) -> String {
        let bench = match (self.benchmark_close, self.benchmark_change_pct) {
            (Some(close), Some(chg)) => format!(
                "{benchmark} {} {:.2}% at ${close:.2}. ",
                if chg >= 0.0 { "up" } else { "down" },
                chg.abs()
            ),
            _ => String::new(),
        };
        format!(
            "{bench}{} at {:.1} ({} regime). Min R:R requirement: {:.1}:1.",
            vol_symbol.trim_start_matches('^'),
            self.vol,
            self.label,
            self.min_rr
        )
    }
}

/// Classify from the latest bars of each series.
pub fn classify(vol_bars: &[Bar], benchmark_bars: &[Bar]) -> Regime {
    let mut regime = match vol_bars.last() {
        Some(bar) if bar.close.is_finite() => Regime::from_vol(bar.close),
        _ => Regime::fallback(),
    };
    if let [.., prev, last] = benchmark_bars {
        regime.benchmark_close = Some(round_dp(last.close, 2));
        if prev.close > 0.0 {
            regime.benchmark_change_pct = Some(round_dp((last.close / prev.close - 1.0) * 100.0, 2));
        }
    } else if let [only] = benchmark_bars {
        regime.benchmark_close = Some(round_dp(only.close, 2));
    }
    regime
}

/// Point-in-time classification: only bars dated on or before `date` count.
pub fn classify_at(vol_bars: &[Bar], benchmark_bars: &[Bar], date: NaiveDate) -> Regime {
    let cut = |bars: &[Bar]| bars.partition_point(|b| b.date() <= date);
    classify(
        &vol_bars[..cut(vol_bars)],
        &benchmark_bars[..cut(benchmark_bars)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn thresholds_are_exclusive_on_the_lower_side() {
        assert_eq!(RegimeLabel::from_vol(20.0), RegimeLabel::TrendingBull);
        assert_eq!(RegimeLabel::from_vol(20.01), RegimeLabel::ChoppyRange);
        assert_eq!(RegimeLabel::from_vol(25.5), RegimeLabel::TrendingBear);
        assert_eq!(RegimeLabel::from_vol(31.0), RegimeLabel::HighVolEvent);
        assert!(RegimeLabel::TrendingBull < RegimeLabel::HighVolEvent);
    }

    #[test]
    fn empty_proxy_falls_back_to_choppy_default() {
        let r = classify(&[], &[]);
        assert_eq!(r.vol, FALLBACK_VOL);
        assert_eq!(r.label, RegimeLabel::ChoppyRange);
        assert_eq!(r.min_rr, 2.5);
        assert_eq!(r.benchmark_close, None);
    }

    #[test]
    fn benchmark_change_and_header() {
        let vix = make_bars(&[18.0, 27.0]);
        let spy = make_bars(&[500.0, 505.0]);
        let r = classify(&vix, &spy);
        assert_eq!(r.label, RegimeLabel::TrendingBear);
        assert_eq!(r.min_rr, 3.0);
        assert_eq!(r.benchmark_change_pct, Some(1.0));
        assert_eq!(
            r.header("SPY", "^VIX"),
            "SPY up 1.00% at $505.00. VIX at 27.0 (Trending Bear regime). Min R:R requirement: 3.0:1."
        );
    }

    #[test]
    fn classify_at_ignores_later_bars() {
        let vix = make_bars(&[15.0, 35.0]);
        let spy = make_bars(&[500.0, 400.0]);
        let first_day = vix[0].date();
        let r = classify_at(&vix, &spy, first_day);
        assert_eq!(r.label, RegimeLabel::TrendingBull);
        assert_eq!(r.benchmark_close, Some(500.0));
    }
}
