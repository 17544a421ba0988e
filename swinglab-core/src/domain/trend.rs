//! Timeframe trend states and the four-timeframe alignment breakdown.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trend classification of one timeframe (close vs its EMA20).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendState {
    Bull,
    Bear,
    /// Not enough history on this timeframe to decide.
    Mixed,
}

impl TrendState {
    pub fn from_close_vs_line(close: f64, line: f64) -> Self {
        if close.is_nan() || line.is_nan() {
            TrendState::Mixed
        } else if close > line {
            TrendState::Bull
        } else {
            TrendState::Bear
        }
    }

    pub fn is_bull(self) -> bool {
        self == TrendState::Bull
    }

    pub fn is_bear(self) -> bool {
        self == TrendState::Bear
    }
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendState::Bull => "BULL",
            TrendState::Bear => "BEAR",
            TrendState::Mixed => "MIXED",
        };
        f.write_str(s)
    }
}

/// Trend state on each of the four timeframes, shortest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeBreakdown {
    pub tf_65m: TrendState,
    pub tf_240m: TrendState,
    pub daily: TrendState,
    pub weekly: TrendState,
}

impl TimeframeBreakdown {
    pub fn all(state: TrendState) -> Self {
        Self {
            tf_65m: state,
            tf_240m: state,
            daily: state,
            weekly: state,
        }
    }

    pub fn states(&self) -> [TrendState; 4] {
        [self.tf_65m, self.tf_240m, self.daily, self.weekly]
    }

    /// Timeframe-alignment count: number of BULL timeframes (0..=4).
    pub fn bull_count(&self) -> u8 {
        self.states().iter().filter(|s| s.is_bull()).count() as u8
    }

    /// Alignment count rendered as `"k/4"`.
    pub fn tas(&self) -> String {
        format!("{}/4", self.bull_count())
    }
}

/// Parse a `"k/4"` alignment string back into its count.
pub fn parse_tas(tas: &str) -> Option<u8> {
    let (k, total) = tas.split_once('/')?;
    if total.trim() != "4" {
        return None;
    }
    k.trim().parse::<u8>().ok().filter(|k| *k <= 4)
}
