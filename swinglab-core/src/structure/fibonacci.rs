//! Fibonacci retracement ladders and multi-window confluence.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// Retracement ratios measured down from the swing high.
pub const RETRACEMENTS: [f64; 5] = [0.236, 0.382, 0.5, 0.618, 0.786];

/// Ratios compared across windows when looking for confluence.
const CONFLUENCE_RATIOS: [f64; 4] = [0.236, 0.382, 0.5, 0.618];

/// Maximum relative distance between two levels to count as overlapping.
const CONFLUENCE_TOLERANCE: f64 = 0.005;

/// Swing range of a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibLadder {
    pub window: usize,
    pub high: f64,
    pub low: f64,
}

impl FibLadder {
    /// Ladder over the trailing `window` bars (or all bars if fewer).
    pub fn over(bars: &[Bar], window: usize) -> Option<Self> {
        if bars.is_empty() || window == 0 {
            return None;
        }
        let tail = &bars[bars.len().saturating_sub(window)..];
        let high = tail.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let low = tail.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        Some(Self { window, high, low })
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Retracement level for `ratio` (0 = swing high, 1 = swing low).
    pub fn level(&self, ratio: f64) -> f64 {
        self.high - self.range() * ratio
    }

    /// Extension above the swing high measured from the low (e.g. 1.272).
    pub fn extension(&self, ratio: f64) -> f64 {
        self.low + self.range() * ratio
    }

    /// Named levels, swing high first.
    pub fn levels(&self) -> Vec<(String, f64)> {
        let mut out = vec![("0".to_string(), self.high)];
        out.extend(RETRACEMENTS.iter().map(|r| (format!("{r:.3}"), self.level(*r))));
        out.push(("1.0".to_string(), self.low));
        out
    }
}

/// Price zones where the two ladders' retracements overlap within 0.5%.
///
/// Returns the midpoints, sorted ascending, deduplicated, at most four.
pub fn confluence_zones(short: &FibLadder, long: &FibLadder) -> Vec<f64> {
    let mut zones: Vec<f64> = Vec::new();
    for rs in CONFLUENCE_RATIOS {
        let a = short.level(rs);
        for rl in CONFLUENCE_RATIOS {
            let b = long.level(rl);
            if (a - b).abs() / a.max(0.01) < CONFLUENCE_TOLERANCE {
                zones.push(round2((a + b) / 2.0));
            }
        }
    }
    zones.sort_by(f64::total_cmp);
    zones.dedup();
    zones.truncate(4);
    zones
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
