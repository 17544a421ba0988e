//! Point-in-time price structure: retracements, imbalance zones, regression
//! channel, volume profile, range compression and trend persistence.
//!
//! Unlike the series indicators these answer a single question about the last
//! bar of the slice they are given.

pub mod fibonacci;
pub mod fvg;
pub mod regression;
pub mod volume_profile;

pub use fibonacci::{confluence_zones, FibLadder};
pub use fvg::{bullish_gaps, price_in_gap, FairValueGap};
pub use regression::{least_squares, least_squares_xy, RegressionChannel};
pub use volume_profile::point_of_control;

use crate::domain::Bar;

/// Range compression: each of the last three ranges is under half the
/// trailing 10-bar mean range.
pub fn is_coiling(bars: &[Bar]) -> bool {
    if bars.len() < 10 {
        return false;
    }
    let tail10 = &bars[bars.len() - 10..];
    let avg = tail10.iter().map(Bar::range).sum::<f64>() / 10.0;
    tail10[7..].iter().all(|b| b.range() < avg * 0.5)
}

/// Consecutive most-recent closes above the aligned trend line, capped at `cap`.
///
/// `line` must be index-aligned with `bars`.
pub fn consecutive_closes_above(bars: &[Bar], line: &[f64], cap: usize) -> usize {
    bars.iter()
        .zip(line)
        .rev()
        .take(cap)
        .take_while(|(bar, value)| !value.is_nan() && bar.close > **value)
        .count()
}
