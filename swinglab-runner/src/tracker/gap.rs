//! Overnight gaps through the stop or the primary target.
//!
//! A gap means the previous close was on the safe side of a level and the
//! current quote is already through it. The quote is then the realistic fill,
//! not the level.

use serde::{Deserialize, Serialize};

use swinglab_core::domain::Quote;
use swinglab_core::numeric::round_dp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    ThroughStop,
    ThroughTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapInfo {
    pub kind: GapKind,
    /// Level the exit was meant to fill at.
    pub intended: f64,
    pub fill: f64,
    pub previous_close: f64,
    /// Positive when the fill is worse than intended for a stop, better than
    /// intended for a target.
    pub slippage_pct: f64,
}

/// Gap down through `stop`.
pub fn through_stop(quote: Quote, stop: f64) -> Option<GapInfo> {
    (quote.previous_close > stop && quote.price <= stop).then(|| GapInfo {
        kind: GapKind::ThroughStop,
        intended: stop,
        fill: quote.price,
        previous_close: quote.previous_close,
        slippage_pct: round_dp((stop - quote.price) / stop * 100.0, 2),
    })
}

/// Gap up through `target`.
pub fn through_target(quote: Quote, target: f64) -> Option<GapInfo> {
    (quote.previous_close < target && quote.price >= target).then(|| GapInfo {
        kind: GapKind::ThroughTarget,
        intended: target,
        fill: quote.price,
        previous_close: quote.previous_close,
        slippage_pct: round_dp((quote.price - target) / target * 100.0, 2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(price: f64, previous_close: f64) -> Quote {
        Quote {
            price,
            previous_close,
        }
    }

    #[test]
    fn gap_down_through_stop_fills_at_quote() {
        let gap = through_stop(quote(98.5, 99.5), 99.0).unwrap();
        assert_eq!(gap.fill, 98.5);
        assert_eq!(gap.slippage_pct, 0.51);
        assert_eq!(gap.kind, GapKind::ThroughStop);
    }

    #[test]
    fn already_below_stop_is_not_a_gap() {
        assert!(through_stop(quote(98.5, 98.8), 99.0).is_none());
        assert!(through_stop(quote(99.2, 99.5), 99.0).is_none());
    }

    #[test]
    fn gap_up_through_target() {
        let gap = through_target(quote(104.0, 101.0), 103.0).unwrap();
        assert_eq!(gap.fill, 104.0);
        assert_eq!(gap.slippage_pct, 0.97);
        assert!(through_target(quote(102.0, 101.0), 103.0).is_none());
    }
}
