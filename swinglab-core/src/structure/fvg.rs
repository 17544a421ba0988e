//! Bullish fair-value gaps (three-candle imbalance zones).
//!
//! A gap exists at candle k when its low sits above the high of candle k-2,
//! leaving an untraded band between them.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub top: f64,
    pub bottom: f64,
}

impl FairValueGap {
    pub fn contains(&self, price: f64) -> bool {
        self.bottom <= price && price <= self.top
    }
}

/// Scan the trailing `lookback` bars, most recent first.
pub fn bullish_gaps(bars: &[Bar], lookback: usize) -> Vec<FairValueGap> {
    let n = bars.len();
    if n < 3 {
        return Vec::new();
    }
    let span = lookback.min(n - 2);
    (2..span)
        .filter_map(|k| {
            let third = &bars[n - k];
            let first = &bars[n - k - 2];
            (third.low > first.high).then_some(FairValueGap {
                top: third.low,
                bottom: first.high,
            })
        })
        .collect()
}

/// True when `price` sits inside any of the `nearest` most recent gaps.
pub fn price_in_gap(gaps: &[FairValueGap], price: f64, nearest: usize) -> bool {
    gaps.iter().take(nearest).any(|g| g.contains(price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn detects_gap_between_first_and_third_candle() {
        // 100 → 110 → 120 with ±1 wicks: bar[2].low=109 > bar[0].high=101
        let mut closes = vec![100.0; 5];
        closes.extend([100.0, 110.0, 120.0, 121.0, 122.0]);
        let bars = make_bars(&closes);
        let gaps = bullish_gaps(&bars, 50);
        assert!(!gaps.is_empty());
        assert!(gaps.iter().all(|g| g.top > g.bottom));
    }

    #[test]
    fn flat_market_has_no_gaps() {
        let bars = make_bars(&vec![100.0; 60]);
        assert!(bullish_gaps(&bars, 50).is_empty());
    }

    #[test]
    fn containment_checks_only_nearest() {
        let gaps = vec![
            FairValueGap {
                top: 10.0,
                bottom: 9.0,
            },
            FairValueGap {
                top: 20.0,
                bottom: 19.0,
            },
        ];
        assert!(price_in_gap(&gaps, 19.5, 2));
        assert!(!price_in_gap(&gaps, 19.5, 1));
    }
}
