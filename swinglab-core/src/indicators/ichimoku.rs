//! Ichimoku cloud (tenkan 9, kijun 26, span B 52, displaced 26 bars).
//!
//! Span A = (tenkan + kijun) / 2 and span B = midpoint of the 52-bar range,
//! both plotted 26 bars ahead. The cloud under bar t is therefore built from
//! bars up to t-26, which keeps it free of look-ahead.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// Price location relative to the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudPosition {
    Above,
    Inside,
    Below,
}

/// Cloud boundaries under one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IchimokuCloud {
    pub span_a: f64,
    pub span_b: f64,
}

impl IchimokuCloud {
    pub fn top(&self) -> f64 {
        self.span_a.max(self.span_b)
    }

    pub fn bottom(&self) -> f64 {
        self.span_a.min(self.span_b)
    }

    pub fn position_of(&self, price: f64) -> CloudPosition {
        if price > self.top() {
            CloudPosition::Above
        } else if price < self.bottom() {
            CloudPosition::Below
        } else {
            CloudPosition::Inside
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ichimoku {
    pub tenkan: usize,
    pub kijun: usize,
    pub span_b: usize,
    pub displacement: usize,
}

impl Default for Ichimoku {
    fn default() -> Self {
        Self {
            tenkan: 9,
            kijun: 26,
            span_b: 52,
            displacement: 26,
        }
    }
}

impl Ichimoku {
    /// Cloud under the last bar of `bars`, `None` while the spans are warming up.
    pub fn cloud_at_last(&self, bars: &[Bar]) -> Option<IchimokuCloud> {
        let last = bars.len().checked_sub(1)?;
        let source = last.checked_sub(self.displacement)?;
        let history = &bars[..=source];

        let tenkan = midpoint(history, self.tenkan)?;
        let kijun = midpoint(history, self.kijun)?;
        let span_b = midpoint(history, self.span_b)?;

        Some(IchimokuCloud {
            span_a: (tenkan + kijun) / 2.0,
            span_b,
        })
    }
}

/// Midpoint of the highest high and lowest low over the trailing `period` bars.
fn midpoint(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let window = &bars[bars.len() - period..];
    let hi = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let lo = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    Some((hi + lo) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn cloud_needs_displacement_plus_span_b() {
        let ichi = Ichimoku::default();
        let short = make_bars(&vec![100.0; 77]);
        assert!(ichi.cloud_at_last(&short).is_none());
        let enough = make_bars(&vec![100.0; 78]);
        assert!(ichi.cloud_at_last(&enough).is_some());
    }

    #[test]
    fn flat_series_cloud_sits_on_price() {
        let bars = make_bars(&vec![100.0; 90]);
        let cloud = Ichimoku::default().cloud_at_last(&bars).unwrap();
        // make_bars pads highs/lows by 1.0 around flat closes
        assert_approx(cloud.top(), 100.0, 1e-9);
        assert_eq!(cloud.position_of(100.0), CloudPosition::Inside);
        assert_eq!(cloud.position_of(102.0), CloudPosition::Above);
        assert_eq!(cloud.position_of(98.0), CloudPosition::Below);
    }

    #[test]
    fn rally_lifts_price_above_cloud() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let cloud = Ichimoku::default().cloud_at_last(&bars).unwrap();
        assert_eq!(cloud.position_of(bars[119].close), CloudPosition::Above);
    }
}
