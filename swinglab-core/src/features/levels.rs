//! Stop / target geometry for a long entry at the as-of close.

use super::snapshot::TradeLevels;
use crate::numeric::round_dp;
use crate::structure::FibLadder;

/// Dollar risk budget used to size the paper position.
pub const RISK_BUDGET: f64 = 75.0;

const ATR_STOP_MULTIPLE: f64 = 1.5;
const SWING_WINDOW: usize = 20;

/// Inputs already computed by the extractor.
pub struct LevelInputs<'a> {
    pub close: f64,
    pub atr: f64,
    /// Lowest low over the trailing 20 bars.
    pub swing_low: f64,
    pub fib35: &'a FibLadder,
    pub fib55: &'a FibLadder,
}

/// Trailing swing low used as a stop candidate.
pub fn swing_low(lows: impl DoubleEndedIterator<Item = f64>) -> f64 {
    lows.rev().take(SWING_WINDOW).fold(f64::INFINITY, f64::min)
}

/// Stop = tightest candidate still below the close, else 5% under it.
pub fn stop_loss(inputs: &LevelInputs<'_>) -> f64 {
    let close = inputs.close;
    [
        close - ATR_STOP_MULTIPLE * inputs.atr,
        inputs.swing_low,
        inputs.fib55.level(0.618),
    ]
    .into_iter()
    .filter(|c| c.is_finite() && *c < close)
    .fold(None, |best: Option<f64>, c| Some(best.map_or(c, |b| b.max(c))))
    .unwrap_or(close * 0.95)
}

pub fn compute(inputs: &LevelInputs<'_>) -> TradeLevels {
    let close = inputs.close;
    let stop = stop_loss(inputs);
    let risk = close - stop;

    let fib_tp1 = inputs.fib35.level(0.382);
    let tp1 = if fib_tp1 > close { fib_tp1 } else { close + 2.0 * risk };
    let fib_tp2 = inputs.fib55.level(0.236);
    let tp2 = if fib_tp2 > close { fib_tp2 } else { close + 3.0 * risk };
    let ext = inputs.fib55.extension(1.272);
    let tp3 = if ext > tp2 { ext } else { tp2 * 1.05 };

    let rr = (tp1 - close) / risk.max(0.01);
    let quantity = if risk > 0.01 {
        ((RISK_BUDGET / risk).floor() as u32).max(1)
    } else {
        0
    };

    TradeLevels {
        entry_low: round_dp(close * 0.99, 2),
        entry_high: round_dp(close * 1.005, 2),
        stop: round_dp(stop, 2),
        tp1: round_dp(tp1, 2),
        tp2: round_dp(tp2, 2),
        tp3: round_dp(tp3, 2),
        rr: round_dp(rr, 2),
        quantity,
    }
}
