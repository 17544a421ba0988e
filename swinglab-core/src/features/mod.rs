//! Feature extractor: bar history → [`IndicatorSnapshot`] as of one bar.
//!
//! There is exactly one entry point, [`extract`], parameterized by the as-of
//! index. Live scans pass the last index, backtests pass every replay index.
//! The extractor slices `daily[..=index]` before any computation, so no
//! rolling window can observe a later bar.

pub mod levels;
pub mod snapshot;
pub mod timeframes;

pub use snapshot::{
    CandleShape, IndicatorSnapshot, MaPosition, StructuralExtras, SustainedTrend, TradeLevels,
    VolumeDirection,
};

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::Bar;
use crate::indicators::{ema_of_series, Atr, CloudPosition, Ema, Ichimoku, Indicator, Rsi};
use crate::numeric::round_dp;
use crate::structure::{
    bullish_gaps, confluence_zones, consecutive_closes_above, is_coiling, point_of_control,
    price_in_gap, FibLadder, RegressionChannel,
};

/// Bars required before a snapshot can be produced (150-bar trend line plus
/// the 55-bar structural window, with slack).
pub const MIN_BARS: usize = 160;

const VOLUME_WINDOW: usize = 20;
const VOLUME_SIGNIFICANT: f64 = 1.5;
const DOJI_BODY: f64 = 0.1;
const LONG_WICK: f64 = 0.5;
const SUSTAINED_CAP: usize = 5;
const SUSTAINED_MIN: usize = 3;
const FVG_LOOKBACK: usize = 50;
const FVG_CHECKED: usize = 10;
const FVG_KEPT: usize = 5;
const CHANNEL_PERIOD: usize = 100;
const PROFILE_WINDOW: usize = 50;
const PROFILE_BINS: usize = 30;

/// Why a snapshot could not be produced. Downstream, this is the "error
/// marker" that scoring turns into a hard fail and backtests turn into a skip.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("{symbol}: insufficient history ({have} bars, need {need})")]
    InsufficientHistory {
        symbol: String,
        have: usize,
        need: usize,
    },

    #[error("{symbol}: as-of index {index} out of range for {len} bars")]
    IndexOutOfRange {
        symbol: String,
        index: usize,
        len: usize,
    },

    #[error("{symbol}: void bar at index {index}")]
    VoidBar { symbol: String, index: usize },
}

impl FeatureError {
    pub fn symbol(&self) -> &str {
        match self {
            FeatureError::InsufficientHistory { symbol, .. }
            | FeatureError::IndexOutOfRange { symbol, .. }
            | FeatureError::VoidBar { symbol, .. } => symbol,
        }
    }
}

/// Everything the extractor needs for one symbol at one as-of index.
#[derive(Debug, Clone, Copy)]
pub struct FeatureInput<'a> {
    pub symbol: &'a str,
    pub daily: &'a [Bar],
    pub index: usize,
    /// Hourly bars; anything dated after the as-of bar is ignored.
    pub intraday: Option<&'a [Bar]>,
    pub days_to_earnings: Option<i64>,
}

impl<'a> FeatureInput<'a> {
    /// Input for the most recent bar of `daily`.
    pub fn latest(symbol: &'a str, daily: &'a [Bar]) -> Self {
        Self {
            symbol,
            daily,
            index: daily.len().saturating_sub(1),
            intraday: None,
            days_to_earnings: None,
        }
    }

    pub fn at(symbol: &'a str, daily: &'a [Bar], index: usize) -> Self {
        Self {
            index,
            ..Self::latest(symbol, daily)
        }
    }

    pub fn with_intraday(mut self, intraday: Option<&'a [Bar]>) -> Self {
        self.intraday = intraday;
        self
    }

    pub fn with_earnings(mut self, days: Option<i64>) -> Self {
        self.days_to_earnings = days;
        self
    }
}

/// Build the snapshot as of `input.index`.
pub fn extract(input: &FeatureInput<'_>) -> Result<IndicatorSnapshot, FeatureError> {
    let symbol = input.symbol;
    if input.index >= input.daily.len() {
        return Err(FeatureError::IndexOutOfRange {
            symbol: symbol.to_string(),
            index: input.index,
            len: input.daily.len(),
        });
    }
    let bars = &input.daily[..=input.index];
    if bars.len() < MIN_BARS {
        return Err(FeatureError::InsufficientHistory {
            symbol: symbol.to_string(),
            have: bars.len(),
            need: MIN_BARS,
        });
    }
    let last = &bars[bars.len() - 1];
    if last.is_void() {
        return Err(FeatureError::VoidBar {
            symbol: symbol.to_string(),
            index: input.index,
        });
    }
    let close = last.close;
    let as_of = last.date();

    // ─── Trend lines ───
    let ema10 = Ema::new(10).last(bars);
    let ema20 = Ema::new(20).last(bars);
    let ma150 = Ema::new(150).last(bars);
    let ma150_position = if close > ma150 {
        MaPosition::Above
    } else {
        MaPosition::Below
    };

    let intraday: Option<Vec<Bar>> = input.intraday.map(|hourly| {
        hourly
            .iter()
            .filter(|b| b.date() <= as_of)
            .cloned()
            .collect()
    });
    let timeframes = timeframes::assess(bars, intraday.as_deref(), ema20);

    let cloud_position = Ichimoku::default()
        .cloud_at_last(bars)
        .map_or(CloudPosition::Inside, |cloud| cloud.position_of(close));

    // ─── Volume and candle ───
    let vol_tail = &bars[bars.len() - VOLUME_WINDOW..];
    let vol_avg = vol_tail.iter().map(|b| b.volume as f64).sum::<f64>() / VOLUME_WINDOW as f64;
    let vol_ratio = if vol_avg > 0.0 {
        last.volume as f64 / vol_avg
    } else {
        1.0
    };

    let range = last.range();
    let body_pct = if range > 0.0 { last.body() / range } else { 0.0 };
    let candle = CandleShape {
        body_pct: round_dp(body_pct, 3),
        is_doji: body_pct < DOJI_BODY,
        long_upper_wick: range > 0.0 && last.upper_wick() / range > LONG_WICK,
        bull_body: last.is_bullish(),
    };
    let vol_direction = classify_volume(vol_ratio, &candle, close > ema20);

    // ─── Volatility ───
    let atr = Atr::new(14).last(bars);
    let rsi = Some(Rsi::new(14).last(bars)).filter(|v| v.is_finite());

    // ─── Retracement structure ───
    let fib55 = ladder(bars, 55);
    let fib35 = ladder(bars, 35);
    let fib_levels: BTreeMap<String, f64> = fib55
        .levels()
        .into_iter()
        .map(|(k, v)| (k, round_dp(v, 2)))
        .collect();
    let zones = confluence_zones(&fib35, &fib55);
    let near_confluence = zones.iter().any(|z| (close - z).abs() / z.max(0.01) < 0.01);

    let levels = levels::compute(&levels::LevelInputs {
        close,
        atr,
        swing_low: levels::swing_low(bars.iter().map(|b| b.low)),
        fib35: &fib35,
        fib55: &fib55,
    });

    let extras = structural_extras(bars, close);

    Ok(IndicatorSnapshot {
        symbol: symbol.to_string(),
        as_of,
        bar_index: input.index,
        last_price: round_dp(close, 2),
        ema10: round_dp(ema10, 2),
        ema20: round_dp(ema20, 2),
        ma150: round_dp(ma150, 2),
        ma150_position,
        tas: timeframes.tas(),
        timeframes,
        cloud_position,
        vol_ratio: round_dp(vol_ratio, 2),
        vol_direction,
        candle,
        atr: round_dp(atr, 2),
        rsi: rsi.map(|v| round_dp(v, 1)),
        fib_levels,
        confluence_zones: zones,
        near_confluence,
        coiling: is_coiling(bars),
        levels,
        days_to_earnings: input.days_to_earnings,
        extras,
    })
}

fn ladder(bars: &[Bar], window: usize) -> FibLadder {
    // bars.len() >= MIN_BARS, so over() always has data
    FibLadder::over(bars, window).unwrap_or(FibLadder {
        window,
        high: f64::NAN,
        low: f64::NAN,
    })
}

/// Heavy volume on a bullish body above trend is accumulation; heavy volume
/// on a bearish, indecisive or rejected candle is distribution.
pub fn classify_volume(vol_ratio: f64, candle: &CandleShape, above_trend: bool) -> VolumeDirection {
    if vol_ratio < VOLUME_SIGNIFICANT {
        return VolumeDirection::Neutral;
    }
    if candle.bull_body && above_trend {
        VolumeDirection::Accumulation
    } else if !candle.bull_body || candle.is_doji || candle.long_upper_wick {
        VolumeDirection::Distribution
    } else {
        VolumeDirection::Neutral
    }
}

fn structural_extras(bars: &[Bar], close: f64) -> StructuralExtras {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema5 = ema_of_series(&closes, 5);
    let bull_candles = consecutive_closes_above(bars, &ema5, SUSTAINED_CAP);

    let channel = RegressionChannel::fit(bars, CHANNEL_PERIOD);
    let mut fvg_zones = bullish_gaps(bars, FVG_LOOKBACK);
    let in_fvg = price_in_gap(&fvg_zones, close, FVG_CHECKED);
    fvg_zones.truncate(FVG_KEPT);
    let poc = point_of_control(bars, PROFILE_WINDOW, PROFILE_BINS);

    StructuralExtras {
        sustained: SustainedTrend {
            bull_candles: bull_candles as u8,
            sustained: bull_candles >= SUSTAINED_MIN,
        },
        lr_lower: channel.map(|c| round_dp(c.lower_band(), 2)),
        at_lower_channel: channel.is_some_and(|c| c.at_lower(close)),
        fvg_zones,
        in_fvg,
        poc: poc.map(|p| round_dp(p, 2)),
        near_poc: poc.is_some_and(|p| (close - p).abs() / p.max(0.01) < 0.005),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrendState;
    use crate::indicators::make_bars;

    fn uptrend(n: usize) -> Vec<Bar> {
        make_bars(&(0..n).map(|i| 100.0 + i as f64 * 0.5).collect::<Vec<_>>())
    }

    #[test]
    fn refuses_short_history() {
        let bars = uptrend(159);
        let err = extract(&FeatureInput::latest("AAPL", &bars)).unwrap_err();
        assert_eq!(
            err,
            FeatureError::InsufficientHistory {
                symbol: "AAPL".into(),
                have: 159,
                need: MIN_BARS
            }
        );
    }

    #[test]
    fn refuses_index_past_end() {
        let bars = uptrend(200);
        let err = extract(&FeatureInput::at("AAPL", &bars, 200)).unwrap_err();
        assert!(matches!(err, FeatureError::IndexOutOfRange { .. }));
    }

    #[test]
    fn steady_uptrend_snapshot() {
        let bars = uptrend(220);
        let snap = extract(&FeatureInput::latest("AAPL", &bars)).unwrap();
        assert_eq!(snap.bar_index, 219);
        assert_eq!(snap.ma150_position, MaPosition::Above);
        assert_eq!(snap.timeframes.daily, TrendState::Bull);
        assert_eq!(snap.timeframes.weekly, TrendState::Bull);
        assert_eq!(snap.tas, "4/4");
        assert_eq!(snap.cloud_position, CloudPosition::Above);
        assert!(snap.levels.stop < snap.last_price);
        assert!(snap.levels.tp1 > snap.last_price);
        assert!(snap.extras.sustained.sustained);
        assert_eq!(snap.vol_direction, VolumeDirection::Neutral);
    }

    #[test]
    fn index_slices_history() {
        let bars = uptrend(260);
        let at = extract(&FeatureInput::at("AAPL", &bars, 200)).unwrap();
        let truncated = extract(&FeatureInput::latest("AAPL", &bars[..=200])).unwrap();
        assert_eq!(at, truncated);
    }

    #[test]
    fn volume_classification() {
        let bull = CandleShape {
            body_pct: 0.8,
            is_doji: false,
            long_upper_wick: false,
            bull_body: true,
        };
        let bear = CandleShape {
            bull_body: false,
            ..bull
        };
        assert_eq!(classify_volume(2.0, &bull, true), VolumeDirection::Accumulation);
        assert_eq!(classify_volume(2.0, &bear, true), VolumeDirection::Distribution);
        assert_eq!(classify_volume(1.2, &bear, true), VolumeDirection::Neutral);
        assert_eq!(classify_volume(2.0, &bull, false), VolumeDirection::Neutral);
    }
}
