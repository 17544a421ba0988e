//! Indicator snapshot: everything the scorer is allowed to know about one
//! symbol as of one bar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::TimeframeBreakdown;
use crate::indicators::CloudPosition;
use crate::structure::FairValueGap;

/// Price location relative to the 150-period trend line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaPosition {
    Above,
    Below,
}

/// Volume-backed direction of the last bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeDirection {
    Accumulation,
    Distribution,
    Neutral,
}

/// Candle shape features of the as-of bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandleShape {
    /// Body as a fraction of the high-low range (0 when the range is 0).
    pub body_pct: f64,
    pub is_doji: bool,
    pub long_upper_wick: bool,
    pub bull_body: bool,
}

/// Stop, targets and the resulting reward:risk for a long entry at the close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub entry_low: f64,
    pub entry_high: f64,
    pub stop: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
    pub rr: f64,
    pub quantity: u32,
}

/// Consecutive closes above the short trend line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SustainedTrend {
    pub bull_candles: u8,
    pub sustained: bool,
}

/// Structural extras consumed only by the upgraded scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralExtras {
    pub sustained: SustainedTrend,
    pub lr_lower: Option<f64>,
    pub at_lower_channel: bool,
    pub fvg_zones: Vec<FairValueGap>,
    pub in_fvg: bool,
    pub poc: Option<f64>,
    pub near_poc: bool,
}

/// Read-only snapshot keyed by symbol and as-of date.
///
/// Every price-derived field is computed from the same as-of bar index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub bar_index: usize,
    pub last_price: f64,
    pub ema10: f64,
    pub ema20: f64,
    pub ma150: f64,
    pub ma150_position: MaPosition,
    pub timeframes: TimeframeBreakdown,
    pub tas: String,
    pub cloud_position: CloudPosition,
    pub vol_ratio: f64,
    pub vol_direction: VolumeDirection,
    pub candle: CandleShape,
    pub atr: f64,
    pub rsi: Option<f64>,
    pub fib_levels: BTreeMap<String, f64>,
    pub confluence_zones: Vec<f64>,
    pub near_confluence: bool,
    pub coiling: bool,
    pub levels: TradeLevels,
    pub days_to_earnings: Option<i64>,
    pub extras: StructuralExtras,
}

impl IndicatorSnapshot {
    /// Timeframe-alignment count (0..=4).
    pub fn tas_count(&self) -> u8 {
        self.timeframes.bull_count()
    }
}
