//! SwingLab Core: the pure, deterministic half of the swing-trading pipeline.
//!
//! - Domain types (bars, quotes, trend states, timeframe breakdowns)
//! - Series indicators and point-in-time price structure
//! - Feature extractor: bars → indicator snapshot at an as-of index
//! - Regime classifier: volatility proxy + benchmark → regime and min R:R
//! - Conviction scoring engine with hard-fail gate and cap fold
//! - Calibration parameters and their application to raw scores
//! - Market-data provider trait with Yahoo, CSV and synthetic sources
//! - Market session clock

pub mod calibration;
pub mod data;
pub mod domain;
pub mod features;
pub mod fingerprint;
pub mod indicators;
pub mod numeric;
pub mod regime;
pub mod rng;
pub mod scoring;
pub mod session;
pub mod structure;

pub use calibration::{CalibrationMode, CalibrationParams, CurveEntry};
pub use data::{DataError, MarketDataProvider};
pub use domain::{AssetClass, Bar, Quote, Resolution, TimeframeBreakdown, TrendState};
pub use features::{extract, FeatureError, FeatureInput, IndicatorSnapshot};
pub use regime::{Regime, RegimeLabel};
pub use scoring::{score, score_outcome, Heat, ScoreResult, ScoringConfig, ScoringVariant};
pub use session::{Clock, FixedClock, MarketSession, SystemClock};
