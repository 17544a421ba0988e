//! Conviction scoring engine: `(snapshot, regime) -> ScoreResult`.
//!
//! Deterministic. The evaluation order is fixed:
//!
//! 1. hard-fail gate ([`gate::evaluate`]), short-circuits everything
//! 2. five pillars ([`pillars`]), each 0..=100, possibly adding caps
//! 3. weighted synthesis, rounded, then the lowest-cap fold
//! 4. heat tier and trend label
//!
//! A snapshot that could not be built is scored as a hard fail by
//! [`score_outcome`]; the engine never returns an error.

pub mod config;
pub mod gate;
pub mod pillars;

pub use config::{EarningsWindow, PillarWeights, ScoringConfig, ScoringVariant};
pub use gate::{apply_caps, reversal_evidence, Cap};
pub use pillars::PillarScores;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationParams;
use crate::domain::{TimeframeBreakdown, TrendState};
use crate::features::{FeatureError, IndicatorSnapshot, TradeLevels};
use crate::regime::{Regime, RegimeLabel};
use gate::Trail;

/// Coarse conviction tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Heat {
    Cold,
    Neutral,
    Hot,
    #[serde(rename = "TOP")]
    Top,
}

impl Heat {
    pub fn from_conviction(conviction: u8) -> Self {
        if conviction >= 75 {
            Heat::Top
        } else if conviction >= 60 {
            Heat::Hot
        } else if conviction >= 45 {
            Heat::Neutral
        } else {
            Heat::Cold
        }
    }
}

impl fmt::Display for Heat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Heat::Top => "TOP",
            Heat::Hot => "Hot",
            Heat::Neutral => "Neutral",
            Heat::Cold => "Cold",
        })
    }
}

/// Majority vote: 3+ bullish timeframes BULL, 0-1 BEAR, else MIXED.
pub fn trend_label(tf: &TimeframeBreakdown) -> TrendState {
    match tf.bull_count() {
        0 | 1 => TrendState::Bear,
        2 => TrendState::Mixed,
        _ => TrendState::Bull,
    }
}

/// Outcome of scoring one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub ticker: String,
    pub as_of: Option<NaiveDate>,
    pub price: f64,
    pub pillars: PillarScores,
    pub raw_score: u8,
    pub caps: Vec<Cap>,
    pub conviction: u8,
    /// Pre-calibration conviction, set only when a calibration was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_conviction: Option<u8>,
    pub hard_fail: bool,
    pub hard_fail_reason: Option<String>,
    pub heat: Heat,
    pub trend: TrendState,
    pub notes: Vec<String>,
    pub regime: RegimeLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    /// `None` when the snapshot could not be built.
    pub snapshot: Option<IndicatorSnapshot>,
}

impl ScoreResult {
    fn failed(
        ticker: String,
        snapshot: Option<IndicatorSnapshot>,
        regime: &Regime,
        reason: String,
        pillars: PillarScores,
        trail: Trail,
    ) -> Self {
        let trend = snapshot
            .as_ref()
            .map_or(TrendState::Mixed, |s| trend_label(&s.timeframes));
        Self {
            ticker,
            as_of: snapshot.as_ref().map(|s| s.as_of),
            price: snapshot.as_ref().map_or(0.0, |s| s.last_price),
            pillars,
            raw_score: 0,
            caps: trail.caps,
            conviction: 0,
            raw_conviction: None,
            hard_fail: true,
            hard_fail_reason: Some(reason),
            heat: Heat::Cold,
            trend,
            notes: trail.notes,
            regime: regime.label,
            plan: None,
            snapshot,
        }
    }

    pub fn levels(&self) -> Option<&TradeLevels> {
        self.snapshot.as_ref().map(|s| &s.levels)
    }

    pub fn tas(&self) -> &str {
        self.snapshot.as_ref().map_or("0/4", |s| s.tas.as_str())
    }

    /// Note trail joined for display; falls back to TAS and RSI.
    pub fn ta_note(&self) -> String {
        if !self.notes.is_empty() {
            return self.notes.join(" · ");
        }
        let rsi = self
            .snapshot
            .as_ref()
            .and_then(|s| s.rsi)
            .map_or_else(|| "n/a".to_string(), |v| format!("{v}"));
        format!("TAS {}. RSI {rsi}.", self.tas())
    }

    /// Replace conviction with its calibrated value, keeping the raw score.
    /// Hard fails stay at 0.
    pub fn apply_calibration(&mut self, params: &CalibrationParams) {
        if self.hard_fail || !params.is_active() {
            return;
        }
        let raw = self.raw_conviction.unwrap_or(self.conviction);
        self.raw_conviction = Some(raw);
        self.conviction = params.apply(raw);
        self.heat = Heat::from_conviction(self.conviction);
    }

    /// Execution plan line for a top-ranked result.
    pub fn plan_text(&self) -> Option<String> {
        let lv = self.levels()?;
        Some(format!(
            "Entry: decisive close ${:.2}-${:.2} in final 30min. SL: ${:.2} (ATR triple-guard). \
             TP1: ${:.2} (exit 40%, move SL to BE). TP2: ${:.2} (exit 45%). R:R {}:1.",
            lv.entry_low, lv.entry_high, lv.stop, lv.tp1, lv.tp2, lv.rr
        ))
    }
}

/// Score a snapshot under a regime.
pub fn score(snap: &IndicatorSnapshot, regime: &Regime, config: &ScoringConfig) -> ScoreResult {
    let mut trail = Trail::default();

    if let Err(reason) = gate::evaluate(snap, config, &mut trail) {
        return ScoreResult::failed(
            snap.symbol.clone(),
            Some(snap.clone()),
            regime,
            reason,
            PillarScores::default(),
            trail,
        );
    }

    let pillars = PillarScores {
        p1: pillars::trend(snap, config.variant, &mut trail),
        p2: pillars::structure(snap, config.variant, &mut trail),
        p3: pillars::flow(snap, &mut trail),
        p4: pillars::risk(snap, regime, &mut trail),
        p5: pillars::catalyst(snap, config, &mut trail),
    };

    let w = &config.weights;
    let weighted = pillars.p1 as f64 * w.trend
        + pillars.p2 as f64 * w.structure
        + pillars.p3 as f64 * w.flow
        + pillars.p4 as f64 * w.risk
        + pillars.p5 as f64 * w.catalyst;
    let raw_score = weighted.round().clamp(0.0, 100.0) as u8;
    let conviction = apply_caps(raw_score, &trail.caps);

    ScoreResult {
        ticker: snap.symbol.clone(),
        as_of: Some(snap.as_of),
        price: snap.last_price,
        pillars,
        raw_score,
        caps: trail.caps,
        conviction,
        raw_conviction: None,
        hard_fail: false,
        hard_fail_reason: None,
        heat: Heat::from_conviction(conviction),
        trend: trend_label(&snap.timeframes),
        notes: trail.notes,
        regime: regime.label,
        plan: None,
        snapshot: Some(snap.clone()),
    }
}

/// Score the extractor's output, converting an error marker into a hard fail.
pub fn score_outcome(
    outcome: Result<IndicatorSnapshot, FeatureError>,
    regime: &Regime,
    config: &ScoringConfig,
) -> ScoreResult {
    match outcome {
        Ok(snap) => score(&snap, regime, config),
        Err(err) => ScoreResult::failed(
            err.symbol().to_string(),
            None,
            regime,
            err.to_string(),
            PillarScores::default(),
            Trail::default(),
        ),
    }
}
