//! Hard-fail gate and conviction caps.
//!
//! The gate runs before any pillar. The first failing rule wins and the
//! engine returns without scoring pillars. Rules that do not fail may still
//! contribute a [`Cap`]; caps from the gate and from the pillars are reduced
//! together with [`apply_caps`] after synthesis.

use serde::{Deserialize, Serialize};

use super::config::{EarningsWindow, ScoringConfig};
use crate::domain::TrendState;
use crate::features::{IndicatorSnapshot, MaPosition};
use crate::indicators::CloudPosition;

/// Upper bound on conviction collected during scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cap {
    pub limit: u8,
    pub reason: String,
}

/// Lowest cap wins. Caps only ever lower the score.
pub fn apply_caps(raw: u8, caps: &[Cap]) -> u8 {
    caps.iter().fold(raw, |acc, cap| acc.min(cap.limit))
}

/// Caps plus the human-readable note trail, collected in evaluation order.
#[derive(Debug, Default, Clone)]
pub struct Trail {
    pub caps: Vec<Cap>,
    pub notes: Vec<String>,
}

impl Trail {
    pub fn cap(&mut self, limit: u8, reason: impl Into<String>) {
        let reason = reason.into();
        self.notes.push(format!("{reason} → cap {limit}%"));
        self.caps.push(Cap { limit, reason });
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Sustained multi-day strength confirmed on both intraday timeframes.
pub fn reversal_evidence(snap: &IndicatorSnapshot) -> bool {
    snap.extras.sustained.sustained
        && snap.timeframes.tf_65m.is_bull()
        && snap.timeframes.tf_240m.is_bull()
}

/// Run the gate. `Err(reason)` is a hard fail; `Ok` carries the caps so far.
pub fn evaluate(
    snap: &IndicatorSnapshot,
    config: &ScoringConfig,
    trail: &mut Trail,
) -> Result<(), String> {
    let tf = &snap.timeframes;
    let tas = snap.tas_count();
    let reversal = reversal_evidence(snap);
    let below_ma = snap.ma150_position == MaPosition::Below;

    if reversal && (tf.weekly.is_bear() || snap.cloud_position == CloudPosition::Below) {
        trail.note("Sustained intraday reversal → structural fails suspended");
    }

    // ─── Hard fails, first match wins ───
    if tf.weekly.is_bear() && tf.daily.is_bear() && !reversal {
        return Err("Weekly BEAR + Daily BEAR → HARD FAIL".into());
    }
    if below_ma && tf.weekly.is_bear() && !reversal {
        return Err("Below 150MA + Weekly BEAR → HARD FAIL".into());
    }
    if tas == 0 {
        return Err(format!("TAS {} full bear alignment → HARD FAIL", snap.tas));
    }
    if snap.cloud_position == CloudPosition::Below && !reversal {
        return Err("Below Ichimoku cloud → HARD FAIL".into());
    }
    if snap.levels.rr < config.rr_floor {
        return Err(format!(
            "R:R {:.2}:1 below absolute floor {:.1}:1 → HARD FAIL",
            snap.levels.rr, config.rr_floor
        ));
    }
    if let EarningsWindow::Blackout { days } =
        EarningsWindow::classify(snap.days_to_earnings, config)
    {
        return Err(format!("Earnings in {days}d blackout → HARD FAIL"));
    }

    // ─── Caps ───
    match tas {
        2 => trail.cap(65, format!("TAS {} split signal", snap.tas)),
        1 => trail.cap(55, format!("TAS {} bear dominance", snap.tas)),
        _ => {}
    }
    if tf.weekly.is_bear() && tf.daily.is_bull() {
        trail.cap(65, "Weekly BEAR + Daily BULL watchlist");
    }
    if tf.weekly.is_bear() && tf.daily.is_bear() {
        trail.cap(55, "Weekly BEAR + Daily BEAR under reversal");
    }
    if below_ma && tf.weekly != TrendState::Bear {
        trail.cap(70, "Below 150MA");
    }
    if tf.daily == TrendState::Mixed {
        trail.cap(70, "MIXED Daily trend");
    }
    match snap.cloud_position {
        CloudPosition::Inside => trail.cap(65, "Inside cloud"),
        CloudPosition::Below => trail.cap(55, "Below cloud under reversal"),
        CloudPosition::Above => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(limit: u8) -> Cap {
        Cap {
            limit,
            reason: String::new(),
        }
    }

    #[test]
    fn lowest_cap_wins_regardless_of_order() {
        assert_eq!(apply_caps(82, &[cap(70), cap(65), cap(90)]), 65);
        assert_eq!(apply_caps(82, &[cap(90), cap(65), cap(70)]), 65);
        assert_eq!(apply_caps(50, &[cap(70)]), 50);
        assert_eq!(apply_caps(77, &[]), 77);
    }

    #[test]
    fn trail_records_note_per_cap() {
        let mut trail = Trail::default();
        trail.cap(60, "Yellow Candle Exhaustion");
        assert_eq!(trail.notes, vec!["Yellow Candle Exhaustion → cap 60%"]);
        assert_eq!(trail.caps[0].limit, 60);
    }
}
