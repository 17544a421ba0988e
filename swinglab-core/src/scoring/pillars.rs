//! The five pillars. Each returns an independent 0..=100 score.

use serde::{Deserialize, Serialize};

use super::config::{EarningsWindow, ScoringConfig, ScoringVariant};
use super::gate::Trail;
use crate::features::{IndicatorSnapshot, VolumeDirection};
use crate::indicators::CloudPosition;
use crate::regime::Regime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarScores {
    pub p1: u8,
    pub p2: u8,
    pub p3: u8,
    pub p4: u8,
    pub p5: u8,
}

impl PillarScores {
    pub fn as_array(&self) -> [u8; 5] {
        [self.p1, self.p2, self.p3, self.p4, self.p5]
    }
}

fn clamp(score: i32) -> u8 {
    score.clamp(0, 100) as u8
}

// ─── P1 Trend ───

/// Timeframe vote weights for the upgraded variant: 65m, 240m, daily, weekly.
const TF_WEIGHTS: [f64; 4] = [0.30, 0.30, 0.25, 0.15];

pub fn trend(snap: &IndicatorSnapshot, variant: ScoringVariant, trail: &mut Trail) -> u8 {
    let tf = &snap.timeframes;
    let mut p1 = match variant {
        ScoringVariant::Standard => {
            if tf.daily.is_bull() {
                80
            } else if tf.weekly.is_bull() {
                55
            } else {
                30
            }
        }
        ScoringVariant::Upgraded => {
            let vote: f64 = tf
                .states()
                .iter()
                .zip(TF_WEIGHTS)
                .filter(|(state, _)| state.is_bull())
                .map(|(_, w)| w)
                .sum();
            let base = if vote >= 0.85 {
                85
            } else if vote >= 0.6 {
                75
            } else if vote >= 0.4 {
                60
            } else if vote >= 0.2 {
                45
            } else {
                30
            };
            if snap.extras.sustained.sustained {
                trail.note(format!(
                    "Sustained trend ({} closes) → P1 +5",
                    snap.extras.sustained.bull_candles
                ));
                base + 5
            } else {
                base
            }
        }
    };

    match snap.cloud_position {
        CloudPosition::Above => {
            p1 += 5;
            trail.note("Above cloud → P1 +5");
        }
        CloudPosition::Below => {
            p1 -= 10;
            trail.note("Below cloud → P1 -10");
        }
        CloudPosition::Inside => {}
    }
    clamp(p1)
}

// ─── P2 Structure ───

pub fn structure(snap: &IndicatorSnapshot, variant: ScoringVariant, trail: &mut Trail) -> u8 {
    let candle = &snap.candle;
    let mut p2: i32 = 50;
    if snap.coiling {
        p2 += 20;
        trail.note("Coiling detected → P2 +20");
    }
    if candle.body_pct > 0.5 {
        p2 += 10;
    }
    if candle.bull_body && snap.last_price > snap.levels.entry_low {
        p2 += 10;
    }
    if candle.is_doji {
        p2 -= 10;
    }

    if variant == ScoringVariant::Upgraded {
        let extras = &snap.extras;
        if extras.at_lower_channel {
            p2 += 10;
            trail.note("At regression lower band → P2 +10");
        }
        if extras.in_fvg {
            p2 += 5;
            trail.note("Inside bullish FVG → P2 +5");
        }
        if extras.near_poc {
            p2 += 5;
            trail.note("Near volume POC → P2 +5");
        }
        if snap.near_confluence {
            p2 += 5;
            trail.note("Fib confluence → P2 +5");
        }
    }

    if candle.long_upper_wick && candle.body_pct < 0.15 && snap.vol_ratio > 1.8 {
        trail.cap(60, "Yellow Candle Exhaustion");
    }
    clamp(p2)
}

// ─── P3 Institutional flow ───

pub fn flow(snap: &IndicatorSnapshot, trail: &mut Trail) -> u8 {
    let tas = snap.tas_count();
    let ratio = snap.vol_ratio;
    let mut p3 = match snap.vol_direction {
        VolumeDirection::Accumulation if tas >= 3 => {
            trail.note("Accumulation on aligned trend → P3 STRONG");
            85
        }
        VolumeDirection::Distribution if snap.candle.body_pct < 0.3 && ratio >= 2.0 => {
            trail.note(format!("Absorption (small body on {ratio}x volume) → P3 MODERATE"));
            65
        }
        VolumeDirection::Distribution => {
            trail.note("Distribution signal → P3 WEAK");
            45
        }
        _ if ratio < 1.5 => {
            trail.note(format!("Vol ratio {ratio}x < 1.5 → P3 WEAK"));
            35
        }
        _ if tas <= 2 => {
            trail.note("Counter-trend volume → P3 WEAK");
            40
        }
        _ => 60,
    };

    if ratio > 3.0 && tas <= 2 {
        trail.note(format!("Climax Reversal Risk (vol {ratio}x, TAS {})", snap.tas));
        p3 = p3.min(35);
    }
    p3
}

// ─── P4 Risk geometry ───

pub fn risk(snap: &IndicatorSnapshot, regime: &Regime, trail: &mut Trail) -> u8 {
    let rr = snap.levels.rr;
    let p4 = if rr >= 3.0 {
        90
    } else if rr >= 2.5 {
        80
    } else if rr >= 2.0 {
        70
    } else {
        50
    };
    if rr < regime.min_rr {
        trail.note(format!(
            "R:R {rr}:1 below {} min {}:1 → P4 capped 40",
            regime.label, regime.min_rr
        ));
        p4.min(40)
    } else {
        p4
    }
}

// ─── P5 Catalyst timing ───

pub fn catalyst(snap: &IndicatorSnapshot, config: &ScoringConfig, trail: &mut Trail) -> u8 {
    match EarningsWindow::classify(snap.days_to_earnings, config) {
        EarningsWindow::HalfSize { days } => {
            trail.note(format!("Earnings in {days}d → half size"));
            40
        }
        // blackout never reaches the pillars
        EarningsWindow::Blackout { .. } => 0,
        EarningsWindow::Clear => 80,
    }
}
