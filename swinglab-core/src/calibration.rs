//! Calibration parameters and their application to raw conviction.
//!
//! The active calibration is an explicit value handed to whoever wants it
//! (scan, tracker). Nothing here reads a global; tests can bypass calibration
//! by simply not passing one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::numeric::round_dp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationMode {
    /// Raw scores pass through unchanged.
    #[default]
    None,
    /// `clamp(round(raw * scale + offset), 0, 100)`.
    Linear,
    /// Piecewise lookup of the raw score's bracket.
    Curve,
}

/// One populated bracket of the piecewise mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveEntry {
    pub raw_min: u8,
    pub raw_max: u8,
    pub raw_mid: f64,
    /// Realized win rate of the bracket, the score it maps to.
    pub calibrated: f64,
    pub tp1_rate: f64,
    pub win_rate: f64,
    pub count: usize,
}

impl CurveEntry {
    pub fn contains(&self, raw: u8) -> bool {
        self.raw_min <= raw && raw <= self.raw_max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub mode: CalibrationMode,
    pub scale: f64,
    pub offset: f64,
    #[serde(default)]
    pub mapping: Vec<CurveEntry>,
    #[serde(default)]
    pub calibrated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signals_used: usize,
    /// Fingerprint of the backtest configuration the fit came from.
    #[serde(default)]
    pub source_fingerprint: Option<String>,
    /// Bracket stats, pillar analysis and suggested filters from the fit.
    #[serde(default)]
    pub diagnostics: Option<serde_json::Value>,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self::identity()
    }
}

impl CalibrationParams {
    /// Mode `none`, scale 1, offset 0.
    pub fn identity() -> Self {
        Self {
            mode: CalibrationMode::None,
            scale: 1.0,
            offset: 0.0,
            mapping: Vec::new(),
            calibrated_at: None,
            signals_used: 0,
            source_fingerprint: None,
            diagnostics: None,
        }
    }

    pub fn linear(scale: f64, offset: f64) -> Self {
        Self {
            mode: CalibrationMode::Linear,
            scale,
            offset,
            ..Self::identity()
        }
    }

    pub fn is_active(&self) -> bool {
        self.mode != CalibrationMode::None
    }

    /// Map a raw conviction to its calibrated value.
    pub fn apply(&self, raw: u8) -> u8 {
        match self.mode {
            CalibrationMode::None => raw,
            CalibrationMode::Linear => {
                let v = (raw as f64 * self.scale + self.offset).round();
                if v.is_finite() {
                    v.clamp(0.0, 100.0) as u8
                } else {
                    raw
                }
            }
            CalibrationMode::Curve => self
                .mapping
                .iter()
                .find(|entry| entry.contains(raw))
                .map_or(raw, |entry| round_dp(entry.calibrated, 0).clamp(0.0, 100.0) as u8),
        }
    }

    /// Raw 40..=100 in steps of 5 with the calibrated value beside each.
    pub fn preview(&self) -> Vec<(u8, u8)> {
        (40..=100).step_by(5).map(|raw| (raw, self.apply(raw))).collect()
    }
}
