//! Scoring configuration.

use serde::{Deserialize, Serialize};

/// Which pillar rule set to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringVariant {
    /// Daily/weekly trend vote, candle-only structure.
    #[default]
    Standard,
    /// Weighted four-timeframe vote plus regression / imbalance / volume-profile structure.
    Upgraded,
}

/// Pillar weights. Must sum to 1.0 for the raw score to stay in 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PillarWeights {
    pub trend: f64,
    pub structure: f64,
    pub flow: f64,
    pub risk: f64,
    pub catalyst: f64,
}

impl Default for PillarWeights {
    fn default() -> Self {
        Self {
            trend: 0.25,
            structure: 0.25,
            flow: 0.20,
            risk: 0.20,
            catalyst: 0.10,
        }
    }
}

impl PillarWeights {
    pub fn total(&self) -> f64 {
        self.trend + self.structure + self.flow + self.risk + self.catalyst
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub variant: ScoringVariant,
    pub weights: PillarWeights,
    /// Absolute reward:risk floor. Below it the signal hard-fails whatever the regime.
    pub rr_floor: f64,
    /// Earnings closer than this many days is a blackout.
    pub earnings_blackout_days: i64,
    /// Earnings closer than this many days halves the catalyst pillar.
    pub earnings_half_size_days: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            variant: ScoringVariant::Standard,
            weights: PillarWeights::default(),
            rr_floor: 1.0,
            earnings_blackout_days: 5,
            earnings_half_size_days: 10,
        }
    }
}

impl ScoringConfig {
    pub fn upgraded() -> Self {
        Self {
            variant: ScoringVariant::Upgraded,
            ..Self::default()
        }
    }
}

/// Earnings proximity as seen by the catalyst pillar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EarningsWindow {
    Clear,
    HalfSize { days: i64 },
    Blackout { days: i64 },
}

impl EarningsWindow {
    pub fn classify(days_to_earnings: Option<i64>, config: &ScoringConfig) -> Self {
        match days_to_earnings {
            Some(days) if days >= 0 && days < config.earnings_blackout_days => {
                EarningsWindow::Blackout { days }
            }
            Some(days) if days >= 0 && days < config.earnings_half_size_days => {
                EarningsWindow::HalfSize { days }
            }
            _ => EarningsWindow::Clear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!((PillarWeights::default().total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn earnings_windows() {
        let cfg = ScoringConfig::default();
        assert_eq!(EarningsWindow::classify(None, &cfg), EarningsWindow::Clear);
        assert_eq!(
            EarningsWindow::classify(Some(3), &cfg),
            EarningsWindow::Blackout { days: 3 }
        );
        assert_eq!(
            EarningsWindow::classify(Some(7), &cfg),
            EarningsWindow::HalfSize { days: 7 }
        );
        assert_eq!(EarningsWindow::classify(Some(10), &cfg), EarningsWindow::Clear);
        assert_eq!(EarningsWindow::classify(Some(-2), &cfg), EarningsWindow::Clear);
    }

    #[test]
    fn partial_toml_like_json_uses_defaults() {
        let cfg: ScoringConfig = serde_json::from_str(r#"{"variant":"upgraded"}"#).unwrap();
        assert_eq!(cfg.variant, ScoringVariant::Upgraded);
        assert_eq!(cfg.rr_floor, 1.0);
    }
}
