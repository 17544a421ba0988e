//! Aggregate statistics over closed signals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use swinglab_core::numeric::{mean, pct, round_dp};
use swinglab_core::regime::RegimeLabel;

use super::{Signal, SignalStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub total_active: usize,
    pub total_closed: usize,
    pub wins: usize,
    pub losses: usize,
    pub timeouts: usize,
    pub win_rate: f64,
    pub avg_pnl: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub avg_days_held: f64,
    pub tp1_hit_rate: f64,
    pub tp2_hit_rate: f64,
    pub avg_mae: f64,
    pub avg_mfe: f64,
    pub profit_factor: f64,
    pub total_gap_slippage: f64,
    pub gap_affected_trades: usize,
    pub avg_conviction_winners: f64,
    pub avg_conviction_losers: f64,
}

fn avg(values: impl Iterator<Item = f64>, dp: i32) -> f64 {
    let values: Vec<f64> = values.collect();
    mean(&values).map_or(0.0, |m| round_dp(m, dp))
}

impl SignalStats {
    /// A win is a positive P&L; everything else is a loss.
    pub fn compute(active: &[Signal], closed: &[Signal]) -> Self {
        let mut stats = Self {
            total_active: active.len(),
            ..Self::default()
        };
        if closed.is_empty() {
            return stats;
        }

        let (wins, losses): (Vec<&Signal>, Vec<&Signal>) =
            closed.iter().partition(|s| s.pnl_pct > 0.0);
        let pnls: Vec<f64> = closed.iter().map(|s| s.pnl_pct).collect();
        let gross_profit: f64 = wins.iter().map(|s| s.pnl_pct).sum();
        let gross_loss = if losses.is_empty() {
            0.01
        } else {
            losses.iter().map(|s| s.pnl_pct).sum::<f64>().abs()
        };
        let gaps: Vec<f64> = closed
            .iter()
            .filter_map(|s| s.close.as_ref().and_then(|c| c.gap))
            .map(|g| g.slippage_pct.abs())
            .collect();
        let n = closed.len();

        stats.total_closed = n;
        stats.wins = wins.len();
        stats.losses = losses.len();
        stats.timeouts = closed
            .iter()
            .filter(|s| s.status == SignalStatus::Timeout)
            .count();
        stats.win_rate = round_dp(pct(wins.len(), n), 1);
        stats.avg_pnl = avg(pnls.iter().copied(), 2);
        stats.best_trade = round_dp(pnls.iter().copied().fold(f64::MIN, f64::max), 2);
        stats.worst_trade = round_dp(pnls.iter().copied().fold(f64::MAX, f64::min), 2);
        stats.avg_days_held = avg(closed.iter().map(|s| s.days_held as f64), 1);
        stats.tp1_hit_rate = round_dp(pct(closed.iter().filter(|s| s.hits.tp1()).count(), n), 1);
        stats.tp2_hit_rate = round_dp(pct(closed.iter().filter(|s| s.hits.tp2()).count(), n), 1);
        stats.avg_mae = avg(closed.iter().map(|s| s.mae_pct), 2);
        stats.avg_mfe = avg(closed.iter().map(|s| s.mfe_pct), 2);
        stats.profit_factor = if gross_loss > 0.0 {
            round_dp(gross_profit / gross_loss, 2)
        } else {
            0.0
        };
        stats.total_gap_slippage = round_dp(gaps.iter().sum(), 2);
        stats.gap_affected_trades = gaps.len();
        stats.avg_conviction_winners = avg(wins.iter().map(|s| s.entry.conviction as f64), 1);
        stats.avg_conviction_losers = avg(losses.iter().map(|s| s.entry.conviction as f64), 1);
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeStats {
    pub regime: RegimeLabel,
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub avg_pnl: f64,
    pub best: f64,
    pub worst: f64,
}

/// Closed signals grouped by the regime they were opened under.
pub fn regime_performance(closed: &[Signal]) -> Vec<RegimeStats> {
    let mut groups: BTreeMap<RegimeLabel, Vec<f64>> = BTreeMap::new();
    for s in closed {
        groups.entry(s.entry_regime()).or_default().push(s.pnl_pct);
    }
    groups
        .into_iter()
        .map(|(regime, pnls)| {
            let wins = pnls.iter().filter(|p| **p > 0.0).count();
            RegimeStats {
                regime,
                trades: pnls.len(),
                wins,
                win_rate: round_dp(pct(wins, pnls.len()), 1),
                avg_pnl: avg(pnls.iter().copied(), 2),
                best: round_dp(pnls.iter().copied().fold(f64::MIN, f64::max), 2),
                worst: round_dp(pnls.iter().copied().fold(f64::MAX, f64::min), 2),
            }
        })
        .collect()
}
