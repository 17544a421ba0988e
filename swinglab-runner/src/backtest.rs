//! Walk-forward backtester.
//!
//! Replays the feature extractor and the scorer at every `stride`-th bar of a
//! recent window, then looks `forward` bars ahead to see which of stop, TP1,
//! TP2 or the time limit came first. Results are bucketed into fixed
//! conviction brackets and compared against the conviction each bracket
//! claims.
//!
//! Every replay step sees only bars up to its own index: the extractor slices
//! the history and the regime is classified point-in-time.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use swinglab_core::data::MarketDataProvider;
use swinglab_core::domain::{Bar, Resolution, TrendState};
use swinglab_core::features::{extract, FeatureInput, MIN_BARS};
use swinglab_core::numeric::{mean, pct, round_dp};
use swinglab_core::regime;
use swinglab_core::scoring::{score, Heat, PillarScores, ScoringConfig};

use crate::config::AppConfig;
use crate::market::MarketSeries;
use crate::scan::SymbolError;
use crate::store::{BacktestStore, StoreError};

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("no signals generated ({} symbol errors)", errors.len())]
    NoSignals { errors: Vec<SymbolError> },

    #[error("no symbols given")]
    NoSymbols,

    #[error("backtest report not saved: {0}")]
    Store(#[from] StoreError),
}

/// Which exit wins when one forward bar touches both the stop and a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameBarPolicy {
    #[default]
    StopFirst,
    TargetFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Bars replayed before the forward reserve.
    pub lookback: usize,
    /// Bars checked after each entry.
    pub forward: usize,
    /// Score every `stride`-th bar.
    pub stride: usize,
    /// Scores below this are not traded.
    pub min_conviction: u8,
    /// Calendar days of daily history requested per symbol.
    pub history_days: u32,
    /// Symbols with fewer daily bars are skipped as errors.
    pub min_bars: usize,
    pub same_bar: SameBarPolicy,
    /// Points between stated and realised rate still counted as calibrated.
    pub gap_tolerance: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            lookback: 120,
            forward: 15,
            stride: 5,
            min_conviction: 40,
            history_days: 730,
            min_bars: 200,
            same_bar: SameBarPolicy::StopFirst,
            gap_tolerance: 10.0,
        }
    }
}

// ─── Forward outcome ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Tp1Hit,
    Tp2Hit,
    SlHit,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeCheck {
    pub outcome: Outcome,
    pub win: bool,
    pub pnl_pct: f64,
    /// Forward bars until the exit (the full window on timeout).
    pub exit_day: usize,
    pub exit_price: f64,
    /// Best high seen in the window, % from entry.
    pub max_gain: f64,
    /// Worst low seen in the window, % from entry (≤ 0).
    pub max_drawdown: f64,
    pub hit_tp1: bool,
    pub hit_tp2: bool,
    pub hit_sl: bool,
}

/// Stop and targets for one entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brackets {
    pub stop: f64,
    pub tp1: f64,
    pub tp2: f64,
}

/// Walk forward from `entry` until an exit or `forward` bars have passed.
///
/// TP2 counts only when touched on the bar that first touches TP1, so TP2
/// always implies TP1.
pub fn check_outcome(
    bars: &[Bar],
    entry: usize,
    levels: Brackets,
    forward: usize,
    policy: SameBarPolicy,
) -> OutcomeCheck {
    let entry_price = bars[entry].close;
    let last = (entry + forward).min(bars.len() - 1);

    let mut hit_tp1 = false;
    let mut hit_tp2 = false;
    let mut hit_sl = false;
    let mut max_price = entry_price;
    let mut min_price = entry_price;
    let mut exit_day = forward;
    let mut exit_price = bars[last].close;

    for (day, bar) in bars[entry + 1..=last].iter().enumerate().map(|(k, b)| (k + 1, b)) {
        max_price = max_price.max(bar.high);
        min_price = min_price.min(bar.low);

        let stop_touched = bar.low <= levels.stop;
        let tp1_touched = bar.high >= levels.tp1;
        let stop_wins = stop_touched && (!tp1_touched || policy == SameBarPolicy::StopFirst);

        if stop_wins {
            hit_sl = true;
            exit_day = day;
            exit_price = levels.stop;
            break;
        }
        if tp1_touched {
            hit_tp1 = true;
            exit_day = day;
            if bar.high >= levels.tp2 {
                hit_tp2 = true;
                exit_price = levels.tp2;
            } else {
                exit_price = levels.tp1;
            }
            break;
        }
    }

    let pnl_pct = round_dp((exit_price - entry_price) / entry_price * 100.0, 2);
    let outcome = if hit_tp2 {
        Outcome::Tp2Hit
    } else if hit_tp1 {
        Outcome::Tp1Hit
    } else if hit_sl {
        Outcome::SlHit
    } else {
        Outcome::Timeout
    };

    OutcomeCheck {
        outcome,
        win: hit_tp1 || pnl_pct > 0.0,
        pnl_pct,
        exit_day,
        exit_price: round_dp(exit_price, 2),
        max_gain: round_dp((max_price - entry_price) / entry_price * 100.0, 2),
        max_drawdown: round_dp((min_price - entry_price) / entry_price * 100.0, 2),
        hit_tp1,
        hit_tp2,
        hit_sl,
    }
}

// ─── Signals ────────────────────────────────────────────────────────

/// One retained historical score with its forward outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSignal {
    pub symbol: String,
    pub date: NaiveDate,
    pub entry_price: f64,
    pub conviction: u8,
    pub heat: Heat,
    pub tas: String,
    pub trend: TrendState,
    pub pillars: PillarScores,
    pub stop: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub rr: f64,
    #[serde(flatten)]
    pub result: OutcomeCheck,
}

impl BacktestSignal {
    /// Leading digit of `"k/4"`.
    pub fn tas_count(&self) -> u8 {
        swinglab_core::domain::parse_tas(&self.tas).unwrap_or(0)
    }
}

/// Replay one symbol's history. `market` supplies the point-in-time regime.
pub fn replay_symbol(
    symbol: &str,
    daily: &[Bar],
    market: &MarketSeries,
    scoring: &ScoringConfig,
    cfg: &BacktestConfig,
) -> Result<Vec<BacktestSignal>, SymbolError> {
    let n = daily.len();
    if n < cfg.min_bars.max(MIN_BARS) {
        return Err(SymbolError::new(
            symbol,
            format!("insufficient data ({n} bars)"),
        ));
    }
    let start = MIN_BARS.max(n.saturating_sub(cfg.lookback + cfg.forward));
    let end = n.saturating_sub(cfg.forward);
    let stride = cfg.stride.max(1);

    let mut signals = Vec::new();
    for index in (start..end).step_by(stride) {
        let snap = match extract(&FeatureInput::at(symbol, daily, index)) {
            Ok(snap) => snap,
            Err(e) => {
                tracing::debug!(symbol, index, error = %e, "replay step skipped");
                continue;
            }
        };
        let regime = regime::classify_at(&market.vol, &market.benchmark, snap.as_of);
        let scored = score(&snap, &regime, scoring);
        if scored.hard_fail || scored.conviction < cfg.min_conviction {
            continue;
        }

        let lv = snap.levels;
        let result = check_outcome(
            daily,
            index,
            Brackets {
                stop: lv.stop,
                tp1: lv.tp1,
                tp2: lv.tp2,
            },
            cfg.forward,
            cfg.same_bar,
        );
        signals.push(BacktestSignal {
            symbol: symbol.to_string(),
            date: snap.as_of,
            entry_price: round_dp(snap.last_price, 2),
            conviction: scored.conviction,
            heat: scored.heat,
            tas: snap.tas.clone(),
            trend: scored.trend,
            pillars: scored.pillars,
            stop: lv.stop,
            tp1: lv.tp1,
            tp2: lv.tp2,
            rr: lv.rr,
            result,
        });
    }
    Ok(signals)
}

// ─── Aggregation ────────────────────────────────────────────────────

/// Fixed conviction brackets, highest first: (label, min, max) inclusive.
pub const BRACKETS: [(&str, u8, u8); 6] = [
    ("85-100%", 85, 100),
    ("75-84%", 75, 84),
    ("65-74%", 65, 74),
    ("60-64%", 60, 64),
    ("50-59%", 50, 59),
    ("40-49%", 40, 49),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketStats {
    pub label: String,
    pub min: u8,
    pub max: u8,
    pub count: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub tp1_rate: f64,
    pub tp2_rate: f64,
    pub avg_pnl: f64,
    pub avg_days: f64,
    pub avg_drawdown: f64,
}

impl BracketStats {
    pub fn midpoint(&self) -> f64 {
        (self.min as f64 + self.max as f64) / 2.0
    }
}

pub fn bracket_stats(signals: &[BacktestSignal]) -> Vec<BracketStats> {
    BRACKETS
        .iter()
        .map(|&(label, min, max)| {
            let members: Vec<&BacktestSignal> = signals
                .iter()
                .filter(|s| (min..=max).contains(&s.conviction))
                .collect();
            let count = members.len();
            let wins = members.iter().filter(|s| s.result.win).count();
            let avg = |f: fn(&BacktestSignal) -> f64, dp: i32| {
                let values: Vec<f64> = members.iter().map(|s| f(*s)).collect();
                mean(&values).map_or(0.0, |m| round_dp(m, dp))
            };
            BracketStats {
                label: label.to_string(),
                min,
                max,
                count,
                wins,
                win_rate: round_dp(pct(wins, count), 1),
                tp1_rate: round_dp(pct(members.iter().filter(|s| s.result.hit_tp1).count(), count), 1),
                tp2_rate: round_dp(pct(members.iter().filter(|s| s.result.hit_tp2).count(), count), 1),
                avg_pnl: avg(|s| s.result.pnl_pct, 2),
                avg_days: avg(|s| s.result.exit_day as f64, 1),
                avg_drawdown: avg(|s| s.result.max_drawdown, 2),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "CALIBRATED")]
    Calibrated,
    #[serde(rename = "OVER-CONFIDENT")]
    OverConfident,
    #[serde(rename = "UNDER-RATED")]
    UnderRated,
}

impl Verdict {
    pub fn from_gap(gap: f64, tolerance: f64) -> Self {
        if gap.abs() < tolerance {
            Verdict::Calibrated
        } else if gap < 0.0 {
            Verdict::OverConfident
        } else {
            Verdict::UnderRated
        }
    }
}

/// Stated conviction (bracket midpoint) against realised TP1 rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyGap {
    pub bracket: String,
    pub expected: f64,
    pub actual_tp1_rate: f64,
    pub gap: f64,
    pub verdict: Verdict,
}

pub fn accuracy_gaps(brackets: &[BracketStats], tolerance: f64) -> Vec<AccuracyGap> {
    brackets
        .iter()
        .filter(|b| b.count > 0)
        .map(|b| {
            let expected = b.midpoint();
            let gap = round_dp(b.tp1_rate - expected, 1);
            AccuracyGap {
                bracket: b.label.clone(),
                expected,
                actual_tp1_rate: b.tp1_rate,
                gap,
                verdict: Verdict::from_gap(gap, tolerance),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRef {
    pub symbol: String,
    pub date: NaiveDate,
    pub pnl: f64,
}

impl From<&BacktestSignal> for TradeRef {
    fn from(s: &BacktestSignal) -> Self {
        Self {
            symbol: s.symbol.clone(),
            date: s.date,
            pnl: s.result.pnl_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_signals: usize,
    pub total_wins: usize,
    pub overall_win_rate: f64,
    pub overall_tp1_rate: f64,
    pub avg_pnl: f64,
    pub best_trade: Option<TradeRef>,
    pub worst_trade: Option<TradeRef>,
    pub symbols_tested: Vec<String>,
    pub signals_per_symbol: BTreeMap<String, usize>,
    pub lookback: usize,
    pub forward: usize,
    pub stride: usize,
    pub config_fingerprint: String,
}

/// Summary figures; only sums and extremes, so input order does not matter
/// except for exact pnl ties on best/worst, which resolve by (symbol, date).
pub fn summarize(
    signals: &[BacktestSignal],
    symbols: &[String],
    cfg: &BacktestConfig,
    fingerprint: String,
) -> BacktestSummary {
    let total = signals.len();
    let wins = signals.iter().filter(|s| s.result.win).count();
    let pnls: Vec<f64> = signals.iter().map(|s| s.result.pnl_pct).collect();
    let key = |s: &&BacktestSignal| (s.symbol.clone(), s.date);
    let best = signals.iter().max_by(|a, b| {
        a.result
            .pnl_pct
            .total_cmp(&b.result.pnl_pct)
            .then_with(|| key(b).cmp(&key(a)))
    });
    let worst = signals.iter().min_by(|a, b| {
        a.result
            .pnl_pct
            .total_cmp(&b.result.pnl_pct)
            .then_with(|| key(a).cmp(&key(b)))
    });

    let mut per_symbol = BTreeMap::new();
    for s in signals {
        *per_symbol.entry(s.symbol.clone()).or_insert(0) += 1;
    }

    BacktestSummary {
        total_signals: total,
        total_wins: wins,
        overall_win_rate: round_dp(pct(wins, total), 1),
        overall_tp1_rate: round_dp(pct(signals.iter().filter(|s| s.result.hit_tp1).count(), total), 1),
        avg_pnl: mean(&pnls).map_or(0.0, |m| round_dp(m, 2)),
        best_trade: best.map(TradeRef::from),
        worst_trade: worst.map(TradeRef::from),
        symbols_tested: symbols.to_vec(),
        signals_per_symbol: per_symbol,
        lookback: cfg.lookback,
        forward: cfg.forward,
        stride: cfg.stride,
        config_fingerprint: fingerprint,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub generated_at: DateTime<Utc>,
    pub summary: BacktestSummary,
    pub brackets: Vec<BracketStats>,
    pub accuracy_gap: Vec<AccuracyGap>,
    pub signals: Vec<BacktestSignal>,
    pub errors: Vec<SymbolError>,
}

impl BacktestReport {
    pub fn from_signals(
        mut signals: Vec<BacktestSignal>,
        errors: Vec<SymbolError>,
        symbols: &[String],
        config: &AppConfig,
        now: DateTime<Utc>,
    ) -> Self {
        signals.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.date.cmp(&b.date)));
        let brackets = bracket_stats(&signals);
        let accuracy_gap = accuracy_gaps(&brackets, config.backtest.gap_tolerance);
        Self {
            generated_at: now,
            summary: summarize(&signals, symbols, &config.backtest, config.fingerprint()),
            brackets,
            accuracy_gap,
            signals,
            errors,
        }
    }
}

/// Backtest every symbol in parallel and persist the full report to `sink`.
/// Per-symbol failures are collected in `errors`; only a batch with no
/// signals at all is an error.
pub fn run_backtest(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    config: &AppConfig,
    sink: &dyn BacktestStore,
    now: DateTime<Utc>,
) -> Result<BacktestReport, BacktestError> {
    if symbols.is_empty() {
        return Err(BacktestError::NoSymbols);
    }
    let cfg = &config.backtest;
    tracing::info!(
        symbols = symbols.len(),
        lookback = cfg.lookback,
        forward = cfg.forward,
        stride = cfg.stride,
        "backtest started"
    );
    let market = MarketSeries::fetch(provider, &config.data, cfg.history_days);

    let per_symbol: Vec<Result<Vec<BacktestSignal>, SymbolError>> = symbols
        .par_iter()
        .map(|sym| {
            let daily = provider
                .get_bars(sym, Resolution::Daily, cfg.history_days)
                .map_err(|e| SymbolError::new(sym.as_str(), e))?;
            let signals = replay_symbol(sym, &daily, &market, &config.scoring, cfg)?;
            tracing::info!(symbol = %sym, signals = signals.len(), "symbol replayed");
            Ok(signals)
        })
        .collect();

    let mut signals = Vec::new();
    let mut errors = Vec::new();
    for outcome in per_symbol {
        match outcome {
            Ok(mut s) => signals.append(&mut s),
            Err(e) => {
                tracing::warn!(symbol = %e.symbol, reason = %e.reason, "symbol excluded");
                errors.push(e);
            }
        }
    }
    errors.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    if signals.is_empty() {
        return Err(BacktestError::NoSignals { errors });
    }
    let report = BacktestReport::from_signals(signals, errors, symbols, config, now);
    let name = sink.save_backtest(&report)?;
    tracing::info!(
        signals = report.summary.total_signals,
        win_rate = report.summary.overall_win_rate,
        report = %name,
        "backtest finished"
    );
    Ok(report)
}
