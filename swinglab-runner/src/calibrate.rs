//! Calibrator: fits stated conviction to realised win rate from a backtest
//! and explains where the scoring over- or under-states its edge.
//!
//! The fit is refused outright when the sample is too small; a descriptive
//! error beats a confident-looking line through three points.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use swinglab_core::calibration::{CalibrationMode, CalibrationParams, CurveEntry};
use swinglab_core::data::MarketDataProvider;
use swinglab_core::domain::TrendState;
use swinglab_core::numeric::{mean, pct, round_dp};
use swinglab_core::scoring::Heat;
use swinglab_core::structure::least_squares_xy;

use crate::backtest::{run_backtest, BacktestError, BacktestReport, BacktestSignal, BacktestSummary, BracketStats};
use crate::config::AppConfig;
use crate::store::{BacktestStore, CalibrationStore, StoreError};

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("backtest failed: {0}")]
    Backtest(#[from] BacktestError),

    #[error("only {have} signals, need {need}+ for calibration")]
    TooFewSignals { have: usize, need: usize },

    #[error("only {have} brackets with enough samples, need {need}")]
    TooFewBrackets { have: usize, need: usize },

    #[error("bracket midpoints are degenerate, no line can be fitted")]
    DegenerateFit,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibratorConfig {
    pub min_signals: usize,
    /// Samples a bracket needs to contribute a fit point.
    pub min_bracket_count: usize,
    pub min_brackets: usize,
    /// Win rate the threshold search aims for.
    pub target_win_rate: f64,
    /// Signals required above a cutoff before its win rate counts.
    pub threshold_min_sample: usize,
    /// Mode saved as active after a successful fit.
    pub mode: CalibrationMode,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            min_signals: 20,
            min_bracket_count: 3,
            min_brackets: 2,
            target_win_rate: 80.0,
            threshold_min_sample: 5,
            mode: CalibrationMode::Linear,
        }
    }
}

const PILLAR_NAMES: [&str; 5] = ["trend", "structure", "flow", "risk", "catalyst"];

/// Take-profit distances (% from entry) tested against realised max gain.
pub const TP_LEVELS: [f64; 10] = [0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 7.0, 10.0];

// ─── Fit ────────────────────────────────────────────────────────────

fn usable<'a>(brackets: &'a [BracketStats], cfg: &CalibratorConfig) -> Vec<&'a BracketStats> {
    brackets
        .iter()
        .filter(|b| b.count >= cfg.min_bracket_count)
        .collect()
}

/// Least squares of bracket win rate on bracket midpoint.
/// Returns (scale, offset) rounded to 4 and 2 places.
pub fn fit_linear(brackets: &[BracketStats], cfg: &CalibratorConfig) -> Result<(f64, f64), CalibrationError> {
    let points: Vec<(f64, f64)> = usable(brackets, cfg)
        .iter()
        .map(|b| (b.midpoint(), b.win_rate))
        .collect();
    if points.len() < cfg.min_brackets {
        return Err(CalibrationError::TooFewBrackets {
            have: points.len(),
            need: cfg.min_brackets,
        });
    }
    let (slope, intercept) = least_squares_xy(&points).ok_or(CalibrationError::DegenerateFit)?;
    Ok((round_dp(slope, 4), round_dp(intercept, 2)))
}

/// One entry per usable bracket, mapping to its realised win rate.
pub fn curve_mapping(brackets: &[BracketStats], cfg: &CalibratorConfig) -> Vec<CurveEntry> {
    usable(brackets, cfg)
        .into_iter()
        .map(|b| CurveEntry {
            raw_min: b.min,
            raw_max: b.max,
            raw_mid: b.midpoint(),
            calibrated: b.win_rate.round(),
            tp1_rate: b.tp1_rate,
            win_rate: b.win_rate,
            count: b.count,
        })
        .collect()
}

// ─── Take-profit distance ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TpLevel {
    pub tp_pct: f64,
    pub hits: usize,
    pub hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpAnalysis {
    pub levels: Vec<TpLevel>,
    /// Furthest level reached by at least 80% of signals.
    pub best_for_80: Option<TpLevel>,
    /// Furthest level reached by at least 65% of signals.
    pub best_for_65: Option<TpLevel>,
    pub total_signals: usize,
    pub positive_signals: usize,
}

/// Share of all signals whose forward max gain reached each distance.
pub fn tp_analysis(signals: &[BacktestSignal]) -> TpAnalysis {
    let gains: Vec<f64> = signals
        .iter()
        .map(|s| s.result.max_gain)
        .filter(|g| *g > 0.0)
        .collect();
    let levels: Vec<TpLevel> = TP_LEVELS
        .iter()
        .map(|&tp_pct| {
            let hits = gains.iter().filter(|g| **g >= tp_pct).count();
            TpLevel {
                tp_pct,
                hits,
                hit_rate: round_dp(pct(hits, signals.len()), 1),
            }
        })
        .collect();
    let furthest = |rate: f64| levels.iter().rev().find(|l| l.hit_rate >= rate).copied();
    TpAnalysis {
        best_for_80: furthest(80.0),
        best_for_65: furthest(65.0),
        total_signals: signals.len(),
        positive_signals: gains.len(),
        levels,
    }
}

// ─── Factor analysis ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub wins: f64,
    pub losses: f64,
    pub delta: f64,
}

impl Comparison {
    fn of(wins: f64, losses: f64, dp: i32) -> Self {
        Self {
            wins: round_dp(wins, dp),
            losses: round_dp(losses, dp),
            delta: round_dp(wins - losses, dp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarComparison {
    pub pillar: String,
    #[serde(flatten)]
    pub comparison: Comparison,
}

/// Means of winners against losers for each candidate factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorAnalysis {
    pub win_count: usize,
    pub loss_count: usize,
    pub avg_tas: Comparison,
    pub avg_rr: Comparison,
    pub avg_conviction: Comparison,
    pub bull_trend_pct: Comparison,
    pub pillars: Vec<PillarComparison>,
    /// Factors that separate winners from losers, strongest first.
    pub predictors: Vec<String>,
}

/// `None` unless there are both winners and losers.
pub fn factor_analysis(signals: &[BacktestSignal]) -> Option<FactorAnalysis> {
    let (wins, losses): (Vec<&BacktestSignal>, Vec<&BacktestSignal>) =
        signals.iter().partition(|s| s.result.win);
    if wins.is_empty() || losses.is_empty() {
        return None;
    }
    let avg = |group: &[&BacktestSignal], f: &dyn Fn(&BacktestSignal) -> f64| {
        let values: Vec<f64> = group.iter().map(|s| f(*s)).collect();
        mean(&values).unwrap_or(0.0)
    };
    let bull_share = |group: &[&BacktestSignal]| {
        pct(group.iter().filter(|s| s.trend == TrendState::Bull).count(), group.len())
    };

    let avg_tas = Comparison::of(
        avg(&wins, &|s| s.tas_count() as f64),
        avg(&losses, &|s| s.tas_count() as f64),
        2,
    );
    let avg_rr = Comparison::of(avg(&wins, &|s| s.rr), avg(&losses, &|s| s.rr), 2);
    let avg_conviction = Comparison::of(
        avg(&wins, &|s| s.conviction as f64),
        avg(&losses, &|s| s.conviction as f64),
        1,
    );
    let bull_trend_pct = Comparison::of(bull_share(&wins), bull_share(&losses), 1);

    let pillars: Vec<PillarComparison> = PILLAR_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| PillarComparison {
            pillar: name.to_string(),
            comparison: Comparison::of(
                avg(&wins, &|s| s.pillars.as_array()[i] as f64),
                avg(&losses, &|s| s.pillars.as_array()[i] as f64),
                1,
            ),
        })
        .collect();

    let mut predictors = Vec::new();
    if avg_tas.delta > 0.3 {
        predictors.push(format!(
            "TAS (wins avg {:.1} vs losses {:.1})",
            avg_tas.wins, avg_tas.losses
        ));
    }
    if avg_rr.delta > 0.3 {
        predictors.push(format!(
            "R:R (wins avg {:.1} vs losses {:.1})",
            avg_rr.wins, avg_rr.losses
        ));
    }
    if bull_trend_pct.delta > 10.0 {
        predictors.push(format!(
            "BULL trend (wins {:.0}% vs losses {:.0}%)",
            bull_trend_pct.wins, bull_trend_pct.losses
        ));
    }
    let mut strong_pillars: Vec<&PillarComparison> =
        pillars.iter().filter(|p| p.comparison.delta > 5.0).collect();
    strong_pillars.sort_by(|a, b| b.comparison.delta.total_cmp(&a.comparison.delta));
    for p in strong_pillars {
        predictors.push(format!(
            "{} pillar (wins avg {:.0} vs losses {:.0})",
            p.pillar, p.comparison.wins, p.comparison.losses
        ));
    }

    Some(FactorAnalysis {
        win_count: wins.len(),
        loss_count: losses.len(),
        avg_tas,
        avg_rr,
        avg_conviction,
        bull_trend_pct,
        pillars,
        predictors,
    })
}

// ─── Thresholds ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupRate {
    pub count: usize,
    pub win_rate: f64,
}

impl GroupRate {
    fn of(group: &[&BacktestSignal]) -> Self {
        Self {
            count: group.len(),
            win_rate: round_dp(pct(group.iter().filter(|s| s.result.win).count(), group.len()), 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Highest cutoff whose signals reach the target win rate.
    pub min_conviction: Option<u8>,
    pub win_rate_at_cutoff: f64,
    pub tas_win_rates: BTreeMap<String, GroupRate>,
    pub rr_win_rates: BTreeMap<String, GroupRate>,
    pub suggested_filters: Vec<String>,
}

fn rr_group(rr: f64) -> &'static str {
    if rr < 2.0 {
        "under_2"
    } else if rr < 3.0 {
        "2_to_3"
    } else {
        "over_3"
    }
}

pub fn thresholds(signals: &[BacktestSignal], cfg: &CalibratorConfig) -> Thresholds {
    let mut min_conviction = None;
    let mut win_rate_at_cutoff = 0.0;
    for cutoff in (40..=95u8).rev().step_by(5) {
        let above: Vec<&BacktestSignal> = signals.iter().filter(|s| s.conviction >= cutoff).collect();
        if above.len() < cfg.threshold_min_sample {
            continue;
        }
        let rate = GroupRate::of(&above).win_rate;
        if rate >= cfg.target_win_rate {
            min_conviction = Some(cutoff);
            win_rate_at_cutoff = rate;
            break;
        }
    }

    let mut tas_win_rates = BTreeMap::new();
    for k in 0..=4u8 {
        let group: Vec<&BacktestSignal> = signals.iter().filter(|s| s.tas_count() == k).collect();
        if group.len() >= 3 {
            tas_win_rates.insert(format!("TAS_{k}"), GroupRate::of(&group));
        }
    }

    let mut rr_groups: BTreeMap<&str, Vec<&BacktestSignal>> = BTreeMap::new();
    for s in signals {
        rr_groups.entry(rr_group(s.rr)).or_default().push(s);
    }
    let rr_win_rates: BTreeMap<String, GroupRate> = rr_groups
        .into_iter()
        .map(|(k, v)| (k.to_string(), GroupRate::of(&v)))
        .collect();

    let suggested_filters = suggest_filters(&tas_win_rates, &rr_win_rates, min_conviction, cfg);
    Thresholds {
        min_conviction,
        win_rate_at_cutoff,
        tas_win_rates,
        rr_win_rates,
        suggested_filters,
    }
}

fn suggest_filters(
    tas: &BTreeMap<String, GroupRate>,
    rr: &BTreeMap<String, GroupRate>,
    cutoff: Option<u8>,
    cfg: &CalibratorConfig,
) -> Vec<String> {
    let mut filters = Vec::new();

    let best_tas = tas
        .iter()
        .filter(|(_, g)| g.count >= cfg.threshold_min_sample && g.win_rate > 0.0)
        .fold(None::<(&String, &GroupRate)>, |best, (k, g)| match best {
            Some((_, b)) if b.win_rate >= g.win_rate => best,
            _ => Some((k, g)),
        });
    if let Some((key, g)) = best_tas {
        let k = key.trim_start_matches("TAS_");
        filters.push(format!("Require TAS >= {k}/4 (win rate {}%)", g.win_rate));
    }

    let rate = |k: &str| rr.get(k).map_or(0.0, |g| g.win_rate);
    if rate("over_3") > rate("under_2") + 10.0 {
        filters.push(format!(
            "Prefer R:R >= 3:1 (win rate {}% vs {}%)",
            rate("over_3"),
            rate("under_2")
        ));
    }

    if let Some(c) = cutoff {
        filters.push(format!(
            "Only act on conviction >= {c}% (achieves ~{:.0}%+ win rate)",
            cfg.target_win_rate
        ));
    }
    filters
}

// ─── Recommendations ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Recalibrate,
    TakeProfit,
    MinConviction,
    Reweight,
    Filter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub text: String,
}

/// Ranked, most structural first.
pub fn recommendations(
    brackets: &[BracketStats],
    tp: &TpAnalysis,
    factors: Option<&FactorAnalysis>,
    thresholds: &Thresholds,
    cfg: &CalibratorConfig,
) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    let mut push = |kind, text: String| recs.push(Recommendation { kind, text });

    let over_confident = brackets
        .iter()
        .any(|b| b.count > 0 && b.tp1_rate < b.midpoint() - 15.0);
    if over_confident {
        push(
            RecommendationKind::Recalibrate,
            "SCORING IS OVER-CONFIDENT: conviction scores are higher than realised accuracy. \
             Apply the calibration curve to scale scores down."
                .to_string(),
        );
    }

    match (tp.best_for_80, tp.best_for_65) {
        (Some(level), _) => push(
            RecommendationKind::TakeProfit,
            format!(
                "FOR 80%+ TP HIT RATE: set TP1 at +{}% from entry (backtested hit rate {}%)",
                level.tp_pct, level.hit_rate
            ),
        ),
        (None, Some(level)) => push(
            RecommendationKind::TakeProfit,
            format!(
                "FOR 65%+ TP HIT RATE: set TP1 at +{}% from entry (backtested hit rate {}%)",
                level.tp_pct, level.hit_rate
            ),
        ),
        (None, None) => push(
            RecommendationKind::TakeProfit,
            "Current TP1 targets are too aggressive. Consider tighter targets.".to_string(),
        ),
    }

    match thresholds.min_conviction {
        Some(cutoff) => push(
            RecommendationKind::MinConviction,
            format!(
                "FOR {:.0}%+ ACCURACY: only trade signals with conviction >= {cutoff}% (backtested win rate {}%)",
                cfg.target_win_rate, thresholds.win_rate_at_cutoff
            ),
        ),
        None => push(
            RecommendationKind::MinConviction,
            format!(
                "No conviction level achieved {:.0}%+ accuracy. Tighten pillar scoring or require more confluence.",
                cfg.target_win_rate
            ),
        ),
    }

    if let Some(f) = factors.filter(|f| !f.predictors.is_empty()) {
        push(
            RecommendationKind::Reweight,
            format!(
                "STRONGEST PREDICTORS: {}. Consider increasing the weight of these factors.",
                f.predictors.join(", ")
            ),
        );
    }

    for filter in &thresholds.suggested_filters {
        push(RecommendationKind::Filter, format!("FILTER: {filter}"));
    }
    recs
}

// ─── Report ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRow {
    pub raw: u8,
    pub calibrated: u8,
    pub heat: Heat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub params: CalibrationParams,
    pub preview: Vec<PreviewRow>,
    pub brackets: Vec<BracketStats>,
    pub tp_analysis: TpAnalysis,
    pub factors: Option<FactorAnalysis>,
    pub thresholds: Thresholds,
    pub recommendations: Vec<Recommendation>,
    pub baseline: BacktestSummary,
}

#[derive(Serialize)]
struct Diagnostics<'a> {
    brackets: &'a [BracketStats],
    factors: Option<&'a FactorAnalysis>,
    thresholds: &'a Thresholds,
    tp_analysis: &'a TpAnalysis,
}

/// Fit calibration from a finished backtest. Pure; nothing is saved.
pub fn calibrate_from_report(
    report: &BacktestReport,
    cfg: &CalibratorConfig,
    now: DateTime<Utc>,
) -> Result<CalibrationReport, CalibrationError> {
    let signals = &report.signals;
    if signals.len() < cfg.min_signals {
        return Err(CalibrationError::TooFewSignals {
            have: signals.len(),
            need: cfg.min_signals,
        });
    }

    let (scale, offset) = fit_linear(&report.brackets, cfg)?;
    let mapping = curve_mapping(&report.brackets, cfg);
    let tp = tp_analysis(signals);
    let factors = factor_analysis(signals);
    let thresholds = thresholds(signals, cfg);
    let recommendations = recommendations(&report.brackets, &tp, factors.as_ref(), &thresholds, cfg);

    let diagnostics = serde_json::to_value(Diagnostics {
        brackets: &report.brackets,
        factors: factors.as_ref(),
        thresholds: &thresholds,
        tp_analysis: &tp,
    })
    .map_err(|e| tracing::warn!(error = %e, "calibration diagnostics not serialisable"))
    .ok();

    let params = CalibrationParams {
        mode: cfg.mode,
        scale,
        offset,
        mapping,
        calibrated_at: Some(now),
        signals_used: signals.len(),
        source_fingerprint: Some(report.summary.config_fingerprint.clone()),
        diagnostics,
    };
    let preview = params
        .preview()
        .into_iter()
        .map(|(raw, calibrated)| PreviewRow {
            raw,
            calibrated,
            heat: Heat::from_conviction(calibrated),
        })
        .collect();

    tracing::info!(
        scale,
        offset,
        signals = signals.len(),
        mode = ?params.mode,
        "calibration fitted"
    );
    Ok(CalibrationReport {
        params,
        preview,
        brackets: report.brackets.clone(),
        tp_analysis: tp,
        factors,
        thresholds,
        recommendations,
        baseline: report.summary.clone(),
    })
}

/// Backtest, fit and save the result as the active calibration. The
/// backtest report is persisted whether or not the fit succeeds.
pub fn run_calibration<S>(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    config: &AppConfig,
    store: &S,
    now: DateTime<Utc>,
) -> Result<CalibrationReport, CalibrationError>
where
    S: CalibrationStore + BacktestStore,
{
    let backtest = run_backtest(provider, symbols, config, store, now)?;
    let report = calibrate_from_report(&backtest, &config.calibration, now)?;
    store.save_params(&report.params)?;
    Ok(report)
}

/// Deactivate calibration: raw scores pass through again.
pub fn reset(store: &dyn CalibrationStore) -> Result<CalibrationParams, StoreError> {
    let params = CalibrationParams::identity();
    store.save_params(&params)?;
    tracing::info!("calibration reset");
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bracket(min: u8, max: u8, count: usize, win_rate: f64, tp1_rate: f64) -> BracketStats {
        BracketStats {
            label: format!("{min}-{max}%"),
            min,
            max,
            count,
            wins: (count as f64 * win_rate / 100.0).round() as usize,
            win_rate,
            tp1_rate,
            tp2_rate: 0.0,
            avg_pnl: 0.0,
            avg_days: 0.0,
            avg_drawdown: 0.0,
        }
    }

    #[test]
    fn linear_fit_through_two_brackets() {
        let brackets = vec![
            bracket(75, 84, 10, 69.5, 60.0),
            bracket(65, 74, 10, 59.5, 50.0),
            bracket(40, 49, 2, 10.0, 10.0),
        ];
        let (scale, offset) = fit_linear(&brackets, &CalibratorConfig::default()).unwrap();
        assert_eq!(scale, 1.0);
        assert_eq!(offset, -10.0);
    }

    #[test]
    fn one_usable_bracket_is_refused() {
        let brackets = vec![bracket(75, 84, 10, 70.0, 60.0), bracket(65, 74, 2, 50.0, 40.0)];
        assert!(matches!(
            fit_linear(&brackets, &CalibratorConfig::default()),
            Err(CalibrationError::TooFewBrackets { have: 1, need: 2 })
        ));
    }

    #[test]
    fn curve_maps_only_populated_brackets() {
        let brackets = vec![bracket(85, 100, 4, 62.4, 50.0), bracket(75, 84, 1, 90.0, 90.0)];
        let mapping = curve_mapping(&brackets, &CalibratorConfig::default());
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping[0].calibrated, 62.0);
        assert_eq!(mapping[0].raw_mid, 92.5);
    }

    #[test]
    fn over_confidence_leads_recommendations() {
        let brackets = vec![bracket(85, 100, 10, 50.0, 40.0)];
        let tp = TpAnalysis {
            levels: Vec::new(),
            best_for_80: None,
            best_for_65: None,
            total_signals: 10,
            positive_signals: 0,
        };
        let thresholds = Thresholds {
            min_conviction: None,
            win_rate_at_cutoff: 0.0,
            tas_win_rates: BTreeMap::new(),
            rr_win_rates: BTreeMap::new(),
            suggested_filters: vec!["Require TAS >= 4/4 (win rate 70%)".into()],
        };
        let recs = recommendations(&brackets, &tp, None, &thresholds, &CalibratorConfig::default());
        assert_eq!(recs[0].kind, RecommendationKind::Recalibrate);
        assert!(recs[1].text.contains("too aggressive"));
        assert!(recs[2].text.starts_with("No conviction level"));
        assert_eq!(recs.last().unwrap().kind, RecommendationKind::Filter);
    }
}
