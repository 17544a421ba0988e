//! Batch scan: extract and score a symbol list under one regime.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use swinglab_core::calibration::CalibrationParams;
use swinglab_core::data::{DataError, MarketDataProvider};
use swinglab_core::domain::Resolution;
use swinglab_core::features::{extract, FeatureInput};
use swinglab_core::regime::Regime;
use swinglab_core::scoring::{score_outcome, ScoreResult};

use crate::config::AppConfig;
use crate::market;

/// Calendar days of hourly bars requested for the intraday timeframes.
const INTRADAY_WINDOW_DAYS: u32 = 60;

/// Number of top results that get an execution plan.
const PLANNED: usize = 3;

/// A symbol that could not be processed; reported next to the successes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolError {
    pub symbol: String,
    pub reason: String,
}

impl SymbolError {
    pub fn new(symbol: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            symbol: symbol.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub generated_at: DateTime<Utc>,
    pub regime: Regime,
    pub market_header: String,
    /// Passing results by conviction (highest first), then hard fails.
    pub results: Vec<ScoreResult>,
    pub errors: Vec<SymbolError>,
    pub calibrated: bool,
}

impl ScanResult {
    pub fn passing(&self) -> impl Iterator<Item = &ScoreResult> {
        self.results.iter().filter(|r| !r.hard_fail)
    }
}

/// Fetch, extract and score one symbol. Provider failures are errors;
/// insufficient history becomes a hard-fail result.
fn scan_symbol(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    regime: &Regime,
    config: &AppConfig,
) -> Result<ScoreResult, DataError> {
    let daily = provider.get_bars(symbol, Resolution::Daily, config.data.history_days)?;
    let hourly = match provider.get_bars(symbol, Resolution::Hourly, INTRADAY_WINDOW_DAYS) {
        Ok(bars) => Some(bars),
        Err(e) => {
            tracing::debug!(symbol, error = %e, "no intraday bars, using daily proxies");
            None
        }
    };
    let input = FeatureInput::latest(symbol, &daily)
        .with_intraday(hourly.as_deref())
        .with_earnings(provider.days_to_earnings(symbol));
    Ok(score_outcome(extract(&input), regime, &config.scoring))
}

/// Order: passing by conviction descending, then hard fails; ticker breaks ties.
fn rank(results: &mut [ScoreResult]) {
    results.sort_by(|a, b| {
        a.hard_fail
            .cmp(&b.hard_fail)
            .then(b.conviction.cmp(&a.conviction))
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
}

/// Score every symbol under the current regime.
///
/// When `calibration` is given, passing results keep `raw_conviction` and
/// carry the calibrated conviction; the order reflects calibrated values.
pub fn run_scan(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    config: &AppConfig,
    calibration: Option<&CalibrationParams>,
    now: DateTime<Utc>,
) -> ScanResult {
    let regime = market::current_regime(provider, &config.data);
    tracing::info!(
        symbols = symbols.len(),
        regime = %regime.label,
        vol = regime.vol,
        "scan started"
    );

    let outcomes: Vec<(String, Result<ScoreResult, DataError>)> = symbols
        .par_iter()
        .map(|sym| (sym.clone(), scan_symbol(provider, sym, &regime, config)))
        .collect();

    let mut results = Vec::with_capacity(outcomes.len());
    let mut errors = Vec::new();
    for (symbol, outcome) in outcomes {
        match outcome {
            Ok(mut result) => {
                if let Some(params) = calibration {
                    result.apply_calibration(params);
                }
                results.push(result);
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "symbol skipped");
                errors.push(SymbolError::new(symbol, e));
            }
        }
    }

    rank(&mut results);
    for result in results.iter_mut().filter(|r| !r.hard_fail).take(PLANNED) {
        result.plan = result.plan_text();
    }
    errors.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let passing = results.iter().filter(|r| !r.hard_fail).count();
    tracing::info!(passing, failed = results.len() - passing, errors = errors.len(), "scan finished");

    ScanResult {
        generated_at: now,
        market_header: regime.header(&config.data.benchmark, &config.data.vol_symbol),
        regime,
        results,
        errors,
        calibrated: calibration.is_some_and(CalibrationParams::is_active),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use swinglab_core::data::SyntheticProvider;

    fn provider() -> SyntheticProvider {
        SyntheticProvider::new(11, NaiveDate::from_ymd_opt(2024, 6, 28).unwrap())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 28, 20, 0, 0).unwrap()
    }

    fn symbols() -> Vec<String> {
        ["AAPL", "NVDA", "MSFT", "AMD", "META", "TSLA"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn results_are_ranked_with_fails_last() {
        let scan = run_scan(&provider(), &symbols(), &AppConfig::default(), None, now());
        assert_eq!(scan.results.len(), 6);
        assert!(scan.errors.is_empty());
        let first_fail = scan
            .results
            .iter()
            .position(|r| r.hard_fail)
            .unwrap_or(scan.results.len());
        assert!(scan.results[first_fail..].iter().all(|r| r.hard_fail));
        assert!(scan.results[..first_fail]
            .windows(2)
            .all(|w| w[0].conviction >= w[1].conviction));
    }

    #[test]
    fn only_top_three_passing_get_plans() {
        let scan = run_scan(&provider(), &symbols(), &AppConfig::default(), None, now());
        let planned = scan.results.iter().filter(|r| r.plan.is_some()).count();
        assert!(planned <= PLANNED);
        assert!(scan.results.iter().filter(|r| r.hard_fail).all(|r| r.plan.is_none()));
        assert!(scan.market_header.contains("Min R:R requirement"));
    }

    #[test]
    fn short_history_is_a_hard_fail_not_an_error() {
        let mut config = AppConfig::default();
        config.data.history_days = 60;
        let scan = run_scan(&provider(), &["AAPL".to_string()], &config, None, now());
        assert!(scan.errors.is_empty());
        assert!(scan.results[0].hard_fail);
        assert_eq!(scan.results[0].conviction, 0);
    }

    #[test]
    fn calibration_keeps_raw_and_leaves_fails_at_zero() {
        let params = CalibrationParams::linear(0.5, 10.0);
        let plain = run_scan(&provider(), &symbols(), &AppConfig::default(), None, now());
        let calibrated = run_scan(&provider(), &symbols(), &AppConfig::default(), Some(&params), now());
        assert!(calibrated.calibrated);
        for r in &calibrated.results {
            if r.hard_fail {
                assert_eq!(r.conviction, 0);
                assert_eq!(r.raw_conviction, None);
            } else {
                let raw = r.raw_conviction.unwrap();
                assert_eq!(r.conviction, params.apply(raw));
                let original = plain.results.iter().find(|p| p.ticker == r.ticker).unwrap();
                assert_eq!(original.conviction, raw);
            }
        }
    }
}
