//! BDD tests for conviction calibration.

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use swinglab_core::calibration::{CalibrationMode, CalibrationParams};
use swinglab_core::data::SyntheticProvider;
use swinglab_core::domain::TrendState;
use swinglab_core::scoring::{Heat, PillarScores};
use swinglab_runner::backtest::OutcomeCheck;
use swinglab_runner::calibrate::{reset, RecommendationKind};
use swinglab_runner::{
    calibrate_from_report, run_calibration, AppConfig, BacktestReport, BacktestSignal,
    BacktestStore, CalibrationError, CalibrationStore, CalibratorConfig, MemoryStore, Outcome,
};

fn signal(conviction: u8, win: bool, day: i64) -> BacktestSignal {
    let pnl = if win { 3.0 } else { -2.0 };
    BacktestSignal {
        symbol: format!("S{}", day % 4),
        date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Duration::days(day),
        entry_price: 50.0,
        conviction,
        heat: Heat::from_conviction(conviction),
        tas: if win { "4/4".into() } else { "2/4".into() },
        trend: TrendState::Bull,
        pillars: PillarScores {
            p1: if win { 20 } else { 10 },
            p2: 12,
            p3: 12,
            p4: 10,
            p5: 6,
        },
        stop: 49.0,
        tp1: 51.5,
        tp2: 53.0,
        rr: 1.5,
        result: OutcomeCheck {
            outcome: if win { Outcome::Tp1Hit } else { Outcome::SlHit },
            win,
            pnl_pct: pnl,
            exit_day: 5,
            exit_price: 50.0 * (1.0 + pnl / 100.0),
            max_gain: if win { 3.0 } else { 0.8 },
            max_drawdown: if win { -0.5 } else { -2.0 },
            hit_tp1: win,
            hit_tp2: false,
            hit_sl: !win,
        },
    }
}

/// Ten signals per (conviction, wins) bracket.
fn report(layout: &[(u8, usize)]) -> BacktestReport {
    let mut day = 0;
    let mut signals = Vec::new();
    for &(conviction, wins) in layout {
        for i in 0..10 {
            signals.push(signal(conviction, i < wins, day));
            day += 1;
        }
    }
    let symbols: Vec<String> = (0..4).map(|i| format!("S{i}")).collect();
    BacktestReport::from_signals(
        signals,
        Vec::new(),
        &symbols,
        &AppConfig::default(),
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap(),
    )
}

#[test]
fn bdd_scenario_fit_maps_scores_onto_realised_win_rate() {
    // GIVEN four brackets winning 60, 50, 40 and 30 percent
    let backtest = report(&[(90, 6), (80, 5), (70, 4), (55, 3)]);
    let cfg = CalibratorConfig::default();

    // WHEN calibration is fitted
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 13, 0, 0).unwrap();
    let result = calibrate_from_report(&backtest, &cfg, now).expect("fit");

    // THEN a rising line below the identity is found
    let params = &result.params;
    assert_eq!(params.mode, CalibrationMode::Linear);
    assert!(params.scale > 0.0 && params.scale < 1.0, "scale {}", params.scale);
    assert_eq!(params.signals_used, 40);
    assert_eq!(params.calibrated_at, Some(now));
    assert!(params.diagnostics.is_some());

    // AND each curve entry carries its own bracket's win rate
    let calibrated: Vec<f64> = params.mapping.iter().map(|m| m.calibrated).collect();
    assert_eq!(calibrated, vec![60.0, 50.0, 40.0, 30.0]);

    // AND the preview never decreases as raw conviction rises
    assert!(!result.preview.is_empty());
    for pair in result.preview.windows(2) {
        assert!(pair[0].calibrated <= pair[1].calibrated);
    }

    // AND over-confidence leads the recommendations
    assert_eq!(result.recommendations[0].kind, RecommendationKind::Recalibrate);
}

#[test]
fn bdd_scenario_too_few_signals_is_an_error() {
    // GIVEN a backtest with a single bracket of ten signals
    let backtest = report(&[(80, 5)]);

    // WHEN calibration is fitted
    let result = calibrate_from_report(&backtest, &CalibratorConfig::default(), Utc::now());

    // THEN it reports the shortfall
    match result {
        Err(CalibrationError::TooFewSignals { have, need }) => {
            assert_eq!(have, 10);
            assert_eq!(need, 20);
        }
        other => panic!("expected TooFewSignals, got {other:?}"),
    }
}

#[test]
fn bdd_scenario_single_bracket_cannot_be_fitted() {
    // GIVEN thirty signals all in the 75-84 bracket
    let backtest = report(&[(78, 5), (80, 6), (82, 4)]);

    // WHEN calibration is fitted
    let result = calibrate_from_report(&backtest, &CalibratorConfig::default(), Utc::now());

    // THEN fewer than two usable brackets is an error
    assert!(matches!(
        result,
        Err(CalibrationError::TooFewBrackets { have: 1, need: 2 })
    ));
}

#[test]
fn bdd_scenario_reset_restores_identity() {
    // GIVEN an active linear calibration in the store
    let store = MemoryStore::new();
    store
        .save_params(&CalibrationParams::linear(0.8, 5.0))
        .expect("save");
    assert!(store.load_params().expect("load").is_active());

    // WHEN calibration is reset
    let params = reset(&store).expect("reset");

    // THEN raw scores pass through unchanged
    assert!(!params.is_active());
    let stored = store.load_params().expect("load");
    assert_eq!(stored.apply(73), 73);
}

#[test]
fn bdd_scenario_params_saved_only_on_success() {
    // GIVEN a synthetic market and an empty store
    let provider = SyntheticProvider::new(21, NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());
    let store = MemoryStore::new();
    let mut config = AppConfig::default();
    config.backtest.min_conviction = 0;
    let symbols: Vec<String> = ["AAPL", "MSFT", "NVDA", "AMD"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    // WHEN a full calibration runs
    let result = run_calibration(&provider, &symbols, &config, &store, Utc::now());

    // THEN the store holds the fitted params, or nothing changed
    let stored = store.load_params().expect("load");
    match &result {
        Ok(report) => assert_eq!(stored, report.params),
        Err(_) => assert!(!stored.is_active()),
    }

    // AND the backtest behind the fit is persisted with every signal
    if let Ok(report) = result {
        let backtest = store.latest_backtest().unwrap().expect("backtest persisted");
        assert_eq!(backtest.summary, report.baseline);
        assert_eq!(backtest.signals.len(), report.baseline.total_signals);
    }
}
