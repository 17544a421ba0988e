//! BDD tests for the walk-forward backtester.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use swinglab_core::data::SyntheticProvider;
use swinglab_core::domain::{Bar, TrendState};
use swinglab_core::scoring::{Heat, PillarScores};
use swinglab_runner::backtest::{accuracy_gaps, bracket_stats, Brackets, OutcomeCheck};
use swinglab_runner::{
    check_outcome, run_backtest, AppConfig, BacktestError, BacktestSignal, BacktestStore,
    JsonFileStore, MemoryStore, Outcome, SameBarPolicy, Verdict,
};

fn signal(conviction: u8, hit_tp1: bool, day: i64) -> BacktestSignal {
    let pnl = if hit_tp1 { 2.5 } else { -2.0 };
    BacktestSignal {
        symbol: "TEST".into(),
        date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Duration::days(day),
        entry_price: 100.0,
        conviction,
        heat: Heat::from_conviction(conviction),
        tas: "3/4".into(),
        trend: TrendState::Bull,
        pillars: PillarScores::default(),
        stop: 98.0,
        tp1: 102.5,
        tp2: 105.0,
        rr: 1.25,
        result: OutcomeCheck {
            outcome: if hit_tp1 { Outcome::Tp1Hit } else { Outcome::SlHit },
            win: hit_tp1,
            pnl_pct: pnl,
            exit_day: 4,
            exit_price: 100.0 + pnl,
            max_gain: pnl.max(0.0),
            max_drawdown: pnl.min(0.0),
            hit_tp1,
            hit_tp2: false,
            hit_sl: !hit_tp1,
        },
    }
}

fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn bdd_scenario_bracket_within_tolerance_is_calibrated() {
    // GIVEN 20 signals scored 75-84 of which 15 touched TP1
    let signals: Vec<BacktestSignal> = (0..20).map(|i| signal(75 + (i % 10) as u8, i < 15, i)).collect();

    // WHEN brackets and accuracy gaps are computed
    let brackets = bracket_stats(&signals);
    let gaps = accuracy_gaps(&brackets, 10.0);

    // THEN the bracket shows a 75% TP1 rate against a 79.5 midpoint
    let b = brackets.iter().find(|b| b.label == "75-84%").unwrap();
    assert_eq!(b.count, 20);
    assert_eq!(b.tp1_rate, 75.0);

    // AND the -4.5 point gap is within tolerance
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].gap, -4.5);
    assert_eq!(gaps[0].verdict, Verdict::Calibrated);
}

#[test]
fn bdd_scenario_overconfident_bracket_is_flagged() {
    // GIVEN 10 signals at 90 of which 5 touched TP1
    let signals: Vec<BacktestSignal> = (0..10).map(|i| signal(90, i % 2 == 0, i)).collect();

    // WHEN gaps are computed
    let gaps = accuracy_gaps(&bracket_stats(&signals), 10.0);

    // THEN a 50% rate against a 92.5 midpoint is over-confident
    assert_eq!(gaps[0].gap, -42.5);
    assert_eq!(gaps[0].verdict, Verdict::OverConfident);
}

#[test]
fn bdd_scenario_synthetic_backtest_is_deterministic() {
    // GIVEN a seeded synthetic market and a permissive conviction floor
    let provider = SyntheticProvider::new(11, NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());
    let mut config = AppConfig::default();
    config.backtest.min_conviction = 0;
    let names = symbols(&["AAPL", "MSFT", "NVDA", "AMD", "META", "TSLA"]);
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
    let store = MemoryStore::new();

    // WHEN the same backtest runs twice
    let first = run_backtest(&provider, &names, &config, &store, now).expect("first run");
    let second = run_backtest(&provider, &names, &config, &store, now).expect("second run");

    // THEN both reports are identical
    assert_eq!(first, second);

    // AND bracket counts cover every retained signal
    let counted: usize = first.brackets.iter().map(|b| b.count).sum();
    let in_range = first.signals.iter().filter(|s| s.conviction >= 40).count();
    assert_eq!(counted, in_range);
    assert_eq!(first.summary.total_signals, first.signals.len());

    // AND TP2 always implies TP1
    for s in &first.signals {
        assert!(!s.result.hit_tp2 || s.result.hit_tp1, "{} {}", s.symbol, s.date);
        assert!(s.result.exit_day >= 1 && s.result.exit_day <= config.backtest.forward);
    }
}

#[test]
fn bdd_scenario_short_histories_yield_no_signals() {
    // GIVEN history too short for the minimum bar count
    let provider = SyntheticProvider::new(3, NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());
    let mut config = AppConfig::default();
    config.backtest.history_days = 120;
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();

    // WHEN the backtest runs
    let store = MemoryStore::new();
    let result = run_backtest(&provider, &symbols(&["AAPL", "MSFT"]), &config, &store, now);

    // THEN it fails with one error per symbol
    match result {
        Err(BacktestError::NoSignals { errors }) => {
            assert_eq!(errors.len(), 2);
            assert!(errors[0].reason.contains("insufficient data"));
        }
        other => panic!("expected NoSignals, got {other:?}"),
    }

    // AND nothing is persisted
    assert!(store.latest_backtest().unwrap().is_none());
}

#[test]
fn bdd_scenario_empty_symbol_list_is_rejected() {
    // GIVEN no symbols
    let provider = SyntheticProvider::new(3, NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());

    // WHEN the backtest runs
    let result = run_backtest(&provider, &[], &AppConfig::default(), &MemoryStore::new(), Utc::now());

    // THEN it is refused up front
    assert!(matches!(result, Err(BacktestError::NoSymbols)));
}

#[test]
fn bdd_scenario_backtest_persists_every_signal() {
    // GIVEN a seeded synthetic market and an empty store
    let provider = SyntheticProvider::new(11, NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());
    let mut config = AppConfig::default();
    config.backtest.min_conviction = 0;
    let names = symbols(&["AAPL", "MSFT", "NVDA"]);
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
    let store = MemoryStore::new();

    // WHEN the backtest runs
    let report = run_backtest(&provider, &names, &config, &store, now).expect("backtest");

    // THEN the stored report is the returned one
    let stored = store.latest_backtest().unwrap().expect("report persisted");
    assert_eq!(stored, report);

    // AND it carries every individual signal
    assert!(!stored.signals.is_empty());
    assert_eq!(stored.signals.len(), stored.summary.total_signals);
}

#[test]
fn bdd_scenario_backtest_report_lands_on_disk() {
    // GIVEN a file store in a temporary directory
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());
    let provider = SyntheticProvider::new(11, NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());
    let mut config = AppConfig::default();
    config.backtest.min_conviction = 0;
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();

    // WHEN the backtest runs
    let report = run_backtest(&provider, &symbols(&["AAPL", "MSFT"]), &config, &store, now)
        .expect("backtest");

    // THEN a timestamped report file exists
    assert!(store.backtest_path("backtest_20240701_120000.json").exists());

    // AND reading it back yields every signal
    let stored = store.latest_backtest().unwrap().expect("report on disk");
    assert_eq!(stored.signals.len(), report.signals.len());
    assert_eq!(stored.generated_at, report.generated_at);
}

// ─── Properties ─────────────────────────────────────────────────────

fn bars_from(steps: &[(f64, f64, f64)]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap();
    let mut close = 100.0;
    let mut bars = vec![Bar {
        symbol: "P".into(),
        timestamp: start,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1,
    }];
    for (i, &(drift, up, down)) in steps.iter().enumerate() {
        let open = close;
        close = (close * (1.0 + drift)).max(1.0);
        bars.push(Bar {
            symbol: "P".into(),
            timestamp: start + Duration::days(i as i64 + 1),
            open,
            high: open.max(close) * (1.0 + up),
            low: open.min(close) * (1.0 - down),
            close,
            volume: 1,
        });
    }
    bars
}

proptest! {
    #[test]
    fn tp2_implies_tp1_and_exits_stay_in_window(
        steps in prop::collection::vec((-0.04f64..0.04, 0.0f64..0.03, 0.0f64..0.03), 1..30),
        stop_pct in 0.5f64..5.0,
        tp1_pct in 0.5f64..5.0,
        tp2_extra in 0.1f64..5.0,
        forward in 1usize..20,
        target_first in any::<bool>(),
    ) {
        let bars = bars_from(&steps);
        let levels = Brackets {
            stop: 100.0 * (1.0 - stop_pct / 100.0),
            tp1: 100.0 * (1.0 + tp1_pct / 100.0),
            tp2: 100.0 * (1.0 + (tp1_pct + tp2_extra) / 100.0),
        };
        let policy = if target_first { SameBarPolicy::TargetFirst } else { SameBarPolicy::StopFirst };

        let r = check_outcome(&bars, 0, levels, forward, policy);

        prop_assert!(!r.hit_tp2 || r.hit_tp1);
        prop_assert!(!(r.hit_tp1 && r.hit_sl));
        prop_assert!(r.exit_day >= 1 && r.exit_day <= forward);
        prop_assert!(r.max_drawdown <= 0.0 && r.max_gain >= 0.0);
        prop_assert_eq!(r.win, r.hit_tp1 || r.pnl_pct > 0.0);
        if r.outcome == Outcome::SlHit {
            prop_assert!(r.pnl_pct < 0.0);
        }
    }
}
