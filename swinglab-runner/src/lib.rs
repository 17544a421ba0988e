//! SwingLab Runner: the stateful half of the pipeline.
//!
//! This crate builds on `swinglab-core` to provide:
//! - Batch scans of a watchlist under the current regime
//! - Walk-forward backtests with conviction-bracket accuracy
//! - Calibration of raw conviction against realised win rate
//! - Signal lifecycle tracking with gap-aware exits and case reports
//! - JSON file and in-memory stores, CSV export
//! - TOML configuration and built-in watchlists

pub mod backtest;
pub mod calibrate;
pub mod config;
pub mod export;
pub mod market;
pub mod scan;
pub mod store;
pub mod tracker;
pub mod watchlists;

pub use backtest::{
    check_outcome, run_backtest, BacktestConfig, BacktestError, BacktestReport, BacktestSignal,
    BracketStats, Outcome, SameBarPolicy, Verdict,
};
pub use calibrate::{
    calibrate_from_report, run_calibration, CalibrationError, CalibrationReport, CalibratorConfig,
    Recommendation,
};
pub use config::{AppConfig, ConfigError, DataSettings, ProviderKind};
pub use market::MarketContext;
pub use scan::{run_scan, ScanResult, SymbolError};
pub use store::{
    BacktestStore, CalibrationStore, JsonFileStore, MemoryStore, ReportSink, SignalStore,
    StoreError,
};
pub use tracker::{
    CheckReport, Signal, SignalOverview, SignalStatus, Tracker, TrackerConfig, TrackerError,
};
pub use watchlists::Watchlist;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn reports_are_send_sync() {
        assert_send::<ScanResult>();
        assert_sync::<ScanResult>();
        assert_send::<BacktestReport>();
        assert_sync::<BacktestReport>();
        assert_send::<CalibrationReport>();
        assert_sync::<CalibrationReport>();
    }

    #[test]
    fn stores_are_send_sync() {
        assert_send::<JsonFileStore>();
        assert_sync::<JsonFileStore>();
        assert_send::<MemoryStore>();
        assert_sync::<MemoryStore>();
    }

    #[test]
    fn tracker_is_send_sync() {
        use swinglab_core::data::SyntheticProvider;
        use swinglab_core::session::FixedClock;
        assert_send::<Tracker<MemoryStore, SyntheticProvider, FixedClock>>();
        assert_sync::<Tracker<MemoryStore, SyntheticProvider, FixedClock>>();
        assert_send::<Signal>();
        assert_sync::<Signal>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<AppConfig>();
        assert_sync::<AppConfig>();
    }
}
