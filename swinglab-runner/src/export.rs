//! CSV and JSON export of signals and reports for external analysis tools.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::backtest::BacktestSignal;
use crate::tracker::Signal;

/// Pretty JSON of any report.
pub fn export_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize report to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per closed signal.
///
/// Columns: id, ticker, kind, status, entry_time, entry_price, conviction,
/// regime, stop, tp1, tp3, close_time, close_price, pnl_pct, mae_pct,
/// mfe_pct, days_held, tp1_hit, tp2_hit, tp3_hit, slippage_pct, reason
pub fn export_signals_csv(signals: &[Signal]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "id",
        "ticker",
        "kind",
        "status",
        "entry_time",
        "entry_price",
        "conviction",
        "regime",
        "stop",
        "tp1",
        "tp3",
        "close_time",
        "close_price",
        "pnl_pct",
        "mae_pct",
        "mfe_pct",
        "days_held",
        "tp1_hit",
        "tp2_hit",
        "tp3_hit",
        "slippage_pct",
        "reason",
    ])?;

    for s in signals {
        let close = s.close.as_ref();
        wtr.write_record([
            s.id.clone(),
            s.ticker.clone(),
            format!("{:?}", s.kind).to_lowercase(),
            s.status.to_string(),
            s.entry.time.to_rfc3339(),
            format!("{:.4}", s.entry.price),
            s.entry.conviction.to_string(),
            s.entry_regime().to_string(),
            format!("{:.4}", s.targets.stop),
            format!("{:.4}", s.targets.tp1),
            format!("{:.4}", s.targets.tp3),
            close.map(|c| c.closed_at.to_rfc3339()).unwrap_or_default(),
            close.map(|c| format!("{:.4}", c.price)).unwrap_or_default(),
            format!("{:.2}", s.pnl_pct),
            format!("{:.2}", s.mae_pct),
            format!("{:.2}", s.mfe_pct),
            s.days_held.to_string(),
            s.hits.tp1().to_string(),
            s.hits.tp2().to_string(),
            s.hits.tp3().to_string(),
            format!("{:.2}", close.map_or(0.0, |c| c.snapshot.slippage_pct)),
            close.map(|c| c.reason.clone()).unwrap_or_default(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per backtest signal, in report order.
pub fn export_backtest_csv(signals: &[BacktestSignal]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "date",
        "entry_price",
        "conviction",
        "tas",
        "trend",
        "stop",
        "tp1",
        "tp2",
        "rr",
        "outcome",
        "win",
        "pnl_pct",
        "exit_day",
        "max_gain",
        "max_drawdown",
    ])?;
    for s in signals {
        let r = &s.result;
        wtr.write_record([
            s.symbol.clone(),
            s.date.to_string(),
            format!("{:.2}", s.entry_price),
            s.conviction.to_string(),
            s.tas.clone(),
            s.trend.to_string(),
            format!("{:.4}", s.stop),
            format!("{:.4}", s.tp1),
            format!("{:.4}", s.tp2),
            format!("{:.2}", s.rr),
            serde_json::to_value(r.outcome)?
                .as_str()
                .unwrap_or_default()
                .to_string(),
            r.win.to_string(),
            format!("{:.2}", r.pnl_pct),
            r.exit_day.to_string(),
            format!("{:.2}", r.max_gain),
            format!("{:.2}", r.max_drawdown),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write an export, creating parent directories.
pub fn write_export(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{Outcome, OutcomeCheck};
    use chrono::NaiveDate;
    use swinglab_core::domain::TrendState;
    use swinglab_core::scoring::{Heat, PillarScores};

    fn bt_signal(outcome: Outcome, pnl: f64) -> BacktestSignal {
        BacktestSignal {
            symbol: "AAPL".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            entry_price: 180.0,
            conviction: 72,
            heat: Heat::Hot,
            tas: "3/4".into(),
            trend: TrendState::Bull,
            pillars: PillarScores::default(),
            stop: 175.0,
            tp1: 185.0,
            tp2: 190.0,
            rr: 1.0,
            result: OutcomeCheck {
                outcome,
                win: pnl > 0.0,
                pnl_pct: pnl,
                exit_day: 3,
                exit_price: 180.0 * (1.0 + pnl / 100.0),
                max_gain: pnl.max(0.0),
                max_drawdown: pnl.min(0.0),
                hit_tp1: outcome == Outcome::Tp1Hit,
                hit_tp2: false,
                hit_sl: outcome == Outcome::SlHit,
            },
        }
    }

    #[test]
    fn backtest_csv_has_header_and_rows() {
        let csv = export_backtest_csv(&[
            bt_signal(Outcome::Tp1Hit, 2.78),
            bt_signal(Outcome::SlHit, -2.78),
        ])
        .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("symbol,date,entry_price"));
        assert!(lines[1].contains("TP1_HIT"));
        assert!(lines[2].contains("SL_HIT"));
        assert!(lines[2].contains("-2.78"));
    }

    #[test]
    fn empty_signal_list_is_header_only() {
        let csv = export_signals_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("id,ticker,kind,status"));
    }

    #[test]
    fn write_export_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        write_export(&path, "a,b\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a,b\n");
    }
}
