//! Persistence: signal collections, case reports, calibration parameters and
//! full backtest reports.
//!
//! Collections are whole JSON documents with last-writer-wins semantics.
//! Callers that read-modify-write (the tracker) serialise themselves.
//!
//! Two implementations, picked at construction:
//! - [`JsonFileStore`]: pretty JSON under a root directory, atomic writes.
//! - [`MemoryStore`]: in-process, used by tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use swinglab_core::calibration::CalibrationParams;

use crate::backtest::BacktestReport;
use crate::tracker::analysis::CaseReport;
use crate::tracker::Signal;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no case report with id {0}")]
    ReportNotFound(String),
}

/// Active and closed signal collections.
pub trait SignalStore: Send + Sync {
    fn load_active(&self) -> Result<Vec<Signal>, StoreError>;
    fn save_active(&self, signals: &[Signal]) -> Result<(), StoreError>;
    fn load_closed(&self) -> Result<Vec<Signal>, StoreError>;
    fn save_closed(&self, signals: &[Signal]) -> Result<(), StoreError>;
    /// Drop every signal and case report.
    fn clear_all(&self) -> Result<(), StoreError>;
}

/// Case reports written when a signal closes.
pub trait ReportSink: Send + Sync {
    /// Returns the name the report was stored under.
    fn save_report(&self, report: &CaseReport) -> Result<String, StoreError>;
    fn load_report(&self, signal_id: &str) -> Result<CaseReport, StoreError>;
    fn load_all_reports(&self) -> Result<Vec<CaseReport>, StoreError>;
}

/// Full backtest reports, every individual signal included.
pub trait BacktestStore: Send + Sync {
    /// Returns the name the report was stored under.
    fn save_backtest(&self, report: &BacktestReport) -> Result<String, StoreError>;
    /// Most recent report by generation time, if any.
    fn latest_backtest(&self) -> Result<Option<BacktestReport>, StoreError>;
}

/// The single active calibration.
pub trait CalibrationStore: Send + Sync {
    /// Identity parameters when nothing has been saved.
    fn load_params(&self) -> Result<CalibrationParams, StoreError>;
    fn save_params(&self, params: &CalibrationParams) -> Result<(), StoreError>;
}

pub fn report_name(report: &CaseReport) -> String {
    format!(
        "{}_{}_{}.json",
        report.identity.ticker, report.identity.id, report.identity.status
    )
}

pub fn backtest_name(at: DateTime<Utc>) -> String {
    format!("backtest_{}.json", at.format("%Y%m%d_%H%M%S"))
}

// ─── JSON files ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn active_path(&self) -> PathBuf {
        self.root.join("signals").join("active.json")
    }

    fn closed_path(&self) -> PathBuf {
        self.root.join("signals").join("closed.json")
    }

    fn reports_dir(&self) -> PathBuf {
        self.root.join("signals").join("reports")
    }

    fn params_path(&self) -> PathBuf {
        self.root.join("calibration").join("params.json")
    }

    fn backtests_dir(&self) -> PathBuf {
        self.root.join("backtests")
    }

    pub fn backtest_path(&self, name: &str) -> PathBuf {
        self.backtests_dir().join(name)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// `None` when the file does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path)(e)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Write to a sibling temp file, then rename over the target.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err(&tmp))?;
    std::fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(dir)(e)),
    };
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(io_err(dir))?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    Ok(files)
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path)(e)),
    }
}

impl SignalStore for JsonFileStore {
    fn load_active(&self) -> Result<Vec<Signal>, StoreError> {
        Ok(read_json(&self.active_path())?.unwrap_or_default())
    }

    fn save_active(&self, signals: &[Signal]) -> Result<(), StoreError> {
        write_json(&self.active_path(), signals)
    }

    fn load_closed(&self) -> Result<Vec<Signal>, StoreError> {
        Ok(read_json(&self.closed_path())?.unwrap_or_default())
    }

    fn save_closed(&self, signals: &[Signal]) -> Result<(), StoreError> {
        write_json(&self.closed_path(), signals)
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        remove_if_present(&self.active_path())?;
        remove_if_present(&self.closed_path())?;
        for path in json_files(&self.reports_dir())? {
            remove_if_present(&path)?;
        }
        tracing::info!(root = %self.root.display(), "signal store cleared");
        Ok(())
    }
}

impl ReportSink for JsonFileStore {
    fn save_report(&self, report: &CaseReport) -> Result<String, StoreError> {
        let name = report_name(report);
        write_json(&self.reports_dir().join(&name), report)?;
        Ok(name)
    }

    fn load_report(&self, signal_id: &str) -> Result<CaseReport, StoreError> {
        let needle = format!("_{signal_id}_");
        for path in json_files(&self.reports_dir())? {
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(&needle));
            if matches {
                if let Some(report) = read_json(&path)? {
                    return Ok(report);
                }
            }
        }
        Err(StoreError::ReportNotFound(signal_id.to_string()))
    }

    fn load_all_reports(&self) -> Result<Vec<CaseReport>, StoreError> {
        let mut reports: Vec<CaseReport> = Vec::new();
        for path in json_files(&self.reports_dir())? {
            if let Some(report) = read_json(&path)? {
                reports.push(report);
            }
        }
        reports.sort_by(|a, b| b.exit.closed_at.cmp(&a.exit.closed_at));
        Ok(reports)
    }
}

impl BacktestStore for JsonFileStore {
    fn save_backtest(&self, report: &BacktestReport) -> Result<String, StoreError> {
        let name = backtest_name(report.generated_at);
        write_json(&self.backtest_path(&name), report)?;
        Ok(name)
    }

    fn latest_backtest(&self) -> Result<Option<BacktestReport>, StoreError> {
        let mut names = json_files(&self.backtests_dir())?;
        names.sort();
        match names.pop() {
            Some(path) => read_json(&path),
            None => Ok(None),
        }
    }
}

impl CalibrationStore for JsonFileStore {
    fn load_params(&self) -> Result<CalibrationParams, StoreError> {
        Ok(read_json(&self.params_path())?.unwrap_or_default())
    }

    fn save_params(&self, params: &CalibrationParams) -> Result<(), StoreError> {
        write_json(&self.params_path(), params)
    }
}

// ─── In memory ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryState {
    active: Vec<Signal>,
    closed: Vec<Signal>,
    reports: BTreeMap<String, CaseReport>,
    backtests: BTreeMap<String, BacktestReport>,
    params: Option<CalibrationParams>,
}

/// Store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalStore for MemoryStore {
    fn load_active(&self) -> Result<Vec<Signal>, StoreError> {
        Ok(self.state.lock().active.clone())
    }

    fn save_active(&self, signals: &[Signal]) -> Result<(), StoreError> {
        self.state.lock().active = signals.to_vec();
        Ok(())
    }

    fn load_closed(&self) -> Result<Vec<Signal>, StoreError> {
        Ok(self.state.lock().closed.clone())
    }

    fn save_closed(&self, signals: &[Signal]) -> Result<(), StoreError> {
        self.state.lock().closed = signals.to_vec();
        Ok(())
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.active.clear();
        state.closed.clear();
        state.reports.clear();
        Ok(())
    }
}

impl ReportSink for MemoryStore {
    fn save_report(&self, report: &CaseReport) -> Result<String, StoreError> {
        let name = report_name(report);
        self.state.lock().reports.insert(name.clone(), report.clone());
        Ok(name)
    }

    fn load_report(&self, signal_id: &str) -> Result<CaseReport, StoreError> {
        self.state
            .lock()
            .reports
            .values()
            .find(|r| r.identity.id == signal_id)
            .cloned()
            .ok_or_else(|| StoreError::ReportNotFound(signal_id.to_string()))
    }

    fn load_all_reports(&self) -> Result<Vec<CaseReport>, StoreError> {
        let mut reports: Vec<CaseReport> = self.state.lock().reports.values().cloned().collect();
        reports.sort_by(|a, b| b.exit.closed_at.cmp(&a.exit.closed_at));
        Ok(reports)
    }
}

impl BacktestStore for MemoryStore {
    fn save_backtest(&self, report: &BacktestReport) -> Result<String, StoreError> {
        let name = backtest_name(report.generated_at);
        self.state.lock().backtests.insert(name.clone(), report.clone());
        Ok(name)
    }

    fn latest_backtest(&self) -> Result<Option<BacktestReport>, StoreError> {
        Ok(self.state.lock().backtests.values().next_back().cloned())
    }
}

impl CalibrationStore for MemoryStore {
    fn load_params(&self) -> Result<CalibrationParams, StoreError> {
        Ok(self.state.lock().params.clone().unwrap_or_default())
    }

    fn save_params(&self, params: &CalibrationParams) -> Result<(), StoreError> {
        self.state.lock().params = Some(params.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use swinglab_core::calibration::CalibrationMode;

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load_active().unwrap().is_empty());
        assert!(store.load_closed().unwrap().is_empty());
        assert!(store.load_all_reports().unwrap().is_empty());
        assert_eq!(store.load_params().unwrap().mode, CalibrationMode::None);
        assert!(store.latest_backtest().unwrap().is_none());
    }

    #[test]
    fn params_persist_and_leave_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .save_params(&CalibrationParams::linear(0.8, 5.0))
            .unwrap();
        let loaded = store.load_params().unwrap();
        assert_eq!(loaded.mode, CalibrationMode::Linear);
        assert_eq!(loaded.scale, 0.8);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("calibration"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_document_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("signals")).unwrap();
        std::fs::write(dir.path().join("signals/active.json"), "{not json").unwrap();
        assert!(matches!(store.load_active(), Err(StoreError::Json { .. })));
    }

    #[test]
    fn backtest_names_sort_by_time() {
        let a = backtest_name(Utc.with_ymd_and_hms(2024, 6, 28, 9, 5, 0).unwrap());
        let b = backtest_name(Utc.with_ymd_and_hms(2024, 6, 28, 17, 0, 0).unwrap());
        assert_eq!(a, "backtest_20240628_090500.json");
        assert!(a < b);
    }

    #[test]
    fn memory_params_default_to_identity() {
        let store = MemoryStore::new();
        assert!(!store.load_params().unwrap().is_active());
        store.save_params(&CalibrationParams::linear(1.1, -3.0)).unwrap();
        assert!(store.load_params().unwrap().is_active());
    }
}
