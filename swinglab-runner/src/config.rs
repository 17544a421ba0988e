//! Application configuration loaded from TOML.
//!
//! Every section is `#[serde(default)]`, so a missing file, a missing section
//! or a missing key all fall back to the defaults below.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use swinglab_core::data::{
    CircuitBreaker, CsvProvider, DataError, MarketDataProvider, SyntheticProvider, YahooProvider,
};
use swinglab_core::fingerprint::short_fingerprint;
use swinglab_core::scoring::ScoringConfig;

use crate::backtest::BacktestConfig;
use crate::calibrate::CalibratorConfig;
use crate::tracker::TrackerConfig;
use crate::watchlists::{self, Watchlist};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown watchlist '{0}'")]
    UnknownWatchlist(String),

    #[error("csv provider needs [data].csv_dir")]
    MissingCsvDir,

    #[error("pillar weights sum to {0}, expected 1.0")]
    BadWeights(f64),

    #[error("market data provider: {0}")]
    Provider(#[from] DataError),
}

/// Where bars and quotes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Csv,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub provider: ProviderKind,
    pub csv_dir: Option<PathBuf>,
    /// Calendar days of daily history requested per symbol.
    pub history_days: u32,
    pub vol_symbol: String,
    pub benchmark: String,
    pub synthetic_seed: u64,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Yahoo,
            csv_dir: None,
            history_days: 730,
            vol_symbol: "^VIX".to_string(),
            benchmark: "SPY".to_string(),
            synthetic_seed: 42,
        }
    }
}

impl DataSettings {
    /// Build the configured provider. `anchor` is the last session date of
    /// synthetic data.
    pub fn build_provider(
        &self,
        anchor: NaiveDate,
    ) -> Result<Arc<dyn MarketDataProvider>, ConfigError> {
        Ok(match self.provider {
            ProviderKind::Yahoo => {
                let breaker = Arc::new(CircuitBreaker::for_quotes());
                Arc::new(YahooProvider::new(breaker)?)
            }
            ProviderKind::Csv => {
                let dir = self.csv_dir.clone().ok_or(ConfigError::MissingCsvDir)?;
                Arc::new(CsvProvider::new(dir))
            }
            ProviderKind::Synthetic => Arc::new(SyntheticProvider::new(self.synthetic_seed, anchor)),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Root of the JSON store. `None` means the platform data directory.
    pub data_dir: Option<PathBuf>,
}

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataSettings,
    pub scoring: ScoringConfig,
    pub backtest: BacktestConfig,
    pub calibration: CalibratorConfig,
    pub tracker: TrackerConfig,
    pub store: StoreSettings,
    /// User watchlists, merged over the built-ins.
    pub watchlists: BTreeMap<String, Watchlist>,
}

impl AppConfig {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let total = self.scoring.weights.total();
        if (total - 1.0).abs() > 1e-6 {
            return Err(ConfigError::BadWeights(total));
        }
        Ok(())
    }

    /// Built-in watchlists with user entries layered on top.
    pub fn all_watchlists(&self) -> BTreeMap<String, Watchlist> {
        let mut lists = watchlists::builtin();
        lists.extend(self.watchlists.clone());
        lists
    }

    pub fn watchlist(&self, name: &str) -> Result<Watchlist, ConfigError> {
        self.all_watchlists()
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownWatchlist(name.to_string()))
    }

    /// Explicit symbols win; otherwise the named (or default) watchlist.
    pub fn resolve_symbols(
        &self,
        symbols: &[String],
        watchlist: Option<&str>,
    ) -> Result<Vec<String>, ConfigError> {
        if !symbols.is_empty() {
            return Ok(symbols.iter().map(|s| s.to_uppercase()).collect());
        }
        let name = watchlist.unwrap_or(watchlists::DEFAULT_WATCHLIST);
        Ok(self.watchlist(name)?.tickers)
    }

    /// Fingerprint of the parameters that shape backtest and calibration output.
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Shape<'a> {
            scoring: &'a ScoringConfig,
            backtest: &'a BacktestConfig,
            calibration: &'a CalibratorConfig,
            vol_symbol: &'a str,
            benchmark: &'a str,
        }
        short_fingerprint(&Shape {
            scoring: &self.scoring,
            backtest: &self.backtest,
            calibration: &self.calibration,
            vol_symbol: &self.data.vol_symbol,
            benchmark: &self.data.benchmark,
        })
        .unwrap_or_default()
    }
}
