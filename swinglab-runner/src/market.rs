//! Market-wide context: the current regime and the frozen snapshot of it
//! attached to signals at entry and at close.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use swinglab_core::data::MarketDataProvider;
use swinglab_core::domain::{Bar, Resolution};
use swinglab_core::regime::{self, Regime, RegimeLabel};

use crate::config::DataSettings;

/// Calendar days of volatility-proxy and benchmark history for a live regime.
const LIVE_WINDOW_DAYS: u32 = 10;

/// Volatility-proxy and benchmark series fetched for a batch.
#[derive(Debug, Clone, Default)]
pub struct MarketSeries {
    pub vol: Vec<Bar>,
    pub benchmark: Vec<Bar>,
}

impl MarketSeries {
    /// Fetch both series. A failed fetch leaves that series empty, which the
    /// classifier turns into its fallback.
    pub fn fetch(provider: &dyn MarketDataProvider, data: &DataSettings, window_days: u32) -> Self {
        let get = |symbol: &str| {
            provider
                .get_bars(symbol, Resolution::Daily, window_days)
                .unwrap_or_else(|e| {
                    tracing::warn!(symbol, error = %e, "market series unavailable");
                    Vec::new()
                })
        };
        Self {
            vol: get(&data.vol_symbol),
            benchmark: get(&data.benchmark),
        }
    }

    pub fn regime(&self) -> Regime {
        regime::classify(&self.vol, &self.benchmark)
    }
}

/// Regime as of now, recomputed on every call.
pub fn current_regime(provider: &dyn MarketDataProvider, data: &DataSettings) -> Regime {
    MarketSeries::fetch(provider, data, LIVE_WINDOW_DAYS).regime()
}

/// Market state frozen into a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub vol: f64,
    pub benchmark_close: Option<f64>,
    pub benchmark_change_pct: Option<f64>,
    pub regime: RegimeLabel,
    pub captured_at: DateTime<Utc>,
}

impl MarketContext {
    /// `None` when the volatility proxy could not be read, so a fallback
    /// regime is never recorded as if it had been observed.
    pub fn capture(
        provider: &dyn MarketDataProvider,
        data: &DataSettings,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let series = MarketSeries::fetch(provider, data, LIVE_WINDOW_DAYS);
        if series.vol.is_empty() {
            return None;
        }
        Some(Self::from_regime(&series.regime(), now))
    }

    pub fn from_regime(regime: &Regime, now: DateTime<Utc>) -> Self {
        Self {
            vol: (regime.vol * 10.0).round() / 10.0,
            benchmark_close: regime.benchmark_close,
            benchmark_change_pct: regime.benchmark_change_pct,
            regime: regime.label,
            captured_at: now,
        }
    }
}
