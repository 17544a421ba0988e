//! Live quote, bar resolution and asset class.

use serde::{Deserialize, Serialize};

/// Last traded price together with the previous session close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub previous_close: f64,
}

impl Quote {
    /// Percentage move from the previous close.
    pub fn gap_pct(&self) -> f64 {
        if self.previous_close > 0.0 {
            (self.price - self.previous_close) / self.previous_close * 100.0
        } else {
            0.0
        }
    }

    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Bar period requested from a market data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Daily,
    Weekly,
    Hourly,
}

impl Resolution {
    pub fn yahoo_interval(self) -> &'static str {
        match self {
            Resolution::Daily => "1d",
            Resolution::Weekly => "1wk",
            Resolution::Hourly => "1h",
        }
    }
}

/// Instrument class. Only stocks observe exchange trading hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    #[default]
    Stock,
    Crypto,
}

impl AssetClass {
    /// Symbol to request from the provider (crypto pairs are quoted against USD).
    pub fn lookup_symbol(self, symbol: &str) -> String {
        match self {
            AssetClass::Crypto if !symbol.ends_with("-USD") => format!("{symbol}-USD"),
            _ => symbol.to_string(),
        }
    }
}
