//! Market-data provider trait and its error type.
//!
//! The core consumes market data as an opaque capability: ordered bars at a
//! resolution, and a last price with the previous close. Providers never
//! zero-fill; an empty answer is [`DataError::Empty`].

use thiserror::Error;

use crate::domain::{Bar, Quote, Resolution};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no data returned for {symbol} ({resolution:?})")]
    Empty {
        symbol: String,
        resolution: Resolution,
    },

    #[error("provider blocked (circuit breaker open)")]
    CircuitBreakerTripped,

    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed row in {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl DataError {
    /// Transient failures worth retrying on the next pass.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_)
                | DataError::RateLimited { .. }
                | DataError::CircuitBreakerTripped
        )
    }
}

/// Source of bars and quotes.
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Ordered bars covering roughly the last `window_days` calendar days.
    fn get_bars(
        &self,
        symbol: &str,
        resolution: Resolution,
        window_days: u32,
    ) -> Result<Vec<Bar>, DataError>;

    fn get_last_price(&self, symbol: &str) -> Result<Quote, DataError>;

    /// Calendar days until the next earnings report, when known.
    fn days_to_earnings(&self, _symbol: &str) -> Option<i64> {
        None
    }
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_bars(
        &self,
        symbol: &str,
        resolution: Resolution,
        window_days: u32,
    ) -> Result<Vec<Bar>, DataError> {
        (**self).get_bars(symbol, resolution, window_days)
    }

    fn get_last_price(&self, symbol: &str) -> Result<Quote, DataError> {
        (**self).get_last_price(symbol)
    }

    fn days_to_earnings(&self, symbol: &str) -> Option<i64> {
        (**self).days_to_earnings(symbol)
    }
}

/// Reject an empty series instead of passing it on.
pub fn non_empty(
    symbol: &str,
    resolution: Resolution,
    bars: Vec<Bar>,
) -> Result<Vec<Bar>, DataError> {
    if bars.is_empty() {
        Err(DataError::Empty {
            symbol: symbol.to_string(),
            resolution,
        })
    } else {
        Ok(bars)
    }
}

/// Quote derived from the last two bars of a series.
pub fn quote_from_bars(symbol: &str, bars: &[Bar]) -> Result<Quote, DataError> {
    match bars {
        [.., prev, last] => Ok(Quote {
            price: last.close,
            previous_close: prev.close,
        }),
        [only] => Ok(Quote {
            price: only.close,
            previous_close: only.close,
        }),
        [] => Err(DataError::Empty {
            symbol: symbol.to_string(),
            resolution: Resolution::Daily,
        }),
    }
}
