//! Market data: provider trait plus Yahoo, CSV and synthetic implementations.

pub mod circuit_breaker;
pub mod csv_file;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use csv_file::CsvProvider;
pub use provider::{non_empty, quote_from_bars, DataError, MarketDataProvider};
pub use synthetic::SyntheticProvider;
pub use yahoo::YahooProvider;
