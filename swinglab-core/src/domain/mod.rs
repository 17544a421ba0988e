//! Domain types shared by every stage of the pipeline.

pub mod bar;
pub mod quote;
pub mod trend;

pub use bar::Bar;
pub use quote::{AssetClass, Quote, Resolution};
pub use trend::{parse_tas, TimeframeBreakdown, TrendState};

/// Symbol type alias
pub type Symbol = String;
