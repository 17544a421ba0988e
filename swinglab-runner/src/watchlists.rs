//! Preset ticker watchlists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchlist {
    pub label: String,
    pub tickers: Vec<String>,
}

impl Watchlist {
    fn new(label: &str, tickers: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Name used when no watchlist or symbols are given.
pub const DEFAULT_WATCHLIST: &str = "mega_cap";

/// The built-in watchlists keyed by name.
pub fn builtin() -> BTreeMap<String, Watchlist> {
    let mut lists = BTreeMap::new();
    lists.insert(
        "mega_cap".to_string(),
        Watchlist::new(
            "Mega Cap Tech",
            &["AAPL", "NVDA", "MSFT", "GOOGL", "AMZN", "META", "TSLA", "AVGO", "TSM", "ORCL"],
        ),
    );
    lists.insert(
        "growth".to_string(),
        Watchlist::new(
            "Growth & Momentum",
            &["PLTR", "CRWD", "SNOW", "DDOG", "NET", "SHOP", "SQ", "COIN", "MSTR", "RKLB"],
        ),
    );
    lists.insert(
        "semis".to_string(),
        Watchlist::new(
            "Semiconductors",
            &["NVDA", "AMD", "AVGO", "QCOM", "MU", "MRVL", "KLAC", "LRCX", "AMAT", "SMCI"],
        ),
    );
    lists.insert(
        "energy_commodities".to_string(),
        Watchlist::new(
            "Energy & Commodities",
            &["XOM", "CVX", "CEG", "VST", "FSLR", "GLD", "SLV", "USO", "UNG", "FCX"],
        ),
    );
    lists.insert(
        "sp500_leaders".to_string(),
        Watchlist::new(
            "S&P 500 Leaders",
            &[
                "AAPL", "NVDA", "MSFT", "AMZN", "META", "GOOGL", "BRK-B", "LLY", "JPM", "V", "UNH",
                "XOM", "MA", "COST", "HD", "PG", "JNJ", "ABBV", "CRM", "NFLX",
            ],
        ),
    );
    lists.insert(
        "full_scan".to_string(),
        Watchlist::new(
            "Full Scan (Top 30)",
            &[
                "AAPL", "NVDA", "MSFT", "GOOGL", "AMZN", "META", "TSLA", "AVGO", "PLTR", "CRWD",
                "AMD", "COIN", "SNOW", "NET", "SHOP", "SQ", "CEG", "VST", "FSLR", "SMCI", "MRVL",
                "MU", "QCOM", "LLY", "JPM", "NFLX", "CRM", "COST", "RKLB", "MSTR",
            ],
        ),
    );
    lists
}
