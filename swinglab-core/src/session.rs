//! US equity market sessions on the New York wall clock, and the clock trait
//! every time-dependent component reads "now" from.

use std::fmt;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::AssetClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketSession {
    Premarket,
    Regular,
    Afterhours,
    Closed,
}

impl MarketSession {
    /// Session at `now`: regular 09:30-16:00 ET, premarket 04:00-09:30,
    /// after-hours 16:00-20:00, closed otherwise and all weekend.
    pub fn at(now: DateTime<Utc>) -> Self {
        let et = now.with_timezone(&New_York);
        if matches!(et.weekday(), Weekday::Sat | Weekday::Sun) {
            return MarketSession::Closed;
        }
        let minutes = et.hour() * 60 + et.minute();
        match minutes {
            m if (570..960).contains(&m) => MarketSession::Regular,
            m if (240..570).contains(&m) => MarketSession::Premarket,
            m if (960..1200).contains(&m) => MarketSession::Afterhours,
            _ => MarketSession::Closed,
        }
    }

    pub fn is_regular(self) -> bool {
        self == MarketSession::Regular
    }
}

impl fmt::Display for MarketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MarketSession::Premarket => "premarket",
            MarketSession::Regular => "regular",
            MarketSession::Afterhours => "afterhours",
            MarketSession::Closed => "closed",
        })
    }
}

/// Whether exits may be evaluated for an instrument right now.
/// Crypto trades around the clock; stocks only in the regular session.
pub fn is_tradable(asset_class: AssetClass, now: DateTime<Utc>) -> bool {
    match asset_class {
        AssetClass::Crypto => true,
        AssetClass::Stock => MarketSession::at(now).is_regular(),
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
