//! Signal lifecycle tracker.
//!
//! A signal is opened with a frozen entry context and then driven by
//! monitoring passes until it exits:
//!
//! ```text
//! OPEN ──▶ STOPPED_OUT | TP1_HIT (turbo) | TP3_HIT | TIMEOUT | MANUAL_CLOSE
//! ```
//!
//! Exit evaluation order within one pass is fixed: stop, then the first
//! target for turbo signals, then the final target, then the timeout. A pass
//! never evaluates exits for an instrument whose market is closed, or on a
//! quote that looks stale.
//!
//! All read-modify-write cycles on the stored collections run under one
//! writer lock, so overlapping passes cannot lose updates.

pub mod analysis;
pub mod gap;
pub mod stats;

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use swinglab_core::data::{DataError, MarketDataProvider};
use swinglab_core::domain::{AssetClass, Quote, Resolution, TrendState};
use swinglab_core::features::IndicatorSnapshot;
use swinglab_core::indicators::{Atr, Indicator};
use swinglab_core::numeric::round_dp;
use swinglab_core::regime::RegimeLabel;
use swinglab_core::scoring::{Heat, PillarScores, ScoreResult};
use swinglab_core::session::{self, Clock, MarketSession};

use crate::config::DataSettings;
use crate::market::{self, MarketContext};
use crate::scan::ScanResult;
use crate::store::{ReportSink, SignalStore, StoreError};

use analysis::CaseReport;
use gap::GapInfo;
use stats::{RegimeStats, SignalStats};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("price unavailable for {symbol}: {source}")]
    Quote {
        symbol: String,
        #[source]
        source: DataError,
    },

    #[error("invalid price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("{0} already has an active signal")]
    AlreadyActive(String),

    #[error("no active signal with id {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum conviction for a scan result to open a signal.
    pub record_floor: u8,
    /// Whole days after which an open signal times out.
    pub timeout_days: i64,
    /// Turbo stop distance below entry, in ATRs.
    pub turbo_stop_atr: f64,
    pub turbo_tp1_atr: f64,
    pub turbo_tp2_atr: f64,
    pub turbo_tp3_atr: f64,
    /// Calendar days of daily bars fetched for the turbo ATR.
    pub atr_window_days: u32,
    pub atr_period: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            record_floor: 60,
            timeout_days: 30,
            turbo_stop_atr: 0.5,
            turbo_tp1_atr: 0.5,
            turbo_tp2_atr: 1.0,
            turbo_tp3_atr: 1.5,
            atr_window_days: 30,
            atr_period: 14,
        }
    }
}

// ─── Signal model ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Open,
    StoppedOut,
    Tp1Hit,
    Tp3Hit,
    Timeout,
    ManualClose,
}

impl SignalStatus {
    pub fn is_open(self) -> bool {
        self == SignalStatus::Open
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalStatus::Open => "OPEN",
            SignalStatus::StoppedOut => "STOPPED_OUT",
            SignalStatus::Tp1Hit => "TP1_HIT",
            SignalStatus::Tp3Hit => "TP3_HIT",
            SignalStatus::Timeout => "TIMEOUT",
            SignalStatus::ManualClose => "MANUAL_CLOSE",
        }
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    #[default]
    Standard,
    /// Short-horizon signal that exits at the first target.
    Turbo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMethod {
    /// Levels from the scoring engine's structure.
    Structure,
    Atr,
    PctFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    pub stop: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
    pub rr: f64,
}

/// When each target was first touched. Set once, never cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetHits {
    pub tp1_at: Option<DateTime<Utc>>,
    pub tp2_at: Option<DateTime<Utc>>,
    pub tp3_at: Option<DateTime<Utc>>,
}

impl TargetHits {
    pub fn tp1(&self) -> bool {
        self.tp1_at.is_some()
    }

    pub fn tp2(&self) -> bool {
        self.tp2_at.is_some()
    }

    pub fn tp3(&self) -> bool {
        self.tp3_at.is_some()
    }

    fn mark(&mut self, price: f64, targets: &Targets, now: DateTime<Utc>) {
        for (level, slot) in [
            (targets.tp1, &mut self.tp1_at),
            (targets.tp2, &mut self.tp2_at),
            (targets.tp3, &mut self.tp3_at),
        ] {
            if price >= level && slot.is_none() {
                *slot = Some(now);
            }
        }
    }
}

/// Final figures frozen at exit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloseSnapshot {
    pub price: f64,
    pub pnl_pct: f64,
    pub mae_pct: f64,
    pub mfe_pct: f64,
    pub days_held: i64,
    pub high: f64,
    pub low: f64,
    pub slippage_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseInfo {
    pub reason: String,
    pub closed_at: DateTime<Utc>,
    pub price: f64,
    pub session: MarketSession,
    pub gap: Option<GapInfo>,
    pub market_context: Option<MarketContext>,
    pub snapshot: CloseSnapshot,
}

/// What the signal looked like when it was opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryContext {
    pub price: f64,
    pub time: DateTime<Utc>,
    pub session: MarketSession,
    pub conviction: u8,
    pub raw_conviction: Option<u8>,
    pub heat: Heat,
    pub pillars: PillarScores,
    pub tas: String,
    pub trend: TrendState,
    pub ta_note: String,
    pub regime: RegimeLabel,
    pub market_context: Option<MarketContext>,
    pub snapshot: Option<IndicatorSnapshot>,
    pub atr: Option<f64>,
    /// Entry quote equalled the previous close during the regular session.
    pub price_stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub ticker: String,
    pub asset_class: AssetClass,
    pub kind: SignalKind,
    pub status: SignalStatus,
    pub entry: EntryContext,
    pub targets: Targets,
    pub target_method: TargetMethod,
    pub hits: TargetHits,
    pub current_price: f64,
    pub pnl_pct: f64,
    pub days_held: i64,
    pub high_watermark: f64,
    pub low_watermark: f64,
    pub mae_pct: f64,
    pub mfe_pct: f64,
    pub price_note: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
    pub close: Option<CloseInfo>,
}

impl Signal {
    fn open(
        ticker: &str,
        asset_class: AssetClass,
        kind: SignalKind,
        entry: EntryContext,
        targets: Targets,
        target_method: TargetMethod,
    ) -> Self {
        let price = entry.price;
        Self {
            id: new_id(),
            ticker: ticker.to_string(),
            asset_class,
            kind,
            status: SignalStatus::Open,
            entry,
            targets,
            target_method,
            hits: TargetHits::default(),
            current_price: price,
            pnl_pct: 0.0,
            days_held: 0,
            high_watermark: price,
            low_watermark: price,
            mae_pct: 0.0,
            mfe_pct: 0.0,
            price_note: None,
            last_checked: None,
            close: None,
        }
    }

    pub fn is_turbo(&self) -> bool {
        self.kind == SignalKind::Turbo
    }

    fn pct_from_entry(&self, price: f64) -> f64 {
        round_dp((price - self.entry.price) / self.entry.price * 100.0, 2)
    }

    /// Refresh price-derived fields. Watermarks only move on tradable quotes.
    fn mark_price(&mut self, price: f64, now: DateTime<Utc>, watermarks: bool) {
        self.current_price = price;
        self.days_held = (now - self.entry.time).num_days();
        self.last_checked = Some(now);
        if watermarks {
            self.high_watermark = self.high_watermark.max(price);
            self.low_watermark = self.low_watermark.min(price);
        }
        self.pnl_pct = self.pct_from_entry(price);
        self.mae_pct = self.pct_from_entry(self.low_watermark);
        self.mfe_pct = self.pct_from_entry(self.high_watermark);
    }

    /// Regime the signal was opened under; the observed one when available.
    pub fn entry_regime(&self) -> RegimeLabel {
        self.entry
            .market_context
            .as_ref()
            .map_or(self.entry.regime, |ctx| ctx.regime)
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

// ─── Exit evaluation ────────────────────────────────────────────────

/// Exit decided by one monitoring step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exit {
    pub status: SignalStatus,
    pub price: f64,
    pub gap: Option<GapInfo>,
}

/// Apply a tradable quote to an open signal and decide whether it exits.
///
/// Stop before targets before timeout; a gap through a level fills at the
/// quote instead of the level. A stop exit never fills above the quote.
pub fn evaluate(signal: &mut Signal, quote: Quote, now: DateTime<Utc>, timeout_days: i64) -> Option<Exit> {
    let targets = signal.targets;
    let stop_gap = gap::through_stop(quote, targets.stop);
    let primary = if signal.is_turbo() { targets.tp1 } else { targets.tp3 };
    let target_gap = gap::through_target(quote, primary);
    if let Some(g) = stop_gap.or(target_gap) {
        tracing::info!(
            ticker = %signal.ticker,
            kind = ?g.kind,
            intended = g.intended,
            fill = g.fill,
            slippage_pct = g.slippage_pct,
            "gap through level"
        );
    }

    signal.mark_price(quote.price, now, true);
    signal.hits.mark(quote.price, &targets, now);

    if quote.price <= targets.stop {
        return Some(Exit {
            status: SignalStatus::StoppedOut,
            price: stop_gap.map_or(targets.stop.min(quote.price), |g| g.fill),
            gap: stop_gap,
        });
    }
    if signal.is_turbo() && signal.hits.tp1() {
        return Some(Exit {
            status: SignalStatus::Tp1Hit,
            price: target_gap.map_or(targets.tp1, |g| g.fill),
            gap: target_gap,
        });
    }
    if !signal.is_turbo() && signal.hits.tp3() {
        return Some(Exit {
            status: SignalStatus::Tp3Hit,
            price: target_gap.map_or(targets.tp3, |g| g.fill),
            gap: target_gap,
        });
    }
    if signal.days_held >= timeout_days {
        return Some(Exit {
            status: SignalStatus::Timeout,
            price: quote.price,
            gap: None,
        });
    }
    None
}

/// Freeze exit fields on a signal.
fn finalize(
    signal: &mut Signal,
    exit: Exit,
    reason: String,
    now: DateTime<Utc>,
    context: Option<MarketContext>,
) {
    signal.status = exit.status;
    signal.current_price = exit.price;
    signal.pnl_pct = signal.pct_from_entry(exit.price);
    signal.mae_pct = signal.pct_from_entry(signal.low_watermark);
    signal.mfe_pct = signal.pct_from_entry(signal.high_watermark);
    let slippage_pct = exit.gap.map_or(0.0, |g| g.slippage_pct);
    signal.close = Some(CloseInfo {
        reason,
        closed_at: now,
        price: exit.price,
        session: MarketSession::at(now),
        gap: exit.gap,
        market_context: context,
        snapshot: CloseSnapshot {
            price: exit.price,
            pnl_pct: signal.pnl_pct,
            mae_pct: signal.mae_pct,
            mfe_pct: signal.mfe_pct,
            days_held: signal.days_held,
            high: signal.high_watermark,
            low: signal.low_watermark,
            slippage_pct,
        },
    });
}

fn exit_reason(signal: &Signal, exit: &Exit, timeout_days: i64) -> String {
    let t = &signal.targets;
    let base = match exit.status {
        SignalStatus::StoppedOut => format!("Price {} hit stop {}", signal.current_price, t.stop),
        SignalStatus::Tp1Hit => format!("Turbo target TP1 {} reached", t.tp1),
        SignalStatus::Tp3Hit => format!("Final target TP3 {} reached", t.tp3),
        SignalStatus::Timeout => format!("Open {} days (limit {timeout_days})", signal.days_held),
        SignalStatus::ManualClose | SignalStatus::Open => String::new(),
    };
    match exit.gap {
        Some(g) => format!("{base}; gap fill at {} ({}% slippage)", g.fill, g.slippage_pct),
        None => base,
    }
}

// ─── Reports returned to callers ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub session: MarketSession,
    pub is_open: bool,
}

impl MarketStatus {
    pub fn at(now: DateTime<Utc>) -> Self {
        let session = MarketSession::at(now);
        Self {
            session,
            is_open: session.is_regular(),
        }
    }
}

/// Active and closed collections with their aggregate statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalOverview {
    pub active: Vec<Signal>,
    pub closed: Vec<Signal>,
    pub stats: SignalStats,
    pub market: MarketStatus,
}

/// Result of one monitoring pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    #[serde(flatten)]
    pub overview: SignalOverview,
    /// Signals closed by this pass.
    pub recently_closed: Vec<Signal>,
    pub warnings: Vec<String>,
}

// ─── Tracker ────────────────────────────────────────────────────────

/// Opens, monitors and closes signals against a store and a price source.
pub struct Tracker<S, P, C> {
    store: S,
    provider: P,
    clock: C,
    data: DataSettings,
    config: TrackerConfig,
    writer: Mutex<()>,
}

impl<S, P, C> Tracker<S, P, C>
where
    S: SignalStore + ReportSink,
    P: MarketDataProvider,
    C: Clock,
{
    pub fn new(store: S, provider: P, clock: C, data: DataSettings, config: TrackerConfig) -> Self {
        Self {
            store,
            provider,
            clock,
            data,
            config,
            writer: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn context(&self, now: DateTime<Utc>) -> Option<MarketContext> {
        MarketContext::capture(&self.provider, &self.data, now)
    }

    fn quote(&self, signal_ticker: &str, asset_class: AssetClass) -> Result<Quote, TrackerError> {
        let symbol = asset_class.lookup_symbol(signal_ticker);
        let quote = self
            .provider
            .get_last_price(&symbol)
            .map_err(|source| TrackerError::Quote {
                symbol: symbol.clone(),
                source,
            })?;
        if !quote.is_valid() {
            return Err(TrackerError::InvalidPrice {
                symbol,
                price: quote.price,
            });
        }
        Ok(quote)
    }

    /// Active and closed collections. An active signal whose id is already
    /// closed is dropped: closed is written before active, so an interrupted
    /// write leaves the signal in both.
    fn load_collections(&self) -> Result<(Vec<Signal>, Vec<Signal>), TrackerError> {
        let mut active = self.store.load_active()?;
        let closed = self.store.load_closed()?;
        active.retain(|s| {
            let done = closed.iter().any(|c| c.id == s.id);
            if done {
                tracing::warn!(id = %s.id, ticker = %s.ticker, "dropping active signal already closed");
            }
            !done
        });
        Ok((active, closed))
    }

    /// Open a signal for every qualifying scan result whose ticker is not
    /// already active. Returns the new signals.
    pub fn record_from_scan(&self, scan: &ScanResult) -> Result<Vec<Signal>, TrackerError> {
        let _guard = self.writer.lock();
        let now = self.clock.now();
        let (mut active, _) = self.load_collections()?;
        let context = self.context(now);
        let session = MarketSession::at(now);

        let mut opened = Vec::new();
        for result in scan.passing() {
            if result.conviction < self.config.record_floor
                || active.iter().any(|s| s.ticker == result.ticker)
            {
                continue;
            }
            let Some(levels) = result.levels() else {
                continue;
            };
            let entry = entry_context(result, now, session, context.clone(), None, false);
            let targets = Targets {
                stop: levels.stop,
                tp1: levels.tp1,
                tp2: levels.tp2,
                tp3: levels.tp3,
                rr: levels.rr,
            };
            let signal = Signal::open(
                &result.ticker,
                AssetClass::Stock,
                SignalKind::Standard,
                entry,
                targets,
                TargetMethod::Structure,
            );
            tracing::info!(
                id = %signal.id,
                ticker = %signal.ticker,
                conviction = signal.entry.conviction,
                entry = signal.entry.price,
                "signal opened"
            );
            active.push(signal.clone());
            opened.push(signal);
        }

        if !opened.is_empty() {
            self.store.save_active(&active)?;
        }
        Ok(opened)
    }

    /// ATR of recent daily bars, `None` with too little history.
    fn recent_atr(&self, symbol: &str) -> Option<f64> {
        let bars = self
            .provider
            .get_bars(symbol, Resolution::Daily, self.config.atr_window_days)
            .map_err(|e| tracing::debug!(symbol, error = %e, "no bars for turbo ATR"))
            .ok()?;
        if bars.len() < self.config.atr_period {
            return None;
        }
        let atr = Atr::new(self.config.atr_period.max(1)).last(&bars);
        (atr.is_finite() && atr > 0.0).then_some(atr)
    }

    /// Open a short-horizon signal at the live price with ATR-based targets
    /// (percentage targets when ATR is unavailable).
    pub fn create_turbo(
        &self,
        symbol: &str,
        asset_class: AssetClass,
        scored: Option<&ScoreResult>,
    ) -> Result<Signal, TrackerError> {
        let ticker = symbol.to_uppercase();
        let quote = self.quote(&ticker, asset_class)?;
        let now = self.clock.now();
        let session = MarketSession::at(now);
        let price_stale = asset_class == AssetClass::Stock
            && session.is_regular()
            && quote.price == quote.previous_close;
        let atr = self.recent_atr(&asset_class.lookup_symbol(&ticker));
        let (targets, method) = turbo_targets(quote.price, atr, &self.config);
        let context = self.context(now);

        let entry = match scored {
            Some(result) => {
                let mut entry = entry_context(result, now, session, context, atr, price_stale);
                entry.price = quote.price;
                entry
            }
            None => EntryContext {
                price: quote.price,
                time: now,
                session,
                conviction: 0,
                raw_conviction: None,
                heat: Heat::Cold,
                pillars: PillarScores::default(),
                tas: "0/4".to_string(),
                trend: TrendState::Mixed,
                ta_note: String::new(),
                regime: context
                    .as_ref()
                    .map_or_else(|| market::current_regime(&self.provider, &self.data).label, |c| c.regime),
                market_context: context,
                snapshot: None,
                atr,
                price_stale,
            },
        };

        let _guard = self.writer.lock();
        let (mut active, _) = self.load_collections()?;
        if active.iter().any(|s| s.ticker == ticker) {
            return Err(TrackerError::AlreadyActive(ticker));
        }
        let signal = Signal::open(&ticker, asset_class, SignalKind::Turbo, entry, targets, method);
        tracing::info!(
            id = %signal.id,
            ticker = %signal.ticker,
            method = ?method,
            stop = targets.stop,
            tp1 = targets.tp1,
            "turbo signal opened"
        );
        active.push(signal.clone());
        self.store.save_active(&active)?;
        Ok(signal)
    }

    /// Run one monitoring pass over every active signal.
    pub fn check(&self) -> Result<CheckReport, TrackerError> {
        let _guard = self.writer.lock();
        let now = self.clock.now();
        let session = MarketSession::at(now);
        let (mut active, mut closed) = self.load_collections()?;
        let mut warnings = Vec::new();
        let mut still_open = Vec::with_capacity(active.len());
        let mut recently_closed = Vec::new();
        let mut close_context: Option<Option<MarketContext>> = None;

        for mut signal in active.drain(..) {
            let quote = match self.quote(&signal.ticker, signal.asset_class) {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!(ticker = %signal.ticker, error = %e, "price check failed");
                    warnings.push(format!("{}: {e}", signal.ticker));
                    still_open.push(signal);
                    continue;
                }
            };

            let stale = signal.asset_class == AssetClass::Stock
                && session.is_regular()
                && quote.price == quote.previous_close;
            if stale {
                tracing::warn!(ticker = %signal.ticker, price = quote.price, "stale quote");
                warnings.push(format!(
                    "{}: quote {} equals previous close during regular session",
                    signal.ticker, quote.price
                ));
            }

            if !session::is_tradable(signal.asset_class, now) || stale {
                signal.mark_price(quote.price, now, false);
                signal.price_note = Some(if stale {
                    "stale quote, exits not evaluated".to_string()
                } else {
                    format!("market {session}, exits not evaluated")
                });
                still_open.push(signal);
                continue;
            }
            signal.price_note = None;

            match evaluate(&mut signal, quote, now, self.config.timeout_days) {
                None => still_open.push(signal),
                Some(exit) => {
                    let reason = exit_reason(&signal, &exit, self.config.timeout_days);
                    let context = close_context.get_or_insert_with(|| self.context(now)).clone();
                    finalize(&mut signal, exit, reason, now, context);
                    self.save_case_report(&signal);
                    tracing::info!(
                        id = %signal.id,
                        ticker = %signal.ticker,
                        status = %signal.status,
                        pnl_pct = signal.pnl_pct,
                        "signal closed"
                    );
                    recently_closed.push(signal.clone());
                    closed.push(signal);
                }
            }
        }

        self.store.save_closed(&closed)?;
        self.store.save_active(&still_open)?;
        let stats = SignalStats::compute(&still_open, &closed);
        Ok(CheckReport {
            overview: SignalOverview {
                active: still_open,
                closed,
                stats,
                market: MarketStatus::at(now),
            },
            recently_closed,
            warnings,
        })
    }

    /// Close an active signal at its last known price.
    pub fn close(&self, id: &str, reason: Option<&str>) -> Result<Signal, TrackerError> {
        let _guard = self.writer.lock();
        let now = self.clock.now();
        let (mut active, mut closed) = self.load_collections()?;
        let position = active
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
        let mut signal = active.remove(position);

        let exit = Exit {
            status: SignalStatus::ManualClose,
            price: signal.current_price,
            gap: None,
        };
        let reason = reason.unwrap_or("manual").to_string();
        finalize(&mut signal, exit, reason, now, self.context(now));
        self.save_case_report(&signal);

        closed.push(signal.clone());
        self.store.save_closed(&closed)?;
        self.store.save_active(&active)?;
        tracing::info!(id = %signal.id, ticker = %signal.ticker, "signal closed manually");
        Ok(signal)
    }

    /// A failed report write is logged; it never keeps a signal open.
    fn save_case_report(&self, signal: &Signal) {
        let Some(report) = CaseReport::build(signal) else {
            return;
        };
        match self.store.save_report(&report) {
            Ok(name) => tracing::debug!(report = %name, "case report saved"),
            Err(e) => tracing::error!(id = %signal.id, error = %e, "case report not saved"),
        }
    }

    /// Stored collections without refreshing prices.
    pub fn overview(&self) -> Result<SignalOverview, TrackerError> {
        let (active, closed) = self.load_collections()?;
        Ok(SignalOverview {
            stats: SignalStats::compute(&active, &closed),
            active,
            closed,
            market: MarketStatus::at(self.clock.now()),
        })
    }

    pub fn clear_all(&self) -> Result<(), TrackerError> {
        let _guard = self.writer.lock();
        self.store.clear_all()?;
        Ok(())
    }

    pub fn report(&self, id: &str) -> Result<CaseReport, TrackerError> {
        Ok(self.store.load_report(id)?)
    }

    pub fn reports(&self) -> Result<Vec<CaseReport>, TrackerError> {
        Ok(self.store.load_all_reports()?)
    }

    pub fn regime_performance(&self) -> Result<Vec<RegimeStats>, TrackerError> {
        Ok(stats::regime_performance(&self.store.load_closed()?))
    }
}

fn entry_context(
    result: &ScoreResult,
    now: DateTime<Utc>,
    session: MarketSession,
    market_context: Option<MarketContext>,
    atr: Option<f64>,
    price_stale: bool,
) -> EntryContext {
    EntryContext {
        price: result.price,
        time: now,
        session,
        conviction: result.conviction,
        raw_conviction: result.raw_conviction,
        heat: result.heat,
        pillars: result.pillars,
        tas: result.tas().to_string(),
        trend: result.trend,
        ta_note: result.ta_note(),
        regime: result.regime,
        market_context,
        snapshot: result.snapshot.clone(),
        atr: atr.or_else(|| result.snapshot.as_ref().map(|s| s.atr)),
        price_stale,
    }
}

/// Turbo stop and targets around `price`.
pub fn turbo_targets(price: f64, atr: Option<f64>, cfg: &TrackerConfig) -> (Targets, TargetMethod) {
    match atr {
        Some(atr) => {
            let stop = round_dp(price - cfg.turbo_stop_atr * atr, 4);
            let tp1 = round_dp(price + cfg.turbo_tp1_atr * atr, 4);
            let risk = price - stop;
            let rr = if risk > 0.0 { round_dp((tp1 - price) / risk, 2) } else { 0.0 };
            (
                Targets {
                    stop,
                    tp1,
                    tp2: round_dp(price + cfg.turbo_tp2_atr * atr, 4),
                    tp3: round_dp(price + cfg.turbo_tp3_atr * atr, 4),
                    rr,
                },
                TargetMethod::Atr,
            )
        }
        None => (
            Targets {
                stop: round_dp(price * 0.998, 4),
                tp1: round_dp(price * 1.005, 4),
                tp2: round_dp(price * 1.008, 4),
                tp3: round_dp(price * 1.012, 4),
                rr: 2.5,
            },
            TargetMethod::PctFallback,
        ),
    }
}
