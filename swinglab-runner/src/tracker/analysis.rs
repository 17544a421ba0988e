//! Case reports for closed signals and the heuristic notes attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use swinglab_core::domain::AssetClass;
use swinglab_core::session::MarketSession;

use super::gap::GapInfo;
use super::{CloseSnapshot, EntryContext, Signal, SignalKind, SignalStatus, TargetMethod, Targets};
use crate::market::MarketContext;

pub const REPORT_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub ticker: String,
    pub asset_class: AssetClass,
    pub kind: SignalKind,
    pub status: SignalStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSection {
    #[serde(flatten)]
    pub levels: Targets,
    pub method: TargetMethod,
    pub turbo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSection {
    pub price: f64,
    pub closed_at: DateTime<Utc>,
    pub status: SignalStatus,
    pub reason: String,
    pub session: MarketSession,
    pub market_context: Option<MarketContext>,
    pub snapshot: CloseSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub pnl_pct: f64,
    pub mae_pct: f64,
    pub mfe_pct: f64,
    pub highest_price: f64,
    pub lowest_price: f64,
    pub days_held: i64,
    pub tp1_hit: bool,
    pub tp2_hit: bool,
    pub tp3_hit: bool,
    pub slippage_pct: f64,
    pub gap: Option<GapInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    SlReview,
    TpReview,
    MaeInsight,
    Speed,
    ConvictionAccuracy,
    GapImpact,
    SessionNote,
    RegimeShift,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisNote {
    pub kind: NoteKind,
    pub text: String,
}

/// Everything known about one closed signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
    pub version: String,
    pub identity: Identity,
    pub entry: EntryContext,
    pub targets: TargetSection,
    pub exit: ExitSection,
    pub performance: Performance,
    pub analysis: Vec<AnalysisNote>,
}

impl CaseReport {
    /// `None` for a signal that has not closed.
    pub fn build(signal: &Signal) -> Option<Self> {
        let close = signal.close.as_ref()?;
        Some(Self {
            version: REPORT_VERSION.to_string(),
            identity: Identity {
                id: signal.id.clone(),
                ticker: signal.ticker.clone(),
                asset_class: signal.asset_class,
                kind: signal.kind,
                status: signal.status,
            },
            entry: signal.entry.clone(),
            targets: TargetSection {
                levels: signal.targets,
                method: signal.target_method,
                turbo: signal.is_turbo(),
            },
            exit: ExitSection {
                price: close.price,
                closed_at: close.closed_at,
                status: signal.status,
                reason: close.reason.clone(),
                session: close.session,
                market_context: close.market_context.clone(),
                snapshot: close.snapshot,
            },
            performance: Performance {
                pnl_pct: signal.pnl_pct,
                mae_pct: signal.mae_pct,
                mfe_pct: signal.mfe_pct,
                highest_price: signal.high_watermark,
                lowest_price: signal.low_watermark,
                days_held: signal.days_held,
                tp1_hit: signal.hits.tp1(),
                tp2_hit: signal.hits.tp2(),
                tp3_hit: signal.hits.tp3(),
                slippage_pct: close.snapshot.slippage_pct,
                gap: close.gap,
            },
            analysis: analyze(signal),
        })
    }

    pub fn note(&self, kind: NoteKind) -> Option<&str> {
        self.analysis
            .iter()
            .find(|n| n.kind == kind)
            .map(|n| n.text.as_str())
    }
}

/// Heuristic notes on a closed signal. At most one note per kind.
pub fn analyze(signal: &Signal) -> Vec<AnalysisNote> {
    let mut notes = Vec::new();
    let mut add = |kind, text: String| notes.push(AnalysisNote { kind, text });

    let status = signal.status;
    let pnl = signal.pnl_pct;
    let mae = signal.mae_pct;
    let mfe = signal.mfe_pct;
    let days = signal.days_held;
    let close = signal.close.as_ref();

    if status == SignalStatus::StoppedOut && mfe > 0.5 {
        add(
            NoteKind::SlReview,
            format!("Trade went +{mfe}% before reversing to the stop. MFE suggests the stop may be too tight."),
        );
    } else if status == SignalStatus::StoppedOut && mfe <= 0.0 {
        add(
            NoteKind::SlReview,
            "Trade never went positive. Entry timing was poor or the direction was wrong.".to_string(),
        );
    }

    if signal.hits.tp1() && !signal.hits.tp3() && status == SignalStatus::StoppedOut {
        add(
            NoteKind::TpReview,
            "TP1 was hit but the trade reversed to the stop. Consider taking profit at TP1.".to_string(),
        );
    } else if status == SignalStatus::Timeout && mfe > 0.0 {
        add(
            NoteKind::TpReview,
            format!("Trade reached +{mfe}% but no target. Consider tighter targets."),
        );
    }

    if pnl < 0.0 && mae < -2.0 {
        add(
            NoteKind::MaeInsight,
            format!("Severe drawdown of {mae}%. The stop may need adjustment."),
        );
    } else if pnl > 0.0 && mae < -0.5 {
        add(
            NoteKind::MaeInsight,
            format!("Winner but saw a {mae}% drawdown. Risk management held."),
        );
    }

    if days <= 1 && pnl.abs() > 1.0 {
        add(NoteKind::Speed, "Fast move, resolved within 1 day.".to_string());
    } else if days > 14 && pnl.abs() < 1.0 {
        add(
            NoteKind::Speed,
            "Slow grind: low P&L after 2+ weeks. Consider a time-based exit.".to_string(),
        );
    }

    let conviction = signal.entry.conviction;
    if conviction >= 70 && pnl < 0.0 {
        add(
            NoteKind::ConvictionAccuracy,
            format!("HIGH conviction ({conviction}%) but LOSS. Investigate pillar scores."),
        );
    } else if conviction < 50 && pnl > 2.0 {
        add(
            NoteKind::ConvictionAccuracy,
            format!("LOW conviction ({conviction}%) but BIG WIN (+{pnl}%). Scoring may underweight something."),
        );
    }

    if let Some(gap) = close.and_then(|c| c.gap) {
        add(
            NoteKind::GapImpact,
            format!(
                "Gap detected. Slippage {}%: filled at {} instead of {}.",
                gap.slippage_pct, gap.fill, gap.intended
            ),
        );
    }

    match signal.entry.session {
        MarketSession::Premarket => add(
            NoteKind::SessionNote,
            "Entered during pre-market. Prices may have been less reliable.".to_string(),
        ),
        MarketSession::Closed => add(
            NoteKind::SessionNote,
            "Entered while the market was closed. Entry price was the previous close.".to_string(),
        ),
        MarketSession::Regular | MarketSession::Afterhours => {}
    }

    let entry_regime = signal.entry.market_context.as_ref().map(|c| c.regime);
    let close_regime = close.and_then(|c| c.market_context.as_ref()).map(|c| c.regime);
    if let (Some(from), Some(to)) = (entry_regime, close_regime) {
        if from != to {
            add(
                NoteKind::RegimeShift,
                format!("Regime changed from '{from}' to '{to}' during the trade."),
            );
        }
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use swinglab_core::domain::TrendState;
    use swinglab_core::regime::RegimeLabel;
    use swinglab_core::scoring::{Heat, PillarScores};

    use super::super::{CloseInfo, TargetHits};

    fn closed(status: SignalStatus, pnl: f64, mae: f64, mfe: f64, days: i64) -> Signal {
        let at = Utc.with_ymd_and_hms(2024, 6, 3, 15, 0, 0).unwrap();
        let ctx = |regime| MarketContext {
            vol: 15.0,
            benchmark_close: None,
            benchmark_change_pct: None,
            regime,
            captured_at: at,
        };
        Signal {
            id: "abcd1234".into(),
            ticker: "TEST".into(),
            asset_class: AssetClass::Stock,
            kind: SignalKind::Standard,
            status,
            entry: EntryContext {
                price: 100.0,
                time: at,
                session: MarketSession::Regular,
                conviction: 75,
                raw_conviction: None,
                heat: Heat::Hot,
                pillars: PillarScores::default(),
                tas: "3/4".into(),
                trend: TrendState::Bull,
                ta_note: String::new(),
                regime: RegimeLabel::TrendingBull,
                market_context: Some(ctx(RegimeLabel::TrendingBull)),
                snapshot: None,
                atr: None,
                price_stale: false,
            },
            targets: Targets {
                stop: 98.0,
                tp1: 102.0,
                tp2: 104.0,
                tp3: 106.0,
                rr: 1.0,
            },
            target_method: TargetMethod::Structure,
            hits: TargetHits::default(),
            current_price: 100.0 + pnl,
            pnl_pct: pnl,
            days_held: days,
            high_watermark: 100.0 + mfe,
            low_watermark: 100.0 + mae,
            mae_pct: mae,
            mfe_pct: mfe,
            price_note: None,
            last_checked: Some(at),
            close: Some(CloseInfo {
                reason: "test".into(),
                closed_at: at + chrono::Duration::days(days),
                price: 100.0 + pnl,
                session: MarketSession::Regular,
                gap: None,
                market_context: Some(ctx(RegimeLabel::ChoppyRange)),
                snapshot: CloseSnapshot {
                    price: 100.0 + pnl,
                    pnl_pct: pnl,
                    mae_pct: mae,
                    mfe_pct: mfe,
                    days_held: days,
                    high: 100.0 + mfe,
                    low: 100.0 + mae,
                    slippage_pct: 0.0,
                },
            }),
        }
    }

    #[test]
    fn stopped_out_after_running_up_flags_tight_stop() {
        let report = CaseReport::build(&closed(SignalStatus::StoppedOut, -2.0, -2.5, 1.2, 5)).unwrap();
        assert!(report.note(NoteKind::SlReview).unwrap().contains("too tight"));
        assert!(report.note(NoteKind::MaeInsight).unwrap().contains("Severe"));
        assert!(report.note(NoteKind::ConvictionAccuracy).unwrap().contains("HIGH"));
        assert!(report.note(NoteKind::RegimeShift).is_some());
        assert_eq!(report.version, "2.0");
    }

    #[test]
    fn slow_timeout_with_small_gain() {
        let notes = analyze(&closed(SignalStatus::Timeout, 0.4, -0.2, 1.1, 30));
        let kinds: Vec<NoteKind> = notes.iter().map(|n| n.kind).collect();
        assert!(kinds.contains(&NoteKind::TpReview));
        assert!(kinds.contains(&NoteKind::Speed));
        assert!(!kinds.contains(&NoteKind::SlReview));
    }

    #[test]
    fn open_signal_has_no_report() {
        let mut s = closed(SignalStatus::Open, 0.0, 0.0, 0.0, 0);
        s.close = None;
        assert!(CaseReport::build(&s).is_none());
    }
}
