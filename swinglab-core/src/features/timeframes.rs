//! Multi-timeframe trend assessment.
//!
//! Each timeframe is BULL when its last close is above its EMA20. Weekly bars
//! are resampled from the daily slice, 4-hour bars from the hourly slice, so
//! every timeframe sees exactly the same history cut-off.

use chrono::{Datelike, Timelike};

use crate::domain::{Bar, TimeframeBreakdown, TrendState};
use crate::indicators::{ema_of_series, Ema, Indicator};

/// Bars needed on a higher timeframe before it is allowed to vote.
pub const MIN_TIMEFRAME_BARS: usize = 20;

const TREND_SPAN: usize = 20;

/// Last close of each ISO week, oldest first. The current partial week counts.
pub fn weekly_closes(daily: &[Bar]) -> Vec<f64> {
    bucket_last_close(daily, |b| {
        let week = b.date().iso_week();
        (week.year() as i64) * 100 + week.week() as i64
    })
}

/// Last close of each `hours`-wide clock bucket (UTC), oldest first.
pub fn hour_bucket_closes(intraday: &[Bar], hours: u32) -> Vec<f64> {
    let hours = hours.max(1);
    bucket_last_close(intraday, |b| {
        let d = b.date();
        (d.num_days_from_ce() as i64) * 100 + (b.timestamp.hour() / hours) as i64
    })
}

fn bucket_last_close(bars: &[Bar], key: impl Fn(&Bar) -> i64) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    let mut current: Option<i64> = None;
    for bar in bars {
        let k = key(bar);
        if current == Some(k) {
            if let Some(last) = out.last_mut() {
                *last = bar.close;
            }
        } else {
            out.push(bar.close);
            current = Some(k);
        }
    }
    out
}

/// Close vs EMA20 on a resampled series; MIXED when the series is too short.
pub fn series_trend(closes: &[f64]) -> TrendState {
    if closes.len() < MIN_TIMEFRAME_BARS {
        return TrendState::Mixed;
    }
    let ema = ema_of_series(closes, TREND_SPAN);
    match (closes.last(), ema.last()) {
        (Some(close), Some(line)) => TrendState::from_close_vs_line(*close, *line),
        _ => TrendState::Mixed,
    }
}

/// Four-timeframe breakdown as of the last daily bar.
///
/// With an intraday slice the 65m and 240m votes come from hourly bars and
/// their 4-hour resample; without one they fall back to close vs EMA5 and
/// close vs EMA8 on the daily slice.
pub fn assess(daily: &[Bar], intraday: Option<&[Bar]>, ema20_daily: f64) -> TimeframeBreakdown {
    let close = daily.last().map_or(f64::NAN, |b| b.close);
    let daily_state = TrendState::from_close_vs_line(close, ema20_daily);
    let weekly = series_trend(&weekly_closes(daily));

    let (tf_65m, tf_240m) = match intraday {
        Some(hourly) if !hourly.is_empty() => {
            let closes: Vec<f64> = hourly.iter().map(|b| b.close).collect();
            (series_trend(&closes), series_trend(&hour_bucket_closes(hourly, 4)))
        }
        _ => (
            TrendState::from_close_vs_line(close, Ema::new(5).last(daily)),
            TrendState::from_close_vs_line(close, Ema::new(8).last(daily)),
        ),
    };

    TimeframeBreakdown {
        tf_65m,
        tf_240m,
        daily: daily_state,
        weekly,
    }
}
