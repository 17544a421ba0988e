//! Look-ahead contamination tests for the indicators and the feature extractor.
//!
//! Invariant: no value at bar t may depend on price data from bar t+1 or later.
//!
//! Method: compute on a truncated series and on the full series and require
//! identical output over the shared prefix. For the extractor, a snapshot at
//! index i over the full history must equal the snapshot of the history cut
//! at i.

use chrono::{TimeZone, Utc};
use swinglab_core::domain::Bar;
use swinglab_core::features::{extract, FeatureInput};
use swinglab_core::indicators::*;

/// N bars of deterministic pseudo-random OHLCV.
fn make_test_bars(n: usize) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2023, 1, 3, 14, 30, 0).unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed % 200) as f64 - 98.0) * 0.05;
        price = (price + change).max(10.0);

        let open = price - 0.5;
        let close = price + 0.3;
        bars.push(Bar {
            symbol: "TEST".to_string(),
            timestamp: base + chrono::Duration::days(i as i64),
            open,
            high: open.max(close) + 2.0,
            low: open.min(close) - 2.0,
            close,
            volume: 1000 + (seed % 5000),
        });
    }
    bars
}

fn assert_no_lookahead(indicator: &dyn Indicator, full_bars: &[Bar], truncated_len: usize) {
    let truncated = &full_bars[..truncated_len];
    let full_result = indicator.compute(full_bars);
    let truncated_result = indicator.compute(truncated);

    assert_eq!(truncated_result.len(), truncated_len, "{}", indicator.name());
    assert_eq!(full_result.len(), full_bars.len(), "{}", indicator.name());

    for i in 0..truncated_len {
        let (t, f) = (truncated_result[i], full_result[i]);
        if t.is_nan() && f.is_nan() {
            continue;
        }
        assert!(
            (t - f).abs() < 1e-10,
            "{}: look-ahead contamination at bar {i}: truncated={t}, full={f}",
            indicator.name()
        );
    }
}

#[test]
fn lookahead_sma_and_ema() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&Sma::new(20), &bars, 150);
    assert_no_lookahead(&Ema::new(10), &bars, 150);
    assert_no_lookahead(&Ema::new(150), &bars, 200);
}

#[test]
fn lookahead_atr_and_rsi() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&Atr::new(14), &bars, 100);
    assert_no_lookahead(&Rsi::new(14), &bars, 100);
}

#[test]
fn extractor_snapshot_at_index_ignores_later_bars() {
    let bars = make_test_bars(320);
    for index in [160, 200, 259, 319] {
        let on_full = extract(&FeatureInput::at("TEST", &bars, index)).unwrap();
        let on_cut = extract(&FeatureInput::latest("TEST", &bars[..=index])).unwrap();
        assert_eq!(on_full, on_cut, "snapshot at {index} saw future bars");
    }
}

#[test]
fn extractor_ignores_intraday_after_as_of() {
    let daily = make_test_bars(220);
    // one hourly bar per day, plus ten days past the as-of bar
    let hourly: Vec<Bar> = make_test_bars(230)
        .into_iter()
        .map(|mut b| {
            b.timestamp += chrono::Duration::hours(2);
            b
        })
        .collect();
    let index = 219;
    let with_future = FeatureInput::at("TEST", &daily, index).with_intraday(Some(&hourly));
    let cut = &hourly[..=index];
    let without_future = FeatureInput::at("TEST", &daily, index).with_intraday(Some(cut));
    assert_eq!(
        extract(&with_future).unwrap(),
        extract(&without_future).unwrap()
    );
}

#[test]
fn extraction_is_idempotent() {
    let bars = make_test_bars(250);
    let input = FeatureInput::at("TEST", &bars, 240);
    let a = serde_json::to_vec(&extract(&input).unwrap()).unwrap();
    let b = serde_json::to_vec(&extract(&input).unwrap()).unwrap();
    assert_eq!(a, b);
}
