//! Criterion benchmarks for the scan hot path.
//!
//! 1. Feature extraction at the latest bar
//! 2. Conviction scoring of a prepared snapshot
//! 3. Walk of every as-of index over one history (backtester inner loop)

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use swinglab_core::data::{MarketDataProvider, SyntheticProvider};
use swinglab_core::domain::{Bar, Resolution};
use swinglab_core::features::{extract, FeatureInput};
use swinglab_core::regime::Regime;
use swinglab_core::scoring::{score, ScoringConfig};

// ── Helpers ──────────────────────────────────────────────────────────

fn synthetic_daily(symbol: &str) -> Vec<Bar> {
    let anchor = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
    SyntheticProvider::new(42, anchor)
        .get_bars(symbol, Resolution::Daily, 730)
        .unwrap()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_extract(c: &mut Criterion) {
    let bars = synthetic_daily("AAPL");
    c.bench_function("extract_latest", |b| {
        b.iter(|| extract(black_box(&FeatureInput::latest("AAPL", &bars))).unwrap())
    });
}

fn bench_score(c: &mut Criterion) {
    let bars = synthetic_daily("NVDA");
    let snap = extract(&FeatureInput::latest("NVDA", &bars)).unwrap();
    let regime = Regime::from_vol(18.0);
    let mut group = c.benchmark_group("score");
    for (name, cfg) in [
        ("standard", ScoringConfig::default()),
        ("upgraded", ScoringConfig::upgraded()),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &cfg, |b, cfg| {
            b.iter(|| score(black_box(&snap), &regime, cfg))
        });
    }
    group.finish();
}

fn bench_walk(c: &mut Criterion) {
    let bars = synthetic_daily("MSFT");
    let regime = Regime::from_vol(18.0);
    let cfg = ScoringConfig::upgraded();
    let start = 160.min(bars.len().saturating_sub(1));
    c.bench_function("walk_forward_history", |b| {
        b.iter(|| {
            let mut total = 0u64;
            for index in start..bars.len() {
                if let Ok(snap) = extract(&FeatureInput::at("MSFT", &bars, index)) {
                    total += u64::from(score(&snap, &regime, &cfg).conviction);
                }
            }
            black_box(total)
        })
    });
}

criterion_group!(benches, bench_extract, bench_score, bench_walk);
criterion_main!(benches);
