//! Criterion benchmarks for candlecache hot paths.
//!
//! Benchmarks:
//! 1. Layered store ingest (disjoint and overlapping batches)
//! 2. Layered store loads (head, tail, unlimited)
//! 3. Cached source answering from the store
//! 4. Cached source filling gaps between cached ranges

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use candlecache_core::{
    CachedSource, Candlestick, CandlestickSource, LayeredIntervalStore, LocalSource, Scalar,
    ScalarKind, SnapshotLimit,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn unit_sticks(n: i64) -> Vec<Candlestick> {
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            Candlestick::with_values(
                Scalar::from(i),
                Scalar::from(i + 1),
                Scalar::from_money(close - 0.3),
                Scalar::from_money(close),
                Scalar::from_money(close + 1.5),
                Scalar::from_money(close - 1.5),
            )
        })
        .collect()
}

/// Candlesticks of widths 1, 5 and 20 over the same span: three layers.
fn mixed_sticks(n: i64) -> Vec<Candlestick> {
    let mut sticks = unit_sticks(n);
    for width in [5, 20] {
        sticks.extend(
            (0..n / width)
                .map(|i| Candlestick::new(Scalar::from(i * width), Scalar::from((i + 1) * width))),
        );
    }
    sticks
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

// ── 1. Store ingest ──────────────────────────────────────────────────

fn bench_store_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_ingest");

    for n in [1_000i64, 10_000] {
        let sticks = unit_sticks(n);
        group.bench_with_input(BenchmarkId::new("unit", n), &sticks, |b, sticks| {
            b.iter(|| {
                let store = LayeredIntervalStore::with_candlesticks(sticks.clone()).unwrap();
                black_box(store.len());
            });
        });

        let mixed = mixed_sticks(n);
        group.bench_with_input(BenchmarkId::new("mixed_widths", n), &mixed, |b, sticks| {
            b.iter(|| {
                let store = LayeredIntervalStore::with_candlesticks(sticks.clone()).unwrap();
                black_box(store.layer_count());
            });
        });
    }

    group.bench_function("batches_of_100_out_of_order", |b| {
        let batches: Vec<Vec<Candlestick>> = unit_sticks(10_000)
            .chunks(100)
            .rev()
            .map(|chunk| chunk.to_vec())
            .collect();
        b.iter(|| {
            let mut store = LayeredIntervalStore::new();
            for batch in &batches {
                store.store(batch.clone()).unwrap();
            }
            black_box(store.len());
        });
    });

    group.finish();
}

// ── 2. Store loads ───────────────────────────────────────────────────

fn bench_store_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_load");
    let store = LayeredIntervalStore::with_candlesticks(mixed_sticks(10_000)).unwrap();
    let first = Scalar::from(2_500);
    let last = Scalar::from(7_500);

    group.bench_function("unlimited_5000", |b| {
        b.iter(|| black_box(store.load(first, last, SnapshotLimit::Unlimited)));
    });
    group.bench_function("head_100", |b| {
        b.iter(|| black_box(store.load(first, last, SnapshotLimit::FromHead(100))));
    });
    group.bench_function("tail_100", |b| {
        b.iter(|| black_box(store.load(first, last, SnapshotLimit::FromTail(100))));
    });

    group.finish();
}

// ── 3 & 4. Cached source ─────────────────────────────────────────────

fn bench_cached_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_source");
    let rt = runtime();
    let model = Arc::new(
        LocalSource::new(ScalarKind::Money, ScalarKind::Money, unit_sticks(10_000)).unwrap(),
    );

    let warm = CachedSource::new(model.clone());
    rt.block_on(warm.load(Scalar::from(0), Scalar::from(10_000), SnapshotLimit::Unlimited))
        .unwrap();

    group.bench_function("warm_head_100", |b| {
        b.iter(|| {
            let sticks = rt
                .block_on(warm.load(
                    Scalar::from(4_000),
                    Scalar::from(6_000),
                    SnapshotLimit::FromHead(100),
                ))
                .unwrap();
            black_box(sticks);
        });
    });

    group.bench_function("fill_20_gaps", |b| {
        b.iter(|| {
            let cache = CachedSource::new(model.clone());
            rt.block_on(async {
                for i in 0..20i64 {
                    let lower = Scalar::from(i * 500);
                    let upper = Scalar::from(i * 500 + 250);
                    cache.load(lower, upper, SnapshotLimit::Unlimited).await.unwrap();
                }
                let all = cache
                    .load(Scalar::from(0), Scalar::from(10_000), SnapshotLimit::Unlimited)
                    .await
                    .unwrap();
                black_box(all);
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_store_ingest,
    bench_store_load,
    bench_cached_source,
);
criterion_main!(benches);
