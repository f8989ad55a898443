//! Property tests for the coalescing cache.
//!
//! Uses proptest to verify:
//! 1. Round trip: the cache answers every query exactly like the source it wraps
//! 2. Concurrency: interleaved callers still get exact answers
//! 3. Single flight: unlimited loads never request the same range twice
//! 4. Coverage: a completed unlimited load leaves its range cached

use candlecache_core::testing::{CountingSource, YieldingSource};
use candlecache_core::{
    CachedSource, Candlestick, CandlestickSource, LocalSource, Scalar, ScalarKind, SnapshotLimit,
};
use futures::future::join_all;
use proptest::prelude::*;
use std::sync::Arc;

type Query = (i64, i64, SnapshotLimit);
type Upstream = Arc<CountingSource<YieldingSource<Arc<LocalSource>>>>;
type Harness = CachedSource<Upstream>;

// ── Fixtures ─────────────────────────────────────────────────────────

fn stick(start: i64, end: i64) -> Candlestick {
    Candlestick::new(Scalar::from(start), Scalar::from(end))
}

fn unit_model() -> Arc<LocalSource> {
    Arc::new(
        LocalSource::new(
            ScalarKind::Money,
            ScalarKind::Money,
            (0..101).map(|i| stick(i, i + 1)).collect(),
        )
        .unwrap(),
    )
}

/// Long candlesticks ending together at 40 and starting together at 45.
fn coincident_model() -> Arc<LocalSource> {
    let mut sticks = vec![
        stick(1, 40),
        stick(10, 40),
        stick(20, 40),
        stick(30, 40),
        stick(39, 40),
        stick(45, 46),
        stick(45, 50),
        stick(45, 60),
        stick(45, 70),
        stick(45, 80),
    ];
    sticks.extend((40..45).map(|i| stick(i, i + 1)));
    sticks.extend((46..90).map(|i| stick(i, i + 1)));
    Arc::new(LocalSource::new(ScalarKind::Money, ScalarKind::Money, sticks).unwrap())
}

fn harness(model: &Arc<LocalSource>, yields: usize) -> (Harness, Upstream) {
    let counting = Arc::new(CountingSource::new(YieldingSource::new(model.clone(), yields)));
    (CachedSource::new(counting.clone()), counting)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// Run all queries concurrently on one task and return the answers in query order.
async fn run_concurrently(cache: &Harness, queries: &[Query]) -> Vec<Vec<Candlestick>> {
    join_all(queries.iter().map(|&(first, last, limit)| async move {
        cache
            .load(Scalar::from(first), Scalar::from(last), limit)
            .await
            .unwrap()
    }))
    .await
}

fn expected(model: &LocalSource, &(first, last, limit): &Query) -> Vec<Candlestick> {
    model.load_now(Scalar::from(first), Scalar::from(last), limit)
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_limit() -> impl Strategy<Value = SnapshotLimit> {
    prop_oneof![
        Just(SnapshotLimit::Unlimited),
        (0usize..30).prop_map(SnapshotLimit::FromHead),
        (0usize..30).prop_map(SnapshotLimit::FromTail),
    ]
}

fn arb_head_limit() -> impl Strategy<Value = SnapshotLimit> {
    prop_oneof![
        Just(SnapshotLimit::Unlimited),
        (0usize..30).prop_map(SnapshotLimit::FromHead),
    ]
}

fn arb_query(limit: impl Strategy<Value = SnapshotLimit>) -> impl Strategy<Value = Query> {
    (-5i64..106, 0i64..40, limit).prop_map(|(first, len, limit)| (first, first + len, limit))
}

// ── 1. Round trip ────────────────────────────────────────────────────

proptest! {
    /// Sequential queries with any limit match the wrapped source.
    #[test]
    fn sequential_round_trip(queries in prop::collection::vec(arb_query(arb_limit()), 1..10)) {
        let model = unit_model();
        let (cache, _) = harness(&model, 0);
        runtime().block_on(async {
            for query in &queries {
                let (first, last, limit) = *query;
                let actual = cache
                    .load(Scalar::from(first), Scalar::from(last), limit)
                    .await
                    .unwrap();
                assert_eq!(actual, expected(&model, query), "query {query:?}");
            }
        });
    }

    /// Head-anchored queries stay exact over long, coincident candlesticks.
    #[test]
    fn coincident_head_round_trip(
        queries in prop::collection::vec(arb_query(arb_head_limit()), 1..10),
    ) {
        let model = coincident_model();
        let (cache, _) = harness(&model, 0);
        runtime().block_on(async {
            for query in &queries {
                let (first, last, limit) = *query;
                let actual = cache
                    .load(Scalar::from(first), Scalar::from(last), limit)
                    .await
                    .unwrap();
                assert_eq!(actual, expected(&model, query), "query {query:?}");
            }
        });
    }
}

// ── 2. Concurrency ───────────────────────────────────────────────────

proptest! {
    /// Interleaved callers each get the answer the source would give them.
    #[test]
    fn concurrent_round_trip(
        queries in prop::collection::vec(arb_query(arb_limit()), 1..6),
        yields in 0usize..4,
    ) {
        let model = unit_model();
        let (cache, _) = harness(&model, yields);
        let answers = runtime().block_on(run_concurrently(&cache, &queries));
        for (query, answer) in queries.iter().zip(&answers) {
            prop_assert_eq!(answer, &expected(&model, query), "query {:?}", query);
        }
    }

    /// Same, over coincident candlesticks with head-anchored limits.
    #[test]
    fn concurrent_coincident_head_round_trip(
        queries in prop::collection::vec(arb_query(arb_head_limit()), 1..6),
        yields in 0usize..4,
    ) {
        let model = coincident_model();
        let (cache, _) = harness(&model, yields);
        let answers = runtime().block_on(run_concurrently(&cache, &queries));
        for (query, answer) in queries.iter().zip(&answers) {
            prop_assert_eq!(answer, &expected(&model, query), "query {:?}", query);
        }
    }
}

// ── 3 & 4. Single flight and coverage ────────────────────────────────

proptest! {
    /// Upstream requests for unlimited loads overlap at most at a shared
    /// endpoint, each lies inside a query, and every query ends up cached.
    #[test]
    fn unlimited_requests_are_disjoint(
        queries in prop::collection::vec(arb_query(Just(SnapshotLimit::Unlimited)), 1..8),
        yields in 0usize..4,
    ) {
        let model = unit_model();
        let (cache, counting) = harness(&model, yields);
        runtime().block_on(run_concurrently(&cache, &queries));

        let requests = counting.requests();
        for (i, a) in requests.iter().enumerate() {
            prop_assert!(
                queries
                    .iter()
                    .any(|&(first, last, _)| {
                        Scalar::from(first) <= a.first && a.last <= Scalar::from(last)
                    }),
                "request {:?} outside every query", a
            );
            for b in &requests[i + 1..] {
                prop_assert!(
                    a.last <= b.first || b.last <= a.first,
                    "requests {:?} and {:?} overlap", a, b
                );
            }
        }

        let cached = cache.cached_intervals();
        for &(first, last, _) in &queries {
            prop_assert!(
                cached
                    .iter()
                    .any(|c| c.covers(Scalar::from(first), Scalar::from(last))),
                "[{}, {}] not cached: {:?}", first, last, cached
            );
        }
        prop_assert!(cache.pending_intervals().is_empty());
    }
}

// ── Orderings ────────────────────────────────────────────────────────

/// Every permutation of `items`, by Heap's algorithm.
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn heap<T: Clone>(k: usize, items: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        heap(k - 1, items, out);
        for i in 0..k - 1 {
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
            heap(k - 1, items, out);
        }
    }
    let mut items = items.to_vec();
    let mut out = Vec::new();
    heap(items.len(), &mut items, &mut out);
    out
}

#[test]
fn every_ordering_of_overlapping_queries_agrees() {
    let unit_queries: Vec<Query> = vec![
        (40, 60, SnapshotLimit::Unlimited),
        (50, 70, SnapshotLimit::FromHead(8)),
        (30, 55, SnapshotLimit::FromTail(12)),
        (45, 45, SnapshotLimit::Unlimited),
    ];
    let coincident_queries: Vec<Query> = vec![
        (40, 40, SnapshotLimit::FromHead(3)),
        (35, 50, SnapshotLimit::Unlimited),
        (45, 45, SnapshotLimit::FromHead(4)),
        (38, 46, SnapshotLimit::FromHead(9)),
    ];
    let rt = runtime();

    for (model, queries) in [
        (unit_model(), unit_queries),
        (coincident_model(), coincident_queries),
    ] {
        let orderings = permutations(&queries);
        assert_eq!(orderings.len(), 24);
        for ordering in orderings {
            for yields in [0, 1, 3] {
                let (cache, _) = harness(&model, yields);
                let answers = rt.block_on(run_concurrently(&cache, &ordering));
                for (query, answer) in ordering.iter().zip(&answers) {
                    assert_eq!(
                        answer,
                        &expected(&model, query),
                        "query {query:?} in {ordering:?} with {yields} yields"
                    );
                }
            }
        }
    }
}
