//! Coalescing range cache in front of a slow candlestick source.
//!
//! `CachedSource` wraps any [`CandlestickSource`] and answers the same `load`
//! calls. It tracks two kinds of x-axis ranges:
//! - cached: every upstream candlestick touching the range is in the local store
//! - pending: an upstream load for the range is in flight
//!
//! A query is resolved from the side its limit counts from (the bound):
//! - bound inside a cached range: serve that slice from the store, then
//!   recurse on whatever is left if the limit is not yet met;
//! - bound inside a pending range: wait for it to resolve, then start over;
//! - otherwise: request the uncovered gap up to the nearest cached or pending
//!   range, store the answer, and start over if the limit is not yet met.
//!
//! Each uncovered gap is requested once, however many callers ask for it
//! concurrently.
//!
//! # Thread Safety
//!
//! All state sits behind one mutex that is never held across an `.await`.
//! Waiter registration and load completion both happen under that lock, so
//! a wakeup cannot be lost.

use super::interval::{Interval, IntervalSet};
use super::source::{CandlestickSource, SourceError};
use super::store::LayeredIntervalStore;
use crate::domain::{Anchor, Candlestick, Scalar, ScalarKind, SnapshotLimit};
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

type Waiter = oneshot::Sender<Result<(), SourceError>>;

/// Pending loads are keyed by `(lower, upper)`: two in-flight ranges may share
/// a lower bound when one of them is a single point.
type PendingKey = (Scalar, Scalar);

#[derive(Default)]
struct PendingLoad {
    waiters: Vec<Waiter>,
}

#[derive(Default)]
struct CacheState {
    store: LayeredIntervalStore,
    cached: IntervalSet,
    pending: BTreeMap<PendingKey, PendingLoad>,
}

/// What to do next for one query.
enum Plan {
    /// Fully answered from the store.
    Served(Vec<Candlestick>),
    /// Partly answered; the rest of the range still has to be loaded.
    Partial {
        served: Vec<Candlestick>,
        first: Scalar,
        last: Scalar,
        limit: SnapshotLimit,
    },
    /// Another caller is loading the bound; wait for it.
    Wait(oneshot::Receiver<Result<(), SourceError>>),
    /// Nobody has this range; request it upstream.
    Fetch(Interval),
}

/// Snapshot of cache activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Loads issued to the wrapped source.
    pub upstream_requests: u64,
    /// Queries (or query slices) answered from the local store.
    pub served_from_store: u64,
    /// Times a caller waited on another caller's in-flight load.
    pub coalesced_waits: u64,
    /// Upstream loads that failed.
    pub upstream_failures: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    upstream_requests: AtomicU64,
    served_from_store: AtomicU64,
    coalesced_waits: AtomicU64,
    upstream_failures: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            upstream_requests: self.upstream_requests.load(Ordering::Relaxed),
            served_from_store: self.served_from_store.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
        }
    }
}

/// Caching decorator over a [`CandlestickSource`].
///
/// One instance per data series. The cache is unbounded and never evicts.
pub struct CachedSource<S> {
    source: S,
    state: Mutex<CacheState>,
    stats: StatsCounters,
}

impl<S: CandlestickSource> CachedSource<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: Mutex::new(CacheState::default()),
            stats: StatsCounters::default(),
        }
    }

    /// The wrapped source.
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Ranges fully backed by the local store, ascending.
    pub fn cached_intervals(&self) -> Vec<Interval> {
        self.state.lock().cached.iter().collect()
    }

    /// Ranges with an upstream load in flight, ascending.
    pub fn pending_intervals(&self) -> Vec<Interval> {
        self.state
            .lock()
            .pending
            .keys()
            .map(|&(lower, upper)| Interval { lower, upper })
            .collect()
    }

    /// Number of distinct candlesticks held locally.
    pub fn stored_len(&self) -> usize {
        self.state.lock().store.len()
    }

    fn load_range(
        &self,
        first: Scalar,
        last: Scalar,
        limit: SnapshotLimit,
    ) -> BoxFuture<'_, Result<Vec<Candlestick>, SourceError>> {
        Box::pin(async move {
            loop {
                match self.plan(first, last, limit) {
                    Plan::Served(sticks) => return Ok(sticks),
                    Plan::Partial {
                        served,
                        first: rest_first,
                        last: rest_last,
                        limit: rest_limit,
                    } => {
                        let rest = self.load_range(rest_first, rest_last, rest_limit).await?;
                        return Ok(splice(served, rest, limit));
                    }
                    Plan::Wait(receiver) => match receiver.await {
                        Ok(Err(e)) => return Err(e),
                        // Resolved, or the loader was dropped: look again.
                        Ok(Ok(())) | Err(_) => continue,
                    },
                    Plan::Fetch(range) => {
                        let sticks = self.fetch(range, limit).await?;
                        if limit.is_saturated_by(sticks.len()) {
                            return Ok(sticks);
                        }
                    }
                }
            }
        })
    }

    fn plan(&self, first: Scalar, last: Scalar, limit: SnapshotLimit) -> Plan {
        if limit.is_empty() || first > last {
            return Plan::Served(Vec::new());
        }
        let anchor = limit.anchor();
        let mut state = self.state.lock();

        let cached = state
            .cached
            .nearest_overlap(first, last, anchor)
            .filter(|c| c.holds_bound(first, last, anchor));
        if let Some(cached) = cached {
            StatsCounters::bump(&self.stats.served_from_store);
            return serve(&state.store, cached, first, last, limit);
        }

        if let Some(key) = state.pending_holding(first, last, anchor) {
            let (sender, receiver) = oneshot::channel();
            if let Some(pending) = state.pending.get_mut(&key) {
                pending.waiters.push(sender);
            }
            StatsCounters::bump(&self.stats.coalesced_waits);
            tracing::debug!(
                first = %first,
                last = %last,
                pending_lower = %key.0,
                pending_upper = %key.1,
                "waiting on in-flight load"
            );
            return Plan::Wait(receiver);
        }

        let range = state.uncovered_gap(first, last, anchor);
        state
            .pending
            .insert((range.lower, range.upper), PendingLoad::default());
        Plan::Fetch(range)
    }

    /// Load `range` upstream, publish the outcome to waiters, and record what
    /// is now cached.
    async fn fetch(
        &self,
        range: Interval,
        limit: SnapshotLimit,
    ) -> Result<Vec<Candlestick>, SourceError> {
        let mut guard = PendingGuard {
            state: &self.state,
            key: (range.lower, range.upper),
            armed: true,
        };
        StatsCounters::bump(&self.stats.upstream_requests);
        tracing::debug!(first = %range.lower, last = %range.upper, ?limit, "loading upstream");

        let result = self.source.load(range.lower, range.upper, limit).await;

        let mut state = self.state.lock();
        let waiters = state
            .pending
            .remove(&guard.key)
            .map(|p| p.waiters)
            .unwrap_or_default();
        guard.armed = false;

        let result = result.and_then(|sticks| {
            state
                .store
                .store(sticks.clone())
                .map_err(|e| SourceError::Upstream(e.to_string()))?;
            Ok(sticks)
        });
        match &result {
            Ok(sticks) => {
                if let Some(covered) = coverage(range, sticks, limit) {
                    state.cached.insert(covered);
                }
                drop(state);
                for waiter in waiters {
                    let _ = waiter.send(Ok(()));
                }
            }
            Err(e) => {
                drop(state);
                StatsCounters::bump(&self.stats.upstream_failures);
                tracing::warn!(
                    first = %range.lower,
                    last = %range.upper,
                    error = %e,
                    waiters = waiters.len(),
                    "upstream load failed"
                );
                for waiter in waiters {
                    let _ = waiter.send(Err(e.clone()));
                }
            }
        }
        result
    }
}

impl CacheState {
    /// Key of an in-flight load that holds the query's bound.
    fn pending_holding(&self, first: Scalar, last: Scalar, anchor: Anchor) -> Option<PendingKey> {
        let holding = self
            .pending
            .range(..=(last, Scalar::MAX))
            .map(|(&key, _)| key)
            .filter(|&(lower, upper)| Interval { lower, upper }.holds_bound(first, last, anchor));
        match anchor {
            Anchor::Head => holding.min_by_key(|&(lower, _)| lower),
            Anchor::Tail => holding.max_by_key(|&(_, upper)| upper),
        }
    }

    /// `[first, last]` clipped so it stops at the nearest cached or pending
    /// range on the far side of the bound.
    fn uncovered_gap(&self, first: Scalar, last: Scalar, anchor: Anchor) -> Interval {
        match anchor {
            Anchor::Head => {
                let cached = self.cached.next_lower_after(first);
                let pending = self
                    .pending
                    .keys()
                    .map(|&(lower, _)| lower)
                    .find(|&lower| lower > first);
                let upper = [Some(last), cached, pending]
                    .into_iter()
                    .flatten()
                    .min()
                    .unwrap_or(last);
                Interval::new(first, upper)
            }
            Anchor::Tail => {
                let cached = self.cached.prev_upper_before(last);
                let pending = self
                    .pending
                    .keys()
                    .map(|&(_, upper)| upper)
                    .filter(|&upper| upper < last)
                    .max();
                let lower = [Some(first), cached, pending]
                    .into_iter()
                    .flatten()
                    .max()
                    .unwrap_or(first);
                Interval::new(lower, last)
            }
        }
    }
}

/// Answer the slice of `[first, last]` inside `cached` from the store.
fn serve(
    store: &LayeredIntervalStore,
    cached: Interval,
    first: Scalar,
    last: Scalar,
    limit: SnapshotLimit,
) -> Plan {
    let (slice_first, slice_last, boundary, reaches_end) = match limit.anchor() {
        Anchor::Head => (
            first,
            last.min(cached.upper),
            cached.upper,
            cached.upper >= last,
        ),
        Anchor::Tail => (
            first.max(cached.lower),
            last,
            cached.lower,
            cached.lower <= first,
        ),
    };
    let served = store.load(slice_first, slice_last, limit);
    tracing::trace!(
        first = %slice_first,
        last = %slice_last,
        count = served.len(),
        "served from store"
    );
    if reaches_end || limit.is_saturated_by(served.len()) {
        return Plan::Served(served);
    }

    // Candlesticks straddling the boundary come back again from the
    // remainder, so the remainder's limit makes room for them.
    let straddling = served.iter().filter(|c| c.contains(boundary)).count();
    let remaining = limit
        .size()
        .saturating_sub(served.len())
        .saturating_add(straddling);
    let (rest_first, rest_last) = match limit.anchor() {
        Anchor::Head => (boundary, last),
        Anchor::Tail => (first, boundary),
    };
    Plan::Partial {
        served,
        first: rest_first,
        last: rest_last,
        limit: limit.with_size(remaining),
    }
}

/// Merge a served slice with the remainder's answer: ascending, without the
/// repeated boundary candlesticks, trimmed to `limit` from its anchored side.
fn splice(
    served: Vec<Candlestick>,
    rest: Vec<Candlestick>,
    limit: SnapshotLimit,
) -> Vec<Candlestick> {
    let mut merged = served;
    merged.extend(rest);
    merged.sort_by_key(Candlestick::key);
    merged.dedup();
    let size = limit.size();
    if merged.len() > size {
        match limit.anchor() {
            Anchor::Head => merged.truncate(size),
            Anchor::Tail => {
                merged.drain(..merged.len() - size);
            }
        }
    }
    merged
}

/// The part of `range` a completed load proves is fully stored.
///
/// An unsaturated answer covers the whole range. A saturated head answer
/// covers everything before the last start (candlesticks sharing that start
/// may have been cut off). A saturated tail answer covers from the first
/// candlestick's end.
fn coverage(range: Interval, sticks: &[Candlestick], limit: SnapshotLimit) -> Option<Interval> {
    if !limit.is_saturated_by(sticks.len()) {
        return Some(range);
    }
    match limit.anchor() {
        Anchor::Head => {
            let last_start = sticks.iter().map(|c| c.start).max()?;
            let upper = last_start.next_down().min(range.upper);
            (upper >= range.lower).then(|| Interval::new(range.lower, upper))
        }
        Anchor::Tail => {
            let first_end = sticks.iter().min_by_key(|c| c.key())?.end;
            let lower = first_end.max(range.lower);
            (lower <= range.upper).then(|| Interval::new(lower, range.upper))
        }
    }
}

/// Releases a pending entry if its loader is dropped before completing.
///
/// Dropping the entry drops its waiters' senders; they wake up and retry.
struct PendingGuard<'a> {
    state: &'a Mutex<CacheState>,
    key: PendingKey,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(
                first = %self.key.0,
                last = %self.key.1,
                "upstream load abandoned"
            );
            self.state.lock().pending.remove(&self.key);
        }
    }
}

#[async_trait]
impl<S: CandlestickSource> CandlestickSource for CachedSource<S> {
    fn x_axis(&self) -> ScalarKind {
        self.source.x_axis()
    }

    fn y_axis(&self) -> ScalarKind {
        self.source.y_axis()
    }

    async fn load(
        &self,
        first: Scalar,
        last: Scalar,
        limit: SnapshotLimit,
    ) -> Result<Vec<Candlestick>, SourceError> {
        self.load_range(first, last, limit).await
    }
}
