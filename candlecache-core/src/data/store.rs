//! Layered interval store.
//!
//! Candlesticks whose ranges overlap cannot share one sorted map, so the store
//! keeps several layers. Within a layer no two candlesticks overlap, which
//! makes each layer a chain that can be scanned forwards or backwards from a
//! single seek. A query merges the per-layer scans by `(start, end)`.
//!
//! Placement rule for a candlestick `c`:
//! - an exact `(start, end)` match in any layer is overwritten in place;
//! - otherwise `c` goes into the first layer where it neither shares a key
//!   with nor overlaps its neighbours (touching at an end point is fine);
//! - if no layer accepts it, a new layer is opened.

use crate::domain::{Candlestick, Scalar, SnapshotLimit};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::ops::Bound::{Excluded, Unbounded};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("candlestick range is inverted: start {start} > end {end}")]
    InvalidRange { start: Scalar, end: Scalar },
}

type Layer = BTreeMap<Scalar, Candlestick>;

/// Holds candlesticks, overlapping or not, and answers bounded range queries.
#[derive(Debug, Clone, Default)]
pub struct LayeredIntervalStore {
    layers: Vec<Layer>,
}

impl LayeredIntervalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store seeded with `candlesticks`.
    pub fn with_candlesticks(candlesticks: Vec<Candlestick>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        store.store(candlesticks)?;
        Ok(store)
    }

    /// Number of distinct candlesticks held.
    pub fn len(&self) -> usize {
        self.layers.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(BTreeMap::is_empty)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Smallest start and largest end across all layers.
    pub fn span(&self) -> Option<(Scalar, Scalar)> {
        let start = self
            .layers
            .iter()
            .filter_map(|l| l.keys().next().copied())
            .min()?;
        let end = self
            .layers
            .iter()
            .flat_map(|l| l.values().map(|c| c.end))
            .max()?;
        Some((start, end))
    }

    /// Insert candlesticks. Input is sorted by `(start, end)` before placement.
    ///
    /// Validation happens up front: an invalid candlestick rejects the whole
    /// batch and leaves the store untouched.
    pub fn store(&mut self, mut candlesticks: Vec<Candlestick>) -> Result<(), StoreError> {
        if let Some(bad) = candlesticks.iter().find(|c| !c.is_valid()) {
            return Err(StoreError::InvalidRange {
                start: bad.start,
                end: bad.end,
            });
        }
        candlesticks.sort_by_key(Candlestick::key);
        for candlestick in candlesticks {
            self.place(candlestick);
        }
        Ok(())
    }

    fn place(&mut self, candlestick: Candlestick) {
        for layer in &mut self.layers {
            if let Some(existing) = layer.get_mut(&candlestick.start) {
                if existing.end == candlestick.end {
                    *existing = candlestick;
                    return;
                }
            }
        }
        match self.layers.iter().position(|l| accepts(l, &candlestick)) {
            Some(index) => {
                self.layers[index].insert(candlestick.start, candlestick);
            }
            None => {
                tracing::trace!(
                    start = %candlestick.start,
                    end = %candlestick.end,
                    layer = self.layers.len(),
                    "opening new store layer"
                );
                let mut layer = Layer::new();
                layer.insert(candlestick.start, candlestick);
                self.layers.push(layer);
            }
        }
    }

    /// Candlesticks intersecting `[first, last]`, bounded by `limit`, in
    /// ascending `(start, end)` order regardless of which side the limit counts from.
    pub fn load(&self, first: Scalar, last: Scalar, limit: SnapshotLimit) -> Vec<Candlestick> {
        if limit.is_empty() || first > last {
            return Vec::new();
        }
        match limit {
            SnapshotLimit::Unlimited | SnapshotLimit::FromHead(_) => {
                self.load_from_head(first, last, limit.size())
            }
            SnapshotLimit::FromTail(n) => self.load_from_tail(first, last, n),
        }
    }

    fn load_from_head(&self, first: Scalar, last: Scalar, size: usize) -> Vec<Candlestick> {
        let mut cursors: Vec<Peekable<btree_map::Range<'_, Scalar, Candlestick>>> = self
            .layers
            .iter()
            .filter_map(|layer| head_seed(layer, first).map(|key| layer.range(key..).peekable()))
            .collect();
        let mut result = Vec::new();
        while result.len() < size {
            let next = cursors
                .iter_mut()
                .enumerate()
                .filter_map(|(i, cursor)| {
                    cursor
                        .peek()
                        .filter(|(_, c)| c.start <= last)
                        .map(|(_, c)| (i, c.key()))
                })
                .min_by_key(|&(_, key)| key);
            let Some((index, _)) = next else {
                break;
            };
            if let Some((_, candlestick)) = cursors[index].next() {
                result.push(*candlestick);
            }
        }
        result
    }

    fn load_from_tail(&self, first: Scalar, last: Scalar, size: usize) -> Vec<Candlestick> {
        let mut cursors: Vec<_> = self
            .layers
            .iter()
            .map(|layer| layer.range(..=last).rev().peekable())
            .collect();
        let mut result = Vec::new();
        while result.len() < size {
            let next = cursors
                .iter_mut()
                .enumerate()
                .filter_map(|(i, cursor)| {
                    cursor
                        .peek()
                        .filter(|(_, c)| c.end >= first)
                        .map(|(_, c)| (i, c.key()))
                })
                .max_by_key(|&(_, key)| key);
            let Some((index, _)) = next else {
                break;
            };
            if let Some((_, candlestick)) = cursors[index].next() {
                result.push(*candlestick);
            }
        }
        result.reverse();
        result
    }
}

/// Whether `layer` can take `candlestick` without an overlap or key clash.
fn accepts(layer: &Layer, candlestick: &Candlestick) -> bool {
    if let Some((&key, prev)) = layer.range(..=candlestick.start).next_back() {
        if key == candlestick.start || prev.end > candlestick.start {
            return false;
        }
    }
    match layer
        .range((Excluded(candlestick.start), Unbounded))
        .next()
    {
        Some((&next_start, _)) => next_start >= candlestick.end,
        None => true,
    }
}

/// Key of the first candlestick in `layer` whose end reaches `first`.
///
/// Ends never decrease along a layer, so this walks back from the seek point
/// over every candlestick that still touches `first`.
fn head_seed(layer: &Layer, first: Scalar) -> Option<Scalar> {
    let touching = layer
        .range(..=first)
        .rev()
        .take_while(|(_, c)| c.end >= first)
        .last()
        .map(|(&key, _)| key);
    touching.or_else(|| {
        layer
            .range((Excluded(first), Unbounded))
            .next()
            .map(|(&key, _)| key)
    })
}
