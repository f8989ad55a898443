//! Candlecache Core: interval-coalescing range cache for candlestick series.
//!
//! This crate serves windowed time-series queries from a slow upstream source:
//! - Domain types (axis scalars, candlesticks, snapshot limits)
//! - Layered interval store that keeps overlapping candlesticks queryable
//! - `CandlestickSource` trait shared by local stores, remote adapters and caches
//! - `CachedSource` decorator that coalesces concurrent loads of the same range
//! - Test doubles for driving sources by hand

pub mod data;
pub mod domain;
pub mod testing;

pub use data::{
    CacheStats, CachedSource, CandlestickSource, Interval, IntervalSet, LayeredIntervalStore,
    LocalSource, SourceError, StoreError,
};
pub use domain::{Anchor, Candlestick, Scalar, ScalarKind, SnapshotLimit};
