//! Range storage, sources and the coalescing cache

pub mod cache;
pub mod interval;
pub mod local;
pub mod source;
pub mod store;

pub use cache::{CacheStats, CachedSource};
pub use interval::{Interval, IntervalSet};
pub use local::LocalSource;
pub use source::{CandlestickSource, SourceError};
pub use store::{LayeredIntervalStore, StoreError};
