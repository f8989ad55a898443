//! Candlestick source trait and structured error types.
//!
//! The CandlestickSource trait is the one capability shared by every model in
//! the crate: the local store, the coalescing cache and remote adapters all
//! answer `load(first, last, limit)`, so a cache can stand in for the source it
//! wraps.

use crate::domain::{Candlestick, Scalar, ScalarKind, SnapshotLimit};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Structured error types for range loads.
///
/// Clone so one upstream failure can be handed to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("upstream load failed: {0}")]
    Upstream(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("load of [{first}, {last}] was abandoned before it resolved")]
    Abandoned { first: Scalar, last: Scalar },
}

/// Trait for anything that can answer windowed candlestick queries.
#[async_trait]
pub trait CandlestickSource: Send + Sync {
    /// Domain of the x-axis (the axis ranges are expressed in).
    fn x_axis(&self) -> ScalarKind;

    /// Domain of the candlestick payload values.
    fn y_axis(&self) -> ScalarKind;

    /// Candlesticks intersecting `[first, last]`, bounded by `limit`, in
    /// ascending `(start, end)` order.
    async fn load(
        &self,
        first: Scalar,
        last: Scalar,
        limit: SnapshotLimit,
    ) -> Result<Vec<Candlestick>, SourceError>;
}

#[async_trait]
impl<T: CandlestickSource + ?Sized> CandlestickSource for Arc<T> {
    fn x_axis(&self) -> ScalarKind {
        (**self).x_axis()
    }

    fn y_axis(&self) -> ScalarKind {
        (**self).y_axis()
    }

    async fn load(
        &self,
        first: Scalar,
        last: Scalar,
        limit: SnapshotLimit,
    ) -> Result<Vec<Candlestick>, SourceError> {
        (**self).load(first, last, limit).await
    }
}
