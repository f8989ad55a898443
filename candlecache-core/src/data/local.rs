//! In-memory source backed by a layered interval store.

use super::source::{CandlestickSource, SourceError};
use super::store::{LayeredIntervalStore, StoreError};
use crate::domain::{Candlestick, Scalar, ScalarKind, SnapshotLimit};
use async_trait::async_trait;
use parking_lot::RwLock;

/// A source whose full history is already in memory.
///
/// Used for static datasets and as the reference answer in tests.
#[derive(Debug)]
pub struct LocalSource {
    x_axis: ScalarKind,
    y_axis: ScalarKind,
    store: RwLock<LayeredIntervalStore>,
}

impl LocalSource {
    pub fn new(
        x_axis: ScalarKind,
        y_axis: ScalarKind,
        candlesticks: Vec<Candlestick>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            x_axis,
            y_axis,
            store: RwLock::new(LayeredIntervalStore::with_candlesticks(candlesticks)?),
        })
    }

    /// Append more history.
    pub fn store(&self, candlesticks: Vec<Candlestick>) -> Result<(), StoreError> {
        self.store.write().store(candlesticks)
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    pub fn layer_count(&self) -> usize {
        self.store.read().layer_count()
    }

    pub fn span(&self) -> Option<(Scalar, Scalar)> {
        self.store.read().span()
    }

    /// Synchronous query, same answer as [`CandlestickSource::load`].
    pub fn load_now(&self, first: Scalar, last: Scalar, limit: SnapshotLimit) -> Vec<Candlestick> {
        self.store.read().load(first, last, limit)
    }
}

#[async_trait]
impl CandlestickSource for LocalSource {
    fn x_axis(&self) -> ScalarKind {
        self.x_axis
    }

    fn y_axis(&self) -> ScalarKind {
        self.y_axis
    }

    async fn load(
        &self,
        first: Scalar,
        last: Scalar,
        limit: SnapshotLimit,
    ) -> Result<Vec<Candlestick>, SourceError> {
        Ok(self.load_now(first, last, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_from_store() {
        let source = LocalSource::new(
            ScalarKind::Money,
            ScalarKind::Money,
            (0..10)
                .map(|i| Candlestick::new(Scalar::from(i), Scalar::from(i + 1)))
                .collect(),
        )
        .unwrap();
        assert_eq!(source.x_axis(), ScalarKind::Money);
        let sticks = source
            .load(Scalar::from(2), Scalar::from(4), SnapshotLimit::Unlimited)
            .await
            .unwrap();
        assert_eq!(sticks.len(), 4);
        assert_eq!(sticks[0].start, Scalar::from(1));
    }

    #[test]
    fn appends_history() {
        let source = LocalSource::new(ScalarKind::Timestamp, ScalarKind::Money, vec![]).unwrap();
        assert!(source.is_empty());
        source
            .store(vec![Candlestick::new(Scalar::from(0), Scalar::from(5))])
            .unwrap();
        assert_eq!(source.len(), 1);
        assert_eq!(source.layer_count(), 1);
    }
}
