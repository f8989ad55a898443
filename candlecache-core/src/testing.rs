//! Test doubles for candlestick sources.
//!
//! - `CountingSource` records every request before delegating
//! - `ManualSource` parks each load until the test answers it
//! - `YieldingSource` yields to the scheduler before delegating, to force interleavings
//! - `FailingSource` rejects every load

use crate::data::{CandlestickSource, SourceError};
use crate::domain::{Candlestick, Scalar, ScalarKind, SnapshotLimit};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

/// One request as seen by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadRequest {
    pub first: Scalar,
    pub last: Scalar,
    pub limit: SnapshotLimit,
}

/// Delegates to an inner source and records every request.
pub struct CountingSource<S> {
    inner: S,
    requests: Mutex<Vec<LoadRequest>>,
}

impl<S> CountingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<LoadRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl<S: CandlestickSource> CandlestickSource for CountingSource<S> {
    fn x_axis(&self) -> ScalarKind {
        self.inner.x_axis()
    }

    fn y_axis(&self) -> ScalarKind {
        self.inner.y_axis()
    }

    async fn load(
        &self,
        first: Scalar,
        last: Scalar,
        limit: SnapshotLimit,
    ) -> Result<Vec<Candlestick>, SourceError> {
        self.requests.lock().push(LoadRequest { first, last, limit });
        self.inner.load(first, last, limit).await
    }
}

/// A load parked inside a [`ManualSource`], waiting for the test to answer it.
pub struct ManualLoad {
    request: LoadRequest,
    responder: oneshot::Sender<Result<Vec<Candlestick>, SourceError>>,
}

impl ManualLoad {
    pub fn first(&self) -> Scalar {
        self.request.first
    }

    pub fn last(&self) -> Scalar {
        self.request.last
    }

    pub fn limit(&self) -> SnapshotLimit {
        self.request.limit
    }

    pub fn request(&self) -> LoadRequest {
        self.request
    }

    pub fn set_result(self, candlesticks: Vec<Candlestick>) {
        let _ = self.responder.send(Ok(candlesticks));
    }

    pub fn set_error(self, error: SourceError) {
        let _ = self.responder.send(Err(error));
    }
}

/// A source whose loads complete only when the test says so.
///
/// Dropping a [`ManualLoad`] without answering it fails the load with
/// [`SourceError::Abandoned`].
pub struct ManualSource {
    x_axis: ScalarKind,
    y_axis: ScalarKind,
    sender: mpsc::UnboundedSender<ManualLoad>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<ManualLoad>>,
}

impl ManualSource {
    pub fn new(x_axis: ScalarKind, y_axis: ScalarKind) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            x_axis,
            y_axis,
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    /// Next parked load, waiting for one to arrive.
    pub async fn pop_load(&self) -> Option<ManualLoad> {
        self.receiver.lock().await.recv().await
    }

    /// Next parked load if one is already queued.
    pub fn try_pop_load(&self) -> Option<ManualLoad> {
        self.receiver.try_lock().ok()?.try_recv().ok()
    }
}

#[async_trait]
impl CandlestickSource for ManualSource {
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
        let (responder, response) = oneshot::channel();
        let load = ManualLoad {
            request: LoadRequest { first, last, limit },
            responder,
        };
        self.sender
            .send(load)
            .map_err(|_| SourceError::Unavailable("manual source closed".into()))?;
        response
            .await
            .unwrap_or(Err(SourceError::Abandoned { first, last }))
    }
}

/// Yields to the scheduler `yields` times before each delegated load.
pub struct YieldingSource<S> {
    inner: S,
    yields: usize,
}

impl<S> YieldingSource<S> {
    pub fn new(inner: S, yields: usize) -> Self {
        Self { inner, yields }
    }
}

#[async_trait]
impl<S: CandlestickSource> CandlestickSource for YieldingSource<S> {
    fn x_axis(&self) -> ScalarKind {
        self.inner.x_axis()
    }

    fn y_axis(&self) -> ScalarKind {
        self.inner.y_axis()
    }

    async fn load(
        &self,
        first: Scalar,
        last: Scalar,
        limit: SnapshotLimit,
    ) -> Result<Vec<Candlestick>, SourceError> {
        for _ in 0..self.yields {
            tokio::task::yield_now().await;
        }
        self.inner.load(first, last, limit).await
    }
}

/// Rejects every load with [`SourceError::Upstream`].
pub struct FailingSource {
    message: String,
}

impl FailingSource {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl CandlestickSource for FailingSource {
    fn x_axis(&self) -> ScalarKind {
        ScalarKind::Timestamp
    }

    fn y_axis(&self) -> ScalarKind {
        ScalarKind::Money
    }

    async fn load(
        &self,
        _first: Scalar,
        _last: Scalar,
        _limit: SnapshotLimit,
    ) -> Result<Vec<Candlestick>, SourceError> {
        Err(SourceError::Upstream(self.message.clone()))
    }
}
