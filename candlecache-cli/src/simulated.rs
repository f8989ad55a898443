//! Simulated slow upstream.
//!
//! Wraps a source and delays every load by a fixed latency plus seeded
//! random jitter, standing in for a remote candlestick service.

use async_trait::async_trait;
use candlecache_core::{
    Candlestick, CandlestickSource, Scalar, ScalarKind, SnapshotLimit, SourceError,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::UpstreamConfig;

pub struct DelayedSource<S> {
    inner: S,
    latency: Duration,
    jitter_ms: u64,
    rng: Mutex<StdRng>,
    requests: AtomicU64,
}

impl<S> DelayedSource<S> {
    pub fn new(inner: S, config: &UpstreamConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            inner,
            latency: Duration::from_millis(config.latency_ms),
            jitter_ms: config.jitter_ms,
            rng: Mutex::new(rng),
            requests: AtomicU64::new(0),
        }
    }

    /// Loads that reached this source.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn next_delay(&self) -> Duration {
        if self.jitter_ms == 0 {
            return self.latency;
        }
        let jitter = self.rng.lock().gen_range(0..=self.jitter_ms);
        self.latency + Duration::from_millis(jitter)
    }
}

#[async_trait]
impl<S: CandlestickSource> CandlestickSource for DelayedSource<S> {
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
        let n = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = self.next_delay();
        let x_axis = self.inner.x_axis();
        tracing::info!(
            request = n,
            first = %x_axis.format(first),
            last = %x_axis.format(last),
            ?limit,
            delay_ms = delay.as_millis() as u64,
            "upstream request"
        );
        tokio::time::sleep(delay).await;
        self.inner.load(first, last, limit).await
    }
}
