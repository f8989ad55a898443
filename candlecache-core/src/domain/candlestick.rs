//! Candlestick: an immutable aggregate over a range of the x-axis.

use super::scalar::Scalar;
use serde::{Deserialize, Serialize};

/// OHLC aggregate covering `[start, end]` on the x-axis.
///
/// Equality is structural. Ordering everywhere in this crate is by [`Candlestick::key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candlestick {
    pub start: Scalar,
    pub end: Scalar,
    pub open: Scalar,
    pub close: Scalar,
    pub high: Scalar,
    pub low: Scalar,
}

impl Candlestick {
    /// A candlestick with an empty payload.
    pub fn new(start: Scalar, end: Scalar) -> Self {
        Self::with_values(start, end, Scalar::ZERO, Scalar::ZERO, Scalar::ZERO, Scalar::ZERO)
    }

    pub fn with_values(
        start: Scalar,
        end: Scalar,
        open: Scalar,
        close: Scalar,
        high: Scalar,
        low: Scalar,
    ) -> Self {
        Self {
            start,
            end,
            open,
            close,
            high,
            low,
        }
    }

    /// Sort key: start first, then end.
    pub fn key(&self) -> (Scalar, Scalar) {
        (self.start, self.end)
    }

    /// `start <= end`.
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Whether this candlestick touches the closed range `[first, last]`.
    ///
    /// Both ends are inclusive, so `[39, 40)` intersects the point 40.
    pub fn intersects(&self, first: Scalar, last: Scalar) -> bool {
        self.start <= last && self.end >= first
    }

    /// Whether the candlestick's range contains `point`.
    pub fn contains(&self, point: Scalar) -> bool {
        self.intersects(point, point)
    }

    pub fn width(&self) -> Scalar {
        self.end - self.start
    }
}
