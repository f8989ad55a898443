//! Domain types: axis scalars, candlesticks, snapshot limits.

pub mod candlestick;
pub mod limit;
pub mod scalar;

pub use candlestick::Candlestick;
pub use limit::{Anchor, SnapshotLimit};
pub use scalar::{Scalar, ScalarKind, ScalarParseError, MONEY_SCALE};
