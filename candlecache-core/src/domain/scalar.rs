//! Scalar: one ordered, subtractable value type for every chart axis.
//!
//! Money, quantities, durations and timestamps all collapse into a signed
//! 64-bit raw value so interval logic is written once. The raw domain is
//! discrete: every value has an adjacent successor and predecessor, which the
//! interval set relies on when merging neighbouring ranges.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Raw units per whole unit of money (six decimal places).
pub const MONEY_SCALE: i64 = 1_000_000;

const MICROS_PER_SECOND: i64 = 1_000_000;

/// A value on a chart axis.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Scalar(i64);

impl Scalar {
    pub const ZERO: Scalar = Scalar(0);
    pub const MIN: Scalar = Scalar(i64::MIN);
    pub const MAX: Scalar = Scalar(i64::MAX);

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Money amount, rounded to six decimal places.
    pub fn from_money(amount: f64) -> Self {
        Self((amount * MONEY_SCALE as f64).round() as i64)
    }

    pub fn to_money(self) -> f64 {
        self.0 as f64 / MONEY_SCALE as f64
    }

    pub const fn from_quantity(quantity: i64) -> Self {
        Self(quantity)
    }

    /// Timestamp as microseconds since the Unix epoch.
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp.timestamp_micros())
    }

    pub fn to_timestamp(self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_micros(self.0)
    }

    /// Duration in microseconds. Durations beyond the microsecond range saturate.
    pub fn from_duration(duration: Duration) -> Self {
        Self(duration.num_microseconds().unwrap_or(if duration < Duration::zero() {
            i64::MIN
        } else {
            i64::MAX
        }))
    }

    pub fn to_duration(self) -> Duration {
        Duration::microseconds(self.0)
    }

    /// The adjacent larger value, saturating at [`Scalar::MAX`].
    pub fn next_up(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// The adjacent smaller value, saturating at [`Scalar::MIN`].
    pub fn next_down(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn signum(self) -> i64 {
        self.0.signum()
    }
}

impl From<i64> for Scalar {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(timestamp: DateTime<Utc>) -> Self {
        Self::from_timestamp(timestamp)
    }
}

impl From<Duration> for Scalar {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

impl Add for Scalar {
    type Output = Scalar;

    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Scalar {
    type Output = Scalar;

    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Scalar {
    type Output = Scalar;

    fn neg(self) -> Scalar {
        Scalar(self.0.saturating_neg())
    }
}

impl Mul<f64> for Scalar {
    type Output = Scalar;

    fn mul(self, ratio: f64) -> Scalar {
        Scalar((self.0 as f64 * ratio).round() as i64)
    }
}

impl Div<f64> for Scalar {
    type Output = Scalar;

    fn div(self, ratio: f64) -> Scalar {
        Scalar((self.0 as f64 / ratio).round() as i64)
    }
}

/// Dimensionless ratio between two values of the same axis.
impl Div for Scalar {
    type Output = f64;

    fn div(self, rhs: Scalar) -> f64 {
        self.0 as f64 / rhs.0 as f64
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The domain an axis measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Money,
    Quantity,
    Duration,
    Timestamp,
}

impl ScalarKind {
    /// Parse the textual form of a value on this axis.
    ///
    /// - Money: decimal, up to six places (`12.50`, `0.000125`)
    /// - Quantity: integer (`300`)
    /// - Duration: seconds, fractional allowed (`90`, `0.5`)
    /// - Timestamp: RFC 3339 (`2024-01-02T14:30:00Z`)
    pub fn parse(self, input: &str) -> Result<Scalar, ScalarParseError> {
        let input = input.trim();
        let invalid = |reason: String| ScalarParseError::Invalid {
            kind: self,
            input: input.to_string(),
            reason,
        };
        match self {
            ScalarKind::Money => input
                .parse::<f64>()
                .map_err(|e| invalid(e.to_string()))
                .and_then(|v| {
                    if v.is_finite() {
                        Ok(Scalar::from_money(v))
                    } else {
                        Err(invalid("not a finite amount".into()))
                    }
                }),
            ScalarKind::Quantity => input
                .parse::<i64>()
                .map(Scalar::from_quantity)
                .map_err(|e| invalid(e.to_string())),
            ScalarKind::Duration => input
                .parse::<f64>()
                .map_err(|e| invalid(e.to_string()))
                .and_then(|secs| {
                    if secs.is_finite() {
                        Ok(Scalar::from_raw(
                            (secs * MICROS_PER_SECOND as f64).round() as i64
                        ))
                    } else {
                        Err(invalid("not a finite duration".into()))
                    }
                }),
            ScalarKind::Timestamp => DateTime::parse_from_rfc3339(input)
                .map(|t| Scalar::from_timestamp(t.with_timezone(&Utc)))
                .map_err(|e| invalid(e.to_string())),
        }
    }

    /// Render a value in the textual form [`ScalarKind::parse`] accepts.
    pub fn format(self, value: Scalar) -> String {
        match self {
            ScalarKind::Money => format_fixed(value.raw(), MONEY_SCALE, 2),
            ScalarKind::Quantity => value.raw().to_string(),
            ScalarKind::Duration => format_fixed(value.raw(), MICROS_PER_SECOND, 0),
            ScalarKind::Timestamp => match value.to_timestamp() {
                Some(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                None => value.raw().to_string(),
            },
        }
    }
}

/// `raw / scale` in decimal, keeping at least `min_digits` fractional digits
/// and dropping trailing zeros past them. `scale` is a power of ten.
fn format_fixed(raw: i64, scale: i64, min_digits: usize) -> String {
    let sign = if raw < 0 { "-" } else { "" };
    let magnitude = raw.unsigned_abs();
    let scale = scale.unsigned_abs();
    let width = scale.to_string().len() - 1;
    let whole = magnitude / scale;
    let fraction = format!("{:0width$}", magnitude % scale);
    let keep = fraction.trim_end_matches('0').len().max(min_digits).min(width);
    if keep == 0 {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole}.{}", &fraction[..keep])
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Money => "money",
            ScalarKind::Quantity => "quantity",
            ScalarKind::Duration => "duration",
            ScalarKind::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

impl FromStr for ScalarKind {
    type Err = ScalarParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "money" => Ok(ScalarKind::Money),
            "quantity" => Ok(ScalarKind::Quantity),
            "duration" => Ok(ScalarKind::Duration),
            "timestamp" => Ok(ScalarKind::Timestamp),
            _ => Err(ScalarParseError::UnknownKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScalarParseError {
    #[error("unknown axis kind '{0}' (expected money, quantity, duration or timestamp)")]
    UnknownKind(String),

    #[error("invalid {kind} value '{input}': {reason}")]
    Invalid {
        kind: ScalarKind,
        input: String,
        reason: String,
    },
}
