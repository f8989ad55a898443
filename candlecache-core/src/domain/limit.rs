//! SnapshotLimit: how many candlesticks a query returns and from which end.

use serde::{Deserialize, Serialize};

/// Bound on the number of candlesticks a range query returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "size", rename_all = "snake_case")]
pub enum SnapshotLimit {
    /// Every candlestick in the range.
    #[default]
    Unlimited,
    /// The first `n` candlesticks, walking up from the lower bound.
    FromHead(usize),
    /// The last `n` candlesticks, walking down from the upper bound.
    /// Results are still returned in ascending order.
    FromTail(usize),
}

/// Which side of a range a limit counts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    Head,
    Tail,
}

impl SnapshotLimit {
    /// Maximum number of results; `usize::MAX` when unlimited.
    pub fn size(&self) -> usize {
        match *self {
            SnapshotLimit::Unlimited => usize::MAX,
            SnapshotLimit::FromHead(n) | SnapshotLimit::FromTail(n) => n,
        }
    }

    /// Unlimited queries are walked from the head.
    pub fn anchor(&self) -> Anchor {
        match self {
            SnapshotLimit::Unlimited | SnapshotLimit::FromHead(_) => Anchor::Head,
            SnapshotLimit::FromTail(_) => Anchor::Tail,
        }
    }

    /// Same side, new size. Unlimited stays unlimited.
    pub fn with_size(&self, size: usize) -> SnapshotLimit {
        match self {
            SnapshotLimit::Unlimited => SnapshotLimit::Unlimited,
            SnapshotLimit::FromHead(_) => SnapshotLimit::FromHead(size),
            SnapshotLimit::FromTail(_) => SnapshotLimit::FromTail(size),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, SnapshotLimit::Unlimited)
    }

    /// Whether `count` results exhaust this limit.
    pub fn is_saturated_by(&self, count: usize) -> bool {
        !self.is_unlimited() && count >= self.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_and_anchors() {
        assert_eq!(SnapshotLimit::Unlimited.size(), usize::MAX);
        assert_eq!(SnapshotLimit::FromTail(7).size(), 7);
        assert_eq!(SnapshotLimit::Unlimited.anchor(), Anchor::Head);
        assert_eq!(SnapshotLimit::FromTail(1).anchor(), Anchor::Tail);
    }

    #[test]
    fn with_size_keeps_side() {
        assert_eq!(SnapshotLimit::FromHead(3).with_size(9), SnapshotLimit::FromHead(9));
        assert_eq!(SnapshotLimit::FromTail(3).with_size(0), SnapshotLimit::FromTail(0));
        assert_eq!(SnapshotLimit::Unlimited.with_size(2), SnapshotLimit::Unlimited);
    }

    #[test]
    fn saturation() {
        assert!(SnapshotLimit::FromHead(0).is_empty());
        assert!(SnapshotLimit::FromHead(3).is_saturated_by(3));
        assert!(!SnapshotLimit::FromHead(3).is_saturated_by(2));
        assert!(!SnapshotLimit::Unlimited.is_saturated_by(usize::MAX));
    }

    #[test]
    fn toml_representation() {
        #[derive(Deserialize)]
        struct Query {
            limit: SnapshotLimit,
        }
        let q: Query = serde_json::from_str(r#"{"limit":{"type":"from_tail","size":25}}"#).unwrap();
        assert_eq!(q.limit, SnapshotLimit::FromTail(25));
        let q: Query = serde_json::from_str(r#"{"limit":{"type":"unlimited"}}"#).unwrap();
        assert_eq!(q.limit, SnapshotLimit::Unlimited);
    }
}
