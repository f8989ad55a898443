//! Closed intervals over the x-axis and a disjoint set of them.

use crate::domain::{Anchor, Scalar};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::{Excluded, Unbounded};

/// Closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub lower: Scalar,
    pub upper: Scalar,
}

impl Interval {
    pub fn new(lower: Scalar, upper: Scalar) -> Self {
        debug_assert!(lower <= upper, "interval bounds out of order");
        Self { lower, upper }
    }

    pub fn point(value: Scalar) -> Self {
        Self::new(value, value)
    }

    pub fn is_degenerate(&self) -> bool {
        self.lower == self.upper
    }

    pub fn contains(&self, point: Scalar) -> bool {
        self.lower <= point && point <= self.upper
    }

    pub fn covers(&self, first: Scalar, last: Scalar) -> bool {
        self.lower <= first && last <= self.upper
    }

    pub fn overlaps(&self, first: Scalar, last: Scalar) -> bool {
        self.lower <= last && first <= self.upper
    }

    /// Whether a query over `[first, last]` anchored at `anchor` can start
    /// from inside this interval.
    ///
    /// The far edge is open so a query that starts exactly where an interval
    /// ends moves on to the next region: a head bound must satisfy
    /// `lower <= bound < upper`, a tail bound `lower < bound <= upper`. A
    /// degenerate interval is closed and holds its single point, and an
    /// interval covering the whole query always holds it.
    pub fn holds_bound(&self, first: Scalar, last: Scalar, anchor: Anchor) -> bool {
        if self.covers(first, last) {
            return true;
        }
        match anchor {
            Anchor::Head => self.lower <= first && first < self.upper,
            Anchor::Tail => self.lower < last && last <= self.upper,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// Set of pairwise disjoint, non-adjacent closed intervals.
///
/// Intervals that overlap or sit next to each other on the discrete
/// [`Scalar`] domain are merged on insert.
#[derive(Debug, Clone, Default)]
pub struct IntervalSet {
    // lower -> upper
    ranges: BTreeMap<Scalar, Scalar>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Interval> + '_ {
        self.ranges.iter().map(|(&lower, &upper)| Interval { lower, upper })
    }

    pub fn insert(&mut self, interval: Interval) {
        let mut lower = interval.lower;
        let mut upper = interval.upper;

        // Absorb a predecessor that overlaps or touches.
        if let Some((&prev_lower, &prev_upper)) = self.ranges.range(..=lower).next_back() {
            if prev_upper.next_up() >= lower {
                lower = prev_lower;
                upper = upper.max(prev_upper);
                self.ranges.remove(&prev_lower);
            }
        }

        // Absorb successors that start at or before `upper + 1`.
        loop {
            let next = self
                .ranges
                .range((Excluded(lower), Unbounded))
                .next()
                .map(|(&l, &u)| (l, u));
            match next {
                Some((next_lower, next_upper)) if next_lower <= upper.next_up() => {
                    upper = upper.max(next_upper);
                    self.ranges.remove(&next_lower);
                }
                _ => break,
            }
        }

        self.ranges.insert(lower, upper);
    }

    /// The interval containing `point`, if any.
    pub fn containing(&self, point: Scalar) -> Option<Interval> {
        self.ranges
            .range(..=point)
            .next_back()
            .filter(|(_, &upper)| upper >= point)
            .map(|(&lower, &upper)| Interval { lower, upper })
    }

    /// The interval nearest the anchored side of `[first, last]` that overlaps it.
    pub fn nearest_overlap(&self, first: Scalar, last: Scalar, anchor: Anchor) -> Option<Interval> {
        match anchor {
            Anchor::Head => {
                let candidate = self.containing(first).or_else(|| {
                    self.ranges
                        .range((Excluded(first), Unbounded))
                        .next()
                        .map(|(&lower, &upper)| Interval { lower, upper })
                });
                candidate.filter(|i| i.overlaps(first, last))
            }
            Anchor::Tail => self
                .ranges
                .range(..=last)
                .next_back()
                .map(|(&lower, &upper)| Interval { lower, upper })
                .filter(|i| i.overlaps(first, last)),
        }
    }

    /// Smallest lower bound strictly greater than `point`.
    pub fn next_lower_after(&self, point: Scalar) -> Option<Scalar> {
        self.ranges
            .range((Excluded(point), Unbounded))
            .next()
            .map(|(&lower, _)| lower)
    }

    /// Largest upper bound strictly less than `point`.
    pub fn prev_upper_before(&self, point: Scalar) -> Option<Scalar> {
        // Disjoint intervals keep their uppers in the same order as their lowers.
        self.ranges
            .range(..point)
            .rev()
            .map(|(_, &upper)| upper)
            .find(|&upper| upper < point)
    }
}
