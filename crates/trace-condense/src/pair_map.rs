// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Score map keyed by unordered pairs of states.
use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use trace_graph::StateId;

/// Unordered pair of states. `(a, b)` and `(b, a)` build the same value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StatePair {
    lo: StateId,
    hi: StateId,
}

impl StatePair {
    /// Normalizes `(a, b)` so that `lo() <= hi()`.
    #[must_use]
    pub fn new(a: StateId, b: StateId) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// The smaller state id.
    #[must_use]
    pub fn lo(&self) -> StateId {
        self.lo
    }

    /// The larger state id.
    #[must_use]
    pub fn hi(&self) -> StateId {
        self.hi
    }

    /// Returns `true` when both sides are the same state.
    #[must_use]
    pub fn is_diagonal(&self) -> bool {
        self.lo == self.hi
    }

    /// Returns `true` when `state` is either side.
    #[must_use]
    pub fn contains(&self, state: StateId) -> bool {
        self.lo == state || self.hi == state
    }
}

/// Accumulates real-valued scores per unordered state pair.
#[derive(Debug, Clone, Default)]
pub struct PairScoreMap {
    scores: FxHashMap<StatePair, f64>,
}

impl PairScoreMap {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pairs with a score.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns `true` when no pair has a score.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Score for `(a, b)`, if set.
    #[must_use]
    pub fn get(&self, a: StateId, b: StateId) -> Option<f64> {
        self.scores.get(&StatePair::new(a, b)).copied()
    }

    /// Score for `(a, b)`, or `default` when unset.
    #[must_use]
    pub fn get_or(&self, a: StateId, b: StateId, default: f64) -> f64 {
        self.get(a, b).unwrap_or(default)
    }

    /// Sets the score for `(a, b)`, returning the previous one.
    pub fn set(&mut self, a: StateId, b: StateId, score: f64) -> Option<f64> {
        self.scores.insert(StatePair::new(a, b), score)
    }

    /// Adds `delta` to the score for `(a, b)`, starting from `0.0`.
    pub fn add(&mut self, a: StateId, b: StateId, delta: f64) {
        *self.scores.entry(StatePair::new(a, b)).or_insert(0.0) += delta;
    }

    /// Removes the score for `(a, b)`.
    pub fn remove(&mut self, a: StateId, b: StateId) -> Option<f64> {
        self.scores.remove(&StatePair::new(a, b))
    }

    /// Unordered iteration over `(pair, score)`.
    pub fn iter(&self) -> impl Iterator<Item = (StatePair, f64)> + '_ {
        self.scores.iter().map(|(pair, score)| (*pair, *score))
    }

    /// Every entry sorted by score descending, ties by ascending pair.
    ///
    /// This is the deterministic merge order: hash iteration order never
    /// leaks into results.
    #[must_use]
    pub fn ranked(&self) -> Vec<(StatePair, f64)> {
        let mut entries: Vec<(StatePair, f64)> = self.iter().collect();
        entries.sort_by(|(pa, sa), (pb, sb)| match sb.total_cmp(sa) {
            Ordering::Equal => pa.cmp(pb),
            other => other,
        });
        entries
    }

    /// The top entry of [`Self::ranked`].
    #[must_use]
    pub fn best(&self) -> Option<(StatePair, f64)> {
        self.iter().min_by(|(pa, sa), (pb, sb)| match sb.total_cmp(sa) {
            Ordering::Equal => pa.cmp(pb),
            other => other,
        })
    }
}
