// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pluggable step equality and similarity strategies.
use std::sync::Arc;

use crate::step::Step;

/// Decides whether two steps denote the same interaction.
///
/// Must be reflexive and symmetric; the tree builder and the merge engine
/// treat equal steps as interchangeable transition labels.
pub trait StepEquality {
    /// Returns `true` when `a` and `b` are the same interaction.
    fn steps_equal(&self, a: &Step, b: &Step) -> bool;
}

impl<F> StepEquality for F
where
    F: Fn(&Step, &Step) -> bool,
{
    fn steps_equal(&self, a: &Step, b: &Step) -> bool {
        self(a, b)
    }
}

/// Scores how alike two steps are; positive means alike.
pub trait StepSimilarity {
    /// Similarity of `a` and `b`. Should be symmetric.
    fn similarity(&self, a: &Step, b: &Step) -> f64;
}

impl<F> StepSimilarity for F
where
    F: Fn(&Step, &Step) -> f64,
{
    fn similarity(&self, a: &Step, b: &Step) -> f64 {
        self(a, b)
    }
}

/// Default equality: same event kind, and either the same manual label (when
/// both steps carry one) or the same target element, ignoring where the
/// element sits in the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralEquality;

impl StepEquality for StructuralEquality {
    fn steps_equal(&self, a: &Step, b: &Step) -> bool {
        if a.event_type != b.event_type {
            return false;
        }
        if let (Some(la), Some(lb)) = (&a.manual_label, &b.manual_label) {
            return la == lb;
        }
        match (&a.target, &b.target) {
            (Some(ta), Some(tb)) => ta.same_element(tb),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Default similarity derived from an equality: `1.0` if equal, else `-1.0`.
#[derive(Clone)]
pub struct EqualitySimilarity {
    equality: SharedEquality,
}

impl EqualitySimilarity {
    /// Derives a similarity from `equality`.
    pub fn new(equality: SharedEquality) -> Self {
        Self { equality }
    }
}

impl Default for EqualitySimilarity {
    fn default() -> Self {
        Self::new(Arc::new(StructuralEquality))
    }
}

impl StepSimilarity for EqualitySimilarity {
    fn similarity(&self, a: &Step, b: &Step) -> f64 {
        if self.equality.steps_equal(a, b) {
            1.0
        } else {
            -1.0
        }
    }
}

/// Shared equality strategy handle.
pub type SharedEquality = Arc<dyn StepEquality + Send + Sync>;
/// Shared similarity strategy handle.
pub type SharedSimilarity = Arc<dyn StepSimilarity + Send + Sync>;

/// The equality/similarity pair every condensation pass runs with.
#[derive(Clone)]
pub struct Strategies {
    /// Step equality used for tree folding, matching and merge conflicts.
    pub equality: SharedEquality,
    /// Step similarity used for scoring.
    pub similarity: SharedSimilarity,
}

impl Strategies {
    /// Uses `equality` and derives the similarity from it.
    #[must_use]
    pub fn from_equality(equality: SharedEquality) -> Self {
        let similarity = Arc::new(EqualitySimilarity::new(Arc::clone(&equality)));
        Self {
            equality,
            similarity,
        }
    }
}

impl Default for Strategies {
    fn default() -> Self {
        Self::from_equality(Arc::new(StructuralEquality))
    }
}

impl std::fmt::Debug for Strategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategies").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_compares_kind_and_target() {
        let eq = StructuralEquality;
        assert!(eq.steps_equal(&Step::click("button", "1"), &Step::click("button", "1")));
        assert!(!eq.steps_equal(&Step::click("button", "1"), &Step::click("button", "2")));
        assert!(!eq.steps_equal(&Step::click("a", "1"), &Step::click("button", "1")));
        assert!(eq.steps_equal(&Step::start_marker(), &Step::start_marker()));
        assert!(!eq.steps_equal(&Step::start_marker(), &Step::click("button", "1")));
    }

    #[test]
    fn manual_labels_decide_when_both_present() {
        let eq = StructuralEquality;
        let mut a = Step::click("button", "1");
        let mut b = Step::click("button", "2");
        a.manual_label = Some("next".into());
        b.manual_label = Some("next".into());
        assert!(eq.steps_equal(&a, &b));
        b.manual_label = Some("back".into());
        assert!(!eq.steps_equal(&a, &b));
    }

    #[test]
    fn closures_are_strategies() {
        let by_kind = |a: &Step, b: &Step| a.event_type == b.event_type;
        assert!(by_kind.steps_equal(&Step::click("a", "x"), &Step::click("b", "y")));
        let flat = |_: &Step, _: &Step| 0.25;
        assert!((flat.similarity(&Step::start_marker(), &Step::start_marker()) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn derived_similarity_is_plus_or_minus_one() {
        let sim = EqualitySimilarity::default();
        let one = Step::click("button", "1");
        let two = Step::click("button", "2");
        assert!((sim.similarity(&one, &one) - 1.0).abs() < f64::EPSILON);
        assert!((sim.similarity(&one, &two) + 1.0).abs() < f64::EPSILON);
    }
}
