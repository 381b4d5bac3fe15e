// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Payload types shared by the trace tree and the condensed model.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use trace_graph::{StateGraph, StateId, TransitionId};

use crate::step::Step;

/// Opaque end-user identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which users' own transitions a model transition stands for.
///
/// In the trace tree every user maps to exactly one originating transition.
/// After condensation a looping transition can stand for several steps of
/// the same user, so each user maps to a set.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attribution(BTreeMap<UserId, BTreeSet<TransitionId>>);

impl Attribution {
    /// Attribution naming a single user transition.
    #[must_use]
    pub fn single(user: UserId, transition: TransitionId) -> Self {
        let mut attribution = Self::default();
        attribution.insert(user, transition);
        attribution
    }

    /// Records `user -> transition`. Returns `false` if already present.
    pub fn insert(&mut self, user: UserId, transition: TransitionId) -> bool {
        self.0.entry(user).or_default().insert(transition)
    }

    /// Returns `true` if `user -> transition` is recorded.
    #[must_use]
    pub fn contains(&self, user: &UserId, transition: TransitionId) -> bool {
        self.0.get(user).is_some_and(|set| set.contains(&transition))
    }

    /// Transitions recorded for `user`.
    pub fn transitions_of(&self, user: &UserId) -> impl Iterator<Item = TransitionId> + '_ {
        self.0.get(user).into_iter().flatten().copied()
    }

    /// Attributed users in ascending order.
    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.0.keys()
    }

    /// Number of attributed users.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when nobody is attributed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds every entry of `other`.
    pub fn union_with(&mut self, other: &Self) {
        for (user, transitions) in &other.0 {
            self.0
                .entry(user.clone())
                .or_default()
                .extend(transitions.iter().copied());
        }
    }
}

/// Tree/model state payload: the user-trace state each user reached here.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct TreeState {
    /// User-trace state per user.
    pub origins: BTreeMap<UserId, StateId>,
}

/// Tree/model transition payload.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TreeTransition {
    /// Representative step, fixed when the transition was created.
    pub step: Step,
    /// Users whose own transitions this one stands for.
    pub attribution: Attribution,
}

/// Graph shape shared by the trace tree and the condensed output model.
pub type ModelGraph = StateGraph<TreeState, TreeTransition>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_keeps_every_transition_per_user() {
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let mut a = Attribution::single(alice.clone(), TransitionId(1));
        let mut b = Attribution::single(alice.clone(), TransitionId(4));
        b.insert(bob.clone(), TransitionId(2));
        a.union_with(&b);
        assert!(a.contains(&alice, TransitionId(1)));
        assert!(a.contains(&alice, TransitionId(4)));
        assert!(a.contains(&bob, TransitionId(2)));
        assert_eq!(a.user_count(), 2);
        assert_eq!(a.transitions_of(&alice).count(), 2);
    }

    #[test]
    fn insert_reports_duplicates() {
        let mut a = Attribution::default();
        assert!(a.insert("u".into(), TransitionId(0)));
        assert!(!a.insert("u".into(), TransitionId(0)));
    }
}
