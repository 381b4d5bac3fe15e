// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Arena handles for states and transitions.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Strongly typed handle for a state in a [`crate::StateGraph`].
///
/// Handles are allocated monotonically per graph and never reused, so
/// ascending `StateId` order is creation order. A forked graph keeps the same
/// handles as its origin.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub u64);

impl StateId {
    /// Returns the raw handle value.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Strongly typed handle for a transition in a [`crate::StateGraph`].
///
/// Same allocation rules as [`StateId`]; the two spaces are independent, so
/// `StateId(3)` and `TransitionId(3)` may coexist.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionId(pub u64);

impl TransitionId {
    /// Returns the raw handle value.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn handles_order_by_raw_value_and_display_distinctly() {
        assert!(StateId(1) < StateId(2));
        assert!(TransitionId(7) > TransitionId(0));
        assert_eq!(StateId(3).to_string(), "s3");
        assert_eq!(TransitionId(3).to_string(), "t3");
    }

    #[test]
    fn handles_serialize_as_bare_integers() {
        let json = serde_json::to_string(&(StateId(4), TransitionId(9))).unwrap();
        assert_eq!(json, "[4,9]");
    }
}
