// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Change journal entries emitted by [`crate::StateGraph`].

use crate::ident::{StateId, TransitionId};

/// A single structural or payload change recorded by a journaling graph.
///
/// Events are appended in mutation order. Cascading removals (a state taking
/// its incident transitions with it) emit one `TransitionRemoved` per
/// transition before the `StateRemoved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEvent {
    /// A state was created.
    StateAdded(StateId),
    /// A state was removed.
    StateRemoved(StateId),
    /// A transition was created.
    TransitionAdded {
        /// New transition.
        id: TransitionId,
        /// Source state.
        from: StateId,
        /// Destination state.
        to: StateId,
    },
    /// A transition was removed.
    TransitionRemoved(TransitionId),
    /// A transition's source or destination was re-pointed.
    TransitionRetargeted {
        /// Re-pointed transition.
        id: TransitionId,
        /// Source state after the change.
        from: StateId,
        /// Destination state after the change.
        to: StateId,
    },
    /// A state payload was replaced or borrowed mutably.
    StatePayloadChanged(StateId),
    /// A transition payload was replaced or borrowed mutably.
    TransitionPayloadChanged(TransitionId),
}

impl GraphEvent {
    /// Returns `true` for [`GraphEvent::TransitionAdded`].
    #[must_use]
    pub fn is_transition_added(&self) -> bool {
        matches!(self, Self::TransitionAdded { .. })
    }
}
