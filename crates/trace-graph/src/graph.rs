// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Arena-backed directed labeled multigraph with a designated start state.
use std::collections::BTreeMap;

use thiserror::Error;

use crate::event::GraphEvent;
use crate::ident::{StateId, TransitionId};

/// Errors returned by [`StateGraph`] mutations and imports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The referenced state does not exist.
    #[error("state not found: {0}")]
    MissingState(StateId),
    /// The referenced transition does not exist.
    #[error("transition not found: {0}")]
    MissingTransition(TransitionId),
    /// The start state is permanent.
    #[error("the start state cannot be removed")]
    StartStateRemoval,
    /// A serialized graph failed validation.
    #[error("corrupt serialized graph: {0}")]
    Corrupt(String),
    /// Canonical CBOR encoding failed.
    #[error("canonical encoding failed: {0}")]
    Encode(String),
}

/// Materialised state: payload plus ordered adjacency.
#[derive(Debug, Clone)]
pub(crate) struct StateRecord<S> {
    pub(crate) payload: S,
    /// Outbound transitions in insertion order.
    pub(crate) outgoing: Vec<TransitionId>,
    /// Inbound transitions in insertion order.
    pub(crate) incoming: Vec<TransitionId>,
}

impl<S> StateRecord<S> {
    fn new(payload: S) -> Self {
        Self {
            payload,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }
}

/// Materialised transition record.
///
/// Invariants
/// - `from` and `to` reference existing states in the same graph.
/// - The id appears exactly once in `from`'s outgoing list and exactly once in
///   `to`'s incoming list (self-loops appear once in each).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord<T> {
    pub(crate) from: StateId,
    pub(crate) to: StateId,
    pub(crate) alias: Option<String>,
    pub(crate) payload: T,
}

impl<T> TransitionRecord<T> {
    /// Source state.
    #[must_use]
    pub fn from(&self) -> StateId {
        self.from
    }

    /// Destination state.
    #[must_use]
    pub fn to(&self) -> StateId {
        self.to
    }

    /// Optional display alias.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Opaque payload.
    #[must_use]
    pub fn payload(&self) -> &T {
        &self.payload
    }
}

/// Directed labeled multigraph keyed by integer handles.
///
/// States carry a payload `S`, transitions a payload `T`. Parallel transitions
/// and self-loops are allowed. Adjacency lists keep insertion order, which the
/// condensation algorithms rely on for reproducible greedy matching; a
/// re-pointed transition moves to the end of its new state's list.
///
/// Handles are never reused. Removing a state cascades to its incident
/// transitions; the start state cannot be removed.
#[derive(Debug, Clone)]
pub struct StateGraph<S, T> {
    pub(crate) start: StateId,
    pub(crate) states: BTreeMap<StateId, StateRecord<S>>,
    pub(crate) transitions: BTreeMap<TransitionId, TransitionRecord<T>>,
    pub(crate) next_state: u64,
    pub(crate) next_transition: u64,
    pub(crate) journal: Option<Vec<GraphEvent>>,
}

impl<S: Default, T> Default for StateGraph<S, T> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S, T> StateGraph<S, T> {
    /// Creates a graph holding only the start state.
    pub fn new(start_payload: S) -> Self {
        let start = StateId(0);
        let mut states = BTreeMap::new();
        states.insert(start, StateRecord::new(start_payload));
        Self {
            start,
            states,
            transitions: BTreeMap::new(),
            next_state: 1,
            next_transition: 0,
            journal: None,
        }
    }

    /// The distinguished start state.
    #[must_use]
    pub fn start_state(&self) -> StateId {
        self.start
    }

    /// Starts recording [`GraphEvent`]s. Idempotent.
    pub fn enable_journal(&mut self) {
        if self.journal.is_none() {
            self.journal = Some(Vec::new());
        }
    }

    /// Returns `true` when a change journal is being recorded.
    #[must_use]
    pub fn is_journaling(&self) -> bool {
        self.journal.is_some()
    }

    /// Takes every event recorded since the last drain.
    ///
    /// Returns an empty list when journaling is disabled.
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        self.journal.as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn record(&mut self, event: GraphEvent) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(event);
        }
    }

    /// Number of states, including the start state.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Returns `true` if `id` names a live state.
    #[must_use]
    pub fn has_state(&self, id: StateId) -> bool {
        self.states.contains_key(&id)
    }

    /// Returns `true` if `id` names a live transition.
    #[must_use]
    pub fn has_transition(&self, id: TransitionId) -> bool {
        self.transitions.contains_key(&id)
    }

    /// All state ids in ascending (creation) order.
    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states.keys().copied()
    }

    /// All transition ids in ascending (creation) order.
    pub fn transitions(&self) -> impl Iterator<Item = TransitionId> + '_ {
        self.transitions.keys().copied()
    }

    /// Outbound transitions of `state` in stable order (empty if missing).
    #[must_use]
    pub fn outgoing(&self, state: StateId) -> &[TransitionId] {
        self.states
            .get(&state)
            .map_or(&[], |record| record.outgoing.as_slice())
    }

    /// Inbound transitions of `state` in stable order (empty if missing).
    #[must_use]
    pub fn incoming(&self, state: StateId) -> &[TransitionId] {
        self.states
            .get(&state)
            .map_or(&[], |record| record.incoming.as_slice())
    }

    /// Full transition record.
    #[must_use]
    pub fn transition(&self, id: TransitionId) -> Option<&TransitionRecord<T>> {
        self.transitions.get(&id)
    }

    /// Source state of a transition.
    #[must_use]
    pub fn transition_from(&self, id: TransitionId) -> Option<StateId> {
        self.transitions.get(&id).map(|t| t.from)
    }

    /// Destination state of a transition.
    #[must_use]
    pub fn transition_to(&self, id: TransitionId) -> Option<StateId> {
        self.transitions.get(&id).map(|t| t.to)
    }

    /// Display alias of a transition.
    #[must_use]
    pub fn transition_alias(&self, id: TransitionId) -> Option<&str> {
        self.transitions.get(&id).and_then(|t| t.alias.as_deref())
    }

    /// Payload of a transition.
    #[must_use]
    pub fn transition_payload(&self, id: TransitionId) -> Option<&T> {
        self.transitions.get(&id).map(|t| &t.payload)
    }

    /// Mutable payload of a transition. Journals a payload change.
    pub fn transition_payload_mut(&mut self, id: TransitionId) -> Option<&mut T> {
        if !self.transitions.contains_key(&id) {
            return None;
        }
        self.record(GraphEvent::TransitionPayloadChanged(id));
        self.transitions.get_mut(&id).map(|t| &mut t.payload)
    }

    /// Replaces a transition payload, returning the previous one.
    pub fn set_transition_payload(&mut self, id: TransitionId, payload: T) -> Result<T, GraphError> {
        let record = self
            .transitions
            .get_mut(&id)
            .ok_or(GraphError::MissingTransition(id))?;
        let previous = std::mem::replace(&mut record.payload, payload);
        self.record(GraphEvent::TransitionPayloadChanged(id));
        Ok(previous)
    }

    /// Payload of a state.
    #[must_use]
    pub fn state_payload(&self, id: StateId) -> Option<&S> {
        self.states.get(&id).map(|s| &s.payload)
    }

    /// Mutable payload of a state. Journals a payload change.
    pub fn state_payload_mut(&mut self, id: StateId) -> Option<&mut S> {
        if !self.states.contains_key(&id) {
            return None;
        }
        self.record(GraphEvent::StatePayloadChanged(id));
        self.states.get_mut(&id).map(|s| &mut s.payload)
    }

    /// Replaces a state payload, returning the previous one.
    pub fn set_state_payload(&mut self, id: StateId, payload: S) -> Result<S, GraphError> {
        let record = self.states.get_mut(&id).ok_or(GraphError::MissingState(id))?;
        let previous = std::mem::replace(&mut record.payload, payload);
        self.record(GraphEvent::StatePayloadChanged(id));
        Ok(previous)
    }

    /// Creates a state and returns its handle.
    pub fn add_state(&mut self, payload: S) -> StateId {
        let id = StateId(self.next_state);
        self.next_state += 1;
        self.states.insert(id, StateRecord::new(payload));
        self.record(GraphEvent::StateAdded(id));
        id
    }

    /// Creates a transition `from -> to` without an alias.
    pub fn add_transition(
        &mut self,
        from: StateId,
        to: StateId,
        payload: T,
    ) -> Result<TransitionId, GraphError> {
        self.add_transition_with_alias(from, to, None, payload)
    }

    /// Creates a transition `from -> to` with an optional display alias.
    pub fn add_transition_with_alias(
        &mut self,
        from: StateId,
        to: StateId,
        alias: Option<String>,
        payload: T,
    ) -> Result<TransitionId, GraphError> {
        if !self.states.contains_key(&to) {
            return Err(GraphError::MissingState(to));
        }
        let id = TransitionId(self.next_transition);
        self.states
            .get_mut(&from)
            .ok_or(GraphError::MissingState(from))?
            .outgoing
            .push(id);
        if let Some(dest) = self.states.get_mut(&to) {
            dest.incoming.push(id);
        }
        self.next_transition += 1;
        self.transitions.insert(
            id,
            TransitionRecord {
                from,
                to,
                alias,
                payload,
            },
        );
        self.record(GraphEvent::TransitionAdded { id, from, to });
        Ok(id)
    }

    /// Removes a transition and returns its payload.
    pub fn remove_transition(&mut self, id: TransitionId) -> Result<T, GraphError> {
        let record = self
            .transitions
            .remove(&id)
            .ok_or(GraphError::MissingTransition(id))?;
        if let Some(src) = self.states.get_mut(&record.from) {
            src.outgoing.retain(|t| *t != id);
        }
        if let Some(dst) = self.states.get_mut(&record.to) {
            dst.incoming.retain(|t| *t != id);
        }
        self.record(GraphEvent::TransitionRemoved(id));
        Ok(record.payload)
    }

    /// Removes a state together with every incident transition.
    ///
    /// # Errors
    ///
    /// - [`GraphError::StartStateRemoval`] for the start state
    /// - [`GraphError::MissingState`] if `id` is not live
    pub fn remove_state(&mut self, id: StateId) -> Result<S, GraphError> {
        if id == self.start {
            return Err(GraphError::StartStateRemoval);
        }
        let Some(record) = self.states.get(&id) else {
            return Err(GraphError::MissingState(id));
        };
        let mut incident: Vec<TransitionId> = record.outgoing.clone();
        for t in &record.incoming {
            if !incident.contains(t) {
                incident.push(*t);
            }
        }
        for t in incident {
            self.remove_transition(t)?;
        }
        let record = self.states.remove(&id).ok_or(GraphError::MissingState(id))?;
        self.record(GraphEvent::StateRemoved(id));
        Ok(record.payload)
    }

    /// Re-points the source of a transition to `from`.
    ///
    /// The transition is appended to the end of `from`'s outgoing list.
    pub fn set_transition_from(&mut self, id: TransitionId, from: StateId) -> Result<(), GraphError> {
        if !self.states.contains_key(&from) {
            return Err(GraphError::MissingState(from));
        }
        let record = self
            .transitions
            .get_mut(&id)
            .ok_or(GraphError::MissingTransition(id))?;
        let previous = std::mem::replace(&mut record.from, from);
        let to = record.to;
        if let Some(src) = self.states.get_mut(&previous) {
            src.outgoing.retain(|t| *t != id);
        }
        if let Some(src) = self.states.get_mut(&from) {
            src.outgoing.push(id);
        }
        self.record(GraphEvent::TransitionRetargeted { id, from, to });
        Ok(())
    }

    /// Re-points the destination of a transition to `to`.
    ///
    /// The transition is appended to the end of `to`'s incoming list.
    pub fn set_transition_to(&mut self, id: TransitionId, to: StateId) -> Result<(), GraphError> {
        if !self.states.contains_key(&to) {
            return Err(GraphError::MissingState(to));
        }
        let record = self
            .transitions
            .get_mut(&id)
            .ok_or(GraphError::MissingTransition(id))?;
        let previous = std::mem::replace(&mut record.to, to);
        let from = record.from;
        if let Some(dst) = self.states.get_mut(&previous) {
            dst.incoming.retain(|t| *t != id);
        }
        if let Some(dst) = self.states.get_mut(&to) {
            dst.incoming.push(id);
        }
        self.record(GraphEvent::TransitionRetargeted { id, from, to });
        Ok(())
    }
}

impl<S: Clone, T: Clone> StateGraph<S, T> {
    /// Clones the structure with every handle preserved and journaling off.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            start: self.start,
            states: self.states.clone(),
            transitions: self.transitions.clone(),
            next_state: self.next_state,
            next_transition: self.next_transition,
            journal: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn chain() -> (StateGraph<(), &'static str>, [StateId; 3], [TransitionId; 2]) {
        let mut g = StateGraph::<(), &'static str>::default();
        let a = g.start_state();
        let b = g.add_state(());
        let c = g.add_state(());
        let ab = g.add_transition(a, b, "ab").unwrap();
        let bc = g.add_transition(b, c, "bc").unwrap();
        (g, [a, b, c], [ab, bc])
    }

    #[test]
    fn remove_state_cascades_incident_transitions() {
        let (mut g, [a, b, c], [ab, bc]) = chain();
        let loop_b = g.add_transition(b, b, "bb").unwrap();
        g.remove_state(b).unwrap();
        assert!(!g.has_state(b));
        assert!(!g.has_transition(ab));
        assert!(!g.has_transition(bc));
        assert!(!g.has_transition(loop_b));
        assert!(g.outgoing(a).is_empty());
        assert!(g.incoming(c).is_empty());
    }

    #[test]
    fn start_state_is_permanent() {
        let (mut g, [a, ..], _) = chain();
        assert_eq!(g.remove_state(a), Err(GraphError::StartStateRemoval));
    }

    #[test]
    fn retargeting_moves_transition_to_end_of_adjacency() {
        let (mut g, [a, b, c], [ab, bc]) = chain();
        let ac = g.add_transition(a, c, "ac").unwrap();
        g.set_transition_from(ab, b).unwrap();
        assert_eq!(g.outgoing(a), &[ac]);
        assert_eq!(g.outgoing(b), &[bc, ab]);
        g.set_transition_to(bc, b).unwrap();
        assert_eq!(g.incoming(c), &[ac]);
        assert_eq!(g.incoming(b), &[ab, bc]);
        assert_eq!(g.transition_to(bc), Some(b));
    }

    #[test]
    fn handles_are_not_reused_after_removal() {
        let (mut g, [_, _, c], _) = chain();
        g.remove_state(c).unwrap();
        let d = g.add_state(());
        assert!(d > c);
    }

    #[test]
    fn payload_replacement_returns_the_old_value_and_is_journaled() {
        let mut g = StateGraph::<u8, &'static str>::new(0);
        let a = g.start_state();
        let b = g.add_state(1);
        let ab = g.add_transition(a, b, "old").unwrap();
        g.enable_journal();
        assert_eq!(g.set_state_payload(b, 7), Ok(1));
        assert_eq!(g.set_transition_payload(ab, "new"), Ok("old"));
        assert_eq!(g.state_payload(b), Some(&7));
        assert_eq!(g.set_state_payload(StateId(99), 3), Err(GraphError::MissingState(StateId(99))));
        assert_eq!(
            g.drain_events(),
            vec![
                GraphEvent::StatePayloadChanged(b),
                GraphEvent::TransitionPayloadChanged(ab),
            ]
        );
    }

    #[test]
    fn journal_records_only_when_enabled() {
        let (mut g, [a, b, _], _) = chain();
        assert!(g.drain_events().is_empty());
        g.enable_journal();
        let t = g.add_transition(b, a, "ba").unwrap();
        g.remove_transition(t).unwrap();
        assert_eq!(
            g.drain_events(),
            vec![
                GraphEvent::TransitionAdded { id: t, from: b, to: a },
                GraphEvent::TransitionRemoved(t),
            ]
        );
        assert!(g.drain_events().is_empty());
    }

    #[test]
    fn fork_preserves_identity_and_drops_journal() {
        let (mut g, [a, b, _], [ab, _]) = chain();
        g.enable_journal();
        let f = g.fork();
        assert!(!f.is_journaling());
        assert_eq!(f.outgoing(a), &[ab]);
        assert_eq!(f.transition_to(ab), Some(b));
        assert_eq!(f.transition_payload(ab), Some(&"ab"));
    }
}
