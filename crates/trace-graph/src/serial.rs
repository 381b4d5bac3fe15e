// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Portable serialized form and canonical hashing.
use std::collections::{BTreeMap, BTreeSet};

use ciborium::ser::into_writer;
use serde::{Deserialize, Serialize};

use crate::graph::{GraphError, StateGraph, StateRecord, TransitionRecord};
use crate::ident::{StateId, TransitionId};

/// 32-byte BLAKE3 digest of a graph's canonical bytes.
pub type Hash32 = [u8; 32];

/// Serialized state, including its adjacency order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerializedState<S> {
    /// State handle.
    pub id: StateId,
    /// State payload.
    pub payload: S,
    /// Outbound transitions in adjacency order.
    pub outgoing: Vec<TransitionId>,
    /// Inbound transitions in adjacency order.
    pub incoming: Vec<TransitionId>,
}

/// Serialized transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerializedTransition<T> {
    /// Transition handle.
    pub id: TransitionId,
    /// Source state.
    pub from: StateId,
    /// Destination state.
    pub to: StateId,
    /// Optional display alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Transition payload.
    pub payload: T,
}

/// Whole-graph portable form. States and transitions are sorted by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerializedGraph<S, T> {
    /// Start state handle.
    pub start: StateId,
    /// Next state handle to allocate.
    pub next_state: u64,
    /// Next transition handle to allocate.
    pub next_transition: u64,
    /// Every state.
    pub states: Vec<SerializedState<S>>,
    /// Every transition.
    pub transitions: Vec<SerializedTransition<T>>,
}

impl<S: Clone, T: Clone> StateGraph<S, T> {
    /// Exports the graph with handles and adjacency order intact.
    #[must_use]
    pub fn to_serialized(&self) -> SerializedGraph<S, T> {
        SerializedGraph {
            start: self.start,
            next_state: self.next_state,
            next_transition: self.next_transition,
            states: self
                .states
                .iter()
                .map(|(id, record)| SerializedState {
                    id: *id,
                    payload: record.payload.clone(),
                    outgoing: record.outgoing.clone(),
                    incoming: record.incoming.clone(),
                })
                .collect(),
            transitions: self
                .transitions
                .iter()
                .map(|(id, record)| SerializedTransition {
                    id: *id,
                    from: record.from,
                    to: record.to,
                    alias: record.alias.clone(),
                    payload: record.payload.clone(),
                })
                .collect(),
        }
    }
}

impl<S, T> StateGraph<S, T> {
    /// Rebuilds a graph from its portable form, validating every invariant.
    ///
    /// # Errors
    ///
    /// [`GraphError::Corrupt`] when ids collide, references dangle, the
    /// allocation counters lag behind existing handles, or adjacency lists
    /// disagree with transition endpoints.
    pub fn from_serialized(serialized: SerializedGraph<S, T>) -> Result<Self, GraphError> {
        let SerializedGraph {
            start,
            next_state,
            next_transition,
            states: serialized_states,
            transitions: serialized_transitions,
        } = serialized;

        let mut states = BTreeMap::new();
        for state in serialized_states {
            if state.id.0 >= next_state {
                return Err(corrupt(format!("state {} beyond allocator", state.id)));
            }
            let record = StateRecord {
                payload: state.payload,
                outgoing: state.outgoing,
                incoming: state.incoming,
            };
            if states.insert(state.id, record).is_some() {
                return Err(corrupt(format!("duplicate state {}", state.id)));
            }
        }
        if !states.contains_key(&start) {
            return Err(corrupt(format!("start state {start} missing")));
        }

        let mut transitions = BTreeMap::new();
        for t in serialized_transitions {
            if t.id.0 >= next_transition {
                return Err(corrupt(format!("transition {} beyond allocator", t.id)));
            }
            if !states.contains_key(&t.from) || !states.contains_key(&t.to) {
                return Err(corrupt(format!("transition {} has dangling endpoint", t.id)));
            }
            let record = TransitionRecord {
                from: t.from,
                to: t.to,
                alias: t.alias,
                payload: t.payload,
            };
            if transitions.insert(t.id, record).is_some() {
                return Err(corrupt(format!("duplicate transition {}", t.id)));
            }
        }

        validate_adjacency(&states, &transitions)?;

        Ok(Self {
            start,
            states,
            transitions,
            next_state,
            next_transition,
            journal: None,
        })
    }
}

fn corrupt(message: String) -> GraphError {
    GraphError::Corrupt(message)
}

fn validate_adjacency<S, T>(
    states: &BTreeMap<StateId, StateRecord<S>>,
    transitions: &BTreeMap<TransitionId, TransitionRecord<T>>,
) -> Result<(), GraphError> {
    let mut seen_out = BTreeSet::new();
    let mut seen_in = BTreeSet::new();
    for (id, state) in states {
        for t in &state.outgoing {
            match transitions.get(t) {
                Some(record) if record.from == *id => {}
                _ => return Err(corrupt(format!("{id} lists foreign outgoing {t}"))),
            }
            if !seen_out.insert(*t) {
                return Err(corrupt(format!("{t} listed twice as outgoing")));
            }
        }
        for t in &state.incoming {
            match transitions.get(t) {
                Some(record) if record.to == *id => {}
                _ => return Err(corrupt(format!("{id} lists foreign incoming {t}"))),
            }
            if !seen_in.insert(*t) {
                return Err(corrupt(format!("{t} listed twice as incoming")));
            }
        }
    }
    if seen_out.len() != transitions.len() || seen_in.len() != transitions.len() {
        return Err(corrupt("adjacency lists miss transitions".to_owned()));
    }
    Ok(())
}

impl<S: Clone + Serialize, T: Clone + Serialize> StateGraph<S, T> {
    /// Canonical CBOR encoding of [`Self::to_serialized`].
    ///
    /// Handles and adjacency order are part of the encoding, so two graphs
    /// hash equal only when they are identical handle-for-handle.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, GraphError> {
        let mut bytes = Vec::new();
        into_writer(&self.to_serialized(), &mut bytes)
            .map_err(|err| GraphError::Encode(err.to_string()))?;
        Ok(bytes)
    }

    /// BLAKE3 hash of [`Self::canonical_bytes`].
    pub fn canonical_hash(&self) -> Result<Hash32, GraphError> {
        let bytes = self.canonical_bytes()?;
        Ok(blake3::hash(&bytes).into())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> StateGraph<String, u32> {
        let mut g = StateGraph::new("start".to_owned());
        let a = g.add_state("a".to_owned());
        let b = g.add_state("b".to_owned());
        let start = g.start_state();
        g.add_transition(start, a, 1).unwrap();
        g.add_transition_with_alias(a, b, Some("a->b".into()), 2).unwrap();
        let back = g.add_transition(b, a, 3).unwrap();
        g.set_transition_from(back, a).unwrap();
        g
    }

    #[test]
    fn serialized_form_survives_json_and_keeps_order() {
        let g = sample();
        let json = serde_json::to_string(&g.to_serialized()).unwrap();
        let back: SerializedGraph<String, u32> = serde_json::from_str(&json).unwrap();
        let restored = StateGraph::from_serialized(back).unwrap();
        assert_eq!(restored.canonical_hash().unwrap(), g.canonical_hash().unwrap());
        let a = StateId(1);
        assert_eq!(restored.outgoing(a), g.outgoing(a));
        assert_eq!(restored.transition_alias(TransitionId(1)), Some("a->b"));
    }

    #[test]
    fn dangling_endpoint_is_rejected() {
        let mut s = sample().to_serialized();
        s.transitions[0].to = StateId(42);
        assert!(matches!(
            StateGraph::from_serialized(s),
            Err(GraphError::Corrupt(_))
        ));
    }

    #[test]
    fn adjacency_mismatch_is_rejected() {
        let mut s = sample().to_serialized();
        s.states[1].outgoing.clear();
        assert!(matches!(
            StateGraph::from_serialized(s),
            Err(GraphError::Corrupt(_))
        ));
    }

    #[test]
    fn lagging_allocator_is_rejected() {
        let mut s = sample().to_serialized();
        s.next_state = 1;
        assert!(matches!(
            StateGraph::from_serialized(s),
            Err(GraphError::Corrupt(_))
        ));
    }

    #[test]
    fn canonical_hash_tracks_payload_changes() {
        let g = sample();
        let mut h = g.fork();
        assert_eq!(g.canonical_hash().unwrap(), h.canonical_hash().unwrap());
        h.set_transition_payload(TransitionId(0), 99).unwrap();
        assert_ne!(g.canonical_hash().unwrap(), h.canonical_hash().unwrap());
    }
}
