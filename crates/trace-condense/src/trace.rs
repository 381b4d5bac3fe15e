// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-user linear traces.
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use thiserror::Error;
use trace_graph::{GraphError, StateGraph, StateId, TransitionId};

use crate::step::Step;

/// Handle shared between a capture session (which appends) and the engine
/// (which only reads).
pub type SharedTrace = Rc<RefCell<UserTrace>>;

/// A user trace is not a single acyclic chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TraceShapeError {
    /// The walk from the start state revisited a state.
    #[error("circular trace: state {state} revisited")]
    Circular {
        /// The revisited state.
        state: StateId,
    },
    /// A state has more than one outgoing transition.
    #[error("branching trace: state {state} has {outgoing} outgoing transitions")]
    Branching {
        /// The branching state.
        state: StateId,
        /// Its number of outgoing transitions.
        outgoing: usize,
    },
}

/// One transition along a validated trace walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceLink {
    /// The user-trace transition.
    pub transition: TransitionId,
    /// State the transition leaves.
    pub from: StateId,
    /// State the transition enters.
    pub to: StateId,
}

/// One user's append-only chain of steps.
///
/// Wraps a journaling [`StateGraph`] whose transitions carry [`Step`]s, plus a
/// tail cursor that [`UserTrace::record`] appends after. The raw graph is
/// reachable through [`UserTrace::graph_mut`], so nothing stops a caller from
/// building a branching or cyclic shape; [`UserTrace::walk`] reports those.
#[derive(Debug, Clone)]
pub struct UserTrace {
    graph: StateGraph<(), Step>,
    tail: StateId,
}

impl Default for UserTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl UserTrace {
    /// Empty trace (only the start state).
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StateGraph::default();
        graph.enable_journal();
        let tail = graph.start_state();
        Self { graph, tail }
    }

    /// Trace opened the way capture sessions open one: with a start marker.
    #[must_use]
    pub fn with_start_marker() -> Self {
        Self::from_steps([Step::start_marker()])
    }

    /// Trace holding `steps` in order.
    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        let mut trace = Self::new();
        for step in steps {
            let state = trace.graph.add_state(());
            // The tail and the fresh state both exist.
            if trace.graph.add_transition(trace.tail, state, step).is_ok() {
                trace.tail = state;
            }
        }
        trace
    }

    /// Adopts an existing graph, e.g. one loaded from a saved trace set.
    ///
    /// The tail is the end of the chain when the shape is valid, otherwise
    /// the start state.
    pub fn from_graph(mut graph: StateGraph<(), Step>) -> Self {
        graph.enable_journal();
        let mut trace = Self {
            tail: graph.start_state(),
            graph,
        };
        if let Ok(links) = trace.walk() {
            if let Some(last) = links.last() {
                trace.tail = last.to;
            }
        }
        trace
    }

    /// Wraps the trace in a [`SharedTrace`] handle.
    #[must_use]
    pub fn into_shared(self) -> SharedTrace {
        Rc::new(RefCell::new(self))
    }

    /// Appends `step` after the tail and advances the tail.
    pub fn record(&mut self, step: Step) -> Result<TransitionId, GraphError> {
        let state = self.graph.add_state(());
        let transition = self.graph.add_transition(self.tail, state, step)?;
        self.tail = state;
        Ok(transition)
    }

    /// The state [`UserTrace::record`] appends after.
    #[must_use]
    pub fn tail(&self) -> StateId {
        self.tail
    }

    /// Underlying graph.
    #[must_use]
    pub fn graph(&self) -> &StateGraph<(), Step> {
        &self.graph
    }

    /// Underlying graph, mutably. Does not move the tail.
    pub fn graph_mut(&mut self) -> &mut StateGraph<(), Step> {
        &mut self.graph
    }

    /// Step carried by `transition`.
    #[must_use]
    pub fn step(&self, transition: TransitionId) -> Option<&Step> {
        self.graph.transition_payload(transition)
    }

    /// Lazily walks the chain from the start state, one link per step.
    ///
    /// The iterator yields an error (and then stops) at the first shape
    /// violation it reaches, so a consumer that stops early never sees
    /// problems further down the chain.
    #[must_use]
    pub fn links(&self) -> Links<'_> {
        Links {
            graph: &self.graph,
            current: Some(self.graph.start_state()),
            visited: BTreeSet::new(),
        }
    }

    /// Walks the whole chain from the start state.
    ///
    /// # Errors
    ///
    /// [`TraceShapeError::Circular`] if a state is revisited, checked before
    /// [`TraceShapeError::Branching`] for a state with several successors.
    pub fn walk(&self) -> Result<Vec<TraceLink>, TraceShapeError> {
        self.links().collect()
    }
}

/// Iterator returned by [`UserTrace::links`].
#[derive(Debug)]
pub struct Links<'a> {
    graph: &'a StateGraph<(), Step>,
    current: Option<StateId>,
    visited: BTreeSet<StateId>,
}

impl Iterator for Links<'_> {
    type Item = Result<TraceLink, TraceShapeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        if !self.visited.insert(current) {
            return Some(Err(TraceShapeError::Circular { state: current }));
        }
        match self.graph.outgoing(current) {
            [] => None,
            [only] => {
                let to = self.graph.transition_to(*only)?;
                self.current = Some(to);
                Some(Ok(TraceLink {
                    transition: *only,
                    from: current,
                    to,
                }))
            }
            many => Some(Err(TraceShapeError::Branching {
                state: current,
                outgoing: many.len(),
            })),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn record_extends_the_chain() {
        let mut trace = UserTrace::with_start_marker();
        let t = trace.record(Step::click("button", "1")).unwrap();
        let links = trace.walk().unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].transition, t);
        assert_eq!(links[1].to, trace.tail());
        assert_eq!(trace.step(t), Some(&Step::click("button", "1")));
    }

    #[test]
    fn empty_trace_walks_to_nothing() {
        assert!(UserTrace::new().walk().unwrap().is_empty());
    }

    #[test]
    fn branching_is_reported() {
        let mut trace = UserTrace::with_start_marker();
        let tail = trace.tail();
        let extra = trace.graph_mut().add_state(());
        trace
            .graph_mut()
            .add_transition(tail, extra, Step::click("a", "x"))
            .unwrap();
        trace.record(Step::click("a", "y")).unwrap();
        assert_eq!(
            trace.walk(),
            Err(TraceShapeError::Branching {
                state: tail,
                outgoing: 2
            })
        );
    }

    #[test]
    fn cycles_are_reported() {
        let mut trace = UserTrace::from_steps([Step::start_marker(), Step::click("a", "1")]);
        let tail = trace.tail();
        let first = trace.walk().unwrap()[0].to;
        trace
            .graph_mut()
            .add_transition(tail, first, Step::click("a", "back"))
            .unwrap();
        assert_eq!(trace.walk(), Err(TraceShapeError::Circular { state: first }));
    }

    #[test]
    fn recording_is_journaled() {
        let mut trace = UserTrace::new();
        trace.record(Step::start_marker()).unwrap();
        let events = trace.graph_mut().drain_events();
        assert!(events.iter().any(|e| e.is_transition_added()));
    }

    #[test]
    fn adopted_graph_finds_its_tail() {
        let original = UserTrace::from_steps([Step::start_marker(), Step::click("a", "1")]);
        let adopted = UserTrace::from_graph(original.graph().fork());
        assert_eq!(adopted.tail(), original.tail());
        assert!(adopted.graph().is_journaling());
    }
}
