// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! State merging, duplicate-transition reconciliation and orphan collection.
use trace_graph::{GraphError, StateGraph, StateId, TransitionId};

use crate::error::EngineError;
use crate::model::TreeTransition;
use crate::strategy::StepEquality;

/// What [`merge_states`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Outgoing transitions moved onto the surviving state.
    pub moved_outgoing: usize,
    /// Incoming transitions redirected to the surviving state.
    pub redirected_incoming: usize,
    /// Outgoing transitions dropped because the survivor already had an equal one.
    pub dropped: usize,
    /// States collected after losing their last incoming transition.
    pub pruned: Vec<StateId>,
}

fn step_of<S>(graph: &StateGraph<S, TreeTransition>, t: TransitionId) -> Result<&TreeTransition, GraphError> {
    graph.transition_payload(t).ok_or(GraphError::MissingTransition(t))
}

/// What [`remove_conflicting_transitions`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    /// Duplicate transitions deleted.
    pub removed: usize,
    /// States collected after losing their last incoming transition.
    pub pruned: Vec<StateId>,
}

/// Folds `remove` into `into`, then deletes `remove`.
///
/// Outgoing transitions of `remove` move to `into` unless `into` already
/// leaves by an equal step; such a duplicate is dropped and its attribution
/// joins the one it collided with. Destinations of dropped transitions are
/// collected once nothing points at them, together with the chains behind
/// them. Their outgoing transitions are matched by step against those of the
/// survivor's destination: matches absorb the attribution, the rest are
/// re-attached there, so every attributed step stays in the model.
///
/// # Errors
///
/// - [`EngineError::InvalidMerge`] if `remove == into` or `remove` is the start state
/// - [`EngineError::Graph`] if either state is missing
pub fn merge_states<S>(
    graph: &mut StateGraph<S, TreeTransition>,
    remove: StateId,
    into: StateId,
    equality: &dyn StepEquality,
) -> Result<MergeReport, EngineError> {
    if remove == into || remove == graph.start_state() {
        return Err(EngineError::InvalidMerge { remove, into });
    }
    for state in [remove, into] {
        if !graph.has_state(state) {
            return Err(GraphError::MissingState(state).into());
        }
    }

    let mut report = MergeReport::default();
    let mut orphans = Vec::new();

    while let Some(t) = graph.outgoing(remove).first().copied() {
        match equal_outgoing(graph, into, t, equality)? {
            Some(keep) => {
                let dest = graph.transition_to(t).ok_or(GraphError::MissingTransition(t))?;
                absorb(graph, t, keep)?;
                graph.remove_transition(t)?;
                report.dropped += 1;
                if dest != remove {
                    orphans.push((dest, keep));
                }
            }
            None => {
                graph.set_transition_from(t, into)?;
                report.moved_outgoing += 1;
            }
        }
    }
    while let Some(t) = graph.incoming(remove).first().copied() {
        graph.set_transition_to(t, into)?;
        report.redirected_incoming += 1;
    }
    graph.remove_state(remove)?;

    report.pruned = collect_orphans(graph, orphans, equality)?;
    Ok(report)
}

/// Collapses outgoing transitions of `state` whose steps are equal.
///
/// Within each group of equal transitions, the one whose destination has the
/// most incoming transitions survives (the earliest on ties); the others'
/// attribution is unioned into it and they are deleted. Destinations left
/// without incoming transitions are collected like in [`merge_states`].
pub fn remove_conflicting_transitions<S>(
    graph: &mut StateGraph<S, TreeTransition>,
    state: StateId,
    equality: &dyn StepEquality,
) -> Result<ConflictReport, EngineError> {
    let outgoing = graph.outgoing(state).to_vec();
    let mut groups: Vec<Vec<TransitionId>> = Vec::new();
    for t in outgoing {
        let step = &step_of(graph, t)?.step;
        let mut placed = false;
        for group in &mut groups {
            let head = &step_of(graph, group[0])?.step;
            if equality.steps_equal(head, step) {
                group.push(t);
                placed = true;
                break;
            }
        }
        if !placed {
            groups.push(vec![t]);
        }
    }

    let mut in_degree = Vec::new();
    for group in &groups {
        for t in group {
            let dest = graph.transition_to(*t).ok_or(GraphError::MissingTransition(*t))?;
            in_degree.push((*t, graph.incoming(dest).len()));
        }
    }
    let degree_of = |t: TransitionId| {
        in_degree
            .iter()
            .find(|(candidate, _)| *candidate == t)
            .map_or(0, |(_, degree)| *degree)
    };

    let mut report = ConflictReport::default();
    let mut orphans = Vec::new();
    for group in groups.into_iter().filter(|g| g.len() > 1) {
        let mut survivor = group[0];
        for t in &group[1..] {
            if degree_of(*t) > degree_of(survivor) {
                survivor = *t;
            }
        }
        for t in group.into_iter().filter(|t| *t != survivor) {
            let dest = graph.transition_to(t).ok_or(GraphError::MissingTransition(t))?;
            absorb(graph, t, survivor)?;
            graph.remove_transition(t)?;
            report.removed += 1;
            if dest != state {
                orphans.push((dest, survivor));
            }
        }
    }
    report.pruned = collect_orphans(graph, orphans, equality)?;
    Ok(report)
}

/// Deletes orphaned states, starting from `orphans`, and hands their
/// outgoing transitions to the state they were replaced by.
///
/// Each entry pairs a possibly orphaned state with the surviving transition
/// that took over its incoming one. Once the state has no incoming
/// transitions it is deleted; before that, every outgoing transition is
/// matched against an equal-step transition leaving the survivor's
/// destination. A match absorbs the attribution and the walk continues one
/// level down; an unmatched transition is re-attached to the survivor's
/// destination so the steps it carries stay in the model.
fn collect_orphans<S>(
    graph: &mut StateGraph<S, TreeTransition>,
    mut orphans: Vec<(StateId, TransitionId)>,
    equality: &dyn StepEquality,
) -> Result<Vec<StateId>, EngineError> {
    let start = graph.start_state();
    let mut pruned = Vec::new();
    while let Some((candidate, replacement)) = orphans.pop() {
        if candidate == start || !graph.has_state(candidate) || !graph.incoming(candidate).is_empty() {
            continue;
        }
        // Without incoming transitions the candidate has no self-loops.
        let mirror = graph.transition_to(replacement);
        for t in graph.outgoing(candidate).to_vec() {
            let dest = graph.transition_to(t).ok_or(GraphError::MissingTransition(t))?;
            let Some(mirror) = mirror else {
                orphans.push((dest, t));
                continue;
            };
            match equal_outgoing(graph, mirror, t, equality)? {
                Some(keep) => {
                    absorb(graph, t, keep)?;
                    orphans.push((dest, keep));
                }
                None => graph.set_transition_from(t, mirror)?,
            }
        }
        graph.remove_state(candidate)?;
        pruned.push(candidate);
    }
    Ok(pruned)
}

/// First outgoing transition of `state`, other than `t`, whose step equals `t`'s.
fn equal_outgoing<S>(
    graph: &StateGraph<S, TreeTransition>,
    state: StateId,
    t: TransitionId,
    equality: &dyn StepEquality,
) -> Result<Option<TransitionId>, GraphError> {
    let step = &step_of(graph, t)?.step;
    Ok(graph.outgoing(state).iter().copied().find(|o| {
        *o != t
            && graph
                .transition_payload(*o)
                .is_some_and(|p| equality.steps_equal(&p.step, step))
    }))
}

/// Unions the attribution of `from` into `into`.
fn absorb<S>(
    graph: &mut StateGraph<S, TreeTransition>,
    from: TransitionId,
    into: TransitionId,
) -> Result<(), GraphError> {
    let attribution = step_of(graph, from)?.attribution.clone();
    graph
        .transition_payload_mut(into)
        .ok_or(GraphError::MissingTransition(into))?
        .attribution
        .union_with(&attribution);
    Ok(())
}

/// Deletes non-start states without incoming transitions until none remain.
///
/// Returns the removed states in removal order.
pub fn remove_stale_states<S, T>(graph: &mut StateGraph<S, T>) -> Result<Vec<StateId>, EngineError> {
    let start = graph.start_state();
    let mut removed = Vec::new();
    loop {
        let stale: Vec<StateId> = graph
            .states()
            .filter(|s| *s != start && graph.incoming(*s).is_empty())
            .collect();
        if stale.is_empty() {
            return Ok(removed);
        }
        for state in stale {
            graph.remove_state(state)?;
            removed.push(state);
        }
    }
}
