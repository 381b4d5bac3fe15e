// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared prefix tree folded from every user's trace.
use trace_graph::{GraphError, StateId, TransitionId};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::model::{Attribution, ModelGraph, TreeState, TreeTransition, UserId};
use crate::step::Step;
use crate::strategy::StepEquality;
use crate::trace::UserTrace;

/// Outcome of folding one user's trace into the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldReport {
    /// Folded user.
    pub user: UserId,
    /// Steps walked in the user's trace.
    pub steps: usize,
    /// Tree transitions created for this user.
    pub created: usize,
    /// Existing tree transitions this user was newly attributed to.
    pub attached: usize,
    /// Tree state the user's trace ends at.
    pub end: StateId,
}

/// Outcome of [`TraceTree::rebuild`].
#[derive(Debug, Default)]
pub struct RebuildOutcome {
    /// Per-user fold reports, ascending by user.
    pub folded: Vec<FoldReport>,
    /// Users left out of the tree, with the reason their fold failed.
    pub skipped: Vec<(UserId, EngineError)>,
}

/// Which lookup rule picked the tree transition for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Matched {
    Attributed(TransitionId),
    Equal(TransitionId),
    RootReuse(TransitionId),
}

/// Single-rooted tree deduplicating identical prefixes across users.
///
/// The tree only ever grows; states disappear solely through a full
/// [`TraceTree::rebuild`].
#[derive(Debug, Clone)]
pub struct TraceTree {
    graph: ModelGraph,
}

impl Default for TraceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceTree {
    /// Tree holding only the root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: ModelGraph::default(),
        }
    }

    /// Underlying graph.
    #[must_use]
    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    /// Root state.
    #[must_use]
    pub fn root(&self) -> StateId {
        self.graph.start_state()
    }

    /// Folds `trace` into the tree on behalf of `user`.
    ///
    /// Safe to re-run after every appended step: transitions already
    /// attributed to `(user, transition)` are reused as-is.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTraceShape`] when the trace is not a single
    /// acyclic chain. The whole trace is validated before the first
    /// mutation, so the tree is untouched in that case.
    pub fn fold_trace(
        &mut self,
        user: &UserId,
        trace: &UserTrace,
        equality: &dyn StepEquality,
    ) -> Result<FoldReport, EngineError> {
        let links = trace.walk().map_err(|source| EngineError::InvalidTraceShape {
            user: user.clone(),
            source,
        })?;
        let trace_start = trace.graph().start_state();
        let mut cursor = self.root();
        self.record_origin(cursor, user, trace_start);

        let mut report = FoldReport {
            user: user.clone(),
            steps: links.len(),
            created: 0,
            attached: 0,
            end: cursor,
        };
        for link in links {
            let step = trace
                .step(link.transition)
                .ok_or(GraphError::MissingTransition(link.transition))?;
            let at_root = cursor == self.root() && link.from == trace_start;
            let chosen = match self.find_match(cursor, user, link.transition, step, at_root, equality) {
                Some(Matched::Attributed(t)) => t,
                Some(Matched::Equal(t) | Matched::RootReuse(t)) => {
                    let payload = self
                        .graph
                        .transition_payload_mut(t)
                        .ok_or(GraphError::MissingTransition(t))?;
                    if payload.attribution.insert(user.clone(), link.transition) {
                        report.attached += 1;
                    }
                    t
                }
                None => {
                    let state = self.graph.add_state(TreeState::default());
                    report.created += 1;
                    self.graph.add_transition(
                        cursor,
                        state,
                        TreeTransition {
                            step: step.clone(),
                            attribution: Attribution::single(user.clone(), link.transition),
                        },
                    )?
                }
            };
            cursor = self
                .graph
                .transition_to(chosen)
                .ok_or(GraphError::MissingTransition(chosen))?;
            self.record_origin(cursor, user, link.to);
        }
        report.end = cursor;
        debug!(
            user = %user,
            steps = report.steps,
            created = report.created,
            attached = report.attached,
            "folded trace"
        );
        Ok(report)
    }

    /// Folds every user into a fresh tree in ascending user order.
    ///
    /// Users whose fold fails (malformed traces included) are skipped and
    /// reported instead of aborting the rebuild.
    pub fn rebuild<'a, I>(users: I, equality: &dyn StepEquality) -> (Self, RebuildOutcome)
    where
        I: IntoIterator<Item = (&'a UserId, &'a UserTrace)>,
    {
        let mut ordered: Vec<(&UserId, &UserTrace)> = users.into_iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(b.0));

        let mut tree = Self::new();
        let mut outcome = RebuildOutcome::default();
        for (user, trace) in ordered {
            match tree.fold_trace(user, trace, equality) {
                Ok(report) => outcome.folded.push(report),
                Err(err) => {
                    warn!(user = %user, error = %err, "skipping trace during rebuild");
                    outcome.skipped.push((user.clone(), err));
                }
            }
        }
        (tree, outcome)
    }

    fn find_match(
        &self,
        cursor: StateId,
        user: &UserId,
        user_transition: TransitionId,
        step: &Step,
        at_root: bool,
        equality: &dyn StepEquality,
    ) -> Option<Matched> {
        let outgoing = self.graph.outgoing(cursor);
        let payload = |t: TransitionId| self.graph.transition_payload(t);
        if let Some(t) = outgoing.iter().copied().find(|t| {
            payload(*t).is_some_and(|p| p.attribution.contains(user, user_transition))
        }) {
            return Some(Matched::Attributed(t));
        }
        if let Some(t) = outgoing
            .iter()
            .copied()
            .find(|t| payload(*t).is_some_and(|p| equality.steps_equal(&p.step, step)))
        {
            return Some(Matched::Equal(t));
        }
        // The root keeps a single first branch.
        if at_root {
            return outgoing.first().copied().map(Matched::RootReuse);
        }
        None
    }

    fn record_origin(&mut self, state: StateId, user: &UserId, origin: StateId) {
        if let Some(payload) = self.graph.state_payload_mut(state) {
            payload.origins.entry(user.clone()).or_insert(origin);
        }
    }
}
