// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine façade: tracks users and keeps the tree and model current.
use std::cell::Ref;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trace_graph::{GraphEvent, SerializedGraph, StateGraph};
use tracing::{info, instrument, warn};

use crate::condense::{condense, CondenseReport};
use crate::config::CondenseConfig;
use crate::error::EngineError;
use crate::model::{ModelGraph, UserId};
use crate::replay::{self, Location};
use crate::step::Step;
use crate::strategy::{
    EqualitySimilarity, SharedEquality, SharedSimilarity, StepEquality, StepSimilarity, Strategies,
    StructuralEquality,
};
use crate::trace::{SharedTrace, UserTrace};
use crate::tree::{FoldReport, RebuildOutcome, TraceTree};

/// Result of one user update (add or appended step).
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    /// Tree fold for the updated user.
    pub fold: FoldReport,
    /// Condensation of the fresh model.
    pub condense: CondenseReport,
}

/// Result of [`TraceEngine::remove_user`].
#[derive(Debug)]
pub struct RebuildReport {
    /// The user that was dropped.
    pub removed: UserId,
    /// Folds of the remaining users.
    pub rebuild: RebuildOutcome,
    /// Condensation of the fresh model.
    pub condense: CondenseReport,
}

/// Result of [`TraceEngine::pump_events`].
#[derive(Debug, Default)]
pub struct PumpReport {
    /// Users refreshed because their trace recorded new transitions.
    pub updated: Vec<UpdateReport>,
    /// Users whose refresh failed.
    pub failures: Vec<(UserId, EngineError)>,
}

/// Every user's raw trace, as exchanged with a persistence collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceSet {
    /// Serialized trace per user.
    pub traces: BTreeMap<UserId, SerializedGraph<(), Step>>,
}

impl TraceSet {
    /// Pretty JSON form.
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses the JSON form.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Result of [`TraceEngine::load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Handles of every loaded trace, for the caller to keep recording into.
    pub handles: BTreeMap<UserId, SharedTrace>,
    /// Users whose trace failed to load or fold.
    pub failures: Vec<(UserId, EngineError)>,
}

/// Builder for [`TraceEngine`].
#[derive(Default)]
pub struct TraceEngineBuilder {
    config: CondenseConfig,
    equality: Option<SharedEquality>,
    similarity: Option<SharedSimilarity>,
}

impl TraceEngineBuilder {
    /// Condensation tunables.
    pub fn config(mut self, config: CondenseConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the step equality. Unless a similarity is also supplied, the
    /// similarity is derived from this equality.
    pub fn equality<E>(mut self, equality: E) -> Self
    where
        E: StepEquality + Send + Sync + 'static,
    {
        self.equality = Some(Arc::new(equality));
        self
    }

    /// Replaces the step similarity.
    pub fn similarity<F>(mut self, similarity: F) -> Self
    where
        F: StepSimilarity + Send + Sync + 'static,
    {
        self.similarity = Some(Arc::new(similarity));
        self
    }

    /// Builds an engine with no users.
    pub fn build(self) -> TraceEngine {
        let equality: SharedEquality = self.equality.unwrap_or_else(|| Arc::new(StructuralEquality));
        let similarity: SharedSimilarity = self
            .similarity
            .unwrap_or_else(|| Arc::new(EqualitySimilarity::new(Arc::clone(&equality))));
        TraceEngine {
            config: self.config,
            strategies: Strategies {
                equality,
                similarity,
            },
            users: BTreeMap::new(),
            tree: TraceTree::new(),
            model: ModelGraph::default(),
        }
    }
}

/// Tracks user traces and keeps the shared tree and condensed model current.
///
/// Every update folds into a copy of the tree, forks it into a fresh model
/// and condenses that from scratch. Nothing is committed until all three
/// succeed, so a failed update leaves the previous tree and model in place.
///
/// Cost per update grows at least quadratically with the number of tree
/// states because every pair is scored.
pub struct TraceEngine {
    config: CondenseConfig,
    strategies: Strategies,
    users: BTreeMap<UserId, SharedTrace>,
    tree: TraceTree,
    model: ModelGraph,
}

impl Default for TraceEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TraceEngine {
    /// Starts a builder with default config and strategies.
    pub fn builder() -> TraceEngineBuilder {
        TraceEngineBuilder::default()
    }

    /// Condensation tunables in use.
    pub fn config(&self) -> &CondenseConfig {
        &self.config
    }

    /// Strategies in use.
    pub fn strategies(&self) -> &Strategies {
        &self.strategies
    }

    /// The shared prefix tree.
    pub fn trace_tree(&self) -> &TraceTree {
        &self.tree
    }

    /// The condensed model.
    pub fn output_model(&self) -> &ModelGraph {
        &self.model
    }

    /// Tracked users in ascending order.
    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.users.keys()
    }

    /// Handle of a tracked user's trace.
    pub fn user_trace(&self, user: &UserId) -> Option<&SharedTrace> {
        self.users.get(user)
    }

    /// Starts tracking `user` and folds what the trace already holds.
    ///
    /// Re-adding a tracked user replaces its handle and refolds it against a
    /// tree rebuilt without the old trace. A malformed trace stays tracked
    /// (so a later append can be retried) but the error is returned and the
    /// tree and model keep their previous contents.
    #[instrument(skip_all, fields(user = %user))]
    pub fn add_user(&mut self, user: UserId, handle: SharedTrace) -> Result<UpdateReport, EngineError> {
        let replaced = self.users.insert(user.clone(), handle).is_some();
        let base = if replaced {
            self.rebuilt_tree(Some(&user))?.0
        } else {
            self.tree.clone()
        };
        self.refresh(&user, base)
    }

    /// Refolds `user` after its capture session appended a step.
    #[instrument(skip_all, fields(user = %user))]
    pub fn on_step_appended(&mut self, user: &UserId) -> Result<UpdateReport, EngineError> {
        let base = self.tree.clone();
        self.refresh(user, base)
    }

    /// Drains every tracked trace's change journal and refreshes the users
    /// whose trace gained transitions, in ascending user order.
    #[instrument(skip(self))]
    pub fn pump_events(&mut self) -> PumpReport {
        let mut pending = Vec::new();
        let mut report = PumpReport::default();
        for (user, handle) in &self.users {
            match handle.try_borrow_mut() {
                Ok(mut trace) => {
                    let events = trace.graph_mut().drain_events();
                    if events.iter().any(GraphEvent::is_transition_added) {
                        pending.push(user.clone());
                    }
                }
                Err(_) => report.failures.push((user.clone(), EngineError::TraceBusy(user.clone()))),
            }
        }
        for user in pending {
            match self.on_step_appended(&user) {
                Ok(update) => report.updated.push(update),
                Err(err) => report.failures.push((user, err)),
            }
        }
        report
    }

    /// Stops tracking `user` and rebuilds the tree from the remaining users.
    #[instrument(skip_all, fields(user = %user))]
    pub fn remove_user(&mut self, user: &UserId) -> Result<RebuildReport, EngineError> {
        if !self.users.contains_key(user) {
            return Err(EngineError::UnknownUser(user.clone()));
        }
        let (tree, rebuild) = self.rebuilt_tree(Some(user))?;
        let mut model = tree.graph().fork();
        let condensed = condense(&mut model, &self.config, &self.strategies)?;

        self.users.remove(user);
        self.tree = tree;
        self.model = model;
        info!(
            users = self.users.len(),
            skipped = rebuild.skipped.len(),
            states = self.model.state_count(),
            "user removed, model rebuilt"
        );
        Ok(RebuildReport {
            removed: user.clone(),
            rebuild,
            condense: condensed,
        })
    }

    /// Where `user` currently is in the condensed model.
    pub fn locate(&self, user: &UserId) -> Result<Location, EngineError> {
        let trace = self.borrow_trace(user)?;
        replay::locate(&self.model, user, &trace).map_err(|source| EngineError::InvalidTraceShape {
            user: user.clone(),
            source,
        })
    }

    /// Exports every tracked trace.
    pub fn serialize_all(&self) -> Result<TraceSet, EngineError> {
        let mut traces = BTreeMap::new();
        for user in self.users.keys() {
            let trace = self.borrow_trace(user)?;
            traces.insert(user.clone(), trace.graph().to_serialized());
        }
        Ok(TraceSet { traces })
    }

    /// Imports every trace in `set` through [`TraceEngine::add_user`].
    ///
    /// Failures are collected per user instead of aborting the load.
    #[instrument(skip_all, fields(users = set.traces.len()))]
    pub fn load_all(&mut self, set: TraceSet) -> LoadReport {
        let mut report = LoadReport::default();
        for (user, serialized) in set.traces {
            let graph = match StateGraph::from_serialized(serialized) {
                Ok(graph) => graph,
                Err(err) => {
                    warn!(user = %user, error = %err, "discarding corrupt trace");
                    report.failures.push((user, err.into()));
                    continue;
                }
            };
            let handle = UserTrace::from_graph(graph).into_shared();
            report.handles.insert(user.clone(), SharedTrace::clone(&handle));
            if let Err(err) = self.add_user(user.clone(), handle) {
                report.failures.push((user, err));
            }
        }
        report
    }

    fn borrow_trace(&self, user: &UserId) -> Result<Ref<'_, UserTrace>, EngineError> {
        self.users
            .get(user)
            .ok_or_else(|| EngineError::UnknownUser(user.clone()))?
            .try_borrow()
            .map_err(|_| EngineError::TraceBusy(user.clone()))
    }

    fn refresh(&mut self, user: &UserId, mut tree: TraceTree) -> Result<UpdateReport, EngineError> {
        {
            let handle = self
                .users
                .get(user)
                .ok_or_else(|| EngineError::UnknownUser(user.clone()))?;
            // Consumed here so `pump_events` does not refold the same steps.
            handle
                .try_borrow_mut()
                .map_err(|_| EngineError::TraceBusy(user.clone()))?
                .graph_mut()
                .drain_events();
        }
        let fold = {
            let trace = self.borrow_trace(user)?;
            tree.fold_trace(user, &trace, self.strategies.equality.as_ref())
        };
        let fold = match fold {
            Ok(fold) => fold,
            Err(err) => {
                warn!(user = %user, error = %err, "trace not folded");
                return Err(err);
            }
        };
        let mut model = tree.graph().fork();
        let condensed = condense(&mut model, &self.config, &self.strategies)?;

        self.tree = tree;
        self.model = model;
        info!(
            user = %user,
            steps = fold.steps,
            tree_states = self.tree.graph().state_count(),
            model_states = self.model.state_count(),
            merges = condensed.merges.len(),
            "model updated"
        );
        Ok(UpdateReport {
            fold,
            condense: condensed,
        })
    }

    fn rebuilt_tree(&self, skip: Option<&UserId>) -> Result<(TraceTree, RebuildOutcome), EngineError> {
        let mut borrowed = Vec::with_capacity(self.users.len());
        for user in self.users.keys().filter(|u| Some(*u) != skip) {
            borrowed.push((user, self.borrow_trace(user)?));
        }
        Ok(TraceTree::rebuild(
            borrowed.iter().map(|(user, trace)| (*user, &**trace)),
            self.strategies.equality.as_ref(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::replay::MatchStatus;

    fn clicks(labels: &[&str]) -> SharedTrace {
        let mut steps = vec![Step::start_marker()];
        steps.extend(labels.iter().map(|l| Step::click("button", *l)));
        UserTrace::from_steps(steps).into_shared()
    }

    #[test]
    fn adding_a_user_builds_tree_and_model() {
        let mut engine = TraceEngine::default();
        let report = engine.add_user("a".into(), clicks(&["1", "2"])).unwrap();
        assert_eq!(report.fold.steps, 3);
        assert_eq!(engine.trace_tree().graph().state_count(), 4);
        assert!(engine.locate(&"a".into()).unwrap().is_complete());
    }

    #[test]
    fn unknown_users_are_rejected() {
        let mut engine = TraceEngine::default();
        assert!(matches!(
            engine.on_step_appended(&"ghost".into()),
            Err(EngineError::UnknownUser(_))
        ));
        assert!(matches!(engine.remove_user(&"ghost".into()), Err(EngineError::UnknownUser(_))));
        assert!(matches!(engine.locate(&"ghost".into()), Err(EngineError::UnknownUser(_))));
    }

    #[test]
    fn busy_traces_are_reported() {
        let mut engine = TraceEngine::default();
        let handle = clicks(&["1"]);
        engine.add_user("a".into(), SharedTrace::clone(&handle)).unwrap();
        let _guard = handle.borrow_mut();
        assert!(matches!(engine.locate(&"a".into()), Err(EngineError::TraceBusy(_))));
    }

    #[test]
    fn appended_steps_are_picked_up_by_pumping() {
        let mut engine = TraceEngine::default();
        let handle = clicks(&["1"]);
        engine.add_user("a".into(), SharedTrace::clone(&handle)).unwrap();
        assert!(engine.pump_events().updated.is_empty());

        handle.borrow_mut().record(Step::click("button", "2")).unwrap();
        let location = engine.locate(&"a".into()).unwrap();
        assert!(matches!(location.status, MatchStatus::Unmatched { at_step: 2, .. }));

        let pumped = engine.pump_events();
        assert_eq!(pumped.updated.len(), 1);
        assert!(pumped.failures.is_empty());
        assert!(engine.locate(&"a".into()).unwrap().is_complete());
    }

    #[test]
    fn re_adding_a_user_replaces_its_trace() {
        let mut engine = TraceEngine::default();
        engine.add_user("a".into(), clicks(&["1", "2"])).unwrap();
        engine.add_user("a".into(), clicks(&["3"])).unwrap();
        assert_eq!(engine.users().count(), 1);
        assert_eq!(engine.trace_tree().graph().transition_count(), 2);
    }

    #[test]
    fn custom_strategies_are_used() {
        let by_kind = |a: &Step, b: &Step| a.event_type == b.event_type;
        let mut engine = TraceEngine::builder().equality(by_kind).build();
        engine.add_user("a".into(), clicks(&["1"])).unwrap();
        engine.add_user("b".into(), clicks(&["2"])).unwrap();
        // every click is the same step under this equality
        assert_eq!(engine.trace_tree().graph().transition_count(), 2);
    }
}
