// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Greedy score-then-merge driver.
use trace_graph::{StateGraph, StateId};
use tracing::{debug, warn};

use crate::config::CondenseConfig;
use crate::error::EngineError;
use crate::merge::{merge_states, remove_conflicting_transitions, remove_stale_states, MergeReport};
use crate::model::TreeTransition;
use crate::pair_map::StatePair;
use crate::score::score_pairs;
use crate::strategy::Strategies;

/// One merge performed by [`iterate_merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeDecision {
    /// Winning pair.
    pub pair: StatePair,
    /// Its score.
    pub score: f64,
    /// State that survived (`pair.lo()`).
    pub kept: StateId,
    /// State that was merged away (`pair.hi()`).
    pub removed: StateId,
    /// Merge details.
    pub report: MergeReport,
}

/// Summary of a [`condense`] pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CondenseReport {
    /// Merges in the order performed.
    pub merges: Vec<MergeDecision>,
    /// Duplicate transitions removed by the final sweep.
    pub conflicts_resolved: usize,
    /// States collected by the final sweep, orphans of resolved conflicts first.
    pub stale_removed: Vec<StateId>,
    /// The merge bound stopped the loop while a pair still cleared the threshold.
    pub bound_hit: bool,
}

/// Best pair strictly above `threshold`, if any.
///
/// Pairs are ranked by score descending with ties going to the smallest
/// pair; NaN scores never win.
pub fn best_candidate<S>(
    graph: &StateGraph<S, TreeTransition>,
    config: &CondenseConfig,
    strategies: &Strategies,
) -> Option<(StatePair, f64)> {
    let scores = score_pairs(
        graph,
        config.rounds,
        config.unmatched_penalty,
        strategies.equality.as_ref(),
        strategies.similarity.as_ref(),
    );
    scores
        .ranked()
        .into_iter()
        .find(|(_, score)| !score.is_nan())
        .filter(|(_, score)| *score > config.threshold)
}

/// Scores every pair and merges the best one if it clears the threshold.
///
/// Returns `None` when no merge was performed.
pub fn iterate_merge<S>(
    graph: &mut StateGraph<S, TreeTransition>,
    config: &CondenseConfig,
    strategies: &Strategies,
) -> Result<Option<MergeDecision>, EngineError> {
    let Some((pair, score)) = best_candidate(graph, config, strategies) else {
        return Ok(None);
    };
    let (kept, removed) = (pair.lo(), pair.hi());
    let report = merge_states(graph, removed, kept, strategies.equality.as_ref())?;
    debug!(
        kept = %kept,
        removed = %removed,
        score,
        pruned = report.pruned.len(),
        "merged states"
    );
    Ok(Some(MergeDecision {
        pair,
        score,
        kept,
        removed,
        report,
    }))
}

/// Merges until no pair clears the threshold, then resolves duplicate
/// transitions on every state and collects stale states.
pub fn condense<S>(
    graph: &mut StateGraph<S, TreeTransition>,
    config: &CondenseConfig,
    strategies: &Strategies,
) -> Result<CondenseReport, EngineError> {
    let bound = config.max_merges.unwrap_or_else(|| graph.state_count());
    let mut report = CondenseReport::default();
    loop {
        if report.merges.len() >= bound {
            if best_candidate(graph, config, strategies).is_some() {
                warn!(bound, "merge bound reached before condensation settled");
                report.bound_hit = true;
            }
            break;
        }
        match iterate_merge(graph, config, strategies)? {
            Some(decision) => report.merges.push(decision),
            None => break,
        }
    }

    let survivors: Vec<StateId> = graph.states().collect();
    for state in survivors {
        if !graph.has_state(state) {
            continue;
        }
        let resolved = remove_conflicting_transitions(graph, state, strategies.equality.as_ref())?;
        report.conflicts_resolved += resolved.removed;
        report.stale_removed.extend(resolved.pruned);
    }
    report.stale_removed.extend(remove_stale_states(graph)?);
    debug!(
        merges = report.merges.len(),
        conflicts = report.conflicts_resolved,
        stale = report.stale_removed.len(),
        "condensation settled"
    );
    Ok(report)
}
