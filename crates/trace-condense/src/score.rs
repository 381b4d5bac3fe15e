// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Multi-round pairwise state similarity.
//!
//! Each unordered pair of non-root states gets a base score from greedily
//! matching their outgoing transitions. Every further round adds the previous
//! round's score of each matched pair of destinations, so a pair looks more
//! alike when its successors already looked alike.
use trace_graph::{StateGraph, StateId, TransitionId};

use crate::model::TreeTransition;
use crate::pair_map::{PairScoreMap, StatePair};
use crate::strategy::{StepEquality, StepSimilarity};

/// Scoring inputs for one pair, computed once and reused across rounds.
#[derive(Debug, Clone)]
struct PairAnalysis {
    pair: StatePair,
    base: f64,
    successors: Vec<(StateId, StateId)>,
}

/// Scores every unordered pair of distinct non-root states.
///
/// Matching walks `a`'s outgoing transitions in adjacency order and pairs
/// each with the first still-unmatched transition of `b` whose step is equal,
/// which is why adjacency order must be stable. Destination pairs that
/// collapse to one state or involve the root contribute nothing.
pub fn score_pairs<S>(
    graph: &StateGraph<S, TreeTransition>,
    rounds: usize,
    unmatched_penalty: f64,
    equality: &dyn StepEquality,
    similarity: &dyn StepSimilarity,
) -> PairScoreMap {
    let root = graph.start_state();
    let states: Vec<StateId> = graph.states().filter(|s| *s != root).collect();

    let mut analyses = Vec::with_capacity(states.len() * states.len().saturating_sub(1) / 2);
    for (i, a) in states.iter().enumerate() {
        for b in &states[i + 1..] {
            analyses.push(analyze(graph, *a, *b, unmatched_penalty, equality, similarity));
        }
    }

    let mut scores = PairScoreMap::new();
    for analysis in &analyses {
        scores.set(analysis.pair.lo(), analysis.pair.hi(), analysis.base);
    }
    for _ in 0..rounds {
        let mut next = PairScoreMap::new();
        for analysis in &analyses {
            let propagated: f64 = analysis
                .successors
                .iter()
                .map(|(d1, d2)| StatePair::new(*d1, *d2))
                .filter(|pair| !pair.is_diagonal() && !pair.contains(root))
                .map(|pair| scores.get_or(pair.lo(), pair.hi(), 0.0))
                .sum();
            next.set(analysis.pair.lo(), analysis.pair.hi(), analysis.base + propagated);
        }
        scores = next;
    }
    scores
}

fn analyze<S>(
    graph: &StateGraph<S, TreeTransition>,
    a: StateId,
    b: StateId,
    unmatched_penalty: f64,
    equality: &dyn StepEquality,
    similarity: &dyn StepSimilarity,
) -> PairAnalysis {
    let out_a = graph.outgoing(a);
    let out_b = graph.outgoing(b);
    let mut taken = vec![false; out_b.len()];
    let mut matched_similarity = 0.0;
    let mut unmatched = 0usize;
    let mut successors = Vec::new();

    for ta in out_a {
        let Some(pa) = graph.transition_payload(*ta) else {
            unmatched += 1;
            continue;
        };
        let hit = out_b.iter().enumerate().find(|(j, tb)| {
            !taken[*j]
                && graph
                    .transition_payload(**tb)
                    .is_some_and(|pb| equality.steps_equal(&pa.step, &pb.step))
        });
        match hit {
            Some((j, tb)) => {
                taken[j] = true;
                if let Some(pb) = graph.transition_payload(*tb) {
                    matched_similarity += similarity.similarity(&pa.step, &pb.step);
                }
                if let (Some(da), Some(db)) = (dest(graph, *ta), dest(graph, *tb)) {
                    successors.push((da, db));
                }
            }
            None => unmatched += 1,
        }
    }
    unmatched += taken.iter().filter(|t| !**t).count();
    // Counts stay far below 2^52.
    #[allow(clippy::cast_precision_loss)]
    let leftover = unmatched as f64;

    PairAnalysis {
        pair: StatePair::new(a, b),
        base: matched_similarity - unmatched_penalty * leftover,
        successors,
    }
}

fn dest<S>(graph: &StateGraph<S, TreeTransition>, t: TransitionId) -> Option<StateId> {
    graph.transition_to(t)
}
