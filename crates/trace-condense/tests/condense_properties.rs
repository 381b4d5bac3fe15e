// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Properties that must hold for any set of well-formed traces.

#![allow(missing_docs)]
mod common;

use common::{pinned_runner, tokens, tree_signature};
use proptest::prelude::*;
use trace_condense::{
    iterate_merge, remove_stale_states, score_pairs, CondenseConfig, Strategies, TraceEngine,
    TraceTree, UserId,
};

fn user_traces() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(0u8..3, 0..6), 1..5)
}

fn user(i: usize) -> UserId {
    UserId::from(format!("u{i}"))
}

#[test]
fn tree_shape_does_not_depend_on_add_order() {
    let mut runner = pinned_runner(0x31, 64);
    let cases = user_traces().prop_flat_map(|traces| {
        let order: Vec<usize> = (0..traces.len()).collect();
        (Just(traces), Just(order).prop_shuffle())
    });
    runner
        .run(&cases, |(traces, order)| {
            let strategies = Strategies::default();
            let mut sorted = TraceTree::new();
            for (i, t) in traces.iter().enumerate() {
                sorted
                    .fold_trace(&user(i), &tokens(t), strategies.equality.as_ref())
                    .unwrap();
            }
            let mut shuffled = TraceTree::new();
            for i in &order {
                shuffled
                    .fold_trace(&user(*i), &tokens(&traces[*i]), strategies.equality.as_ref())
                    .unwrap();
            }
            prop_assert_eq!(tree_signature(sorted.graph()), tree_signature(shuffled.graph()));
            prop_assert_eq!(sorted.graph().state_count(), shuffled.graph().state_count());
            Ok(())
        })
        .expect("tree construction is order independent");
}

#[test]
fn every_user_replays_without_error() {
    let mut runner = pinned_runner(0x32, 48);
    runner
        .run(&user_traces(), |traces| {
            let config = CondenseConfig {
                threshold: 1.0,
                ..CondenseConfig::default()
            };
            let mut engine = TraceEngine::builder().config(config).build();
            for (i, t) in traces.iter().enumerate() {
                engine.add_user(user(i), tokens(t).into_shared()).unwrap();
            }
            let model = engine.output_model();
            for (i, t) in traces.iter().enumerate() {
                let location = engine.locate(&user(i)).unwrap();
                prop_assert!(location.matched_steps <= t.len() + 1);
                prop_assert!(model.has_state(location.state));

                // Every recorded step stays attributed to exactly one transition.
                let trace = tokens(t);
                for link in trace.walk().unwrap() {
                    let carriers = model
                        .transitions()
                        .filter_map(|m| model.transition_payload(m))
                        .filter(|p| p.attribution.contains(&user(i), link.transition))
                        .count();
                    prop_assert_eq!(carriers, 1);
                }
            }
            Ok(())
        })
        .expect("replay terminates and condensation keeps every step attributed");
}

#[test]
fn condensed_models_have_no_stale_states() {
    let mut runner = pinned_runner(0x33, 48);
    runner
        .run(&user_traces(), |traces| {
            let config = CondenseConfig {
                threshold: 0.5,
                ..CondenseConfig::default()
            };
            let mut engine = TraceEngine::builder().config(config).build();
            for (i, t) in traces.iter().enumerate() {
                engine.add_user(user(i), tokens(t).into_shared()).unwrap();
            }
            let mut model = engine.output_model().fork();
            prop_assert!(remove_stale_states(&mut model).unwrap().is_empty());
            prop_assert!(remove_stale_states(&mut model).unwrap().is_empty());
            Ok(())
        })
        .expect("stale collection is idempotent");
}

#[test]
fn merged_states_are_never_offered_again() {
    let mut runner = pinned_runner(0x34, 48);
    runner
        .run(&user_traces(), |traces| {
            let strategies = Strategies::default();
            let config = CondenseConfig {
                threshold: 0.0,
                ..CondenseConfig::default()
            };
            let mut tree = TraceTree::new();
            for (i, t) in traces.iter().enumerate() {
                tree.fold_trace(&user(i), &tokens(t), strategies.equality.as_ref())
                    .unwrap();
            }
            let mut model = tree.graph().fork();
            while let Some(decision) = iterate_merge(&mut model, &config, &strategies).unwrap() {
                prop_assert!(!model.has_state(decision.removed));
                let scores = score_pairs(
                    &model,
                    config.rounds,
                    config.unmatched_penalty,
                    strategies.equality.as_ref(),
                    strategies.similarity.as_ref(),
                );
                prop_assert!(scores.iter().all(|(pair, _)| !pair.contains(decision.removed)));
                for pruned in &decision.report.pruned {
                    prop_assert!(scores.iter().all(|(pair, _)| !pair.contains(*pruned)));
                }
            }
            Ok(())
        })
        .expect("merged pairs disappear from later scoring");
}
