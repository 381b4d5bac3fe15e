// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::collections::BTreeSet;

use proptest::test_runner::{Config as PropConfig, RngAlgorithm, TestRng, TestRunner};
use trace_condense::trace_graph::{StateId, TransitionId};
use trace_condense::{ModelGraph, SharedTrace, Step, UserId, UserTrace};

/// Click step on a button labelled `label`.
pub fn click(label: &str) -> Step {
    Step::click("button", label)
}

/// Trace opened with a start marker followed by one click per label.
pub fn clicks(labels: &[&str]) -> UserTrace {
    let mut steps = vec![Step::start_marker()];
    steps.extend(labels.iter().map(|l| click(l)));
    UserTrace::from_steps(steps)
}

/// [`clicks`] wrapped in a shared handle.
pub fn shared(labels: &[&str]) -> SharedTrace {
    clicks(labels).into_shared()
}

/// Trace from small integer tokens, each a distinct click target.
pub fn tokens(tokens: &[u8]) -> UserTrace {
    let mut steps = vec![Step::start_marker()];
    steps.extend(tokens.iter().map(|t| click(&t.to_string())));
    UserTrace::from_steps(steps)
}

/// Deterministic proptest runner seeded from `seed`.
pub fn pinned_runner(seed: u8, cases: u32) -> TestRunner {
    let mut seed_bytes = [0u8; 32];
    seed_bytes[0] = seed;
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &seed_bytes);
    TestRunner::new_with_rng(
        PropConfig {
            cases,
            ..PropConfig::default()
        },
        rng,
    )
}

/// Outgoing transition of `from` whose step displays as `label`.
pub fn transition_labelled(graph: &ModelGraph, from: StateId, label: &str) -> Option<TransitionId> {
    graph.outgoing(from).iter().copied().find(|t| {
        graph
            .transition_payload(*t)
            .is_some_and(|p| p.step.to_string() == format!("click {label}"))
    })
}

/// Every user attributed anywhere in `graph`.
pub fn attributed_users(graph: &ModelGraph) -> BTreeSet<UserId> {
    graph
        .transitions()
        .filter_map(|t| graph.transition_payload(t))
        .flat_map(|p| p.attribution.users().cloned().collect::<Vec<_>>())
        .collect()
}

/// Handle-independent rendering of an acyclic graph reachable from its start
/// state: children sorted by step and attribution, recursively.
pub fn tree_signature(graph: &ModelGraph) -> String {
    fn render(graph: &ModelGraph, state: StateId, depth: usize) -> String {
        if depth > 64 {
            return "...".to_owned();
        }
        let mut children: Vec<String> = graph
            .outgoing(state)
            .iter()
            .filter_map(|t| graph.transition(*t))
            .map(|record| {
                let payload = record.payload();
                let users: Vec<String> = payload
                    .attribution
                    .users()
                    .map(|u| {
                        let ids: Vec<String> =
                            payload.attribution.transitions_of(u).map(|t| t.to_string()).collect();
                        format!("{u}:{}", ids.join("+"))
                    })
                    .collect();
                format!(
                    "{}<{}>{}",
                    payload.step,
                    users.join(","),
                    render(graph, record.to(), depth + 1)
                )
            })
            .collect();
        children.sort();
        format!("({})", children.join(" "))
    }
    render(graph, graph.start_state(), 0)
}
