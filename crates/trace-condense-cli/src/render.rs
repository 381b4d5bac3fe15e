// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Text and JSON renderings of trees, models and locations.

use anyhow::Result;
use comfy_table::Table;
use serde::Serialize;
use trace_condense::{Location, MatchStatus, ModelGraph, UserId};

/// One transition, flattened for display.
#[derive(Debug, Serialize)]
pub struct TransitionRow {
    /// Transition handle.
    pub id: String,
    /// Source state.
    pub from: String,
    /// Destination state.
    pub to: String,
    /// Representative step.
    pub step: String,
    /// Attributed users.
    pub users: Vec<String>,
}

/// Whole-graph summary.
#[derive(Debug, Serialize)]
pub struct GraphSummary {
    /// Live state count.
    pub states: usize,
    /// Every transition in creation order.
    pub transitions: Vec<TransitionRow>,
    /// Hex BLAKE3 hash of the canonical encoding.
    pub hash: String,
}

impl GraphSummary {
    /// Summarizes `graph`.
    pub fn of(graph: &ModelGraph) -> Result<Self> {
        let transitions = graph
            .transitions()
            .filter_map(|t| graph.transition(t).map(|record| (t, record)))
            .map(|(t, record)| TransitionRow {
                id: t.to_string(),
                from: record.from().to_string(),
                to: record.to().to_string(),
                step: record.payload().step.to_string(),
                users: record
                    .payload()
                    .attribution
                    .users()
                    .map(ToString::to_string)
                    .collect(),
            })
            .collect();
        Ok(Self {
            states: graph.state_count(),
            transitions,
            hash: hex::encode(graph.canonical_hash()?),
        })
    }

    /// Table form.
    pub fn to_text(&self) -> String {
        let mut table = Table::new();
        table.set_header(vec!["transition", "from", "to", "step", "users"]);
        for row in &self.transitions {
            table.add_row(vec![
                row.id.clone(),
                row.from.clone(),
                row.to.clone(),
                row.step.clone(),
                row.users.join(", "),
            ]);
        }
        format!(
            "{table}\nstates: {}  transitions: {}  hash: {}",
            self.states,
            self.transitions.len(),
            self.hash
        )
    }
}

/// A user's location, ready to print.
#[derive(Debug, Serialize)]
pub struct LocationView<'a> {
    /// Located user.
    pub user: &'a UserId,
    /// The location itself.
    #[serde(flatten)]
    pub location: Location,
}

impl LocationView<'_> {
    /// One-line form.
    pub fn to_text(&self) -> String {
        let Location {
            state,
            matched_steps,
            status,
        } = self.location;
        match status {
            MatchStatus::Complete => {
                format!("{} at {state} (complete, {matched_steps} steps)", self.user)
            }
            MatchStatus::Unmatched { at_step, transition } => format!(
                "{} at {state} (unmatched at step {at_step}, {transition}; {matched_steps} steps matched)",
                self.user
            ),
        }
    }
}
