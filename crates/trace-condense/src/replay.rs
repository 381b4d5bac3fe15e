// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Locating a user inside the condensed model.
use serde::Serialize;
use trace_graph::{StateGraph, StateId, TransitionId};

use crate::model::{TreeTransition, UserId};
use crate::trace::{TraceShapeError, UserTrace};

/// Whether the whole trace could be followed through the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchStatus {
    /// Every step of the trace was followed.
    Complete,
    /// The model has no attributed successor for a step yet, usually
    /// because it has not been condensed since the user moved on.
    Unmatched {
        /// Zero-based index of the first unmatched step.
        at_step: usize,
        /// The user-trace transition that could not be followed.
        transition: TransitionId,
    },
}

/// A user's current position in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    /// Last model state reached.
    pub state: StateId,
    /// Steps followed before stopping.
    pub matched_steps: usize,
    /// Why the replay stopped.
    #[serde(flatten)]
    pub status: MatchStatus,
}

impl Location {
    /// Returns `true` when every step was followed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == MatchStatus::Complete
    }
}

/// Replays `trace` through `model`, following at each state the transition
/// attributed to `(user, step)`.
///
/// Always terminates: every iteration advances the user-trace cursor, and a
/// revisited trace state is reported as circular.
///
/// # Errors
///
/// The same [`TraceShapeError`]s as folding, for the part of the trace
/// walked before the replay stopped.
pub fn locate<S>(
    model: &StateGraph<S, TreeTransition>,
    user: &UserId,
    trace: &UserTrace,
) -> Result<Location, TraceShapeError> {
    let mut cursor = model.start_state();
    let mut matched_steps = 0;
    for (index, link) in trace.links().enumerate() {
        let link = link?;
        let next = model.outgoing(cursor).iter().find_map(|t| {
            model
                .transition(*t)
                .filter(|record| record.payload().attribution.contains(user, link.transition))
                .map(|record| record.to())
        });
        let Some(next) = next else {
            return Ok(Location {
                state: cursor,
                matched_steps,
                status: MatchStatus::Unmatched {
                    at_step: index,
                    transition: link.transition,
                },
            });
        };
        cursor = next;
        matched_steps += 1;
    }
    Ok(Location {
        state: cursor,
        matched_steps,
        status: MatchStatus::Complete,
    })
}
