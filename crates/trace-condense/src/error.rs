// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine error taxonomy.
use thiserror::Error;
use trace_graph::{GraphError, StateId};

use crate::model::UserId;
use crate::trace::TraceShapeError;

/// Errors surfaced by the tree builder, the merge engine and the façade.
///
/// None of these are retried: everything is synchronous local computation, so
/// a failure aborts only the triggering update and leaves the previous tree
/// and model in place.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A user's trace is not a single acyclic chain. Other users are
    /// unaffected; this user's contribution stays at its last good fold.
    #[error("invalid trace shape for user {user}: {source}")]
    InvalidTraceShape {
        /// Offending user.
        user: UserId,
        /// What was wrong with the trace.
        #[source]
        source: TraceShapeError,
    },
    /// The user is not tracked by this engine.
    #[error("unknown user: {0}")]
    UnknownUser(UserId),
    /// The user's trace handle is mutably borrowed by its capture session.
    #[error("trace for user {0} is busy")]
    TraceBusy(UserId),
    /// A merge was requested between a state and itself or with the start state.
    #[error("invalid merge of {remove} into {into}")]
    InvalidMerge {
        /// State that would be removed.
        remove: StateId,
        /// State that would survive.
        into: StateId,
    },
    /// A graph primitive rejected an operation.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
    /// A trace set could not be (de)serialized.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
