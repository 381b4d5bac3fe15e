// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Directed labeled multigraph used by the trace condensation engine.
//!
//! States and transitions live in an arena keyed by integer handles
//! ([`StateId`], [`TransitionId`]), so merges that re-point transitions and
//! delete states never leave dangling references. Adjacency lists keep
//! insertion order; algorithms that match transitions greedily depend on it.
//!
//! The graph has a single start state that cannot be removed, an opt-in
//! change journal ([`GraphEvent`]), and a portable serialized form with a
//! canonical CBOR encoding and BLAKE3 hash for determinism checks.
#![forbid(unsafe_code)]

mod event;
mod graph;
mod ident;
mod serial;

pub use event::GraphEvent;
pub use graph::{GraphError, StateGraph, TransitionRecord};
pub use ident::{StateId, TransitionId};
pub use serial::{Hash32, SerializedGraph, SerializedState, SerializedTransition};
