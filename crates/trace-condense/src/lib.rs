// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Trace condensation: from many users' linear interaction traces to one
//! generalized behavior model.
//!
//! Each user's [`UserTrace`] is folded into a shared [`TraceTree`] that
//! deduplicates identical prefixes. On every update the tree is forked into a
//! fresh model, and [`condense`] greedily merges the best-scoring pair of
//! states (multi-round, successor-aware scoring) until no pair clears the
//! configured threshold. [`locate`] replays a user's own trace through the
//! model to find where that user currently is.
//!
//! [`TraceEngine`] ties the pieces together behind the add/remove/update
//! entry points a capture or transport layer drives.
//!
//! # Known limitation
//!
//! Nothing is carried across updates: every update re-folds, re-forks and
//! re-condenses, and scoring visits every pair of states. Per-update cost is
//! therefore at least quadratic in the number of tree states. Changing this
//! into incremental condensation would change which merges happen.
#![forbid(unsafe_code)]

mod condense;
mod config;
mod engine;
mod error;
mod merge;
mod model;
mod pair_map;
mod replay;
mod score;
mod step;
mod strategy;
mod trace;
mod tree;

pub use condense::{best_candidate, condense, iterate_merge, CondenseReport, MergeDecision};
pub use config::{
    CondenseConfig, ConfigError, ConfigService, ConfigStore, MemoryConfigStore, CONDENSE_CONFIG_KEY,
};
pub use engine::{
    LoadReport, PumpReport, RebuildReport, TraceEngine, TraceEngineBuilder, TraceSet, UpdateReport,
};
pub use error::EngineError;
pub use merge::{
    merge_states, remove_conflicting_transitions, remove_stale_states, ConflictReport, MergeReport,
};
pub use model::{Attribution, ModelGraph, TreeState, TreeTransition, UserId};
pub use pair_map::{PairScoreMap, StatePair};
pub use replay::{locate, Location, MatchStatus};
pub use score::score_pairs;
pub use step::{ElementTarget, ParentLink, Step, START_EVENT};
pub use strategy::{
    EqualitySimilarity, SharedEquality, SharedSimilarity, StepEquality, StepSimilarity, Strategies,
    StructuralEquality,
};
pub use trace::{Links, SharedTrace, TraceLink, TraceShapeError, UserTrace};
pub use tree::{FoldReport, RebuildOutcome, TraceTree};

pub use trace_graph;
