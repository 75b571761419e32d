// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! nodeflow-core: deterministic dataflow evaluation engine.
//!
//! The engine loads a directed acyclic graph of typed computational nodes
//! from a declarative document, evaluates it deterministically in response
//! to external input events and the passage of time, and exposes every
//! output port to observers through snapshots and generation-stamped
//! deltas.
//!
//! # Determinism contract
//!
//! - All string identifiers are interned to dense integer handles at load;
//!   the hot path indexes flat arrays and never hashes.
//! - Handle assignment, topological order, and initial state are pure
//!   functions of the document's declared ordering.
//! - Evaluation is strictly single-threaded: a cold-start sweep in
//!   topological order, then dirty-driven passes draining a ready queue in
//!   ascending `(topological index, node)` order with per-generation
//!   duplicate suppression.
//! - Change detection is bitwise-by-value, so NaNs do not self-propagate.
//! - Neither `tick` nor `evaluate` blocks, fails, or allocates per-node
//!   state.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self,
    // Coercion by `as` (truncation toward zero) and bitwise float
    // comparison are the specified semantics, not accidents.
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]

mod doc;
mod engine_impl;
mod graph;
mod ident;
mod kind;
mod scheduler;
mod snapshot;
mod state;
mod telemetry;
mod value;

/// Flow document structs consumed by `load`.
pub use doc::{ConnectionDoc, FlowDoc, NodeDoc, ParamValue, PortDoc};
/// The evaluation engine.
pub use engine_impl::FlowEngine;
/// Immutable graph tables, record types, and load failures.
pub use graph::{EdgeRecord, GraphStore, LoadError, NodeRecord, PortRecord};
/// Dense handle types.
pub use ident::{Direction, NodeIx, PortHandle};
/// The closed set of node kinds.
pub use kind::NodeKind;
/// Observability sink trait and the no-op default.
pub use telemetry::{NullTelemetrySink, TelemetrySink};
/// Tagged scalars and declared port types.
pub use value::{DType, Value};
