// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Telemetry sink trait for observability without coupling to I/O.
//!
//! The engine emits events through this trait and performs no I/O itself;
//! hosts decide what to do with them (tracing, counters, nothing). Runtime
//! misses, meaning `set_input` against a node that does not exist or cannot
//! be written, are swallowed and surface only here.
//!
//! All methods default to no-ops, so sinks implement only what they need.

/// Sink for engine events.
pub trait TelemetrySink: Send + Sync {
    /// Called when `set_input` / `set_input_config` target an unknown node
    /// or a node that is not a `DeviceTrigger`. The write had no effect.
    fn on_unknown_node(&self, _node_id: &str) {}

    /// Called after a node evaluates.
    fn on_node_evaluated(&self, _node_id: &str, _generation: u64) {}

    /// Called when a timer's pulse goes high during `tick`.
    fn on_timer_fired(&self, _node_id: &str) {}

    /// Called at the end of an `evaluate` call.
    fn on_evaluate_complete(&self, _generation: u64, _nodes_evaluated: u64) {}
}

/// A no-op sink that discards all events; the default when none is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {}
