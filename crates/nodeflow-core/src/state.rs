// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Run-time state arenas: port values, generation stamps, and the per-kind
//! side tables.
//!
//! The value arena and the stamp arena are parallel, handle-indexed, and
//! identical in length. Timer and Counter state lives in parallel arrays
//! indexed by node position so evaluation never chases per-instance
//! allocations. Everything is pre-sized at load; steady state allocates
//! nothing (numeric writes move a tag and a word).

use crate::graph::GraphStore;
use crate::ident::PortHandle;
use crate::value::Value;

/// Mutable evaluation state for one loaded graph.
#[derive(Debug, Clone)]
pub struct FlowState {
    /// Current value per port handle.
    values: Vec<Value>,
    /// Generation stamp of the last write per port handle.
    stamps: Vec<u64>,
    /// Timer accumulators, indexed by node position (zero for non-timers).
    pub(crate) timer_acc: Vec<f64>,
    /// Timer pulse level (0 or 1), indexed by node position.
    pub(crate) timer_pulse: Vec<f64>,
    /// Counter previous-edge state, indexed by node position.
    pub(crate) counter_prev: Vec<bool>,
    /// Counter running totals (f64 for uniformity), indexed by node
    /// position.
    pub(crate) counter_total: Vec<f64>,
}

impl FlowState {
    /// Zero-initialized state sized to `graph`.
    pub(crate) fn for_graph(graph: &GraphStore) -> Self {
        let values = (0..graph.port_count())
            .map(|i| Value::zero(graph.port(PortHandle(i as u32)).dtype))
            .collect();
        let node_count = graph.node_count();
        Self {
            values,
            stamps: vec![0; graph.port_count()],
            timer_acc: vec![0.0; node_count],
            timer_pulse: vec![0.0; node_count],
            counter_prev: vec![false; node_count],
            counter_total: vec![0.0; node_count],
        }
    }

    /// Current value of the port behind `handle`.
    #[must_use]
    pub fn value(&self, handle: PortHandle) -> &Value {
        &self.values[handle.index()]
    }

    /// Generation stamp of the last write to `handle`.
    #[must_use]
    pub fn stamp(&self, handle: PortHandle) -> u64 {
        self.stamps[handle.index()]
    }

    /// Writes `value` to `handle` and stamps it with `generation`. The
    /// stamp is refreshed even when the value is unchanged.
    pub(crate) fn write(&mut self, handle: PortHandle, value: Value, generation: u64) {
        self.values[handle.index()] = value;
        self.stamps[handle.index()] = generation;
    }
}
