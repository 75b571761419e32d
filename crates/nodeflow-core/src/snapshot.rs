// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Observer views: full snapshots and watermark deltas.
//!
//! Both views are read-only with respect to the engine and iterate ports in
//! ascending handle order, so observers always see the same ordering for
//! the same state. Deltas honor the at-most-once contract: a port appears
//! at most once per query, with its final value, no matter how many writes
//! landed on it during the generation.

use std::collections::BTreeMap;

use crate::graph::GraphStore;
use crate::ident::{Direction, PortHandle};
use crate::state::FlowState;
use crate::value::Value;

/// Every output port, keyed `node_id:port_id`.
pub(crate) fn full_snapshot(graph: &GraphStore, state: &FlowState) -> BTreeMap<String, Value> {
    let mut view = BTreeMap::new();
    for i in 0..graph.port_count() {
        let handle = PortHandle(i as u32);
        let port = graph.port(handle);
        if port.direction != Direction::Output {
            continue;
        }
        let key = format!("{}:{}", graph.node(port.owner).id, port.id);
        view.insert(key, state.value(handle).clone());
    }
    view
}

/// Output ports whose stamp is strictly greater than the watermark.
pub(crate) fn delta_since(
    graph: &GraphStore,
    state: &FlowState,
    watermark: u64,
) -> BTreeMap<PortHandle, Value> {
    let mut view = BTreeMap::new();
    for i in 0..graph.port_count() {
        let handle = PortHandle(i as u32);
        if graph.port(handle).direction != Direction::Output {
            continue;
        }
        if state.stamp(handle) > watermark {
            view.insert(handle, state.value(handle).clone());
        }
    }
    view
}
