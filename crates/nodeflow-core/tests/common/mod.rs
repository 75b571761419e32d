// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::collections::BTreeMap;

use nodeflow_core::{ConnectionDoc, FlowDoc, NodeDoc, ParamValue, PortDoc};

pub fn port(id: &str, dtype: &str) -> PortDoc {
    PortDoc {
        id: id.to_owned(),
        dtype: dtype.to_owned(),
    }
}

pub fn node(
    id: &str,
    kind: &str,
    inputs: &[(&str, &str)],
    outputs: &[(&str, &str)],
    params: &[(&str, ParamValue)],
) -> NodeDoc {
    NodeDoc {
        id: id.to_owned(),
        kind: kind.to_owned(),
        inputs: inputs.iter().map(|(i, t)| port(i, t)).collect(),
        outputs: outputs.iter().map(|(i, t)| port(i, t)).collect(),
        parameters: params
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn wire(from_node: &str, from_port: &str, to_node: &str, to_port: &str) -> ConnectionDoc {
    ConnectionDoc {
        from_node: from_node.to_owned(),
        from_port: from_port.to_owned(),
        to_node: to_node.to_owned(),
        to_port: to_port.to_owned(),
    }
}

/// A `DeviceTrigger` with a single `out1` of `dtype`.
pub fn trigger(id: &str, dtype: &str) -> NodeDoc {
    node(
        id,
        "DeviceTrigger",
        &[],
        &[("out1", dtype)],
        &[("key", ParamValue::Str("1".into()))],
    )
}

/// A `Timer` with a single f64 `out1`.
pub fn timer(id: &str, interval_ms: f64) -> NodeDoc {
    node(
        id,
        "Timer",
        &[],
        &[("out1", "f64")],
        &[("interval_ms", ParamValue::Float(interval_ms))],
    )
}

/// A `Counter` with an f64 `in1` and an i32 `out1`.
pub fn counter(id: &str) -> NodeDoc {
    node(id, "Counter", &[("in1", "f64")], &[("out1", "i32")], &[])
}

/// An `Add` with `count` inputs `in1..inN` and a single `out1`, all `dtype`.
pub fn adder(id: &str, dtype: &str, count: usize) -> NodeDoc {
    let names: Vec<String> = (1..=count).map(|i| format!("in{i}")).collect();
    let inputs: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), dtype)).collect();
    node(id, "Add", &inputs, &[("out1", dtype)], &[])
}

/// The pure Add chain: triggers `a`, `b`, `c` (f32) feeding `sum`.
pub fn add_chain() -> FlowDoc {
    FlowDoc {
        nodes: vec![
            trigger("a", "f32"),
            trigger("b", "f32"),
            trigger("c", "f32"),
            adder("sum", "f32", 3),
        ],
        connections: vec![
            wire("a", "out1", "sum", "in1"),
            wire("b", "out1", "sum", "in2"),
            wire("c", "out1", "sum", "in3"),
        ],
    }
}

/// A timer feeding a counter: `m` (interval 3000ms) into `c`.
pub fn timer_counter() -> FlowDoc {
    FlowDoc {
        nodes: vec![timer("m", 3000.0), counter("c")],
        connections: vec![wire("m", "out1", "c", "in1")],
    }
}
