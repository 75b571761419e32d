// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! The closed set of node kinds and their evaluation semantics.
//!
//! Every kind computes one value per evaluation in its *compute type* (the
//! declared type of the node's first output) and broadcasts it to all of its
//! outputs. Timer and Counter are the only stateful kinds; their state lives
//! in the side tables of the state arena, indexed by node position.

use crate::graph::{GraphStore, NodeRecord};
use crate::ident::NodeIx;
use crate::state::FlowState;
use crate::value::{DType, Value};

/// Kind tag of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Constant source: emits its `value` parameter.
    Value,
    /// Externally driven source: emits the last value written by
    /// `set_input`. The only kind hosts may write to.
    DeviceTrigger,
    /// Periodic pulse generator driven by `tick`.
    Timer,
    /// Rising-edge counter on its first input.
    Counter,
    /// Sums all inputs in the compute type.
    Add,
}

impl NodeKind {
    /// Parses a document kind tag. Unrecognized tags yield `None`; such
    /// nodes load as inert and hold their outputs at zero.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "Value" => Some(Self::Value),
            "DeviceTrigger" => Some(Self::DeviceTrigger),
            "Timer" => Some(Self::Timer),
            "Counter" => Some(Self::Counter),
            "Add" => Some(Self::Add),
            _ => None,
        }
    }

    /// Canonical tag name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Value => "Value",
            Self::DeviceTrigger => "DeviceTrigger",
            Self::Timer => "Timer",
            Self::Counter => "Counter",
            Self::Add => "Add",
        }
    }
}

/// Returns the timer interval when the node carries a positive
/// `interval_ms`. A missing or non-positive interval disables the timer
/// (outputs held at zero, accumulator never advances).
pub(crate) fn timer_interval(node: &NodeRecord) -> Option<f64> {
    let interval = node.params.get("interval_ms")?.as_f64();
    (interval > 0.0).then_some(interval)
}

/// An input value is "high" iff strictly greater than one half.
pub(crate) fn is_high(value: f64) -> bool {
    value > 0.5
}

/// Computes the node's output value in its compute type, advancing Counter
/// edge state as a side effect. Inputs are read from the port arena, where
/// edge propagation has already coerced them to their declared types.
pub(crate) fn node_output(graph: &GraphStore, state: &mut FlowState, ix: NodeIx) -> Value {
    let node = graph.node(ix);
    let ct = node.compute.unwrap_or(DType::F32);
    let zero = Value::zero(ct);
    let Some(kind) = node.kind else {
        return zero;
    };
    match kind {
        NodeKind::Value | NodeKind::DeviceTrigger => node
            .params
            .get("value")
            .map_or(zero, |param| param.coerce_to(ct)),
        NodeKind::Timer => {
            if timer_interval(node).is_some() {
                Value::F64(state.timer_pulse[ix.index()]).coerce_to(ct)
            } else {
                zero
            }
        }
        NodeKind::Counter => {
            let level = node
                .input_handles()
                .next()
                .map_or(0.0, |h| state.value(h).as_f64());
            let high = is_high(level);
            let slot = ix.index();
            if high && !state.counter_prev[slot] {
                state.counter_total[slot] += 1.0;
            }
            state.counter_prev[slot] = high;
            Value::F64(state.counter_total[slot]).coerce_to(ct)
        }
        NodeKind::Add => sum_inputs(graph, state, node, ct),
    }
}

/// Sums every input port in the compute type. Unconnected inputs hold their
/// initial zero and contribute nothing. Integer summation wraps rather than
/// trapping so evaluation can never panic.
fn sum_inputs(_graph: &GraphStore, state: &FlowState, node: &NodeRecord, ct: DType) -> Value {
    match ct {
        DType::I32 => {
            let mut sum = 0i32;
            for h in node.input_handles() {
                sum = sum.wrapping_add(state.value(h).as_i32());
            }
            Value::I32(sum)
        }
        DType::F32 => {
            let mut sum = 0f32;
            for h in node.input_handles() {
                sum += state.value(h).as_f32();
            }
            Value::F32(sum)
        }
        DType::F64 => {
            let mut sum = 0f64;
            for h in node.input_handles() {
                sum += state.value(h).as_f64();
            }
            Value::F64(sum)
        }
        // Strings never compute; an Add declared over strings holds zero.
        DType::Str => Value::zero(DType::Str),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_covers_the_closed_set() {
        for tag in ["Value", "DeviceTrigger", "Timer", "Counter", "Add"] {
            let kind = NodeKind::parse(tag);
            assert_eq!(kind.map(NodeKind::name), Some(tag));
        }
        assert_eq!(NodeKind::parse("Oscillator"), None);
    }

    #[test]
    fn high_threshold_is_strict() {
        assert!(!is_high(0.5));
        assert!(is_high(0.5000001));
        assert!(!is_high(-1.0));
    }
}
