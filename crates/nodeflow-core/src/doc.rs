// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Flow document structs: the already-parsed declarative description
//! consumed by [`GraphStore::load`](crate::GraphStore::load).
//!
//! Reading the file and running the JSON parser is host business; these
//! types only fix the schema. Field casing follows the wire format of the
//! original flow files (`fromNode`, `toPort`, ...).

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::value::Value;

/// Root flow document: node declarations plus connections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowDoc {
    /// Node declarations, in load order.
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    /// Directed connections between declared ports.
    #[serde(default)]
    pub connections: Vec<ConnectionDoc>,
}

/// One node declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDoc {
    /// Stable identifier, unique within the document.
    pub id: String,
    /// Kind tag (`Value`, `DeviceTrigger`, `Timer`, `Counter`, `Add`).
    /// Unrecognized kinds load as inert nodes whose outputs stay at zero.
    #[serde(rename = "type")]
    pub kind: String,
    /// Declared input ports, in order.
    #[serde(default)]
    pub inputs: Vec<PortDoc>,
    /// Declared output ports, in order.
    #[serde(default)]
    pub outputs: Vec<PortDoc>,
    /// Parameter bag. Recognized keys: `value` (Value, DeviceTrigger),
    /// `key` (DeviceTrigger, vestigial), `interval_ms` (Timer),
    /// `min_interval` / `max_interval` (legacy random-trigger timing).
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
}

/// One declared port.
#[derive(Debug, Clone, Deserialize)]
pub struct PortDoc {
    /// Local identifier, unique within (node, direction).
    pub id: String,
    /// Declared data type spelling (see [`DType::parse`](crate::DType::parse)).
    #[serde(rename = "type")]
    pub dtype: String,
}

/// One connection (edge) from an output port to an input port.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDoc {
    /// Source node identifier.
    pub from_node: String,
    /// Source output port identifier.
    pub from_port: String,
    /// Destination node identifier.
    pub to_node: String,
    /// Destination input port identifier.
    pub to_port: String,
}

/// Scalar parameter value as it appears in a document.
///
/// The variant order matters for untagged deserialization: booleans and
/// integers must be tried before floats so `3` loads as `Int(3)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// JSON boolean, stored as `1` / `0` like the original loader.
    Bool(bool),
    /// JSON integer.
    Int(i64),
    /// JSON float, kept as f64 to preserve precision.
    Float(f64),
    /// JSON string.
    Str(String),
}

impl ParamValue {
    /// Maps a document parameter into the engine's value domain.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::I32(i32::from(*b)),
            Self::Int(v) => Value::I32(*v as i32),
            Self::Float(v) => Value::F64(*v),
            Self::Str(s) => Value::Str(s.clone()),
        }
    }
}
