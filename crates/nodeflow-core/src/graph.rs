// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Immutable-after-load graph tables and handle interning.
//!
//! [`GraphStore::load`] translates a [`FlowDoc`] into flat tables: node and
//! port records, edges, the topological order, node-level forward
//! dependents (for ready-queue enqueueing), and output-port reverse
//! adjacency (for value propagation). All string lookup happens here, once;
//! evaluation indexes dense arrays only.
//!
//! Determinism contract
//! - Handle assignment depends only on declared ordering: nodes in load
//!   order, inputs before outputs within a node, declared order within each
//!   group. Two loads of identical documents produce identical tables.
//! - The topological sort is Kahn's algorithm seeded in load order and fed
//!   in connection order, so it is a pure function of the document as well.
//!
//! The one mutation permitted after load is the per-node parameter bag,
//! which `set_input` / `set_input_config` write through the engine.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::doc::FlowDoc;
use crate::ident::{Direction, NodeIx, PortHandle};
use crate::kind::NodeKind;
use crate::value::{DType, Value};

/// Structural load failures.
///
/// Any of these aborts the load; the engine keeps its previous graph (or
/// stays empty if none was ever installed).
#[derive(Debug, Error)]
pub enum LoadError {
    /// The connection graph contains a cycle.
    #[error("cycle detected in flow graph")]
    CycleDetected,
    /// Two nodes share one identifier.
    #[error("duplicate node id: {0}")]
    DuplicateNodeId(String),
    /// A connection endpoint names a node or port that does not exist.
    #[error("unknown connection endpoint: {node}:{port}")]
    UnknownReference {
        /// Node identifier as written in the connection.
        node: String,
        /// Port identifier as written in the connection.
        port: String,
    },
    /// A connection crosses between a numeric and a non-numeric port.
    #[error("type mismatch on connection {from_node}:{from_port} -> {to_node}:{to_port}")]
    TypeMismatch {
        /// Source node identifier.
        from_node: String,
        /// Source port identifier.
        from_port: String,
        /// Destination node identifier.
        to_node: String,
        /// Destination port identifier.
        to_port: String,
    },
    /// An input port is the destination of more than one connection.
    #[error("input {node}:{port} already has an incoming connection")]
    InputAlreadyConnected {
        /// Destination node identifier.
        node: String,
        /// Destination port identifier.
        port: String,
    },
}

/// One interned port.
#[derive(Debug, Clone)]
pub struct PortRecord {
    /// Owning node position.
    pub owner: NodeIx,
    /// Local identifier, unique within (owner, direction).
    pub id: String,
    /// Input or output.
    pub direction: Direction,
    /// Declared data type.
    pub dtype: DType,
}

/// One interned node.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    /// Stable identifier, unique within the graph.
    pub id: String,
    /// Kind tag; `None` for unrecognized kinds (outputs held at zero).
    pub kind: Option<NodeKind>,
    /// Parameter bag. Written by `set_input` / `set_input_config`; otherwise
    /// fixed at load.
    pub params: BTreeMap<String, Value>,
    /// Handle of this node's first port.
    pub first_port: u32,
    /// Number of declared inputs.
    pub num_inputs: u32,
    /// Number of declared outputs.
    pub num_outputs: u32,
    /// Compute type: the first output's declared type, `None` without
    /// outputs.
    pub compute: Option<DType>,
}

impl NodeRecord {
    /// Handles of the declared inputs, in declared order.
    pub fn input_handles(&self) -> impl Iterator<Item = PortHandle> {
        (self.first_port..self.first_port + self.num_inputs).map(PortHandle)
    }

    /// Handles of the declared outputs, in declared order.
    pub fn output_handles(&self) -> impl Iterator<Item = PortHandle> {
        let base = self.first_port + self.num_inputs;
        (base..base + self.num_outputs).map(PortHandle)
    }

    /// Handle of the primary (first declared) output.
    #[must_use]
    pub fn primary_output(&self) -> Option<PortHandle> {
        (self.num_outputs > 0).then(|| PortHandle(self.first_port + self.num_inputs))
    }
}

/// One directed edge, by interned handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRecord {
    /// Source output port.
    pub from: PortHandle,
    /// Destination input port.
    pub to: PortHandle,
}

/// Immutable-after-load graph tables.
#[derive(Debug, Clone)]
pub struct GraphStore {
    nodes: Vec<NodeRecord>,
    ports: Vec<PortRecord>,
    edges: Vec<EdgeRecord>,
    by_id: FxHashMap<String, NodeIx>,
    topo: Vec<NodeIx>,
    topo_index: Vec<u32>,
    dependents: Vec<Vec<NodeIx>>,
    fanout: Vec<Vec<PortHandle>>,
    input_source: Vec<Option<PortHandle>>,
}

impl GraphStore {
    /// Builds the tables from a parsed document, rejecting malformed input.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] on duplicate node ids, dangling or retyped
    /// connection endpoints, doubly connected inputs, or cycles.
    pub fn load(doc: &FlowDoc) -> Result<Self, LoadError> {
        let mut nodes: Vec<NodeRecord> = Vec::with_capacity(doc.nodes.len());
        let mut ports: Vec<PortRecord> = Vec::new();
        let mut by_id = FxHashMap::default();

        for (pos, decl) in doc.nodes.iter().enumerate() {
            let ix = NodeIx(pos as u32);
            if by_id.insert(decl.id.clone(), ix).is_some() {
                return Err(LoadError::DuplicateNodeId(decl.id.clone()));
            }
            let first_port = ports.len() as u32;
            for p in &decl.inputs {
                ports.push(PortRecord {
                    owner: ix,
                    id: p.id.clone(),
                    direction: Direction::Input,
                    dtype: parse_dtype(&p.dtype),
                });
            }
            for p in &decl.outputs {
                ports.push(PortRecord {
                    owner: ix,
                    id: p.id.clone(),
                    direction: Direction::Output,
                    dtype: parse_dtype(&p.dtype),
                });
            }
            nodes.push(NodeRecord {
                id: decl.id.clone(),
                kind: NodeKind::parse(&decl.kind),
                params: decl
                    .parameters
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
                first_port,
                num_inputs: decl.inputs.len() as u32,
                num_outputs: decl.outputs.len() as u32,
                compute: decl.outputs.first().map(|p| parse_dtype(&p.dtype)),
            });
        }

        let total_ports = ports.len();
        let mut edges = Vec::with_capacity(doc.connections.len());
        let mut fanout: Vec<Vec<PortHandle>> = vec![Vec::new(); total_ports];
        let mut input_source: Vec<Option<PortHandle>> = vec![None; total_ports];
        let mut node_edges: Vec<(NodeIx, NodeIx)> = Vec::with_capacity(doc.connections.len());

        for conn in &doc.connections {
            let from = lookup_port(&nodes, &ports, &by_id, &conn.from_node, &conn.from_port, Direction::Output)
                .ok_or_else(|| LoadError::UnknownReference {
                    node: conn.from_node.clone(),
                    port: conn.from_port.clone(),
                })?;
            let to = lookup_port(&nodes, &ports, &by_id, &conn.to_node, &conn.to_port, Direction::Input)
                .ok_or_else(|| LoadError::UnknownReference {
                    node: conn.to_node.clone(),
                    port: conn.to_port.clone(),
                })?;

            let from_dt = ports[from.index()].dtype;
            let to_dt = ports[to.index()].dtype;
            let compatible = (from_dt.is_numeric() && to_dt.is_numeric())
                || (from_dt == DType::Str && to_dt == DType::Str);
            if !compatible {
                return Err(LoadError::TypeMismatch {
                    from_node: conn.from_node.clone(),
                    from_port: conn.from_port.clone(),
                    to_node: conn.to_node.clone(),
                    to_port: conn.to_port.clone(),
                });
            }
            if input_source[to.index()].is_some() {
                return Err(LoadError::InputAlreadyConnected {
                    node: conn.to_node.clone(),
                    port: conn.to_port.clone(),
                });
            }
            input_source[to.index()] = Some(from);
            fanout[from.index()].push(to);
            node_edges.push((ports[from.index()].owner, ports[to.index()].owner));
            edges.push(EdgeRecord { from, to });
        }

        let node_count = nodes.len();
        let mut dependents: Vec<Vec<NodeIx>> = vec![Vec::new(); node_count];
        for &(src, dst) in &node_edges {
            let list = &mut dependents[src.index()];
            if !list.contains(&dst) {
                list.push(dst);
            }
        }

        let topo = topo_sort(node_count, &node_edges)?;
        let mut topo_index = vec![0u32; node_count];
        for (position, &ix) in topo.iter().enumerate() {
            topo_index[ix.index()] = position as u32;
        }

        Ok(Self {
            nodes,
            ports,
            edges,
            by_id,
            topo,
            topo_index,
            dependents,
            fanout,
            input_source,
        })
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of interned ports.
    #[must_use]
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// The node at `ix`.
    #[must_use]
    pub fn node(&self, ix: NodeIx) -> &NodeRecord {
        &self.nodes[ix.index()]
    }

    pub(crate) fn node_mut(&mut self, ix: NodeIx) -> &mut NodeRecord {
        &mut self.nodes[ix.index()]
    }

    /// Iterates nodes in load order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIx, &NodeRecord)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeIx(i as u32), n))
    }

    /// The port record behind `handle`.
    #[must_use]
    pub fn port(&self, handle: PortHandle) -> &PortRecord {
        &self.ports[handle.index()]
    }

    /// Resolves a node identifier to its load position.
    #[must_use]
    pub fn node_ix(&self, node_id: &str) -> Option<NodeIx> {
        self.by_id.get(node_id).copied()
    }

    /// Resolves `(node_id, port_id, direction)` to a handle. Pure lookup.
    #[must_use]
    pub fn port_handle(
        &self,
        node_id: &str,
        port_id: &str,
        direction: Direction,
    ) -> Option<PortHandle> {
        lookup_port(&self.nodes, &self.ports, &self.by_id, node_id, port_id, direction)
    }

    /// The topological order over all nodes.
    #[must_use]
    pub fn topo_order(&self) -> &[NodeIx] {
        &self.topo
    }

    /// Position of `ix` within the topological order.
    #[must_use]
    pub fn topo_index(&self, ix: NodeIx) -> u32 {
        self.topo_index[ix.index()]
    }

    /// Downstream nodes consuming any output of `ix`, in first-connection
    /// order, deduplicated.
    #[must_use]
    pub fn dependents(&self, ix: NodeIx) -> &[NodeIx] {
        &self.dependents[ix.index()]
    }

    /// Input handles fed by the output `handle`, in connection order.
    #[must_use]
    pub fn fanout(&self, handle: PortHandle) -> &[PortHandle] {
        &self.fanout[handle.index()]
    }

    /// The output feeding the input `handle`, if connected.
    #[must_use]
    pub fn input_source(&self, handle: PortHandle) -> Option<PortHandle> {
        self.input_source[handle.index()]
    }

    /// All edges, in declaration order.
    #[must_use]
    pub fn edges(&self) -> &[EdgeRecord] {
        &self.edges
    }

    /// Nodes with no outgoing edges but at least one output, in load order.
    /// When the graph has none, every node with outputs qualifies (the
    /// original generator's fallback).
    #[must_use]
    pub fn sinks(&self) -> Vec<NodeIx> {
        let strict: Vec<NodeIx> = self
            .nodes()
            .filter(|(ix, n)| n.num_outputs > 0 && self.dependents(*ix).is_empty())
            .map(|(ix, _)| ix)
            .collect();
        if strict.is_empty() {
            self.nodes()
                .filter(|(_, n)| n.num_outputs > 0)
                .map(|(ix, _)| ix)
                .collect()
        } else {
            strict
        }
    }
}

/// Unknown type spellings fall back to f32, the original loader's default.
fn parse_dtype(spelling: &str) -> DType {
    DType::parse(spelling).unwrap_or(DType::F32)
}

fn lookup_port(
    nodes: &[NodeRecord],
    ports: &[PortRecord],
    by_id: &FxHashMap<String, NodeIx>,
    node_id: &str,
    port_id: &str,
    direction: Direction,
) -> Option<PortHandle> {
    let ix = by_id.get(node_id)?;
    let node = &nodes[ix.index()];
    let range = node.first_port..node.first_port + node.num_inputs + node.num_outputs;
    range.map(PortHandle).find(|h| {
        let p = &ports[h.index()];
        p.direction == direction && p.id == port_id
    })
}

/// Kahn's algorithm, seeded in load order and drained FIFO so the result is
/// a pure function of the document.
fn topo_sort(node_count: usize, node_edges: &[(NodeIx, NodeIx)]) -> Result<Vec<NodeIx>, LoadError> {
    let mut in_degree = vec![0usize; node_count];
    let mut adjacency: Vec<Vec<NodeIx>> = vec![Vec::new(); node_count];
    for &(src, dst) in node_edges {
        adjacency[src.index()].push(dst);
        in_degree[dst.index()] += 1;
    }

    let mut queue: VecDeque<NodeIx> = (0..node_count)
        .map(|i| NodeIx(i as u32))
        .filter(|ix| in_degree[ix.index()] == 0)
        .collect();
    let mut order = Vec::with_capacity(node_count);
    while let Some(current) = queue.pop_front() {
        order.push(current);
        for &next in &adjacency[current.index()] {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() == node_count {
        Ok(order)
    } else {
        Err(LoadError::CycleDetected)
    }
}
