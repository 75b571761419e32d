// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Core evaluation engine implementation.
//!
//! [`FlowEngine`] owns the loaded tables, the state arenas, and the
//! scheduler, and drives deterministic evaluation: a cold-start sweep over
//! the full topological order on the first `evaluate`, dirty-driven passes
//! afterwards. `tick` advances the time-driven state (timer pulses, counter
//! edges) without evaluating any node; its writes are stamped with the
//! generation of the evaluation about to happen.
//!
//! Neither `tick` nor `evaluate` can fail, block, or allocate per-node
//! state; all failures are load-time failures.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::doc::FlowDoc;
use crate::graph::{GraphStore, LoadError};
use crate::ident::{Direction, NodeIx, PortHandle};
use crate::kind::{self, NodeKind};
use crate::scheduler::Scheduler;
use crate::snapshot;
use crate::state::FlowState;
use crate::telemetry::{NullTelemetrySink, TelemetrySink};
use crate::value::{DType, Value};

/// Everything owned on behalf of one loaded graph.
struct Loaded {
    graph: GraphStore,
    state: FlowState,
    sched: Scheduler,
}

/// Deterministic dataflow evaluation engine.
///
/// The engine is strictly single-threaded: external writers and observers
/// must serialize against `tick` / `evaluate` themselves if they share it
/// across threads.
///
/// # Example
///
/// ```rust
/// use nodeflow_core::{ConnectionDoc, FlowDoc, FlowEngine, NodeDoc, ParamValue, PortDoc, Value};
///
/// let doc = FlowDoc {
///     nodes: vec![
///         NodeDoc {
///             id: "one".into(),
///             kind: "Value".into(),
///             inputs: vec![],
///             outputs: vec![PortDoc { id: "out1".into(), dtype: "f32".into() }],
///             parameters: [("value".to_owned(), ParamValue::Float(1.5))]
///                 .into_iter()
///                 .collect(),
///         },
///         NodeDoc {
///             id: "sum".into(),
///             kind: "Add".into(),
///             inputs: vec![PortDoc { id: "in1".into(), dtype: "f32".into() }],
///             outputs: vec![PortDoc { id: "out1".into(), dtype: "f32".into() }],
///             parameters: Default::default(),
///         },
///     ],
///     connections: vec![ConnectionDoc {
///         from_node: "one".into(),
///         from_port: "out1".into(),
///         to_node: "sum".into(),
///         to_port: "in1".into(),
///     }],
/// };
///
/// let mut engine = FlowEngine::new();
/// engine.load(&doc).unwrap();
/// engine.evaluate();
/// assert_eq!(engine.snapshot().get("sum:out1"), Some(&Value::F32(1.5)));
/// ```
pub struct FlowEngine {
    loaded: Option<Loaded>,
    telemetry: Arc<dyn TelemetrySink>,
    snapshot_generation: u64,
}

impl Default for FlowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowEngine {
    /// Creates an empty engine with the null telemetry sink.
    #[must_use]
    pub fn new() -> Self {
        Self::with_telemetry(Arc::new(NullTelemetrySink))
    }

    /// Creates an empty engine reporting events to `sink`.
    #[must_use]
    pub fn with_telemetry(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            loaded: None,
            telemetry: sink,
            snapshot_generation: 0,
        }
    }

    /// Installs a graph built from `doc`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] and leaves the previously loaded graph (or
    /// the empty state) untouched when the document is malformed.
    pub fn load(&mut self, doc: &FlowDoc) -> Result<(), LoadError> {
        let graph = GraphStore::load(doc)?;
        let state = FlowState::for_graph(&graph);
        let sched = Scheduler::new(graph.node_count());
        self.loaded = Some(Loaded {
            graph,
            state,
            sched,
        });
        Ok(())
    }

    /// Releases the loaded graph and all run-time state.
    pub fn unload(&mut self) {
        self.loaded = None;
    }

    /// Whether a graph is currently installed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// The loaded graph tables, if any.
    #[must_use]
    pub fn graph(&self) -> Option<&GraphStore> {
        self.loaded.as_ref().map(|l| &l.graph)
    }

    /// Writes a `DeviceTrigger`'s value. The write lands on the node's
    /// output ports immediately (stamped for the upcoming generation) and
    /// enqueues the node's dependents when the value actually changed.
    ///
    /// Unknown node ids and nodes of any other kind are silent no-ops,
    /// reported through [`TelemetrySink::on_unknown_node`].
    pub fn set_input(&mut self, node_id: &str, value: f64) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        let Loaded {
            graph,
            state,
            sched,
        } = loaded;
        let Some(ix) = graph.node_ix(node_id) else {
            self.telemetry.on_unknown_node(node_id);
            return;
        };
        if graph.node(ix).kind != Some(NodeKind::DeviceTrigger) {
            self.telemetry.on_unknown_node(node_id);
            return;
        }
        let ct = graph.node(ix).compute.unwrap_or(DType::F32);
        let incoming = Value::F64(value).coerce_to(ct);
        let changed = graph
            .node(ix)
            .params
            .get("value")
            .map_or(true, |old| !old.bits_eq(&incoming));
        graph
            .node_mut(ix)
            .params
            .insert("value".to_owned(), incoming.clone());
        if changed {
            let anticipated = sched.generation + 1;
            let graph: &GraphStore = graph;
            write_node_outputs(graph, state, ix, &incoming, anticipated);
            enqueue_dependents(graph, sched, ix, anticipated);
        }
    }

    /// Stores the legacy random-trigger timing parameters on a
    /// `DeviceTrigger`. They do not drive evaluation; the deterministic
    /// time model has no wall-clock randomness. Same miss policy as
    /// [`set_input`](Self::set_input).
    pub fn set_input_config(&mut self, node_id: &str, min_interval_ms: i32, max_interval_ms: i32) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        let Some(ix) = loaded.graph.node_ix(node_id) else {
            self.telemetry.on_unknown_node(node_id);
            return;
        };
        if loaded.graph.node(ix).kind != Some(NodeKind::DeviceTrigger) {
            self.telemetry.on_unknown_node(node_id);
            return;
        }
        let params = &mut loaded.graph.node_mut(ix).params;
        params.insert("min_interval".to_owned(), Value::I32(min_interval_ms));
        params.insert("max_interval".to_owned(), Value::I32(max_interval_ms));
    }

    /// Advances the time-driven state by `dt_ms` milliseconds.
    ///
    /// Three phases, all stamped with the generation of the evaluation
    /// about to happen: pulses still high from the previous interval return
    /// to zero; counters fold in any edge that moved between evaluations;
    /// timers accumulate and fire (at most one pulse per call, residual
    /// time carries over). `dt_ms <= 0` is a no-op.
    pub fn tick(&mut self, dt_ms: f64) {
        if dt_ms <= 0.0 {
            return;
        }
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        let Loaded {
            graph,
            state,
            sched,
        } = loaded;
        let graph: &GraphStore = graph;
        let anticipated = sched.generation + 1;

        for (ix, node) in graph.nodes() {
            if node.kind != Some(NodeKind::Timer) || kind::timer_interval(node).is_none() {
                continue;
            }
            if state.timer_pulse[ix.index()] != 0.0 {
                state.timer_pulse[ix.index()] = 0.0;
                let low = Value::F64(0.0).coerce_to(node.compute.unwrap_or(DType::F64));
                write_node_outputs(graph, state, ix, &low, anticipated);
                enqueue_dependents(graph, sched, ix, anticipated);
            }
        }

        for (ix, node) in graph.nodes() {
            if node.kind != Some(NodeKind::Counter) {
                continue;
            }
            let level = node
                .input_handles()
                .next()
                .map_or(0.0, |h| state.value(h).as_f64());
            let high = kind::is_high(level);
            let slot = ix.index();
            if high && !state.counter_prev[slot] {
                state.counter_total[slot] += 1.0;
                // Refresh the output on the next evaluation.
                sched.enqueue(graph.topo_index(ix), ix, anticipated);
            }
            state.counter_prev[slot] = high;
        }

        for (ix, node) in graph.nodes() {
            if node.kind != Some(NodeKind::Timer) {
                continue;
            }
            let Some(interval) = kind::timer_interval(node) else {
                continue;
            };
            let slot = ix.index();
            state.timer_acc[slot] += dt_ms;
            if state.timer_acc[slot] >= interval {
                state.timer_acc[slot] -= interval;
                state.timer_pulse[slot] = 1.0;
                let high = Value::F64(1.0).coerce_to(node.compute.unwrap_or(DType::F64));
                write_node_outputs(graph, state, ix, &high, anticipated);
                enqueue_dependents(graph, sched, ix, anticipated);
                self.telemetry.on_timer_fired(&node.id);
            }
        }
    }

    /// Drives evaluation for one generation.
    ///
    /// The first call after `load` sweeps every node in topological order;
    /// later calls drain the ready queue in ascending
    /// `(topological index, node)` order. Every evaluated node rewrites its
    /// outputs (stamping them with the current generation even when
    /// unchanged) and enqueues its dependents iff the primary output
    /// changed. A no-op on an unloaded engine.
    pub fn evaluate(&mut self) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        let Loaded {
            graph,
            state,
            sched,
        } = loaded;
        let graph: &GraphStore = graph;
        sched.generation += 1;
        let generation = sched.generation;
        let mut evaluated = 0u64;

        if sched.cold {
            for &ix in graph.topo_order() {
                eval_node(graph, state, sched, self.telemetry.as_ref(), ix, generation);
                evaluated += 1;
            }
            sched.clear_queue();
            sched.cold = false;
        } else {
            while let Some(ix) = sched.pop() {
                eval_node(graph, state, sched, self.telemetry.as_ref(), ix, generation);
                evaluated += 1;
            }
        }
        self.telemetry.on_evaluate_complete(generation, evaluated);
    }

    /// Every output port's current value, keyed `node_id:port_id`. Empty on
    /// an unloaded engine.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.loaded
            .as_ref()
            .map_or_else(BTreeMap::new, |l| snapshot::full_snapshot(&l.graph, &l.state))
    }

    /// Output ports whose generation stamp is strictly greater than
    /// `watermark`, with their final values. At most one entry per port.
    #[must_use]
    pub fn delta(&self, watermark: u64) -> BTreeMap<PortHandle, Value> {
        self.loaded.as_ref().map_or_else(BTreeMap::new, |l| {
            snapshot::delta_since(&l.graph, &l.state, watermark)
        })
    }

    /// The current evaluation generation (zero before the first
    /// `evaluate`).
    #[must_use]
    pub fn current_evaluation_generation(&self) -> u64 {
        self.loaded.as_ref().map_or(0, |l| l.sched.generation)
    }

    /// Advances and returns the observer-side snapshot counter. Orthogonal
    /// to the evaluation generation.
    pub fn begin_snapshot_generation(&mut self) -> u64 {
        self.snapshot_generation += 1;
        self.snapshot_generation
    }

    /// Resolves `(node_id, port_id, direction)` to a port handle.
    #[must_use]
    pub fn port_handle(
        &self,
        node_id: &str,
        port_id: &str,
        direction: Direction,
    ) -> Option<PortHandle> {
        self.loaded
            .as_ref()
            .and_then(|l| l.graph.port_handle(node_id, port_id, direction))
    }

    /// Reads one port's current value.
    #[must_use]
    pub fn port_value(&self, handle: PortHandle) -> Option<&Value> {
        let loaded = self.loaded.as_ref()?;
        (handle.index() < loaded.graph.port_count()).then(|| loaded.state.value(handle))
    }

    /// Reads one port's generation stamp.
    #[must_use]
    pub fn port_stamp(&self, handle: PortHandle) -> Option<u64> {
        let loaded = self.loaded.as_ref()?;
        (handle.index() < loaded.graph.port_count()).then(|| loaded.state.stamp(handle))
    }
}

/// Evaluates one node: kind semantics, output writes, propagation, and the
/// change-driven enqueue decision.
fn eval_node(
    graph: &GraphStore,
    state: &mut FlowState,
    sched: &mut Scheduler,
    telemetry: &dyn TelemetrySink,
    ix: NodeIx,
    generation: u64,
) {
    let node = graph.node(ix);
    let entry = node.primary_output().map(|h| state.value(h).clone());
    let out = kind::node_output(graph, state, ix);
    for h in node.output_handles() {
        state.write(h, out.clone(), generation);
        propagate(graph, state, h, generation);
    }
    telemetry.on_node_evaluated(&node.id, generation);
    if let (Some(before), Some(primary)) = (entry, node.primary_output()) {
        if !state.value(primary).bits_eq(&before) {
            enqueue_dependents(graph, sched, ix, generation);
        }
    }
}

/// Copies an output's value to every consumer input, coerced into each
/// destination's declared type.
fn propagate(graph: &GraphStore, state: &mut FlowState, from: PortHandle, generation: u64) {
    for &to in graph.fanout(from) {
        let coerced = state.value(from).coerce_to(graph.port(to).dtype);
        state.write(to, coerced, generation);
    }
}

/// Writes `value` to every output of `ix` and propagates it downstream.
fn write_node_outputs(
    graph: &GraphStore,
    state: &mut FlowState,
    ix: NodeIx,
    value: &Value,
    generation: u64,
) {
    for h in graph.node(ix).output_handles() {
        state.write(h, value.clone(), generation);
        propagate(graph, state, h, generation);
    }
}

fn enqueue_dependents(graph: &GraphStore, sched: &mut Scheduler, ix: NodeIx, generation: u64) {
    for &dep in graph.dependents(ix) {
        sched.enqueue(graph.topo_index(dep), dep, generation);
    }
}
