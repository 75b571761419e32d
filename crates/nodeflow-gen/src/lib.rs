// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Ahead-of-time generator for NodeFlow graphs.
//!
//! The generator is a template-driven pretty-printer over the same interned
//! tables the engine evaluates; there is no separate intermediate
//! representation. For one loaded graph it emits a standalone Rust module
//! with fixed-layout `Inputs` / `Outputs` / `State` records, descriptor
//! tables, and the five-function evaluation contract
//! (`init` / `reset` / `set_input` / `tick` / `step` / `get_output`).
//!
//! Parity contract: for any `set_input` / `tick` / `step` sequence the
//! artifact's outputs and state transitions match the interpreter
//! bit-for-bit under the same coercion rules. `tick` therefore runs the
//! same three phases in the same order (pulse reset, counter edge update,
//! fire), and `step` performs the counter edge update the interpreter
//! performs during `evaluate`.

use nodeflow_core::{DType, FlowDoc, GraphStore, LoadError, NodeIx, NodeKind, Value};

/// Loads `doc` and emits the standalone module source.
///
/// # Errors
///
/// Returns the same [`LoadError`]s as the engine's `load`: the generator
/// refuses exactly the documents the interpreter refuses.
pub fn generate(doc: &FlowDoc) -> Result<String, LoadError> {
    let graph = GraphStore::load(doc)?;
    Ok(generate_from_graph(&graph))
}

/// Emits the standalone module source for an already-loaded graph.
#[must_use]
pub fn generate_from_graph(graph: &GraphStore) -> String {
    Codegen::new(graph).emit()
}

/// Keywords that cannot name a record field.
const RESERVED: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "self", "static", "struct", "super", "trait", "true", "type", "unsafe", "use",
    "where", "while",
];

/// Maps a node identifier to a Rust field identifier: alphanumerics kept,
/// everything else replaced by `_`, leading digits and keywords prefixed.
fn field_name(id: &str) -> String {
    let mut name: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty()
        || name.starts_with(|c: char| c.is_ascii_digit())
        || RESERVED.contains(&name.as_str())
    {
        name.insert_str(0, "n_");
    }
    name
}

fn rust_type(dt: DType) -> &'static str {
    match dt {
        DType::I32 => "i32",
        DType::F32 => "f32",
        DType::F64 => "f64",
        // Unreachable for emitted fields; string-typed nodes are skipped.
        DType::Str => "f32",
    }
}

/// Zero literal in the target type.
fn zero_lit(dt: DType) -> &'static str {
    match dt {
        DType::I32 => "0",
        _ => "0.0",
    }
}

/// Formats a parameter value as a literal of the target type.
fn value_lit(value: &Value, dt: DType) -> String {
    match dt {
        DType::I32 => format!("{}", value.as_i32()),
        DType::F32 => format!("{:?}", value.as_f32()),
        _ => format!("{:?}", value.as_f64()),
    }
}

/// Where an expression for a node's current output is being built.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ExprCtx {
    /// Inside `step`: upstream nodes already have local temporaries.
    Step,
    /// Inside `tick`: no temporaries; expand sources recursively.
    Tick,
}

struct Codegen<'a> {
    graph: &'a GraphStore,
    /// Field identifier per node position, collision-free.
    names: Vec<String>,
    triggers: Vec<NodeIx>,
    timers: Vec<NodeIx>,
    counters: Vec<NodeIx>,
    sinks: Vec<NodeIx>,
    out: String,
}

impl<'a> Codegen<'a> {
    fn new(graph: &'a GraphStore) -> Self {
        let mut names: Vec<String> = Vec::with_capacity(graph.node_count());
        for (_, node) in graph.nodes() {
            let mut name = field_name(&node.id);
            let mut suffix = 1u32;
            while names.contains(&name) {
                suffix += 1;
                name = format!("{}_{suffix}", field_name(&node.id));
            }
            names.push(name);
        }
        let of_kind = |kind: NodeKind| -> Vec<NodeIx> {
            graph
                .nodes()
                .filter(|(_, n)| n.kind == Some(kind) && numeric_compute(n.compute).is_some())
                .map(|(ix, _)| ix)
                .collect()
        };
        Self {
            graph,
            names,
            triggers: of_kind(NodeKind::DeviceTrigger),
            timers: of_kind(NodeKind::Timer),
            counters: of_kind(NodeKind::Counter),
            sinks: graph
                .sinks()
                .into_iter()
                .filter(|&ix| numeric_compute(graph.node(ix).compute).is_some())
                .collect(),
            out: String::new(),
        }
    }

    fn name(&self, ix: NodeIx) -> &str {
        &self.names[ix.index()]
    }

    fn compute_type(&self, ix: NodeIx) -> DType {
        numeric_compute(self.graph.node(ix).compute).unwrap_or(DType::F32)
    }

    fn push(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn emit(mut self) -> String {
        self.push("// Generated by nodeflow-gen. Do not edit.");
        self.push("#![allow(dead_code, unused_variables, clippy::all, clippy::pedantic)]");
        self.push("");
        self.emit_records();
        self.emit_descriptors();
        self.emit_init();
        self.emit_set_input();
        self.emit_tick();
        self.emit_step();
        self.emit_get_output();
        self.out
    }

    fn emit_records(&mut self) {
        self.push("/// External inputs: one field per DeviceTrigger, in node-load order.");
        self.push("#[derive(Clone, Copy, Debug, Default)]");
        self.push("#[repr(C)]");
        self.push("pub struct Inputs {");
        for &ix in &self.triggers.clone() {
            let line = format!(
                "    pub {}: {},",
                self.name(ix),
                rust_type(self.compute_type(ix))
            );
            self.push(&line);
        }
        self.push("}");
        self.push("");

        self.push("/// Sink outputs: one field per node with no outgoing edges, in node-load order.");
        self.push("#[derive(Clone, Copy, Debug, Default)]");
        self.push("#[repr(C)]");
        self.push("pub struct Outputs {");
        for &ix in &self.sinks.clone() {
            let line = format!(
                "    pub {}: {},",
                self.name(ix),
                rust_type(self.compute_type(ix))
            );
            self.push(&line);
        }
        self.push("}");
        self.push("");

        self.push("/// Timer and Counter state.");
        self.push("#[derive(Clone, Copy, Debug, Default)]");
        self.push("#[repr(C)]");
        self.push("pub struct State {");
        for &ix in &self.timers.clone() {
            let name = self.name(ix).to_owned();
            let ty = rust_type(self.compute_type(ix));
            self.push(&format!("    pub acc_{name}: f64,"));
            self.push(&format!("    pub tout_{name}: {ty},"));
        }
        for &ix in &self.counters.clone() {
            let name = self.name(ix).to_owned();
            self.push(&format!("    pub last_{name}: i32,"));
            self.push(&format!("    pub cnt_{name}: f64,"));
        }
        self.push("}");
        self.push("");
    }

    fn emit_descriptors(&mut self) {
        let graph = self.graph;
        self.push("/// Port descriptor row.");
        self.push("#[derive(Clone, Copy, Debug)]");
        self.push("pub struct PortDesc {");
        self.push("    pub handle: u32,");
        self.push("    pub node_id: &'static str,");
        self.push("    pub port_id: &'static str,");
        self.push("    pub is_output: bool,");
        self.push("    pub dtype: &'static str,");
        self.push("}");
        self.push("");

        let port_count = graph.port_count();
        self.push("/// Total number of interned ports.");
        self.push(&format!("pub const NUM_PORTS: usize = {port_count};"));
        self.push(&format!("pub const PORTS: [PortDesc; {port_count}] = ["));
        for i in 0..port_count {
            let handle = nodeflow_core::PortHandle(i as u32);
            let port = graph.port(handle);
            let node = graph.node(port.owner);
            let is_output = port.direction == nodeflow_core::Direction::Output;
            self.push(&format!(
                "    PortDesc {{ handle: {i}, node_id: {:?}, port_id: {:?}, is_output: {is_output}, dtype: {:?} }},",
                node.id,
                port.id,
                port.dtype.name(),
            ));
        }
        self.push("];");
        self.push("");

        let topo: Vec<String> = graph
            .topo_order()
            .iter()
            .map(|ix| ix.0.to_string())
            .collect();
        self.push("/// Topological order over node load positions.");
        self.push(&format!("pub const NUM_TOPO: usize = {};", topo.len()));
        self.push(&format!(
            "pub const TOPO_ORDER: [u32; {}] = [{}];",
            topo.len(),
            topo.join(", ")
        ));
        self.push("");

        self.push("/// Input field descriptor row: byte offsets into `Inputs`.");
        self.push("#[derive(Clone, Copy, Debug)]");
        self.push("pub struct InputField {");
        self.push("    pub node_id: &'static str,");
        self.push("    pub offset: usize,");
        self.push("    pub dtype: &'static str,");
        self.push("}");
        self.push("");
        let trigger_count = self.triggers.len();
        self.push(&format!(
            "pub const NUM_INPUT_FIELDS: usize = {trigger_count};"
        ));
        self.push(&format!(
            "pub const INPUT_FIELDS: [InputField; {trigger_count}] = ["
        ));
        for &ix in &self.triggers.clone() {
            let node = graph.node(ix);
            let line = format!(
                "    InputField {{ node_id: {:?}, offset: core::mem::offset_of!(Inputs, {}), dtype: {:?} }},",
                node.id,
                self.name(ix),
                self.compute_type(ix).name(),
            );
            self.push(&line);
        }
        self.push("];");
        self.push("");
    }

    fn emit_init(&mut self) {
        self.push("/// Zeroes every field of `state`.");
        self.push("pub fn init(state: &mut State) {");
        for &ix in &self.timers.clone() {
            let name = self.name(ix).to_owned();
            let zero = zero_lit(self.compute_type(ix));
            self.push(&format!("    state.acc_{name} = 0.0;"));
            self.push(&format!("    state.tout_{name} = {zero};"));
        }
        for &ix in &self.counters.clone() {
            let name = self.name(ix).to_owned();
            self.push(&format!("    state.last_{name} = 0;"));
            self.push(&format!("    state.cnt_{name} = 0.0;"));
        }
        if self.timers.is_empty() && self.counters.is_empty() {
            self.push("    let _ = state;");
        }
        self.push("}");
        self.push("");
        self.push("/// Equivalent to [`init`].");
        self.push("pub fn reset(state: &mut State) {");
        self.push("    init(state);");
        self.push("}");
        self.push("");
    }

    fn emit_set_input(&mut self) {
        self.push("/// Writes a DeviceTrigger input by output-port handle, coerced to the");
        self.push("/// declared type.");
        self.push("pub fn set_input(handle: u32, value: f64, inputs: &mut Inputs, state: &mut State) {");
        self.push("    match handle {");
        for &ix in &self.triggers.clone() {
            if let Some(primary) = self.graph.node(ix).primary_output() {
                let line = format!(
                    "        {} => inputs.{} = value as {},",
                    primary.0,
                    self.name(ix),
                    rust_type(self.compute_type(ix))
                );
                self.push(&line);
            }
        }
        self.push("        _ => {}");
        self.push("    }");
        self.push("    let _ = state;");
        self.push("}");
        self.push("");
    }

    fn emit_tick(&mut self) {
        self.push("/// Advances timers and counters by `dt_ms`. Phase order matches the");
        self.push("/// interpreter: pulse reset, counter edge update, fire.");
        self.push("pub fn tick(dt_ms: f64, inputs: &Inputs, outputs: &mut Outputs, state: &mut State) {");
        self.push("    if dt_ms <= 0.0 {");
        self.push("        return;");
        self.push("    }");
        for &ix in &self.timers.clone() {
            let name = self.name(ix).to_owned();
            let zero = zero_lit(self.compute_type(ix));
            self.push(&format!("    state.tout_{name} = {zero};"));
        }
        for &ix in &self.counters.clone() {
            let name = self.name(ix).to_owned();
            let level = self.counter_level_expr(ix, ExprCtx::Tick);
            self.push("    {");
            self.push(&format!("        let level: f64 = {level};"));
            self.push("        let high = level > 0.5;");
            self.push(&format!(
                "        if high && state.last_{name} == 0 {{ state.cnt_{name} += 1.0; }}"
            ));
            self.push(&format!(
                "        state.last_{name} = if high {{ 1 }} else {{ 0 }};"
            ));
            self.push("    }");
        }
        for &ix in &self.timers.clone() {
            let node = self.graph.node(ix);
            let Some(interval) = timer_interval_param(node) else {
                continue;
            };
            let name = self.name(ix).to_owned();
            let one = value_lit(&Value::F64(1.0), self.compute_type(ix));
            let interval = format!("{interval:?}");
            self.push(&format!("    state.acc_{name} += dt_ms;"));
            self.push(&format!(
                "    if state.acc_{name} >= {interval} {{ state.acc_{name} -= {interval}; state.tout_{name} = {one}; }}"
            ));
        }
        self.push("    let _ = (inputs, outputs);");
        self.push("}");
        self.push("");
    }

    fn emit_step(&mut self) {
        self.push("/// Straight-line evaluation of the graph in topological order.");
        self.push("pub fn step(inputs: &Inputs, outputs: &mut Outputs, state: &mut State) {");
        for &ix in &self.graph.topo_order().to_vec() {
            let node = self.graph.node(ix);
            if node.num_outputs == 0 || numeric_compute(node.compute).is_none() {
                continue;
            }
            let ct = self.compute_type(ix);
            let name = self.name(ix).to_owned();
            let ty = rust_type(ct);
            let Some(kind) = node.kind else {
                self.push(&format!("    let _{name}: {ty} = {};", zero_lit(ct)));
                continue;
            };
            match kind {
                NodeKind::DeviceTrigger => {
                    self.push(&format!("    let _{name}: {ty} = inputs.{name};"));
                }
                NodeKind::Value => {
                    let lit = node
                        .params
                        .get("value")
                        .map_or_else(|| zero_lit(ct).to_owned(), |v| value_lit(v, ct));
                    self.push(&format!("    let _{name}: {ty} = {lit};"));
                }
                NodeKind::Timer => {
                    self.push(&format!("    let _{name}: {ty} = state.tout_{name};"));
                }
                NodeKind::Counter => {
                    let level = self.counter_level_expr(ix, ExprCtx::Step);
                    self.push(&format!("    let _{name}: {ty} = {{"));
                    self.push(&format!("        let level: f64 = {level};"));
                    self.push("        let high = level > 0.5;");
                    self.push(&format!(
                        "        if high && state.last_{name} == 0 {{ state.cnt_{name} += 1.0; }}"
                    ));
                    self.push(&format!(
                        "        state.last_{name} = if high {{ 1 }} else {{ 0 }};"
                    ));
                    self.push(&format!("        state.cnt_{name} as {ty}"));
                    self.push("    };");
                }
                NodeKind::Add => {
                    let terms: Vec<String> = node
                        .input_handles()
                        .map(|h| self.input_read(h, ct, ExprCtx::Step))
                        .collect();
                    let sum = if terms.is_empty() {
                        zero_lit(ct).to_owned()
                    } else {
                        terms.join(" + ")
                    };
                    self.push(&format!("    let _{name}: {ty} = {sum};"));
                }
            }
        }
        self.push("");
        for &ix in &self.sinks.clone() {
            let name = self.name(ix).to_owned();
            self.push(&format!("    outputs.{name} = _{name};"));
        }
        self.push("    let _ = state;");
        self.push("}");
        self.push("");
    }

    fn emit_get_output(&mut self) {
        let graph = self.graph;
        self.push("/// Reads any readable output port by handle. Timer and Counter results");
        self.push("/// come from `state`, sink results from `outputs`, constants are baked;");
        self.push("/// DeviceTriggers are not readable through this API.");
        self.push("pub fn get_output(handle: u32, outputs: &Outputs, state: &State) -> f64 {");
        self.push("    let _ = (outputs, state);");
        self.push("    match handle {");
        let mut arms: Vec<(u32, String)> = Vec::new();
        for (ix, node) in graph.nodes() {
            let Some(ct) = numeric_compute(node.compute) else {
                continue;
            };
            let expr = match node.kind {
                Some(NodeKind::Timer) if self.timers.contains(&ix) => {
                    format!("state.tout_{} as f64", self.name(ix))
                }
                Some(NodeKind::Counter) if self.counters.contains(&ix) => {
                    format!("state.cnt_{}", self.name(ix))
                }
                Some(NodeKind::Value) => {
                    let baked = node
                        .params
                        .get("value")
                        .map_or(0.0, |v| v.coerce_to(ct).as_f64());
                    format!("{baked:?}")
                }
                _ if self.sinks.contains(&ix) && node.kind != Some(NodeKind::DeviceTrigger) => {
                    format!("outputs.{} as f64", self.name(ix))
                }
                _ => continue,
            };
            for h in node.output_handles() {
                arms.push((h.0, expr.clone()));
            }
        }
        for (handle, expr) in arms {
            self.push(&format!("        {handle} => {expr},"));
        }
        self.push("        _ => 0.0,");
        self.push("    }");
        self.push("}");
    }

    /// The counter's first input read as `f64`, through the input port's
    /// declared type.
    fn counter_level_expr(&self, ix: NodeIx, ctx: ExprCtx) -> String {
        self.graph
            .node(ix)
            .input_handles()
            .next()
            .map_or_else(|| "0.0".to_owned(), |h| self.input_read(h, DType::F64, ctx))
    }

    /// Reads one input port in `target`: the source node's value coerced
    /// first into the input's declared type, then into the target type,
    /// exactly the engine's edge-write-then-node-read coercion pair.
    fn input_read(&self, handle: nodeflow_core::PortHandle, target: DType, ctx: ExprCtx) -> String {
        let in_dt = self.graph.port(handle).dtype;
        let Some(src) = self.graph.input_source(handle) else {
            return zero_lit(target).to_owned();
        };
        let src_ix = self.graph.port(src).owner;
        let src_expr = self.node_value_expr(src_ix, ctx);
        let Some(src_expr) = src_expr else {
            return zero_lit(target).to_owned();
        };
        let src_ct = self.compute_type(src_ix);
        let mut expr = src_expr;
        if in_dt != src_ct && in_dt.is_numeric() {
            expr = format!("({expr} as {})", rust_type(in_dt));
        }
        if target != in_dt || !in_dt.is_numeric() {
            expr = format!("({expr} as {})", rust_type(target));
        }
        expr
    }

    /// An expression for a node's current output in its compute type, or
    /// `None` when the node computes nothing (string-typed or no outputs).
    fn node_value_expr(&self, ix: NodeIx, ctx: ExprCtx) -> Option<String> {
        let node = self.graph.node(ix);
        let ct = numeric_compute(node.compute)?;
        if ctx == ExprCtx::Step {
            return Some(format!("_{}", self.name(ix)));
        }
        let expr = match node.kind? {
            NodeKind::DeviceTrigger => format!("inputs.{}", self.name(ix)),
            NodeKind::Value => node
                .params
                .get("value")
                .map_or_else(|| zero_lit(ct).to_owned(), |v| value_lit(v, ct)),
            NodeKind::Timer => format!("state.tout_{}", self.name(ix)),
            NodeKind::Counter => format!("(state.cnt_{} as {})", self.name(ix), rust_type(ct)),
            NodeKind::Add => {
                let terms: Vec<String> = node
                    .input_handles()
                    .map(|h| self.input_read(h, ct, ctx))
                    .collect();
                if terms.is_empty() {
                    zero_lit(ct).to_owned()
                } else {
                    format!("({})", terms.join(" + "))
                }
            }
        };
        Some(expr)
    }
}

fn numeric_compute(compute: Option<DType>) -> Option<DType> {
    compute.filter(|dt| dt.is_numeric())
}

/// Positive `interval_ms` parameter, the same validity rule the engine
/// applies.
fn timer_interval_param(node: &nodeflow_core::NodeRecord) -> Option<f64> {
    let interval = node.params.get("interval_ms")?.as_f64();
    (interval > 0.0).then_some(interval)
}
