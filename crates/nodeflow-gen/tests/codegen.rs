// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Integration tests for nodeflow-gen code generation.
//!
//! These tests validate that the generator produces valid Rust with the
//! expected records, descriptor tables, and evaluation functions for
//! representative flow fixtures.

use std::io::Write;
use std::process::{Command, Stdio};

/// Helper to run nodeflow-gen with the given flow JSON and return the
/// generated code.
fn generate_from_json(json: &str) -> Result<String, String> {
    let mut child = Command::new(env!("CARGO_BIN_EXE_nodeflow-gen"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn nodeflow-gen");

    {
        let stdin = child.stdin.as_mut().expect("Failed to open stdin");
        stdin
            .write_all(json.as_bytes())
            .expect("Failed to write to stdin");
    }

    let output = child.wait_with_output().expect("Failed to wait on child");

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

fn fixture(fixture_name: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let fixture_path = format!("{manifest_dir}/tests/fixtures/{fixture_name}");
    std::fs::read_to_string(&fixture_path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {fixture_path}: {e}"))
}

fn generate_from_fixture(fixture_name: &str) -> Result<String, String> {
    generate_from_json(&fixture(fixture_name))
}

/// Verify generated code parses as valid Rust using syn.
fn assert_valid_rust(code: &str) {
    syn::parse_file(code).unwrap_or_else(|e| {
        panic!("Generated code is not valid Rust:\n{code}\n\nError: {e}")
    });
}

// ─── Add Chain Fixture ───────────────────────────────────────────────────────

#[test]
fn add_chain_generates_valid_rust() {
    let code = generate_from_fixture("add_chain.json").expect("generation failed");
    assert_valid_rust(&code);
}

#[test]
fn add_chain_binary_and_library_agree() {
    let code = generate_from_fixture("add_chain.json").unwrap();
    let doc: nodeflow_core::FlowDoc = serde_json::from_str(&fixture("add_chain.json")).unwrap();
    assert_eq!(code, nodeflow_gen::generate(&doc).unwrap());
}

#[test]
fn add_chain_inputs_follow_node_load_order() {
    let code = generate_from_fixture("add_chain.json").unwrap();
    let a = code.find("pub a: f32,").expect("missing field a");
    let b = code.find("pub b: f32,").expect("missing field b");
    let c = code.find("pub c: f32,").expect("missing field c");
    assert!(a < b && b < c, "Inputs fields out of load order");
}

#[test]
fn add_chain_state_is_empty() {
    let code = generate_from_fixture("add_chain.json").unwrap();
    assert!(
        code.contains("pub struct State {\n}"),
        "State should have no fields for a stateless graph"
    );
}

#[test]
fn add_chain_step_reduces_to_a_typed_sum() {
    let code = generate_from_fixture("add_chain.json").unwrap();
    assert!(code.contains("let _sum: f32 = _a + _b + _c;"));
    assert!(code.contains("outputs.sum = _sum;"));
}

#[test]
fn rejected_documents_fail_generation() {
    let cyclic = r#"{
        "nodes": [
            { "id": "p", "type": "Add",
              "inputs": [{ "id": "in1", "type": "f32" }],
              "outputs": [{ "id": "out1", "type": "f32" }] },
            { "id": "q", "type": "Add",
              "inputs": [{ "id": "in1", "type": "f32" }],
              "outputs": [{ "id": "out1", "type": "f32" }] }
        ],
        "connections": [
            { "fromNode": "p", "fromPort": "out1", "toNode": "q", "toPort": "in1" },
            { "fromNode": "q", "fromPort": "out1", "toNode": "p", "toPort": "in1" }
        ]
    }"#;
    let err = generate_from_json(cyclic).expect_err("cycle must fail generation");
    assert!(err.contains("cycle"), "stderr should name the cycle: {err}");
}

// ─── Full Demo Fixture ───────────────────────────────────────────────────────

#[test]
fn full_demo_generates_valid_rust() {
    let code = generate_from_fixture("full_demo.json").expect("generation failed");
    assert_valid_rust(&code);
}

#[test]
fn full_demo_descriptor_tables_match_the_interned_graph() {
    let code = generate_from_fixture("full_demo.json").unwrap();
    assert!(code.contains("pub const NUM_PORTS: usize = 11;"));
    assert!(code.contains(
        r#"PortDesc { handle: 0, node_id: "key1", port_id: "out1", is_output: true, dtype: "i32" },"#
    ));
    assert!(code.contains(
        r#"PortDesc { handle: 4, node_id: "counter1", port_id: "in1", is_output: false, dtype: "i32" },"#
    ));
    assert!(code.contains(
        r#"PortDesc { handle: 10, node_id: "add1", port_id: "out1", is_output: true, dtype: "f32" },"#
    ));
    assert!(code.contains("pub const NUM_TOPO: usize = 6;"));
    assert!(code.contains("pub const TOPO_ORDER: [u32; 6] = [0, 1, 2, 3, 4, 5];"));
}

#[test]
fn full_demo_input_fields_expose_byte_offsets() {
    let code = generate_from_fixture("full_demo.json").unwrap();
    assert!(code.contains("pub const NUM_INPUT_FIELDS: usize = 3;"));
    assert!(code.contains(
        r#"InputField { node_id: "key1", offset: core::mem::offset_of!(Inputs, key1), dtype: "i32" },"#
    ));
    assert!(code.contains(
        r#"InputField { node_id: "random1", offset: core::mem::offset_of!(Inputs, random1), dtype: "f32" },"#
    ));
}

#[test]
fn full_demo_state_holds_timer_and_counter_fields() {
    let code = generate_from_fixture("full_demo.json").unwrap();
    assert!(code.contains("pub acc_metronome1: f64,"));
    assert!(code.contains("pub tout_metronome1: f64,"));
    assert!(code.contains("pub last_counter1: i32,"));
    assert!(code.contains("pub cnt_counter1: f64,"));
}

#[test]
fn full_demo_set_input_coerces_by_handle() {
    let code = generate_from_fixture("full_demo.json").unwrap();
    assert!(code.contains("0 => inputs.key1 = value as i32,"));
    assert!(code.contains("1 => inputs.key2 = value as i32,"));
    assert!(code.contains("2 => inputs.random1 = value as f32,"));
}

#[test]
fn full_demo_tick_orders_reset_counters_fire() {
    let code = generate_from_fixture("full_demo.json").unwrap();
    let tick_start = code.find("pub fn tick").expect("missing tick");
    let tick = &code[tick_start..code[tick_start..].find("\npub fn ").unwrap() + tick_start];
    let reset = tick
        .find("state.tout_metronome1 = 0.0;")
        .expect("missing pulse reset");
    let counter = tick.find("let level: f64 =").expect("missing counter update");
    let fire = tick
        .find("state.acc_metronome1 += dt_ms;")
        .expect("missing accumulator advance");
    assert!(
        reset < counter && counter < fire,
        "tick phases out of order: reset={reset} counter={counter} fire={fire}"
    );
    assert!(code.contains(
        "if state.acc_metronome1 >= 3000.0 { state.acc_metronome1 -= 3000.0; state.tout_metronome1 = 1.0; }"
    ));
}

#[test]
fn full_demo_step_runs_the_counter_edge_update() {
    let code = generate_from_fixture("full_demo.json").unwrap();
    assert!(code.contains("let _metronome1: f64 = state.tout_metronome1;"));
    assert!(code.contains("if high && state.last_counter1 == 0 { state.cnt_counter1 += 1.0; }"));
    assert!(code.contains("state.cnt_counter1 as i32"));
    assert!(code.contains("let _add1: f32 = (_key1 as f32) + (_key2 as f32) + _random1 + (_counter1 as f32);"));
    assert!(code.contains("outputs.add1 = _add1;"));
}

#[test]
fn full_demo_get_output_reads_state_sinks_and_nothing_else() {
    let code = generate_from_fixture("full_demo.json").unwrap();
    assert!(code.contains("3 => state.tout_metronome1 as f64,"));
    assert!(code.contains("5 => state.cnt_counter1,"));
    assert!(code.contains("10 => outputs.add1 as f64,"));
    // DeviceTrigger outputs are not readable through this API.
    let tail = &code[code.find("pub fn get_output").expect("missing get_output")..];
    assert!(!tail.contains("inputs."), "triggers must not be readable");
}

#[test]
fn full_demo_init_zeroes_every_state_field() {
    let code = generate_from_fixture("full_demo.json").unwrap();
    assert!(code.contains("state.acc_metronome1 = 0.0;"));
    assert!(code.contains("state.last_counter1 = 0;"));
    assert!(code.contains("state.cnt_counter1 = 0.0;"));
    assert!(code.contains("pub fn reset(state: &mut State) {\n    init(state);\n}"));
}
