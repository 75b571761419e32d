// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

use nodeflow_core::{FlowEngine, Value};

mod common;
use common::{add_chain, timer_counter};

fn driven_add_chain() -> FlowEngine {
    let mut engine = FlowEngine::new();
    engine.load(&add_chain()).unwrap();
    engine.set_input("a", 1.0);
    engine.set_input("b", 2.0);
    engine.set_input("c", 4.0);
    engine.evaluate();
    engine
}

#[test]
fn delta_is_idempotent_for_a_fixed_watermark() {
    let engine = driven_add_chain();
    assert_eq!(engine.delta(0), engine.delta(0));
}

#[test]
fn delta_at_the_current_generation_is_empty() {
    let engine = driven_add_chain();
    assert!(engine.delta(engine.current_evaluation_generation()).is_empty());
}

#[test]
fn snapshot_matches_a_zero_watermark_delta_after_cold_start() {
    let engine = driven_add_chain();
    let graph = engine.graph().unwrap();

    let snapshot = engine.snapshot();
    let delta = engine.delta(0);
    assert_eq!(snapshot.len(), delta.len());
    for (handle, value) in &delta {
        let port = graph.port(*handle);
        let key = format!("{}:{}", graph.node(port.owner).id, port.id);
        assert_eq!(snapshot.get(&key), Some(value), "{key}");
    }
}

#[test]
fn delta_reports_only_the_dirty_path() {
    let mut engine = driven_add_chain();
    let watermark = engine.current_evaluation_generation();

    engine.set_input("a", 9.0);
    engine.evaluate();

    let changes = engine.delta(watermark);
    let graph = engine.graph().unwrap();
    let keys: Vec<String> = changes
        .keys()
        .map(|h| {
            let port = graph.port(*h);
            format!("{}:{}", graph.node(port.owner).id, port.id)
        })
        .collect();
    assert_eq!(keys, vec!["a:out1".to_owned(), "sum:out1".to_owned()]);
    assert_eq!(
        changes.values().collect::<Vec<_>>(),
        vec![&Value::F32(9.0), &Value::F32(15.0)]
    );
}

#[test]
fn a_port_written_twice_in_one_generation_appears_once_with_its_final_value() {
    let mut engine = FlowEngine::new();
    engine.load(&timer_counter()).unwrap();
    engine.tick(3000.0);
    engine.evaluate();
    let watermark = engine.current_evaluation_generation();

    // This tick both resets and re-fires the pulse: two writes to the same
    // port for the upcoming generation.
    engine.tick(3000.0);
    engine.evaluate();

    let changes = engine.delta(watermark);
    let graph = engine.graph().unwrap();
    let m_out = graph
        .port_handle("m", "out1", nodeflow_core::Direction::Output)
        .unwrap();
    assert_eq!(changes.get(&m_out), Some(&Value::F64(1.0)));
    assert_eq!(changes.len(), 2, "timer pulse and counter total");
}

#[test]
fn observers_can_walk_their_own_watermark() {
    let mut engine = driven_add_chain();
    let mut watermark = engine.current_evaluation_generation();

    engine.set_input("b", 10.0);
    engine.evaluate();
    let first = engine.delta(watermark);
    watermark = engine.current_evaluation_generation();
    assert_eq!(first.len(), 2);

    // Nothing new: the watermark view stays empty until the next change.
    engine.evaluate();
    assert!(engine.delta(watermark).is_empty());
}

#[test]
fn snapshot_generation_counter_is_orthogonal() {
    let mut engine = driven_add_chain();
    let eval_generation = engine.current_evaluation_generation();

    assert_eq!(engine.begin_snapshot_generation(), 1);
    assert_eq!(engine.begin_snapshot_generation(), 2);
    assert_eq!(engine.begin_snapshot_generation(), 3);
    assert_eq!(engine.current_evaluation_generation(), eval_generation);
}

#[test]
fn inputs_do_not_appear_in_deltas() {
    let engine = driven_add_chain();
    let graph = engine.graph().unwrap();
    for handle in engine.delta(0).keys() {
        assert_eq!(
            graph.port(*handle).direction,
            nodeflow_core::Direction::Output
        );
    }
}
