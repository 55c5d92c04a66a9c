//! Shared helpers for the integration tests.
//!
//! - Tracing initialisation (once per test binary)
//! - Routine fixtures loaded from JSON schema text
//! - Structural comparison of routine trees under the native backend

#![allow(dead_code)]

use std::sync::Once;

use routine_estimator::models::{ResourceType, Routine, RoutineSchema};
use routine_estimator::symbolics::native::Expr;
use routine_estimator::symbolics::{NativeBackend, SymbolicBackend};

static TRACING: Once = Once::new();

/// Install a test-writer subscriber.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

pub fn expr(text: &str) -> Expr {
    NativeBackend
        .parse(text)
        .unwrap_or_else(|e| panic!("bad test expression '{}': {}", text, e))
}

pub fn load(json: &str) -> Routine<Expr> {
    let schema = RoutineSchema::from_json(json).expect("fixture is valid JSON");
    Routine::from_schema(&schema, &NativeBackend).expect("fixture expressions parse")
}

/// Sum of every additive resource of `node` (not descending into children).
pub fn additive_total(node: &Routine<Expr>) -> Expr {
    node.resources
        .values()
        .filter(|resource| resource.resource_type == ResourceType::Additive)
        .fold(Expr::zero(), |total, resource| NativeBackend.add(&total, &resource.value))
}

/// Assert two trees have the same shape and algebraically equal expressions.
pub fn assert_equivalent(actual: &Routine<Expr>, expected: &Routine<Expr>) {
    let backend = NativeBackend;
    let actual_nodes: Vec<_> = actual.walk().collect();
    let expected_nodes: Vec<_> = expected.walk().collect();
    let actual_paths: Vec<&str> = actual_nodes.iter().map(|(path, _)| path.as_str()).collect();
    let expected_paths: Vec<&str> = expected_nodes.iter().map(|(path, _)| path.as_str()).collect();
    assert_eq!(actual_paths, expected_paths, "tree shapes differ");

    for ((path, a), (_, e)) in actual_nodes.iter().zip(expected_nodes.iter()) {
        assert_eq!(a.input_params, e.input_params, "input_params differ at {}", path);
        assert_eq!(
            a.resources.keys().collect::<Vec<_>>(),
            e.resources.keys().collect::<Vec<_>>(),
            "resource names differ at {}",
            path
        );
        for (name, resource) in &a.resources {
            let other = &e.resources[name];
            assert_eq!(resource.resource_type, other.resource_type, "type of {}#{}", path, name);
            assert!(
                backend.equals(&resource.value, &other.value),
                "{}#resources.{}: {} != {}",
                path,
                name,
                resource.value,
                other.value
            );
        }
        for (name, port) in &a.ports {
            let other = &e.ports[name];
            assert!(
                backend.equals(&port.size, &other.size),
                "{}#ports.{}: {} != {}",
                path,
                name,
                port.size,
                other.size
            );
        }
    }
}

/// A two-level routine: a state-preparation step followed by two rotations.
pub const PREPARE_AND_ROTATE: &str = r#"{
    "name": "root",
    "type": "algorithm",
    "ports": [
        {"name": "in", "direction": "input", "size": "N"},
        {"name": "out", "direction": "output", "size": "N"}
    ],
    "resources": [
        {"name": "T_gates", "type": "additive", "value": "2*N*k + 20*N"},
        {"name": "control_ry", "type": "additive", "value": "N"},
        {"name": "qubits", "type": "qubits", "value": "N + 1"}
    ],
    "input_params": ["N", "k"],
    "linked_params": [
        {"source": "N", "targets": ["prepare.N", "rotate_a.N", "rotate_b.N"]},
        {"source": "k", "targets": ["rotate_a.k", "rotate_b.k"]}
    ],
    "children": [
        {
            "name": "prepare",
            "type": "state_prep",
            "ports": [{"name": "in", "direction": "input", "size": "N"}],
            "resources": [
                {"name": "T_gates", "type": "additive", "value": "20*N"},
                {"name": "control_ry", "type": "additive", "value": "N"}
            ],
            "input_params": ["N"]
        },
        {
            "name": "rotate_a",
            "type": "rotation",
            "ports": [{"name": "in", "direction": "input", "size": "N"}],
            "resources": [{"name": "T_gates", "type": "additive", "value": "N*k"}],
            "input_params": ["N", "k"]
        },
        {
            "name": "rotate_b",
            "type": "rotation",
            "ports": [{"name": "in", "direction": "input", "size": "N"}],
            "resources": [{"name": "T_gates", "type": "additive", "value": "N*k"}],
            "input_params": ["N", "k"]
        }
    ],
    "connections": [
        {"source": "in", "target": "prepare.in"},
        {"source": "prepare.in", "target": "rotate_a.in"},
        {"source": "rotate_a.in", "target": "rotate_b.in"},
        {"source": "rotate_b.in", "target": "out"}
    ]
}"#;

/// A single routine with an error-bounded rotation cost.
pub const ARBITRARY_Z: &str = r#"{
    "name": "root",
    "resources": [
        {"name": "arbitrary_z", "type": "additive", "value": "N"},
        {"name": "CNOT", "type": "additive", "value": 4}
    ],
    "input_params": ["N", "epsilon"]
}"#;
