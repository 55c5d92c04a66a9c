//! Configuration files driving a full estimate.

mod common;

use std::fs;

use common::{init_tracing, load, PREPARE_AND_ROTATE};
use routine_estimator::prelude::*;
use routine_estimator::symbolics::native::Expr;
use routine_estimator::{ConfigError, EstimatorConfig};

const ESTIMATE: &str = r#"
[evaluation]
parallel = false

[aggregation]
remove_decomposed = true

[aggregation.table.control_ry]
rotation = 2
CNOT = 2

[aggregation.table.rotation]
T_gates = 50

[assignments]
N = 8
k = 3
"#;

#[test]
fn test_estimate_from_file() {
    init_tracing();
    let path = std::env::temp_dir().join(format!("routine-estimator-{}.toml", std::process::id()));
    fs::write(&path, ESTIMATE).unwrap();
    let config = EstimatorConfig::load(&path);
    fs::remove_file(&path).unwrap();
    let config = config.unwrap();

    let backend = NativeBackend;
    let routine = load(PREPARE_AND_ROTATE);
    let aggregated = config.aggregator(&backend).unwrap().aggregate(&routine).unwrap();
    let result = config
        .evaluator(&backend, FunctionsMap::new())
        .evaluate(&aggregated, config.assignments())
        .unwrap();

    let root = &result.evaluated_routine;
    assert!(root.input_params.is_empty());
    assert_eq!(root.resources["T_gates"].value, Expr::int(2 * 8 * 3 + 120 * 8));
    assert_eq!(root.resources["CNOT"].value, Expr::int(16));
    assert_eq!(root.children["rotate_b"].resources["T_gates"].value, Expr::int(24));
}

#[test]
fn test_invalid_weight_in_config() {
    let config = EstimatorConfig::parse_toml("[aggregation.table.rotation]\nT_gates = \"3*\"\n").unwrap();
    let err = config.aggregator(&NativeBackend).err().unwrap();
    assert!(matches!(err, routine_estimator::Error::InvalidWeight { .. }));
}

#[test]
fn test_wrong_value_type_is_rejected() {
    let err = EstimatorConfig::parse_toml("[evaluation]\nparallel = \"yes\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}
