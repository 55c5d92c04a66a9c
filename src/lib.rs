//! Routine Estimator - symbolic resource estimation for hierarchical routines
//!
//! A routine is a tree of operations. Every node carries ports and resources
//! (gate counts, depths, qubit counts...) whose values are symbolic
//! expressions over free parameters. This library rewrites such trees.
//!
//! # Architecture
//!
//! 1. **Data model** (`models` module)
//!    - `Routine` tree with ports, resources, parameters and children
//!    - Conversion to and from the declarative JSON schema
//!
//! 2. **Symbolic backends** (`symbolics` module)
//!    - `SymbolicBackend` trait: parsing, substitution, arithmetic, inspection
//!    - `NativeBackend`: exact rational arithmetic over a small expression tree
//!    - `FunctionsMap`: caller-registered functions usable inside expressions
//!
//! 3. **Evaluation** (`eval` module)
//!    - Binds parameter assignments through the whole tree
//!    - Shrinks every node's set of free input parameters
//!    - Settles constraints once both sides are numbers
//!
//! 4. **Aggregation** (`transform` module)
//!    - Expands resources into weighted sums of more primitive resources
//!    - Flattens each table rule once per node and detects cyclic tables
//!
//! # Example
//!
//! ```rust
//! use routine_estimator::prelude::*;
//!
//! let backend = NativeBackend;
//! let routine = Routine::new("root")
//!     .with_input_params(["num"])
//!     .with_resource(Resource::additive("CNOT", backend.parse("2*num").unwrap()))
//!     .with_resource(Resource::additive("control_ry", backend.parse("3*num").unwrap()));
//!
//! let mut table = DecompositionTable::new();
//! table.entry("control_ry".to_string()).or_default().insert("CNOT".to_string(), Literal::from(2));
//!
//! let aggregated = aggregate(&routine, &table, &backend, true).unwrap();
//! let result = evaluate(&aggregated, [("num", 10)], &backend, None).unwrap();
//! assert_eq!(result.evaluated_routine.resources["CNOT"].value.to_string(), "80");
//! ```
//!
//! # Guarantees
//!
//! - **Purity**: transforms never modify their input tree
//! - **Determinism**: all maps are ordered, results do not depend on scheduling
//! - **All or nothing**: the first error aborts the whole transform

pub mod config;
pub mod errors;
pub mod eval;
pub mod models;
pub mod symbolics;
pub mod transform;

pub use config::{ConfigError, EstimatorConfig};
pub use errors::{Error, Result};
pub use eval::{evaluate, EvaluationResult, EvaluationSettings, Evaluator};
pub use models::{
    CompiledRoutine, Connection, Constraint, ConstraintStatus, Port, PortDirection, Resource, ResourceType, Routine,
    RoutineSchema,
};
pub use symbolics::{Assignment, BackendError, FunctionError, FunctionsMap, Literal, NativeBackend, SymbolicBackend};
pub use transform::{aggregate, AggregationSettings, Aggregator, DecompositionTable};

/// Everything needed to build, evaluate and aggregate routines.
pub mod prelude {
    pub use crate::eval::{evaluate, EvaluationSettings, Evaluator};
    pub use crate::models::{
        Connection, Constraint, ConstraintStatus, Port, PortDirection, Resource, ResourceType, Routine, RoutineSchema,
    };
    pub use crate::symbolics::{Assignment, FunctionError, FunctionsMap, Literal, NativeBackend, SymbolicBackend};
    pub use crate::transform::{aggregate, Aggregator, DecompositionTable};
}
