//! Data model shared by the evaluation and aggregation engines.

pub mod routine;
pub mod schema;

pub use routine::{
    CompiledRoutine, Connection, Constraint, ConstraintStatus, Port, PortDirection, Resource, ResourceType, Routine,
    Walk,
};
pub use schema::{ConstraintSchema, LinkSchema, PortSchema, ResourceSchema, RoutineSchema};
