//! Transforms producing a new routine tree from an existing one.

pub mod aggregation;

pub use aggregation::{
    aggregate, AggregationSettings, Aggregator, DecompositionTable, DEFAULT_MAX_REWRITE_STEPS,
};
