//! Errors surfaced by the evaluation and aggregation engines.
//!
//! Every error aborts the whole transform; no partially rewritten tree is
//! ever returned. None of them is transient, so nothing is retried.

use crate::symbolics::BackendError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// An assignment value could not be parsed by the backend.
    #[error("cannot parse assignment {param} = {value}: {source}")]
    UnparsableAssignment {
        param: String,
        value: String,
        #[source]
        source: BackendError,
    },

    /// Assignment values refer to each other in a loop.
    #[error("assignments refer to each other in a loop: {}", .chain.join(" -> "))]
    CyclicAssignment { chain: Vec<String> },

    /// A fully bound expression still applies a function nobody can evaluate.
    #[error("{location} calls '{function}', which is neither a backend function nor in the functions map")]
    UnresolvedFunction { function: String, location: String },

    /// A caller-supplied function failed.
    #[error("evaluating {location} failed: {source}")]
    FunctionEvaluation {
        location: String,
        #[source]
        source: BackendError,
    },

    /// Resource decomposition did not reach a fixed point.
    #[error("resource decomposition in '{routine}' does not terminate: {}", .chain.join(" -> "))]
    CyclicAggregation { routine: String, chain: Vec<String> },

    /// A decomposition weight could not be parsed.
    #[error("invalid weight for {resource} -> {target}: {source}")]
    InvalidWeight {
        resource: String,
        target: String,
        #[source]
        source: BackendError,
    },

    /// A schema expression could not be parsed.
    #[error("invalid expression at {location}: {source}")]
    Schema {
        location: String,
        #[source]
        source: BackendError,
    },

    /// Connections between children form a loop.
    #[error("connections between the children of '{routine}' form a loop through {}", .children.join(", "))]
    CyclicConnections { routine: String, children: Vec<String> },

    /// A linked-parameter target is not of the form `child.param`.
    #[error("invalid linked parameter target '{target}' in '{routine}'")]
    InvalidLink { routine: String, target: String },
}

pub type Result<T> = std::result::Result<T, Error>;
