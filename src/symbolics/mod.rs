//! Symbolic backend interface.
//!
//! The evaluation and aggregation engines never inspect expressions
//! themselves. Everything they need (parsing, substitution, arithmetic,
//! symbol inspection, rendering) goes through [`SymbolicBackend`], so any
//! algebra system can sit underneath. [`native::NativeBackend`] is the
//! implementation shipped with the crate.

pub mod functions;
pub mod native;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

pub use functions::{ExprFunction, FunctionError, FunctionsMap};
pub use native::NativeBackend;

/// Symbol name -> replacement expression.
pub type Bindings<E> = BTreeMap<String, E>;

/// A scalar supplied from outside: a number or expression text.
///
/// Deserializes untagged, so TOML/JSON values `2`, `0.5` and `"k + 3"` all work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Integer(value.into())
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

/// Value assigned to a parameter: a literal still to be parsed, or a ready expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment<E> {
    Literal(Literal),
    Expr(E),
}

impl<E> Assignment<E> {
    pub fn expr(expr: E) -> Self {
        Assignment::Expr(expr)
    }
}

macro_rules! assignment_from_literal {
    ($($ty:ty),*) => {
        $(
            impl<E> From<$ty> for Assignment<E> {
                fn from(value: $ty) -> Self {
                    Assignment::Literal(value.into())
                }
            }
        )*
    };
}

assignment_from_literal!(i64, i32, f64, &str, String, Literal);

/// Errors raised by a backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("cannot parse '{input}': {message} (at position {position})")]
    Parse {
        input: String,
        position: usize,
        message: String,
    },

    #[error("function '{name}' failed: {message}")]
    Function { name: String, message: String },
}

/// Capabilities the engines require from a symbolic-expression backend.
///
/// Implementations must be pure: every method returns a new expression and
/// leaves its inputs untouched. Backends are shared read-only across the
/// whole traversal, possibly from several threads.
pub trait SymbolicBackend: Send + Sync {
    /// The backend's expression type.
    type Expr: Clone + fmt::Debug + PartialEq + Send + Sync;

    /// Convert a number or expression text into an expression.
    fn as_expression(&self, value: &Literal) -> Result<Self::Expr, BackendError>;

    /// Replace named constants (e.g. `pi`) with their values.
    fn parse_constant(&self, expr: Self::Expr) -> Self::Expr;

    /// Substitute every bound symbol occurring in `expr`.
    fn substitute(&self, expr: &Self::Expr, bindings: &Bindings<Self::Expr>) -> Self::Expr;

    /// Replace calls of functions registered in `functions` by their results.
    fn apply_functions(
        &self,
        expr: &Self::Expr,
        functions: &FunctionsMap<Self::Expr>,
    ) -> Result<Self::Expr, BackendError>;

    /// Names of the free symbols of `expr`.
    fn free_symbols(&self, expr: &Self::Expr) -> BTreeSet<String>;

    /// Names of the functions applied in `expr`.
    fn function_calls(&self, expr: &Self::Expr) -> BTreeSet<String>;

    /// Whether `expr` is a plain number.
    fn is_numeric(&self, expr: &Self::Expr) -> bool {
        self.free_symbols(expr).is_empty() && self.function_calls(expr).is_empty()
    }

    /// Whether `name` is a function the backend evaluates by itself.
    fn is_native_function(&self, name: &str) -> bool;

    fn add(&self, lhs: &Self::Expr, rhs: &Self::Expr) -> Self::Expr;

    fn mul(&self, lhs: &Self::Expr, rhs: &Self::Expr) -> Self::Expr;

    /// Semantic equality (up to algebraic rearrangement the backend can prove).
    fn equals(&self, lhs: &Self::Expr, rhs: &Self::Expr) -> bool;

    /// Render `expr` as text that `as_expression` parses back.
    fn serialize(&self, expr: &Self::Expr) -> String;

    /// Parse a literal and resolve constants in one go.
    fn parse_value(&self, value: &Literal) -> Result<Self::Expr, BackendError> {
        self.as_expression(value).map(|expr| self.parse_constant(expr))
    }
}
