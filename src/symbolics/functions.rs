//! Caller-supplied functions usable inside expressions.
//!
//! Cost formulas often mention domain primitives (`O(...)`, a rotation
//! synthesis cost, a lookup table) that no algebra backend knows. A
//! [`FunctionsMap`] maps such names to Rust closures; backends call them from
//! [`SymbolicBackend::apply_functions`](super::SymbolicBackend::apply_functions).
//!
//! A function that cannot handle its arguments yet (typically because they are
//! still symbolic) returns [`FunctionError::NoReduce`] and the call is kept
//! as-is.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Outcome of a function that did not produce a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FunctionError {
    /// Not applicable to these arguments; leave the call symbolic.
    /// This is NOT an error.
    #[error("no reduction")]
    NoReduce,

    /// Applicable, but evaluation failed.
    #[error("{0}")]
    Failed(String),
}

/// A function over backend expressions.
pub type ExprFunction<E> = Arc<dyn Fn(&[E]) -> Result<E, FunctionError> + Send + Sync>;

/// Registry of caller-supplied functions, keyed by name.
pub struct FunctionsMap<E> {
    functions: HashMap<String, ExprFunction<E>>,
}

impl<E> FunctionsMap<E> {
    pub fn new() -> Self {
        FunctionsMap {
            functions: HashMap::new(),
        }
    }

    /// Register a function, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[E]) -> Result<E, FunctionError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[E]) -> Result<E, FunctionError> + Send + Sync + 'static,
    {
        self.register(name, function);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ExprFunction<E>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl<E> Default for FunctionsMap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for FunctionsMap<E> {
    fn clone(&self) -> Self {
        FunctionsMap {
            functions: self.functions.clone(),
        }
    }
}

impl<E> fmt::Debug for FunctionsMap<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionsMap")
            .field("functions", &self.names())
            .finish()
    }
}
