//! Evaluation: binding parameter assignments into a compiled routine.
//!
//! Assignments are parsed once and resolved against each other, so a value
//! mentioning another assigned parameter sees that parameter's value. They are
//! then applied top-down to every port size, resource value and constraint of
//! the tree. Parameters are globally scoped by name: every child sees the same
//! bindings as its parent. Each node's `input_params` shrinks by the assigned
//! names; nothing else about the tree's shape changes.
//!
//! ```rust
//! use routine_estimator::eval::evaluate;
//! use routine_estimator::models::{Resource, Routine};
//! use routine_estimator::symbolics::NativeBackend;
//!
//! let backend = NativeBackend;
//! let routine = Routine::new("root")
//!     .with_input_params(["x", "y"])
//!     .with_resource(Resource::additive("T_gates", backend.parse("x*y + 1").unwrap()));
//!
//! let result = evaluate(&routine, [("x", 2)], &backend, None).unwrap();
//! assert_eq!(result.evaluated_routine.input_params, vec!["y"]);
//! assert_eq!(result.evaluated_routine.resources["T_gates"].value.to_string(), "2*y + 1");
//! ```

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::errors::{Error, Result};
use crate::models::{Constraint, ConstraintStatus, Routine, RoutineSchema};
use crate::symbolics::{Assignment, Bindings, FunctionsMap, SymbolicBackend};

/// Knobs for [`Evaluator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    /// Evaluate sibling subtrees on the rayon pool.
    pub parallel: bool,
    /// Reject closed expressions that still call an unknown function.
    ///
    /// Only expressions the evaluation actually rewrote are checked, so an
    /// empty assignment returns the input tree even when it already holds a
    /// closed call such as `O(1)`.
    pub strict_functions: bool,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        EvaluationSettings {
            parallel: true,
            strict_functions: true,
        }
    }
}

/// A freshly evaluated routine, together with the backend that produced its
/// expressions (needed to render them again).
pub struct EvaluationResult<'b, B: SymbolicBackend> {
    pub evaluated_routine: Routine<B::Expr>,
    backend: &'b B,
}

impl<'b, B: SymbolicBackend> EvaluationResult<'b, B> {
    pub fn backend(&self) -> &'b B {
        self.backend
    }

    pub fn into_routine(self) -> Routine<B::Expr> {
        self.evaluated_routine
    }

    pub fn to_schema(&self) -> RoutineSchema {
        self.evaluated_routine.to_schema(self.backend)
    }
}

impl<B: SymbolicBackend> fmt::Debug for EvaluationResult<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationResult")
            .field("evaluated_routine", &self.evaluated_routine)
            .finish_non_exhaustive()
    }
}

/// Reusable evaluation context: a backend, the caller's functions and settings.
pub struct Evaluator<'b, B: SymbolicBackend> {
    backend: &'b B,
    functions: FunctionsMap<B::Expr>,
    settings: EvaluationSettings,
}

impl<'b, B: SymbolicBackend> Evaluator<'b, B> {
    pub fn new(backend: &'b B) -> Self {
        Evaluator {
            backend,
            functions: FunctionsMap::new(),
            settings: EvaluationSettings::default(),
        }
    }

    pub fn with_functions(mut self, functions: FunctionsMap<B::Expr>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_settings(mut self, settings: EvaluationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// Evaluate `routine` under `assignments`.
    ///
    /// Keys that no routine in the tree declares as an input parameter are
    /// ignored. The input tree is never modified.
    pub fn evaluate<I, K, V>(
        &self,
        routine: &Routine<B::Expr>,
        assignments: I,
    ) -> Result<EvaluationResult<'b, B>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Assignment<B::Expr>>,
    {
        let bindings = self.resolve_assignments(self.parse_assignments(assignments)?)?;
        debug!(
            target: "routine_estimator::eval",
            routine = %routine.name,
            assignments = bindings.len(),
            parallel = self.settings.parallel,
            "Evaluating routine"
        );

        if !bindings.is_empty() {
            let declared: BTreeSet<&str> = routine
                .walk()
                .flat_map(|(_, node)| node.input_params.iter().map(String::as_str))
                .collect();
            for name in bindings.keys().filter(|name| !declared.contains(name.as_str())) {
                warn!(target: "routine_estimator::eval", param = %name, routine = %routine.name, "Ignoring assignment to undeclared parameter");
            }
        }

        let evaluated_routine = self.evaluate_node(routine, &bindings, &routine.name)?;
        Ok(EvaluationResult {
            evaluated_routine,
            backend: self.backend,
        })
    }

    fn parse_assignments<I, K, V>(&self, assignments: I) -> Result<Bindings<B::Expr>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Assignment<B::Expr>>,
    {
        assignments
            .into_iter()
            .map(|(param, value)| {
                let param = param.into();
                let expr = match value.into() {
                    Assignment::Literal(literal) => {
                        self.backend.parse_value(&literal).map_err(|source| {
                            Error::UnparsableAssignment {
                                param: param.clone(),
                                value: literal.to_string(),
                                source,
                            }
                        })?
                    }
                    Assignment::Expr(expr) => self.backend.parse_constant(expr),
                };
                Ok((param, expr))
            })
            .collect()
    }

    /// Substitute assignment values into each other until none mentions an assigned key.
    fn resolve_assignments(&self, parsed: Bindings<B::Expr>) -> Result<Bindings<B::Expr>> {
        let mut resolved = Bindings::new();
        let mut stack = Vec::new();
        for name in parsed.keys() {
            self.resolve_assignment(name, &parsed, &mut resolved, &mut stack)?;
        }
        Ok(resolved)
    }

    fn resolve_assignment(
        &self,
        name: &str,
        parsed: &Bindings<B::Expr>,
        resolved: &mut Bindings<B::Expr>,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        if resolved.contains_key(name) {
            return Ok(());
        }
        let Some(value) = parsed.get(name) else {
            return Ok(());
        };
        if let Some(start) = stack.iter().position(|pending| pending == name) {
            let mut chain = stack[start..].to_vec();
            chain.push(name.to_string());
            return Err(Error::CyclicAssignment { chain });
        }

        let dependencies: Vec<String> = self
            .backend
            .free_symbols(value)
            .into_iter()
            .filter(|symbol| parsed.contains_key(symbol))
            .collect();
        if dependencies.is_empty() {
            resolved.insert(name.to_string(), value.clone());
            return Ok(());
        }

        stack.push(name.to_string());
        for dependency in &dependencies {
            self.resolve_assignment(dependency, parsed, resolved, stack)?;
        }
        stack.pop();

        let inner: Bindings<B::Expr> = dependencies
            .into_iter()
            .filter_map(|dependency| resolved.get(&dependency).map(|value| (dependency, value.clone())))
            .collect();
        trace!(target: "routine_estimator::eval", param = %name, dependencies = inner.len(), "Resolving assignment");
        let value = self.backend.substitute(value, &inner);
        resolved.insert(name.to_string(), value);
        Ok(())
    }

    fn evaluate_node(
        &self,
        node: &Routine<B::Expr>,
        bindings: &Bindings<B::Expr>,
        path: &str,
    ) -> Result<Routine<B::Expr>> {
        trace!(target: "routine_estimator::eval::node", %path, ports = node.ports.len(), resources = node.resources.len());

        let mut evaluated = Routine {
            name: node.name.clone(),
            routine_type: node.routine_type.clone(),
            ports: BTreeMap::new(),
            resources: BTreeMap::new(),
            input_params: node
                .input_params
                .iter()
                .filter(|param| !bindings.contains_key(param.as_str()))
                .cloned()
                .collect(),
            local_variables: node.local_variables.clone(),
            linked_params: node.linked_params.clone(),
            children: BTreeMap::new(),
            connections: node.connections.clone(),
            constraints: Vec::with_capacity(node.constraints.len()),
        };

        for (name, port) in &node.ports {
            let location = format!("{}#ports.{}", path, name);
            let mut port = port.clone();
            port.size = self.rewrite(&port.size, bindings, &location)?;
            evaluated.ports.insert(name.clone(), port);
        }

        for (name, resource) in &node.resources {
            let location = format!("{}#resources.{}", path, name);
            let mut resource = resource.clone();
            resource.value = self.rewrite(&resource.value, bindings, &location)?;
            evaluated.resources.insert(name.clone(), resource);
        }

        for (i, constraint) in node.constraints.iter().enumerate() {
            let location = format!("{}#constraints.{}", path, i);
            let lhs = self.rewrite(&constraint.lhs, bindings, &location)?;
            let rhs = self.rewrite(&constraint.rhs, bindings, &location)?;
            let rewritten = lhs != constraint.lhs || rhs != constraint.rhs;
            let status = if rewritten && self.backend.is_numeric(&lhs) && self.backend.is_numeric(&rhs) {
                if self.backend.equals(&lhs, &rhs) {
                    ConstraintStatus::Satisfied
                } else {
                    warn!(target: "routine_estimator::eval", %location, lhs = %self.backend.serialize(&lhs), rhs = %self.backend.serialize(&rhs), "Constraint violated");
                    ConstraintStatus::Violated
                }
            } else {
                constraint.status
            };
            evaluated.constraints.push(Constraint { lhs, rhs, status });
        }

        let evaluate_child = |child: &Routine<B::Expr>| {
            let child_path = format!("{}.{}", path, child.name);
            self.evaluate_node(child, bindings, &child_path)
                .map(|evaluated| (child.name.clone(), evaluated))
        };

        // Collected in dataflow order so the reported error does not depend on scheduling.
        let order = node.sorted_children()?;
        let children: Vec<Result<(String, Routine<B::Expr>)>> =
            if self.settings.parallel && order.len() > 1 {
                order.par_iter().map(|child| evaluate_child(*child)).collect()
            } else {
                order.iter().map(|child| evaluate_child(*child)).collect()
            };
        evaluated.children = children.into_iter().collect::<Result<_>>()?;

        Ok(evaluated)
    }

    /// Substitute, apply caller functions, then check nothing unresolvable is left.
    fn rewrite(
        &self,
        expr: &B::Expr,
        bindings: &Bindings<B::Expr>,
        location: &str,
    ) -> Result<B::Expr> {
        let substituted = self.backend.substitute(expr, bindings);
        let applied = self
            .backend
            .apply_functions(&substituted, &self.functions)
            .map_err(|source| Error::FunctionEvaluation {
                location: location.to_string(),
                source,
            })?;

        let rewritten = applied != *expr;
        if self.settings.strict_functions && rewritten && self.backend.free_symbols(&applied).is_empty() {
            let unresolved = self
                .backend
                .function_calls(&applied)
                .into_iter()
                .find(|name| !self.backend.is_native_function(name) && !self.functions.contains(name));
            if let Some(function) = unresolved {
                return Err(Error::UnresolvedFunction {
                    function,
                    location: location.to_string(),
                });
            }
        }

        Ok(applied)
    }
}

/// Evaluate `routine` under `assignments` with default settings.
pub fn evaluate<'b, B, I, K, V>(
    routine: &Routine<B::Expr>,
    assignments: I,
    backend: &'b B,
    functions: Option<&FunctionsMap<B::Expr>>,
) -> Result<EvaluationResult<'b, B>>
where
    B: SymbolicBackend,
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Assignment<B::Expr>>,
{
    let mut evaluator = Evaluator::new(backend);
    if let Some(functions) = functions {
        evaluator = evaluator.with_functions(functions.clone());
    }
    evaluator.evaluate(routine, assignments)
}
