//! Native symbolic backend.
//!
//! A small exact-arithmetic expression engine: rational coefficients, symbols,
//! sums, products, powers and function calls kept in a canonical form. It is
//! not a computer-algebra system. It knows enough to add and scale cost
//! formulas, substitute parameters, and fold a handful of common functions.

pub mod builtins;
pub mod coeff;
pub mod expr;
pub mod normalize;
pub mod parser;


use std::borrow::Cow;
use std::collections::BTreeSet;

use tracing::trace;

use super::{BackendError, Bindings, FunctionError, FunctionsMap, Literal, SymbolicBackend};

pub use coeff::Coefficient;
pub use expr::Expr;
pub use parser::{parse, ParseError};

/// Relative tolerance used when two float results are compared.
const FLOAT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        NativeBackend
    }

    /// Parse text directly; convenience for callers holding strings.
    pub fn parse(&self, text: &str) -> Result<Expr, BackendError> {
        parse(text).map_err(|e| BackendError::Parse {
            input: text.to_string(),
            position: e.position,
            message: e.message,
        })
    }
}

/// Substitute bindings, reusing the input when nothing changes.
pub fn apply_bindings<'a>(expr: &'a Expr, bindings: &Bindings<Expr>) -> Cow<'a, Expr> {
    trace!(target: "routine_estimator::symbolics::native::apply_bindings", %expr, bindings = bindings.len());

    if bindings.is_empty() {
        return Cow::Borrowed(expr);
    }
    match expr {
        Expr::Num(_) => Cow::Borrowed(expr),
        Expr::Sym(name) => match bindings.get(name) {
            Some(value) => Cow::Owned(value.clone()),
            None => Cow::Borrowed(expr),
        },
        Expr::Call(name, args) => match rebuild_items(args, bindings) {
            Some(args) => Cow::Owned(normalize::call(name.clone(), args)),
            None => Cow::Borrowed(expr),
        },
        Expr::Pow(base, exp) => {
            let new_base = apply_bindings(base, bindings);
            let new_exp = apply_bindings(exp, bindings);
            if matches!(new_base, Cow::Borrowed(_)) && matches!(new_exp, Cow::Borrowed(_)) {
                Cow::Borrowed(expr)
            } else {
                Cow::Owned(normalize::pow(new_base.into_owned(), new_exp.into_owned()))
            }
        }
        Expr::Mul(factors) => match rebuild_items(factors, bindings) {
            Some(factors) => Cow::Owned(normalize::mul(factors)),
            None => Cow::Borrowed(expr),
        },
        Expr::Add(terms) => match rebuild_items(terms, bindings) {
            Some(terms) => Cow::Owned(normalize::add(terms)),
            None => Cow::Borrowed(expr),
        },
    }
}

/// Substituted copies of `items`, or `None` when no item changed.
fn rebuild_items(items: &[Expr], bindings: &Bindings<Expr>) -> Option<Vec<Expr>> {
    let results: Vec<Cow<'_, Expr>> = items.iter().map(|item| apply_bindings(item, bindings)).collect();
    if results.iter().all(|r| matches!(r, Cow::Borrowed(_))) {
        return None;
    }
    Some(results.into_iter().map(Cow::into_owned).collect())
}

fn apply_functions_impl(expr: &Expr, functions: &FunctionsMap<Expr>) -> Result<Expr, BackendError> {
    let rebuilt = match expr {
        Expr::Num(_) | Expr::Sym(_) => return Ok(expr.clone()),
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|a| apply_functions_impl(a, functions))
                .collect::<Result<Vec<_>, _>>()?;
            return match functions.get(name) {
                Some(function) => match function(&args) {
                    Ok(value) => Ok(value),
                    Err(FunctionError::NoReduce) => Ok(normalize::call(name.clone(), args)),
                    Err(FunctionError::Failed(message)) => Err(BackendError::Function {
                        name: name.clone(),
                        message,
                    }),
                },
                None => Ok(normalize::call(name.clone(), args)),
            };
        }
        Expr::Pow(base, exp) => normalize::pow(
            apply_functions_impl(base, functions)?,
            apply_functions_impl(exp, functions)?,
        ),
        Expr::Mul(factors) => normalize::mul(
            factors
                .iter()
                .map(|f| apply_functions_impl(f, functions))
                .collect::<Result<_, _>>()?,
        ),
        Expr::Add(terms) => normalize::add(
            terms
                .iter()
                .map(|t| apply_functions_impl(t, functions))
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(rebuilt)
}

impl SymbolicBackend for NativeBackend {
    type Expr = Expr;

    fn as_expression(&self, value: &Literal) -> Result<Expr, BackendError> {
        match value {
            Literal::Integer(i) => Ok(Expr::int(i128::from(*i))),
            Literal::Float(x) => Ok(Expr::Num(Coefficient::float(*x))),
            Literal::Text(text) => self.parse(text),
        }
    }

    fn parse_constant(&self, expr: Expr) -> Expr {
        let constants: Bindings<Expr> = builtins::NATIVE_CONSTANTS
            .iter()
            .map(|(name, value)| (name.to_string(), Expr::Num(Coefficient::float(*value))))
            .collect();
        match apply_bindings(&expr, &constants) {
            Cow::Borrowed(_) => expr,
            Cow::Owned(replaced) => replaced,
        }
    }

    fn substitute(&self, expr: &Expr, bindings: &Bindings<Expr>) -> Expr {
        apply_bindings(expr, bindings).into_owned()
    }

    fn apply_functions(&self, expr: &Expr, functions: &FunctionsMap<Expr>) -> Result<Expr, BackendError> {
        if functions.is_empty() {
            return Ok(expr.clone());
        }
        apply_functions_impl(expr, functions)
    }

    fn free_symbols(&self, expr: &Expr) -> BTreeSet<String> {
        expr.free_symbols()
    }

    fn function_calls(&self, expr: &Expr) -> BTreeSet<String> {
        expr.function_calls()
    }

    fn is_numeric(&self, expr: &Expr) -> bool {
        expr.as_number().is_some()
    }

    fn is_native_function(&self, name: &str) -> bool {
        builtins::is_native(name)
    }

    fn add(&self, lhs: &Expr, rhs: &Expr) -> Expr {
        normalize::add(vec![lhs.clone(), rhs.clone()])
    }

    fn mul(&self, lhs: &Expr, rhs: &Expr) -> Expr {
        normalize::mul(vec![lhs.clone(), rhs.clone()])
    }

    fn equals(&self, lhs: &Expr, rhs: &Expr) -> bool {
        if lhs == rhs {
            return true;
        }
        let difference = normalize::expand(&normalize::sub(lhs.clone(), rhs.clone()));
        match difference {
            Expr::Num(Coefficient::Rational(0, _)) => true,
            Expr::Num(Coefficient::Float(delta)) => {
                let scale = lhs
                    .as_number()
                    .map(|c| c.to_f64().abs())
                    .unwrap_or(1.0)
                    .max(1.0);
                delta.abs() <= FLOAT_TOLERANCE * scale
            }
            _ => false,
        }
    }

    fn serialize(&self, expr: &Expr) -> String {
        expr.to_string()
    }
}
