//! Expression tree of the native backend.
//!
//! Values are only ever built through the canonicalising constructors in
//! [`super::normalize`], so two mathematically identical inputs that differ
//! only in operand order, grouping, or like-term layout compare equal with
//! the derived `PartialEq`.

use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;

use super::coeff::Coefficient;

/// A canonical symbolic expression.
///
/// Variant order matters: the derived `Ord` sorts numbers before symbols,
/// which keeps the numeric coefficient at the front of a product.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expr {
    /// A numeric constant
    Num(Coefficient),
    /// A free symbol (may contain `.` for path-qualified parameters)
    Sym(String),
    /// A function application, e.g. `ceiling(x/2)`
    Call(String, Vec<Expr>),
    /// `base ^ exponent`
    Pow(Box<Expr>, Box<Expr>),
    /// Product of at least two factors; a numeric factor, if any, comes first
    Mul(Vec<Expr>),
    /// Sum of at least two terms
    Add(Vec<Expr>),
}

impl Expr {
    pub fn int(n: i128) -> Expr {
        Expr::Num(Coefficient::int(n))
    }

    pub fn zero() -> Expr {
        Expr::Num(Coefficient::ZERO)
    }

    pub fn one() -> Expr {
        Expr::Num(Coefficient::ONE)
    }

    pub fn symbol(name: impl Into<String>) -> Expr {
        Expr::Sym(name.into())
    }

    pub fn as_number(&self) -> Option<Coefficient> {
        match self {
            Expr::Num(c) => Some(*c),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Num(c) if c.is_zero())
    }

    /// Names of all free symbols, sorted.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.visit(&mut |node| {
            if let Expr::Sym(name) = node {
                out.insert(name.clone());
            }
        });
        out
    }

    /// Names of all functions applied anywhere in the expression, sorted.
    pub fn function_calls(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.visit(&mut |node| {
            if let Expr::Call(name, _) = node {
                out.insert(name.clone());
            }
        });
        out
    }

    /// Pre-order visit of every node.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            f(node);
            match node {
                Expr::Num(_) | Expr::Sym(_) => {}
                Expr::Call(_, args) => stack.extend(args.iter().rev()),
                Expr::Pow(base, exp) => {
                    stack.push(exp);
                    stack.push(base);
                }
                Expr::Mul(items) | Expr::Add(items) => stack.extend(items.iter().rev()),
            }
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_ATOM: u8 = 4;

/// Render with the precedence of the produced text.
fn render(expr: &Expr) -> (String, u8) {
    match expr {
        Expr::Num(c) => match c {
            Coefficient::Rational(_, 1) | Coefficient::Float(_) if !c.is_negative() => {
                (c.to_string(), PREC_ATOM)
            }
            Coefficient::Rational(_, _) if !c.is_negative() => (c.to_string(), PREC_MUL),
            _ => (c.to_string(), PREC_ADD),
        },
        Expr::Sym(name) => (name.clone(), PREC_ATOM),
        Expr::Call(name, args) => (
            format!("{}({})", name, args.iter().map(|a| render(a).0).join(", ")),
            PREC_ATOM,
        ),
        Expr::Pow(base, exp) => match exp.as_number() {
            Some(c) if c.is_negative() => render_product(Coefficient::ONE, std::slice::from_ref(expr)),
            _ => (
                format!("{}^{}", wrap(base, PREC_ATOM), wrap(exp, PREC_ATOM)),
                PREC_ATOM - 1,
            ),
        },
        Expr::Mul(factors) => {
            let (coeff, rest) = match factors.split_first() {
                Some((Expr::Num(c), rest)) => (*c, rest),
                _ => (Coefficient::ONE, factors.as_slice()),
            };
            render_product(coeff, rest)
        }
        Expr::Add(terms) => {
            // Constants print last, the way cost formulas are usually written.
            let ordered = terms
                .iter()
                .filter(|t| !matches!(t, Expr::Num(_)))
                .chain(terms.iter().filter(|t| matches!(t, Expr::Num(_))));
            let mut out = String::new();
            for (i, term) in ordered.enumerate() {
                let (negative, magnitude) = split_sign(term);
                let text = render(&magnitude).0;
                match (i, negative) {
                    (0, false) => out.push_str(&text),
                    (0, true) => {
                        out.push('-');
                        out.push_str(&wrap(&magnitude, PREC_MUL));
                    }
                    (_, false) => {
                        out.push_str(" + ");
                        out.push_str(&text);
                    }
                    (_, true) => {
                        out.push_str(" - ");
                        out.push_str(&wrap(&magnitude, PREC_MUL));
                    }
                }
            }
            (out, PREC_ADD)
        }
    }
}

fn wrap(expr: &Expr, min_prec: u8) -> String {
    let (text, prec) = render(expr);
    if prec < min_prec {
        format!("({})", text)
    } else {
        text
    }
}

/// Split a term into its sign and magnitude for `a - b` rendering.
fn split_sign(term: &Expr) -> (bool, Expr) {
    match term {
        Expr::Num(c) if c.is_negative() => (true, Expr::Num(c.abs())),
        Expr::Mul(factors) => match factors.split_first() {
            Some((Expr::Num(c), rest)) if c.is_negative() => {
                let magnitude = c.abs();
                let mut items: Vec<Expr> = Vec::with_capacity(factors.len());
                if !magnitude.is_one() {
                    items.push(Expr::Num(magnitude));
                }
                items.extend(rest.iter().cloned());
                let expr = if items.len() == 1 {
                    items.pop().unwrap_or_else(Expr::one)
                } else {
                    Expr::Mul(items)
                };
                (true, expr)
            }
            _ => (false, term.clone()),
        },
        _ => (false, term.clone()),
    }
}

/// Render `coeff * factors` as `numerator/denominator`.
fn render_product(coeff: Coefficient, factors: &[Expr]) -> (String, u8) {
    let negative = coeff.is_negative();
    let coeff = coeff.abs();

    let mut numerator: Vec<String> = Vec::new();
    let mut denominator: Vec<String> = Vec::new();

    match coeff {
        Coefficient::Rational(n, d) => {
            if n != 1 {
                numerator.push(n.to_string());
            }
            if d != 1 {
                denominator.push(d.to_string());
            }
        }
        Coefficient::Float(_) => numerator.push(coeff.to_string()),
    }

    for factor in factors {
        match factor {
            Expr::Pow(base, exp) => match exp.as_number() {
                Some(c) if c.is_negative() => {
                    let positive = c.abs();
                    if positive.is_one() {
                        denominator.push(wrap(base, PREC_ATOM));
                    } else {
                        denominator.push(format!(
                            "{}^{}",
                            wrap(base, PREC_ATOM),
                            wrap(&Expr::Num(positive), PREC_ATOM)
                        ));
                    }
                }
                _ => numerator.push(wrap(factor, PREC_MUL + 1)),
            },
            _ => numerator.push(wrap(factor, PREC_MUL + 1)),
        }
    }

    let mut text = if numerator.is_empty() {
        "1".to_string()
    } else {
        numerator.join("*")
    };
    match denominator.len() {
        0 => {}
        1 => {
            text.push('/');
            text.push_str(&denominator[0]);
        }
        _ => {
            text.push_str("/(");
            text.push_str(&denominator.join("*"));
            text.push(')');
        }
    }

    if negative {
        (format!("-{}", text), PREC_ADD)
    } else if numerator.len() + denominator.len() > 1 || !denominator.is_empty() {
        (text, PREC_MUL)
    } else {
        (text, PREC_MUL + 1)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render(self).0)
    }
}
