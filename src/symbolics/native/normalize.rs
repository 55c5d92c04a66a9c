//! Canonicalising constructors for [`Expr`].
//!
//! Every constructor returns an expression in canonical form:
//! - sums and products are flat and their operands sorted
//! - numeric constants are folded, one per sum / product
//! - like terms are collected (`x + 2*x = 3*x`) and equal bases merged (`x*x = x^2`)
//! - a numeric factor times a single sum is distributed (`2*(x + 1) = 2*x + 2`)
//!
//! Full expansion of products of sums is not part of the canonical form; it is
//! only applied by [`expand`] when two expressions are compared.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use super::builtins;
use super::coeff::Coefficient;
use super::expr::Expr;

/// Largest integer power of a sum that [`expand`] multiplies out.
pub const MAX_EXPANDED_POWER: i128 = 32;

pub fn num(c: Coefficient) -> Expr {
    Expr::Num(c)
}

pub fn neg(expr: Expr) -> Expr {
    mul(vec![Expr::Num(Coefficient::MINUS_ONE), expr])
}

pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
    add(vec![lhs, neg(rhs)])
}

pub fn div(lhs: Expr, rhs: Expr) -> Expr {
    mul(vec![lhs, pow(rhs, Expr::Num(Coefficient::MINUS_ONE))])
}

/// Split a term into its numeric coefficient and the remaining monomial.
fn split_coefficient(term: Expr) -> (Coefficient, Expr) {
    match term {
        Expr::Mul(mut factors) => match factors.first() {
            Some(Expr::Num(c)) => {
                let c = *c;
                factors.remove(0);
                let rest = if factors.len() == 1 {
                    factors.pop().unwrap_or_else(Expr::one)
                } else {
                    Expr::Mul(factors)
                };
                (c, rest)
            }
            _ => (Coefficient::ONE, Expr::Mul(factors)),
        },
        other => (Coefficient::ONE, other),
    }
}

/// Re-attach a coefficient to a monomial produced by [`split_coefficient`].
fn scale(monomial: Expr, c: Coefficient) -> Expr {
    if c.is_one() {
        return monomial;
    }
    match monomial {
        Expr::Mul(factors) => {
            let mut items = Vec::with_capacity(factors.len() + 1);
            items.push(Expr::Num(c));
            items.extend(factors);
            Expr::Mul(items)
        }
        other => Expr::Mul(vec![Expr::Num(c), other]),
    }
}

/// Canonical sum.
pub fn add(terms: Vec<Expr>) -> Expr {
    let mut constant = Coefficient::ZERO;
    let mut collected: BTreeMap<Expr, Coefficient> = BTreeMap::new();

    let mut pending = terms;
    while let Some(term) = pending.pop() {
        match term {
            Expr::Add(inner) => pending.extend(inner),
            Expr::Num(c) => constant = constant.add(c),
            other => {
                let (c, monomial) = split_coefficient(other);
                let slot = collected.entry(monomial).or_insert(Coefficient::ZERO);
                *slot = slot.add(c);
            }
        }
    }

    let mut out: Vec<Expr> = collected
        .into_iter()
        .filter(|(_, c)| !c.is_zero())
        .map(|(monomial, c)| scale(monomial, c))
        .collect();
    // An exact zero disappears; a float zero still marks the sum as approximate.
    if !constant.is_zero() || (constant.is_float() && out.is_empty()) {
        out.push(Expr::Num(constant));
    }
    out.sort();

    match out.len() {
        0 => Expr::zero(),
        1 => out.pop().unwrap_or_else(Expr::zero),
        _ => Expr::Add(out),
    }
}

/// Canonical product.
pub fn mul(factors: Vec<Expr>) -> Expr {
    let mut coeff = Coefficient::ONE;
    let mut powers: BTreeMap<Expr, SmallVec<[Expr; 2]>> = BTreeMap::new();

    let mut pending = factors;
    while let Some(factor) = pending.pop() {
        match factor {
            Expr::Mul(inner) => pending.extend(inner),
            Expr::Num(c) => coeff = coeff.mul(c),
            Expr::Pow(base, exp) => powers.entry(*base).or_default().push(*exp),
            other => powers.entry(other).or_default().push(Expr::one()),
        }
    }

    if coeff.is_zero() {
        return Expr::Num(coeff);
    }

    let mut out: Vec<Expr> = Vec::with_capacity(powers.len());
    for (base, exps) in powers {
        let exponent = if exps.len() == 1 {
            exps.into_iter().next().unwrap_or_else(Expr::one)
        } else {
            add(exps.into_vec())
        };
        match pow(base, exponent) {
            Expr::Num(c) => coeff = coeff.mul(c),
            Expr::Mul(inner) => {
                for item in inner {
                    match item {
                        Expr::Num(c) => coeff = coeff.mul(c),
                        other => out.push(other),
                    }
                }
            }
            other => out.push(other),
        }
    }

    if coeff.is_zero() {
        return Expr::Num(coeff);
    }
    out.sort();

    if out.len() == 1 && !coeff.is_one() {
        if let Expr::Add(terms) = &out[0] {
            return add(
                terms
                    .iter()
                    .map(|t| mul(vec![Expr::Num(coeff), t.clone()]))
                    .collect(),
            );
        }
    }

    if !coeff.is_one() {
        out.insert(0, Expr::Num(coeff));
    }
    match out.len() {
        0 => Expr::Num(coeff),
        1 => out.pop().unwrap_or_else(Expr::one),
        _ => Expr::Mul(out),
    }
}

/// Canonical power.
pub fn pow(base: Expr, exp: Expr) -> Expr {
    if let Expr::Num(e) = &exp {
        if e.is_zero() && !e.is_float() {
            return Expr::one();
        }
        if e.is_one() {
            return base;
        }
    }
    if let Expr::Num(b) = &base {
        if b.is_one() {
            return Expr::one();
        }
    }

    match (base, exp) {
        (Expr::Num(b), Expr::Num(e)) => match (b, e) {
            (Coefficient::Rational(..), Coefficient::Rational(p, 1)) => match b.pow_int(p) {
                Some(c) => Expr::Num(c),
                None => Expr::Pow(Box::new(Expr::Num(b)), Box::new(Expr::Num(e))),
            },
            (Coefficient::Rational(..), Coefficient::Rational(p, q)) => match b.root(p, q) {
                Some(c) => Expr::Num(c),
                None => Expr::Pow(Box::new(Expr::Num(b)), Box::new(Expr::Num(e))),
            },
            _ => {
                let value = b.to_f64().powf(e.to_f64());
                if value.is_finite() {
                    Expr::Num(Coefficient::float(value))
                } else {
                    Expr::Pow(Box::new(Expr::Num(b)), Box::new(Expr::Num(e)))
                }
            }
        },
        (Expr::Pow(inner_base, inner_exp), Expr::Num(e)) if e.as_integer().is_some() => {
            pow(*inner_base, mul(vec![*inner_exp, Expr::Num(e)]))
        }
        (Expr::Mul(factors), Expr::Num(e)) if e.as_integer().is_some() => mul(
            factors
                .into_iter()
                .map(|f| pow(f, Expr::Num(e)))
                .collect(),
        ),
        (base, exp) => Expr::Pow(Box::new(base), Box::new(exp)),
    }
}

/// Canonical function application; native functions fold on numeric arguments.
pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    let name = name.into();
    match builtins::fold(&name, &args) {
        Some(folded) => folded,
        None => Expr::Call(name, args),
    }
}

/// Rebuild an expression bottom-up through the canonical constructors.
pub fn rebuild(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(_) | Expr::Sym(_) => expr.clone(),
        Expr::Call(name, args) => call(name.clone(), args.iter().map(rebuild).collect()),
        Expr::Pow(base, exp) => pow(rebuild(base), rebuild(exp)),
        Expr::Mul(factors) => mul(factors.iter().map(rebuild).collect()),
        Expr::Add(terms) => add(terms.iter().map(rebuild).collect()),
    }
}

/// Multiply out products of sums and small integer powers of sums.
pub fn expand(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(_) | Expr::Sym(_) => expr.clone(),
        Expr::Call(name, args) => call(name.clone(), args.iter().map(expand).collect()),
        Expr::Add(terms) => add(terms.iter().map(expand).collect()),
        Expr::Mul(factors) => {
            let expanded: Vec<Expr> = factors.iter().map(expand).collect();
            distribute(&expanded)
        }
        Expr::Pow(base, exp) => {
            let base = expand(base);
            let exp = expand(exp);
            match (&base, exp.as_number().and_then(|c| c.as_integer())) {
                (Expr::Add(_), Some(n)) if (2..=MAX_EXPANDED_POWER).contains(&n) => {
                    let copies: Vec<Expr> = (0..n).map(|_| base.clone()).collect();
                    distribute(&copies)
                }
                _ => pow(base, exp),
            }
        }
    }
}

/// Expand a product whose factors are already expanded.
fn distribute(factors: &[Expr]) -> Expr {
    let mut partial: Vec<Expr> = vec![Expr::one()];
    for factor in factors {
        let terms: &[Expr] = match factor {
            Expr::Add(terms) => terms,
            other => std::slice::from_ref(other),
        };
        partial = partial
            .iter()
            .flat_map(|p| terms.iter().map(move |t| mul(vec![p.clone(), t.clone()])))
            .collect();
    }
    add(partial)
}
