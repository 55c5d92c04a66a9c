//! Functions the native backend understands.
//!
//! A native function folds to a number only when every argument is numeric.
//! Exact (rational) arguments fold only to exact results, so `log2(8)` becomes
//! `3` while `log2(3)` stays symbolic; any float argument makes the result a
//! float.

use super::coeff::Coefficient;
use super::expr::Expr;

/// Functions with a native meaning in this backend.
pub const NATIVE_FUNCTIONS: &[&str] = &[
    "ceiling", "floor", "log2", "log", "exp", "sqrt", "abs", "max", "min",
];

/// Named constants replaced by `parse_constant`.
pub const NATIVE_CONSTANTS: &[(&str, f64)] = &[("pi", std::f64::consts::PI), ("E", std::f64::consts::E)];

pub fn is_native(name: &str) -> bool {
    NATIVE_FUNCTIONS.contains(&name)
}

/// Try to evaluate `name(args)`; `None` leaves the call symbolic.
pub fn fold(name: &str, args: &[Expr]) -> Option<Expr> {
    if !is_native(name) {
        return None;
    }
    let values: Vec<Coefficient> = args.iter().map(Expr::as_number).collect::<Option<_>>()?;
    let any_float = values.iter().any(Coefficient::is_float);

    let result = match (name, values.as_slice()) {
        ("ceiling", [x]) => x.ceil(),
        ("floor", [x]) => x.floor(),
        ("abs", [x]) => x.abs(),
        ("max", [first, rest @ ..]) => rest.iter().fold(*first, |acc, v| if v.to_f64() > acc.to_f64() { *v } else { acc }),
        ("min", [first, rest @ ..]) => rest.iter().fold(*first, |acc, v| if v.to_f64() < acc.to_f64() { *v } else { acc }),
        ("log2", [x]) => log_exact(*x, 2).or_else(|| float_if(any_float, x.to_f64().log2()))?,
        ("log", [x]) if x.is_one() => Coefficient::ZERO,
        ("log", [x]) => float_if(any_float, x.to_f64().ln())?,
        ("log", [x, base]) => match base.as_integer() {
            Some(b) => log_exact(*x, b).or_else(|| float_if(any_float, x.to_f64().ln() / base.to_f64().ln()))?,
            None => float_if(any_float, x.to_f64().ln() / base.to_f64().ln())?,
        },
        ("exp", [x]) if x.is_zero() && !x.is_float() => Coefficient::ONE,
        ("exp", [x]) => float_if(any_float, x.to_f64().exp())?,
        ("sqrt", [x]) => x.root(1, 2).or_else(|| float_if(any_float, x.to_f64().sqrt()))?,
        _ => return None,
    };
    Some(Expr::Num(result))
}

fn float_if(enabled: bool, value: f64) -> Option<Coefficient> {
    (enabled && value.is_finite()).then(|| Coefficient::float(value))
}

/// Exact `log_base(x)` when `x` is an integral power (possibly negative) of `base`.
fn log_exact(x: Coefficient, base: i128) -> Option<Coefficient> {
    if base < 2 {
        return None;
    }
    let (num, den) = match x {
        Coefficient::Rational(n, d) if n > 0 => (n, d),
        _ => return None,
    };
    let (value, sign) = match (num, den) {
        (n, 1) => (n, 1),
        (1, d) => (d, -1),
        _ => return None,
    };
    let mut power = 0i128;
    let mut rest = value;
    while rest > 1 {
        if rest % base != 0 {
            return None;
        }
        rest /= base;
        power += 1;
    }
    Some(Coefficient::int(sign * power))
}
