//! Numeric coefficients for the native backend.
//!
//! Coefficients are exact rationals whenever possible and fall back to `f64`
//! when an operation overflows or a float enters the computation.

use std::cmp::Ordering;
use std::fmt;

// Over magnitudes, so `i128::MIN` does not overflow.
fn gcd(a: i128, b: i128) -> u128 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Integer n-th root of a non-negative value, if it is exact.
fn exact_root(value: i128, n: u32) -> Option<i128> {
    if value < 0 || n == 0 {
        return None;
    }
    if value < 2 || n == 1 {
        return Some(value);
    }
    let guess = (value as f64).powf(1.0 / n as f64).round() as i128;
    (guess.saturating_sub(1)..=guess.saturating_add(1))
        .filter(|candidate| *candidate >= 0)
        .find(|candidate| candidate.checked_pow(n) == Some(value))
}

/// A numeric coefficient.
#[derive(Debug, Clone, Copy)]
pub enum Coefficient {
    /// Exact rational (numerator, denominator).
    /// Invariant: denominator > 0 and gcd(num, den) == 1.
    Rational(i128, i128),
    /// Floating-point approximation.
    Float(f64),
}

impl Coefficient {
    pub const ZERO: Coefficient = Coefficient::Rational(0, 1);
    pub const ONE: Coefficient = Coefficient::Rational(1, 1);
    pub const MINUS_ONE: Coefficient = Coefficient::Rational(-1, 1);

    pub fn int(n: i128) -> Self {
        Coefficient::Rational(n, 1)
    }

    /// Build a reduced rational. Returns `None` for a zero denominator.
    pub fn rational(num: i128, den: i128) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let (num, den) = if den < 0 {
            (num.checked_neg()?, den.checked_neg()?)
        } else {
            (num, den)
        };
        let g = i128::try_from(gcd(num, den)).ok()?.max(1);
        Some(Coefficient::Rational(num / g, den / g))
    }

    pub fn float(value: f64) -> Self {
        // Collapse -0.0 so equality stays structural.
        Coefficient::Float(if value == 0.0 { 0.0 } else { value })
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Coefficient::Rational(n, _) => *n == 0,
            Coefficient::Float(f) => *f == 0.0,
        }
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Coefficient::Rational(1, 1))
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Coefficient::Rational(n, _) => *n < 0,
            Coefficient::Float(f) => *f < 0.0,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Coefficient::Float(_))
    }

    /// The integer value of an exact integral coefficient.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Coefficient::Rational(n, 1) => Some(*n),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Coefficient::Rational(n, d) => *n as f64 / *d as f64,
            Coefficient::Float(f) => *f,
        }
    }

    /// Convert an integral float back into an exact integer.
    pub fn integral_from_f64(value: f64) -> Option<Self> {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e30 {
            Some(Coefficient::int(value as i128))
        } else {
            None
        }
    }

    pub fn add(self, other: Coefficient) -> Coefficient {
        match (self, other) {
            (Coefficient::Rational(a, b), Coefficient::Rational(c, d)) => {
                let exact = a
                    .checked_mul(d)
                    .zip(c.checked_mul(b))
                    .and_then(|(x, y)| x.checked_add(y))
                    .zip(b.checked_mul(d))
                    .and_then(|(num, den)| Coefficient::rational(num, den));
                exact.unwrap_or_else(|| Coefficient::float(self.to_f64() + other.to_f64()))
            }
            _ => Coefficient::float(self.to_f64() + other.to_f64()),
        }
    }

    pub fn mul(self, other: Coefficient) -> Coefficient {
        match (self, other) {
            (Coefficient::Rational(a, b), Coefficient::Rational(c, d)) => {
                let exact = a
                    .checked_mul(c)
                    .zip(b.checked_mul(d))
                    .and_then(|(num, den)| Coefficient::rational(num, den));
                exact.unwrap_or_else(|| Coefficient::float(self.to_f64() * other.to_f64()))
            }
            _ => Coefficient::float(self.to_f64() * other.to_f64()),
        }
    }

    pub fn neg(self) -> Coefficient {
        self.mul(Coefficient::MINUS_ONE)
    }

    pub fn abs(self) -> Coefficient {
        if self.is_negative() {
            self.neg()
        } else {
            self
        }
    }

    /// Reciprocal; `None` for zero.
    pub fn recip(self) -> Option<Coefficient> {
        match self {
            Coefficient::Rational(n, d) => Coefficient::rational(d, n),
            Coefficient::Float(f) if f != 0.0 => Some(Coefficient::float(1.0 / f)),
            Coefficient::Float(_) => None,
        }
    }

    /// Integer power; `None` when raising zero to a negative power.
    pub fn pow_int(self, exp: i128) -> Option<Coefficient> {
        if exp < 0 {
            return self.recip()?.pow_int(exp.checked_neg()?);
        }
        match self {
            Coefficient::Rational(n, d) => {
                let exact = u32::try_from(exp).ok().and_then(|e| {
                    n.checked_pow(e)
                        .zip(d.checked_pow(e))
                        .and_then(|(num, den)| Coefficient::rational(num, den))
                });
                Some(exact.unwrap_or_else(|| Coefficient::float(self.to_f64().powf(exp as f64))))
            }
            Coefficient::Float(f) => Some(Coefficient::float(f.powf(exp as f64))),
        }
    }

    /// Exact rational power `self^(p/q)`; `None` when the result is irrational.
    pub fn root(self, p: i128, q: i128) -> Option<Coefficient> {
        let (n, d) = match self {
            Coefficient::Rational(n, d) if n >= 0 => (n, d),
            _ => return None,
        };
        let q = u32::try_from(q).ok()?;
        let base = Coefficient::rational(exact_root(n, q)?, exact_root(d, q)?)?;
        base.pow_int(p)
    }

    pub fn floor(self) -> Coefficient {
        match self {
            Coefficient::Rational(n, d) => Coefficient::int(n.div_euclid(d)),
            Coefficient::Float(f) => {
                Coefficient::integral_from_f64(f.floor()).unwrap_or(Coefficient::float(f.floor()))
            }
        }
    }

    pub fn ceil(self) -> Coefficient {
        match self {
            Coefficient::Rational(n, d) => {
                let q = n.div_euclid(d);
                Coefficient::int(if n.rem_euclid(d) == 0 { q } else { q + 1 })
            }
            Coefficient::Float(f) => {
                Coefficient::integral_from_f64(f.ceil()).unwrap_or(Coefficient::float(f.ceil()))
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Coefficient::Rational(..) => 0,
            Coefficient::Float(_) => 1,
        }
    }
}

impl PartialEq for Coefficient {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Coefficient {}

impl PartialOrd for Coefficient {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coefficient {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Coefficient::Rational(a, b), Coefficient::Rational(c, d)) => {
                match a.checked_mul(*d).zip(c.checked_mul(*b)) {
                    Some((lhs, rhs)) => lhs.cmp(&rhs),
                    None => self
                        .to_f64()
                        .total_cmp(&other.to_f64())
                        .then_with(|| (a, b).cmp(&(c, d))),
                }
            }
            (Coefficient::Float(x), Coefficient::Float(y)) => x.total_cmp(y),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl std::hash::Hash for Coefficient {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Coefficient::Rational(n, d) => {
                0u8.hash(state);
                n.hash(state);
                d.hash(state);
            }
            Coefficient::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coefficient::Rational(n, 1) => write!(f, "{}", n),
            Coefficient::Rational(n, d) => write!(f, "{}/{}", n, d),
            // Debug formatting keeps the decimal point so the text re-parses as a float.
            Coefficient::Float(x) => write!(f, "{:?}", x),
        }
    }
}
