use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// 2^53, above which `f64` can no longer represent every integer.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq, Copy)]
pub struct Number(f64);

impl Number {
    /// Creates a new `Number` from an `f64` value.
    pub fn new(value: f64) -> Self {
        Number(value)
    }

    /// Returns the underlying `f64` value.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Returns the underlying `i64` value, truncating any fractional part.
    pub fn to_int(self) -> i64 {
        self.0 as i64
    }

    /// Returns `true` if the number represents an integer value.
    pub fn is_int(&self) -> bool {
        (self.0 - self.0.trunc()).abs() < f64::EPSILON
    }

    /// Returns `true` if the number is zero or very close to zero.
    pub fn is_zero(&self) -> bool {
        self.0.abs() < f64::EPSILON
    }

    pub fn pow(self, exponent: Self) -> Self {
        Number(self.0.powf(exponent.0))
    }

    /// Division rounded towards negative infinity.
    pub fn floor_div(self, other: Self) -> Self {
        Number((self.0 / other.0).floor())
    }

    /// Remainder with the sign of the divisor.
    pub fn modulo(self, other: Self) -> Self {
        let rem = self.0 % other.0;
        if rem != 0.0 && (rem < 0.0) != (other.0 < 0.0) {
            Number(rem + other.0)
        } else {
            Number(rem)
        }
    }
}

impl Default for Number {
    fn default() -> Self {
        Number(0.0)
    }
}

impl Neg for Number {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Number(-self.0)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number(value as f64)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number(value as f64)
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Number(value as f64)
    }
}

impl From<usize> for Number {
    fn from(value: usize) -> Self {
        Number(value as f64)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 && self.0.abs() < MAX_SAFE_INTEGER {
            write!(f, "{}", self.0 as i64)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Add for Number {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Number(self.0 + other.0)
    }
}

impl Sub for Number {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Number(self.0 - other.0)
    }
}

impl Mul for Number {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Number(self.0 * other.0)
    }
}

impl Div for Number {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        Number(self.0 / other.0)
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for Number {}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.is_nan(), other.0.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.0.partial_cmp(&other.0).unwrap_or(Ordering::Less),
        }
    }
}
