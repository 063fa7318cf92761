//! Intrinsic functions for compiled code
//!
//! Numeric helpers that generated code calls by name: float math, Python
//! integer floor semantics, checked factorial, and exact float summation.

use num_integer::Integer;

use crate::error::{RuntimeError, RuntimeResult};

// ========== Float math ==========

/// Unary float functions exposed by the `math` module, by extern name.
///
/// Argument validation (domain errors) is emitted by the compiler before the
/// call, so these are plain IEEE functions.
pub const UNARY_FLOAT_FUNCTIONS: &[(&str, fn(f64) -> f64)] = &[
    ("sqrt64", f64::sqrt),
    ("exp64", f64::exp),
    ("expm1_64", f64::exp_m1),
    ("log64", f64::ln),
    ("log2_64", f64::log2),
    ("log10_64", f64::log10),
    ("log1p64", f64::ln_1p),
    ("sin64", f64::sin),
    ("cos64", f64::cos),
    ("tan64", f64::tan),
    ("asin64", f64::asin),
    ("acos64", f64::acos),
    ("atan64", f64::atan),
    ("sinh64", f64::sinh),
    ("cosh64", f64::cosh),
    ("tanh64", f64::tanh),
    ("asinh64", f64::asinh),
    ("acosh64", f64::acosh),
    ("atanh64", f64::atanh),
    ("fabs64", f64::abs),
    ("floor64", f64::floor),
    ("ceil64", f64::ceil),
    ("trunc64", f64::trunc),
    ("degrees64", f64::to_degrees),
    ("radians64", f64::to_radians),
];

/// Binary float functions exposed by the `math` module, by extern name.
pub const BINARY_FLOAT_FUNCTIONS: &[(&str, fn(f64, f64) -> f64)] = &[
    ("atan2_64", f64::atan2),
    ("copysign64", f64::copysign),
    ("hypot64", f64::hypot),
    ("pow64", f64::powf),
];

/// Look up a unary float intrinsic.
pub fn unary_float_function(name: &str) -> Option<fn(f64) -> f64> {
    UNARY_FLOAT_FUNCTIONS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, f)| *f)
}

/// Look up a binary float intrinsic.
pub fn binary_float_function(name: &str) -> Option<fn(f64, f64) -> f64> {
    BINARY_FLOAT_FUNCTIONS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, f)| *f)
}

/// `math.sqrt` with its domain check.
pub fn sqrt_checked(x: f64) -> RuntimeResult<f64> {
    if x < 0.0 {
        Err(RuntimeError::domain_error())
    } else {
        Ok(x.sqrt())
    }
}

/// `math.pow(x, y)`
pub fn math_pow(x: f64, y: f64) -> RuntimeResult<f64> {
    if x == 0.0 && y < 0.0 {
        return Err(RuntimeError::domain_error());
    }
    if x < 0.0 && y.is_finite() && y.fract() != 0.0 {
        return Err(RuntimeError::domain_error());
    }
    let result = x.powf(y);
    if result.is_infinite() && x.is_finite() && y.is_finite() {
        return Err(RuntimeError::range_error());
    }
    Ok(result)
}

// ========== Python operator semantics ==========

/// `a // b` on ints.
pub fn int_floordiv(a: i64, b: i64) -> RuntimeResult<i64> {
    if b == 0 {
        return Err(RuntimeError::zero_division("integer division or modulo by zero"));
    }
    if a == i64::MIN && b == -1 {
        return Ok(i64::MIN);
    }
    Ok(Integer::div_floor(&a, &b))
}

/// `a % b` on ints; the result takes the sign of `b`.
pub fn int_mod(a: i64, b: i64) -> RuntimeResult<i64> {
    if b == 0 {
        return Err(RuntimeError::zero_division("integer division or modulo by zero"));
    }
    if b == -1 {
        return Ok(0);
    }
    Ok(Integer::mod_floor(&a, &b))
}

/// `a ** b` on ints with a non-negative exponent, wrapping like the other int operators.
pub fn int_pow(base: i64, exponent: i64) -> RuntimeResult<i64> {
    if exponent < 0 {
        return Err(RuntimeError::value_error(
            "integer power with a negative exponent must be computed in float",
        ));
    }
    let mut result: i64 = 1;
    let mut base = base;
    let mut exponent = exponent as u64;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exponent >>= 1;
    }
    Ok(result)
}

fn float_divmod(a: f64, b: f64) -> (f64, f64) {
    let mut modulo = a % b;
    let mut div = (a - modulo) / b;
    if modulo != 0.0 {
        if (b < 0.0) != (modulo < 0.0) {
            modulo += b;
            div -= 1.0;
        }
    } else {
        modulo = 0.0f64.copysign(b);
    }
    let floordiv = if div != 0.0 {
        let floored = div.floor();
        if div - floored > 0.5 {
            floored + 1.0
        } else {
            floored
        }
    } else {
        0.0f64.copysign(a / b)
    };
    (floordiv, modulo)
}

/// `a // b` on floats.
pub fn float_floordiv(a: f64, b: f64) -> RuntimeResult<f64> {
    if b == 0.0 {
        return Err(RuntimeError::zero_division("float floor division by zero"));
    }
    Ok(float_divmod(a, b).0)
}

/// `a % b` on floats.
pub fn float_mod(a: f64, b: f64) -> RuntimeResult<f64> {
    if b == 0.0 {
        return Err(RuntimeError::zero_division("float modulo"));
    }
    Ok(float_divmod(a, b).1)
}

/// `a ** b` on floats.
pub fn float_pow(a: f64, b: f64) -> RuntimeResult<f64> {
    if a == 0.0 && b < 0.0 {
        return Err(RuntimeError::zero_division(
            "0.0 cannot be raised to a negative power",
        ));
    }
    if a < 0.0 && b.is_finite() && b.fract() != 0.0 {
        return Err(RuntimeError::value_error(
            "negative number cannot be raised to a fractional power",
        ));
    }
    Ok(a.powf(b))
}

/// `a << b`
pub fn int_lshift(a: i64, b: i64) -> RuntimeResult<i64> {
    if b < 0 {
        return Err(RuntimeError::value_error("negative shift count"));
    }
    Ok(if b >= 64 { 0 } else { a.wrapping_shl(b as u32) })
}

/// `a >> b`, arithmetic.
pub fn int_rshift(a: i64, b: i64) -> RuntimeResult<i64> {
    if b < 0 {
        return Err(RuntimeError::value_error("negative shift count"));
    }
    Ok(if b >= 64 {
        if a < 0 {
            -1
        } else {
            0
        }
    } else {
        a >> b
    })
}

// ========== Integer math ==========

/// `math.factorial(n)`
pub fn factorial(n: i64) -> RuntimeResult<i64> {
    if n < 0 {
        return Err(RuntimeError::value_error(
            "factorial() not defined for negative values",
        ));
    }
    (2..=n).try_fold(1i64, |acc, k| {
        acc.checked_mul(k)
            .ok_or_else(|| RuntimeError::overflow_error("factorial() result does not fit in int64"))
    })
}

/// `math.gcd(a, b)`
pub fn gcd(a: i64, b: i64) -> i64 {
    a.gcd(&b)
}

// ========== Ranges ==========

/// Element count of `range(start, stop, step)`, computed without overflow.
/// `step` must be nonzero.
fn range_elements(start: i64, stop: i64, step: i64) -> i128 {
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    if step > 0 && start < stop {
        (stop - start - 1) / step + 1
    } else if step < 0 && start > stop {
        (start - stop - 1) / -step + 1
    } else {
        0
    }
}

/// `len(range(start, stop, step))`
pub fn range_len(start: i64, stop: i64, step: i64) -> RuntimeResult<i64> {
    i64::try_from(range_elements(start, stop, step))
        .map_err(|_| RuntimeError::overflow_error("Python int too large to convert to C ssize_t"))
}

/// Items left to produce when iterating a range, saturating at `i64::MAX`.
pub fn range_count(start: i64, stop: i64, step: i64) -> i64 {
    i64::try_from(range_elements(start, stop, step)).unwrap_or(i64::MAX)
}

// ========== Exact summation ==========

/// Running state of `math.fsum`.
///
/// Shewchuk's algorithm: the sum is kept as a list of non-overlapping
/// partials so the final rounding happens exactly once. The result does not
/// depend on the platform's floating-point extended precision.
#[derive(Debug, Clone, Default)]
pub struct FSum {
    partials: Vec<f64>,
    special_sum: f64,
    inf_sum: f64,
}

impl FSum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one term.
    pub fn add(&mut self, value: f64) -> RuntimeResult<()> {
        let original = value;
        let mut x = value;
        let mut kept = 0;
        for j in 0..self.partials.len() {
            let mut y = self.partials[j];
            if x.abs() < y.abs() {
                std::mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            let lo = y - (hi - x);
            if lo != 0.0 {
                self.partials[kept] = lo;
                kept += 1;
            }
            x = hi;
        }
        self.partials.truncate(kept);

        if x != 0.0 {
            if !x.is_finite() {
                if original.is_finite() {
                    return Err(RuntimeError::overflow_error("intermediate overflow in fsum"));
                }
                if original.is_infinite() {
                    self.inf_sum += original;
                }
                self.special_sum += original;
                self.partials.clear();
            } else {
                self.partials.push(x);
            }
        }
        Ok(())
    }

    /// The correctly rounded sum of every term added so far.
    pub fn total(&self) -> RuntimeResult<f64> {
        if self.special_sum != 0.0 || self.special_sum.is_nan() {
            if self.inf_sum.is_nan() {
                return Err(RuntimeError::value_error("-inf + inf in fsum"));
            }
            return Ok(self.special_sum);
        }

        let mut n = self.partials.len();
        if n == 0 {
            return Ok(0.0);
        }
        n -= 1;
        let mut hi = self.partials[n];
        let mut lo = 0.0;
        while n > 0 {
            let x = hi;
            n -= 1;
            let y = self.partials[n];
            hi = x + y;
            let y_rounded = hi - x;
            lo = y - y_rounded;
            if lo != 0.0 {
                break;
            }
        }
        if n > 0 && ((lo < 0.0 && self.partials[n - 1] < 0.0) || (lo > 0.0 && self.partials[n - 1] > 0.0)) {
            let y = lo * 2.0;
            let x = hi + y;
            let y_rounded = x - hi;
            if y == y_rounded {
                hi = x;
            }
        }
        Ok(hi)
    }
}

/// Sum a slice exactly.
pub fn fsum(values: &[f64]) -> RuntimeResult<f64> {
    let mut acc = FSum::new();
    for &value in values {
        acc.add(value)?;
    }
    acc.total()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_lengths() {
        assert_eq!(range_len(5, 10, 2).unwrap(), 3);
        assert_eq!(range_len(10, 5, -2).unwrap(), 3);
        assert_eq!(range_len(5, 5, 1).unwrap(), 0);
        assert_eq!(range_len(i64::MIN, i64::MAX, i64::MAX).unwrap(), 3);
        let err = range_len(i64::MIN, i64::MAX, 1).unwrap_err();
        assert_eq!(err.kind(), crate::error::ExceptionKind::OverflowError);
        assert_eq!(range_count(i64::MIN, i64::MAX, 1), i64::MAX);
    }

    #[test]
    fn test_function_tables() {
        let sqrt = unary_float_function("sqrt64").unwrap();
        assert_eq!(sqrt(9.0), 3.0);
        let hypot = binary_float_function("hypot64").unwrap();
        assert_eq!(hypot(3.0, 4.0), 5.0);
        assert!(unary_float_function("nope").is_none());
    }

    #[test]
    fn test_domain_checks() {
        assert_eq!(sqrt_checked(-1.0), Err(RuntimeError::domain_error()));
        assert!(sqrt_checked(f64::NAN).unwrap().is_nan());
        assert_eq!(math_pow(0.0, -1.0), Err(RuntimeError::domain_error()));
        assert_eq!(math_pow(10.0, 400.0), Err(RuntimeError::range_error()));
    }

    #[test]
    fn test_floor_semantics() {
        assert_eq!(int_floordiv(-7, 2).unwrap(), -4);
        assert_eq!(int_mod(-7, 2).unwrap(), 1);
        assert_eq!(int_mod(7, -2).unwrap(), -1);
        assert!(int_floordiv(1, 0).is_err());
        assert_eq!(float_floordiv(-7.0, 2.0).unwrap(), -4.0);
        assert_eq!(float_mod(-1.0, 3.0).unwrap(), 2.0);
        assert!(float_mod(1.0, 0.0).is_err());
    }

    #[test]
    fn test_pow_and_shift() {
        assert_eq!(int_pow(3, 4).unwrap(), 81);
        assert_eq!(int_pow(2, 0).unwrap(), 1);
        assert!(float_pow(0.0, -2.0).is_err());
        assert!(float_pow(-8.0, 0.5).is_err());
        assert_eq!(float_pow(-2.0, 2.0).unwrap(), 4.0);
        assert_eq!(int_lshift(1, 4).unwrap(), 16);
        assert_eq!(int_rshift(-16, 2).unwrap(), -4);
        assert!(int_lshift(1, -1).is_err());
    }

    #[test]
    fn test_factorial_and_gcd() {
        assert_eq!(factorial(0).unwrap(), 1);
        assert_eq!(factorial(5).unwrap(), 120);
        assert_eq!(
            factorial(-1).unwrap_err().to_string(),
            "ValueError: factorial() not defined for negative values"
        );
        assert!(factorial(21).is_err());
        assert_eq!(gcd(12, -18), 6);
    }

    #[test]
    fn test_fsum_is_exact() {
        assert_eq!(fsum(&[0.1; 10]).unwrap(), 1.0);
        assert_eq!(fsum(&[1e100, 1.0, -1e100, 1e-100, 1e50, -1.0, -1e50]).unwrap(), 1e-100);
        assert_eq!(fsum(&[]).unwrap(), 0.0);
        assert_eq!(fsum(&[f64::INFINITY, 1.0]).unwrap(), f64::INFINITY);
        assert!(fsum(&[f64::INFINITY, f64::NEG_INFINITY]).is_err());
        assert!(fsum(&[1.7e308, 1.7e308]).is_err());
    }
}
