//! Conversions between numbers and strings
//!
//! `int(str)`, `float(str)`, `int(float)` and `str(float)` with the exact
//! spellings and error messages Python uses.

use crate::error::{RuntimeError, RuntimeResult};
use crate::strings::is_python_space;

/// Remove underscores that sit between two digits; reject any other underscore.
fn strip_digit_underscores(body: &str) -> Option<String> {
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            let before = i > 0 && chars[i - 1].is_ascii_digit();
            let after = chars.get(i + 1).is_some_and(|next| next.is_ascii_digit());
            if !(before && after) {
                return None;
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// `int(s)` in base 10.
pub fn parse_int(s: &str) -> RuntimeResult<i64> {
    let invalid = || RuntimeError::value_error(format!("invalid literal for int() with base 10: '{}'", s));
    let trimmed = s.trim_matches(is_python_space);
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty() || !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let digits = strip_digit_underscores(digits).ok_or_else(invalid)?;
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let signed = if negative { format!("-{}", digits) } else { digits };
    signed
        .parse::<i64>()
        .map_err(|_| RuntimeError::overflow_error("int too large to convert to int64"))
}

/// `float(s)`
pub fn parse_float(s: &str) -> RuntimeResult<f64> {
    let invalid = || RuntimeError::value_error(format!("could not convert string to float: '{}'", s));
    let trimmed = s.trim_matches(is_python_space);
    let unsigned = trimmed.trim_start_matches(['+', '-']);
    if unsigned.len() + 1 < trimmed.len() {
        return Err(invalid());
    }
    let lowered = unsigned.to_ascii_lowercase();
    let negative = trimmed.starts_with('-');
    let special = match lowered.as_str() {
        "inf" | "infinity" => Some(f64::INFINITY),
        "nan" => Some(f64::NAN),
        _ => None,
    };
    if let Some(value) = special {
        return Ok(if negative { -value } else { value });
    }
    if !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Err(invalid());
    }
    let cleaned = strip_digit_underscores(trimmed).ok_or_else(invalid)?;
    cleaned.parse::<f64>().map_err(|_| invalid())
}

/// `int(x)` for a float: truncation toward zero.
pub fn float_to_int(x: f64) -> RuntimeResult<i64> {
    if x.is_nan() {
        return Err(RuntimeError::value_error("cannot convert float NaN to integer"));
    }
    if x.is_infinite() {
        return Err(RuntimeError::overflow_error(
            "cannot convert float infinity to integer",
        ));
    }
    let truncated = x.trunc();
    // 2^63 is exactly representable; anything at or above it does not fit.
    if truncated >= 9_223_372_036_854_775_808.0 || truncated < -9_223_372_036_854_775_808.0 {
        return Err(RuntimeError::overflow_error("int too large to convert to int64"));
    }
    Ok(truncated as i64)
}

/// `str(x)` / `repr(x)` for a float.
pub fn float_repr(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    // `{:e}` yields the shortest round-tripping digits, e.g. "-1.25e-7".
    let scientific = format!("{:e}", x);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let sign = if negative { "-" } else { "" };

    if (-4..16).contains(&exponent) {
        if exponent >= 0 {
            let split = exponent as usize + 1;
            let (int_part, frac_part) = if digits.len() > split {
                (digits[..split].to_string(), digits[split..].to_string())
            } else {
                (format!("{:0<width$}", digits, width = split), "0".to_string())
            };
            format!("{}{}.{}", sign, int_part, frac_part)
        } else {
            let zeros = "0".repeat((-exponent - 1) as usize);
            format!("{}0.{}{}", sign, zeros, digits)
        }
    } else {
        let mantissa = if digits.len() > 1 {
            format!("{}.{}", &digits[..1], &digits[1..])
        } else {
            digits
        };
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        format!("{}{}e{}{:02}", sign, mantissa, exp_sign, exponent.abs())
    }
}

/// `str(b)` for a bool.
pub fn bool_repr(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(" 42 ").unwrap(), 42);
        assert_eq!(parse_int("-1_000").unwrap(), -1000);
        assert_eq!(parse_int("+7").unwrap(), 7);
        assert_eq!(
            parse_int("abc").unwrap_err().to_string(),
            "ValueError: invalid literal for int() with base 10: 'abc'"
        );
        assert!(parse_int("1__0").is_err());
        assert!(parse_int("").is_err());
        assert!(parse_int("99999999999999999999").is_err());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("1.5").unwrap(), 1.5);
        assert_eq!(parse_float(" -inf").unwrap(), f64::NEG_INFINITY);
        assert!(parse_float("NaN").unwrap().is_nan());
        assert_eq!(parse_float("1_0.5").unwrap(), 10.5);
        assert!(parse_float("--1").is_err());
        assert!(parse_float("x1").is_err());
    }

    #[test]
    fn test_float_to_int() {
        assert_eq!(float_to_int(-3.7).unwrap(), -3);
        assert!(float_to_int(f64::NAN).is_err());
        assert!(float_to_int(f64::INFINITY).is_err());
        assert!(float_to_int(1e19).is_err());
    }

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(-2.5), "-2.5");
        assert_eq!(float_repr(123456.0), "123456.0");
        assert_eq!(float_repr(1e15), "1000000000000000.0");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e16), "1.5e+16");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(1e-5), "1e-05");
        assert_eq!(float_repr(f64::NEG_INFINITY), "-inf");
        assert_eq!(float_repr(-0.0), "-0.0");
    }
}
