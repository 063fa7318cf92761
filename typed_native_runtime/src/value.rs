//! Dynamic value type
//!
//! `Value` is what a handle of the universal `object` type points at, and
//! the currency of the call boundary when an untyped caller passes
//! arguments or receives results.

use std::fmt;

use crate::convert::{bool_repr, float_repr, float_to_int, parse_float, parse_int};
use crate::error::{RuntimeError, RuntimeResult};
use crate::strings;

/// Dynamic value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Value>),
    List(Vec<Value>),
}

impl Value {
    /// Python class name of the value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// `bool(v)`
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(items) | Value::List(items) => !items.is_empty(),
        }
    }

    /// `int(v)`
    pub fn to_int(&self) -> RuntimeResult<i64> {
        match self {
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Int(i) => Ok(*i),
            Value::Float(f) => float_to_int(*f),
            Value::Str(s) => parse_int(s),
            other => Err(RuntimeError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        }
    }

    /// `float(v)`
    pub fn to_float(&self) -> RuntimeResult<f64> {
        match self {
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Str(s) => parse_float(s),
            other => Err(RuntimeError::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        }
    }

    /// `len(v)`
    pub fn len(&self) -> RuntimeResult<i64> {
        match self {
            Value::Str(s) => Ok(strings::char_len(s)),
            Value::Tuple(items) | Value::List(items) => Ok(items.len() as i64),
            other => Err(RuntimeError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        }
    }

    /// `repr(v)`
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_str(&item.repr())?;
    }
    Ok(())
}

/// `str(v)`
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(b) => f.write_str(bool_repr(*b)),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => f.write_str(&float_repr(*x)),
            Value::Str(s) => f.write_str(s),
            Value::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_python_str() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(
            Value::Tuple(vec![Value::Int(1), Value::from("a")]).to_string(),
            "(1, 'a')"
        );
        assert_eq!(Value::Tuple(vec![Value::None]).to_string(), "(None,)");
        assert_eq!(Value::List(vec![]).to_string(), "[]");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from("12").to_int().unwrap(), 12);
        assert_eq!(Value::Float(-2.9).to_int().unwrap(), -2);
        assert!(Value::None.to_int().is_err());
        assert_eq!(Value::Bool(true).to_float().unwrap(), 1.0);
        assert!(!Value::from("").truthy());
        assert_eq!(Value::from("héllo").len().unwrap(), 5);
    }
}
