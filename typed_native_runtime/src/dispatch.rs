//! Dynamic dispatch for the `object` type
//!
//! When a variable's static type widens to `object`, generated code hands
//! both operands to these functions, which apply Python's rules on the
//! runtime types.

use std::cmp::Ordering;

use crate::error::{RuntimeError, RuntimeResult};
use crate::intrinsics;
use crate::strings;
use crate::value::Value;

/// Binary operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
}

impl BinOp {
    pub const ALL: [BinOp; 20] = [
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::Div,
        BinOp::FloorDiv,
        BinOp::Mod,
        BinOp::Pow,
        BinOp::LShift,
        BinOp::RShift,
        BinOp::BitAnd,
        BinOp::BitOr,
        BinOp::BitXor,
        BinOp::Eq,
        BinOp::NotEq,
        BinOp::Lt,
        BinOp::LtE,
        BinOp::Gt,
        BinOp::GtE,
        BinOp::In,
        BinOp::NotIn,
    ];

    /// Get the Python operator string
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtE => "<=",
            BinOp::Gt => ">",
            BinOp::GtE => ">=",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
        }
    }

    /// Stable numeric code passed through the native call boundary.
    pub fn code(&self) -> i64 {
        Self::ALL.iter().position(|op| op == self).unwrap_or(0) as i64
    }

    pub fn from_code(code: i64) -> Option<BinOp> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::LtE | BinOp::Gt | BinOp::GtE
        )
    }
}

/// Unary operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 4] = [UnaryOp::Neg, UnaryOp::Pos, UnaryOp::Invert, UnaryOp::Not];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Invert => "~",
            UnaryOp::Not => "not",
        }
    }

    pub fn code(&self) -> i64 {
        Self::ALL.iter().position(|op| op == self).unwrap_or(0) as i64
    }

    pub fn from_code(code: i64) -> Option<UnaryOp> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i).copied())
    }
}

/// Numeric view of a value: bools participate in arithmetic as ints.
enum Num {
    Int(i64),
    Float(f64),
}

fn as_num(v: &Value) -> Option<Num> {
    match v {
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn unsupported(op: BinOp, lhs: &Value, rhs: &Value) -> RuntimeError {
    if op.is_comparison() {
        RuntimeError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.as_str(),
            lhs.type_name(),
            rhs.type_name()
        ))
    } else {
        RuntimeError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.as_str(),
            lhs.type_name(),
            rhs.type_name()
        ))
    }
}

/// Perform dynamic binary operation
///
/// Dispatches based on the runtime types of the operands.
pub fn dynamic_binop(op: BinOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    match op {
        BinOp::Eq => Ok(Value::Bool(dynamic_eq(lhs, rhs))),
        BinOp::NotEq => Ok(Value::Bool(!dynamic_eq(lhs, rhs))),
        BinOp::Lt | BinOp::LtE | BinOp::Gt | BinOp::GtE => {
            let ordering = dynamic_cmp(lhs, rhs).ok_or_else(|| unsupported(op, lhs, rhs))?;
            Ok(Value::Bool(match op {
                BinOp::Lt => ordering == Ordering::Less,
                BinOp::LtE => ordering != Ordering::Greater,
                BinOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinOp::In => dynamic_contains(rhs, lhs).map(Value::Bool),
        BinOp::NotIn => dynamic_contains(rhs, lhs).map(|found| Value::Bool(!found)),
        _ => match (as_num(lhs), as_num(rhs)) {
            (Some(a), Some(b)) => numeric_binop(op, a, b).ok_or_else(|| unsupported(op, lhs, rhs))?,
            _ => sequence_binop(op, lhs, rhs),
        },
    }
}

fn numeric_binop(op: BinOp, a: Num, b: Num) -> Option<RuntimeResult<Value>> {
    let result = match (a, b) {
        (Num::Int(a), Num::Int(b)) => match op {
            BinOp::Add => Ok(Value::Int(a.wrapping_add(b))),
            BinOp::Sub => Ok(Value::Int(a.wrapping_sub(b))),
            BinOp::Mul => Ok(Value::Int(a.wrapping_mul(b))),
            BinOp::Div => float_binop(op, a as f64, b as f64),
            BinOp::FloorDiv => intrinsics::int_floordiv(a, b).map(Value::Int),
            BinOp::Mod => intrinsics::int_mod(a, b).map(Value::Int),
            BinOp::Pow if b < 0 => float_binop(op, a as f64, b as f64),
            BinOp::Pow => intrinsics::int_pow(a, b).map(Value::Int),
            BinOp::LShift => intrinsics::int_lshift(a, b).map(Value::Int),
            BinOp::RShift => intrinsics::int_rshift(a, b).map(Value::Int),
            BinOp::BitAnd => Ok(Value::Int(a & b)),
            BinOp::BitOr => Ok(Value::Int(a | b)),
            BinOp::BitXor => Ok(Value::Int(a ^ b)),
            _ => return None,
        },
        (a, b) => {
            let a = match a {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            let b = match b {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            match op {
                BinOp::LShift | BinOp::RShift | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
                    return None
                }
                _ => float_binop(op, a, b),
            }
        }
    };
    Some(result)
}

fn float_binop(op: BinOp, a: f64, b: f64) -> RuntimeResult<Value> {
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(RuntimeError::zero_division("float division by zero"));
            }
            a / b
        }
        BinOp::FloorDiv => intrinsics::float_floordiv(a, b)?,
        BinOp::Mod => intrinsics::float_mod(a, b)?,
        BinOp::Pow => intrinsics::float_pow(a, b)?,
        _ => return Err(RuntimeError::internal(format!("'{}' is not a float operator", op.as_str()))),
    };
    Ok(Value::Float(value))
}

fn sequence_binop(op: BinOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    match (op, lhs, rhs) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            Ok(Value::Str(strings::repeat(s, *n)?))
        }
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::Tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => Err(unsupported(op, lhs, rhs)),
    }
}

/// `lhs == rhs`
pub fn dynamic_eq(lhs: &Value, rhs: &Value) -> bool {
    match (as_num(lhs), as_num(rhs)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
        (Some(a), Some(b)) => {
            let to_f = |n: Num| match n {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            to_f(a) == to_f(b)
        }
        _ => match (lhs, rhs) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) | (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| dynamic_eq(x, y))
            }
            _ => false,
        },
    }
}

/// Ordering of two values, or `None` when Python would raise `TypeError`.
pub fn dynamic_cmp(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (as_num(lhs), as_num(rhs)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => Some(a.cmp(&b)),
        (Some(a), Some(b)) => {
            let to_f = |n: Num| match n {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            to_f(a).partial_cmp(&to_f(b))
        }
        _ => match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Tuple(a), Value::Tuple(b)) | (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !dynamic_eq(x, y) {
                        return dynamic_cmp(x, y);
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        },
    }
}

/// `item in container`
pub fn dynamic_contains(container: &Value, item: &Value) -> RuntimeResult<bool> {
    match (container, item) {
        (Value::Str(s), Value::Str(sub)) => Ok(strings::contains(s, sub)),
        (Value::Str(_), other) => Err(RuntimeError::type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::Tuple(items), _) | (Value::List(items), _) => {
            Ok(items.iter().any(|candidate| dynamic_eq(candidate, item)))
        }
        (other, _) => Err(RuntimeError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// Perform dynamic unary operation
pub fn dynamic_unaryop(op: UnaryOp, operand: &Value) -> RuntimeResult<Value> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.truthy())),
        (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(*b))),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Value::Int(i)) => Ok(Value::Int(*i)),
        (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        (UnaryOp::Pos, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOp::Invert, Value::Int(i)) => Ok(Value::Int(!i)),
        (UnaryOp::Invert, Value::Bool(b)) => Ok(Value::Int(!i64::from(*b))),
        (op, v) => Err(RuntimeError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            op.as_str(),
            v.type_name()
        ))),
    }
}

/// `container[index]`
pub fn dynamic_getitem(container: &Value, index: &Value) -> RuntimeResult<Value> {
    let position = match index {
        Value::Int(i) => *i,
        Value::Bool(b) => i64::from(*b),
        other => {
            return Err(RuntimeError::type_error(format!(
                "{} indices must be integers, not {}",
                container.type_name(),
                other.type_name()
            )))
        }
    };
    match container {
        Value::Str(s) => strings::getitem(s, position).map(Value::Str),
        Value::Tuple(items) | Value::List(items) => {
            let len = items.len() as i64;
            let resolved = if position < 0 { position + len } else { position };
            usize::try_from(resolved)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| {
                    RuntimeError::index_error(format!("{} index out of range", container.type_name()))
                })
        }
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(
            dynamic_binop(BinOp::Add, &Value::Int(1), &Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            dynamic_binop(BinOp::Add, &Value::Bool(true), &Value::Int(1)).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            dynamic_binop(BinOp::Div, &Value::Int(1), &Value::Int(2)).unwrap(),
            Value::Float(0.5)
        );
        assert_eq!(
            dynamic_binop(BinOp::Pow, &Value::Int(2), &Value::Int(-1)).unwrap(),
            Value::Float(0.5)
        );
    }

    #[test]
    fn test_errors() {
        let err = dynamic_binop(BinOp::Add, &Value::Int(1), &Value::from("a")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: unsupported operand type(s) for +: 'int' and 'str'"
        );
        let err = dynamic_binop(BinOp::Lt, &Value::Int(1), &Value::from("a")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: '<' not supported between instances of 'int' and 'str'"
        );
        assert!(dynamic_binop(BinOp::FloorDiv, &Value::Int(1), &Value::Int(0)).is_err());
    }

    #[test]
    fn test_equality_and_containment() {
        assert!(dynamic_eq(&Value::Int(1), &Value::Float(1.0)));
        assert!(!dynamic_eq(&Value::Int(1), &Value::from("1")));
        assert_eq!(
            dynamic_binop(BinOp::In, &Value::from("b"), &Value::from("abc")).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            dynamic_getitem(&Value::from("abc"), &Value::Int(-1)).unwrap(),
            Value::from("c")
        );
    }

    #[test]
    fn test_op_codes() {
        for op in BinOp::ALL {
            assert_eq!(BinOp::from_code(op.code()), Some(op));
        }
        assert_eq!(UnaryOp::from_code(UnaryOp::Not.code()), Some(UnaryOp::Not));
        assert_eq!(BinOp::from_code(-1), None);
    }
}
