//! `bool`, `int` and `float`
//!
//! The three arithmetic types share one wrapper. Operands of different
//! arithmetic types are promoted the way Python does (`bool` to `int` to
//! `float`). Operations that can raise go through the runtime library and
//! are evaluated exactly once at the point they appear.

use typed_native_runtime::{dynamic_binop, dynamic_unaryop, BinOp, ExceptionKind, UnaryOp, Value};

use super::{cannot_convert, unsupported_bin_op, Wrapper, WrapperRef};
use crate::convert::ExpressionContext;
use crate::native::{NativeBinaryOp, NativeExpr, NativeType, NativeUnaryOp};
use crate::runtime_functions as rt;
use crate::typed_value::{ConvertResult, TypedValue};
use crate::types::TypeKey;

#[derive(Debug)]
pub struct ArithmeticWrapper {
    key: TypeKey,
}

impl ArithmeticWrapper {
    pub fn new(key: TypeKey) -> Self {
        debug_assert!(key.is_arithmetic());
        Self { key }
    }
}

fn as_int(value: &TypedValue) -> NativeExpr {
    match value.key() {
        TypeKey::Int => value.nonref_expr(),
        _ => value.nonref_expr().cast(NativeType::int64()),
    }
}

fn as_float(value: &TypedValue) -> NativeExpr {
    match value.key() {
        TypeKey::Float => value.nonref_expr(),
        _ => value.nonref_expr().cast(NativeType::float64()),
    }
}

fn comparison(op: BinOp) -> Option<NativeBinaryOp> {
    Some(match op {
        BinOp::Eq => NativeBinaryOp::Eq,
        BinOp::NotEq => NativeBinaryOp::NotEq,
        BinOp::Lt => NativeBinaryOp::Lt,
        BinOp::LtE => NativeBinaryOp::LtE,
        BinOp::Gt => NativeBinaryOp::Gt,
        BinOp::GtE => NativeBinaryOp::GtE,
        _ => return None,
    })
}

fn is_bitwise(op: BinOp) -> bool {
    matches!(op, BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor)
}

/// Fold an operation on two constants. Operations that would raise are
/// left for run time.
fn fold(ctx: &mut ExpressionContext<'_, '_>, left: &TypedValue, op: BinOp, right: &TypedValue) -> Option<TypedValue> {
    if !ctx.constant_folding() {
        return None;
    }
    let (Some(a), Some(b)) = (&left.constant, &right.constant) else {
        return None;
    };
    let result = dynamic_binop(op, a, b).ok()?;
    let result = match (left.key(), right.key(), result) {
        // `True & False` stays a bool
        (TypeKey::Bool, TypeKey::Bool, Value::Int(i)) if is_bitwise(op) => Value::Bool(i != 0),
        (_, _, result) => result,
    };
    match result {
        Value::Bool(b) => Some(ctx.constant_bool(b)),
        Value::Int(i) => Some(ctx.constant_int(i)),
        Value::Float(f) => Some(ctx.constant_float(f)),
        _ => None,
    }
}

fn both_int_like(left: &TypedValue, right: &TypedValue) -> bool {
    left.key() != &TypeKey::Float && right.key() != &TypeKey::Float
}

/// Evaluate a call that can raise now, into a temporary.
fn checked(ctx: &mut ExpressionContext<'_, '_>, key: &TypeKey, call: NativeExpr) -> ConvertResult {
    let wrapper = ctx.wrapper(key);
    Ok(Some(ctx.push_pod(&wrapper, call)))
}

fn arithmetic_bin_op(
    ctx: &mut ExpressionContext<'_, '_>,
    left: &TypedValue,
    op: BinOp,
    right: &TypedValue,
) -> ConvertResult {
    if let Some(folded) = fold(ctx, left, op, right) {
        return Ok(Some(folded));
    }
    let ints = both_int_like(left, right);

    if let Some(cmp) = comparison(op) {
        let expr = if ints {
            as_int(left).binop(cmp, as_int(right))
        } else {
            as_float(left).binop(cmp, as_float(right))
        };
        return Ok(Some(ctx.bool_value(expr)));
    }

    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul => {
            let native = match op {
                BinOp::Add => NativeBinaryOp::Add,
                BinOp::Sub => NativeBinaryOp::Sub,
                _ => NativeBinaryOp::Mul,
            };
            if ints {
                Ok(Some(ctx.int_value(as_int(left).binop(native, as_int(right)))))
            } else {
                Ok(Some(ctx.float_value(as_float(left).binop(native, as_float(right)))))
            }
        }
        BinOp::Div => {
            let divisor = as_float(right);
            let nonzero = right.constant.as_ref().is_some_and(Value::truthy);
            if !nonzero {
                let message = if ints {
                    "division by zero"
                } else {
                    "float division by zero"
                };
                ctx.raise_if(
                    divisor.clone().eq(NativeExpr::float(0.0)),
                    ExceptionKind::ZeroDivisionError,
                    message,
                );
            }
            let quotient = as_float(left).binop(NativeBinaryOp::Div, divisor);
            Ok(Some(ctx.float_value(quotient)))
        }
        BinOp::FloorDiv | BinOp::Mod => {
            let name = if op == BinOp::FloorDiv { "floordiv" } else { "mod" };
            if ints {
                let call = rt::int64_binary(&format!("int64_{}", name)).call(vec![as_int(left), as_int(right)]);
                checked(ctx, &TypeKey::Int, call)
            } else {
                let call =
                    rt::float64_binary(&format!("float64_{}", name)).call(vec![as_float(left), as_float(right)]);
                checked(ctx, &TypeKey::Float, call)
            }
        }
        BinOp::Pow => {
            let negative_exponent = right.constant_int().is_some_and(|e| e < 0);
            if ints && !negative_exponent {
                let call = rt::int64_binary("int64_pow").call(vec![as_int(left), as_int(right)]);
                checked(ctx, &TypeKey::Int, call)
            } else {
                let call = rt::float64_binary("float64_pow").call(vec![as_float(left), as_float(right)]);
                checked(ctx, &TypeKey::Float, call)
            }
        }
        BinOp::LShift | BinOp::RShift if ints => {
            let name = if op == BinOp::LShift {
                "int64_lshift"
            } else {
                "int64_rshift"
            };
            let call = rt::int64_binary(name).call(vec![as_int(left), as_int(right)]);
            checked(ctx, &TypeKey::Int, call)
        }
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor if ints => {
            let native = match op {
                BinOp::BitAnd => NativeBinaryOp::BitAnd,
                BinOp::BitOr => NativeBinaryOp::BitOr,
                _ => NativeBinaryOp::BitXor,
            };
            if left.key() == &TypeKey::Bool && right.key() == &TypeKey::Bool {
                let expr = left.nonref_expr().binop(native, right.nonref_expr());
                Ok(Some(ctx.bool_value(expr)))
            } else {
                Ok(Some(ctx.int_value(as_int(left).binop(native, as_int(right)))))
            }
        }
        _ => unsupported_bin_op(ctx, left, op, right),
    }
}

impl Wrapper for ArithmeticWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        match self.key {
            TypeKey::Bool => NativeType::bool(),
            TypeKey::Float => NativeType::float64(),
            _ => NativeType::int64(),
        }
    }

    fn convert_bin_op(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        left: &TypedValue,
        op: BinOp,
        right: &TypedValue,
    ) -> ConvertResult {
        if right.key().is_arithmetic() {
            return arithmetic_bin_op(ctx, left, op, right);
        }
        right.wrapper.clone().convert_bin_op_reverse(ctx, right, op, left)
    }

    fn convert_unary_op(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, op: UnaryOp) -> ConvertResult {
        if ctx.constant_folding() {
            if let Some(constant) = &value.constant {
                if let Ok(result) = dynamic_unaryop(op, constant) {
                    return Ok(Some(ctx.constant(&result)?));
                }
            }
        }
        match (op, &self.key) {
            (UnaryOp::Not, _) => {
                let Some(truth) = value.convert_bool_cast(ctx)? else {
                    return Ok(None);
                };
                Ok(Some(ctx.bool_value(truth.nonref_expr().logical_not())))
            }
            (UnaryOp::Neg, TypeKey::Float) => Ok(Some(ctx.float_value(NativeExpr::Unaryop {
                op: NativeUnaryOp::Negate,
                operand: Box::new(value.nonref_expr()),
            }))),
            (UnaryOp::Pos, TypeKey::Float) => Ok(Some(value.clone())),
            (UnaryOp::Neg, _) => Ok(Some(ctx.int_value(NativeExpr::Unaryop {
                op: NativeUnaryOp::Negate,
                operand: Box::new(as_int(value)),
            }))),
            (UnaryOp::Pos, _) => Ok(Some(ctx.int_value(as_int(value)))),
            (UnaryOp::Invert, TypeKey::Float) => ctx.push_exception(
                ExceptionKind::TypeError,
                "bad operand type for unary ~: 'float'",
            ),
            (UnaryOp::Invert, _) => Ok(Some(ctx.int_value(NativeExpr::Unaryop {
                op: NativeUnaryOp::BitNot,
                operand: Box::new(as_int(value)),
            }))),
        }
    }

    fn convert_bool_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let truth = match self.key {
            TypeKey::Bool => return Ok(Some(value.clone())),
            TypeKey::Float => value.nonref_expr().ne(NativeExpr::float(0.0)),
            _ => value.nonref_expr().ne(NativeExpr::int(0)),
        };
        Ok(Some(ctx.bool_value(truth)))
    }

    fn convert_int_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        match self.key {
            TypeKey::Int => Ok(Some(value.clone())),
            TypeKey::Float => {
                if let Some(Value::Float(f)) = &value.constant {
                    if f.is_finite() && ctx.constant_folding() {
                        return Ok(Some(ctx.constant_int(f.trunc() as i64)));
                    }
                }
                checked(ctx, &TypeKey::Int, rt::float64_to_int().call(vec![value.nonref_expr()]))
            }
            _ => Ok(Some(ctx.int_value(as_int(value)))),
        }
    }

    fn convert_float_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        if self.key == TypeKey::Float {
            return Ok(Some(value.clone()));
        }
        Ok(Some(ctx.float_value(as_float(value))))
    }

    fn convert_str_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        if let Some(constant) = &value.constant {
            return Ok(Some(ctx.constant_str(&constant.to_string())?));
        }
        let text = match self.key {
            TypeKey::Int => rt::str_from_int().call(vec![value.nonref_expr()]),
            TypeKey::Float => rt::str_from_float().call(vec![value.nonref_expr()]),
            _ => NativeExpr::branch(
                value.nonref_expr(),
                rt::str_from_utf8().call(vec![NativeExpr::utf8("True")]),
                rt::str_from_utf8().call(vec![NativeExpr::utf8("False")]),
            ),
        };
        let wrapper = ctx.wrapper(&TypeKey::Str);
        Ok(Some(ctx.push_owned(&wrapper, text)?))
    }

    fn convert_to_type(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        target: &WrapperRef,
    ) -> ConvertResult {
        match (&self.key, target.key()) {
            (from, to) if from == to => Ok(Some(value.clone())),
            (TypeKey::Bool, TypeKey::Int) => Ok(Some(ctx.int_value(as_int(value)))),
            (TypeKey::Bool | TypeKey::Int, TypeKey::Float) => Ok(Some(ctx.float_value(as_float(value)))),
            (_, TypeKey::Object) => self.box_to_object(ctx, value),
            (from, to) => Err(cannot_convert(from, to)),
        }
    }

    fn box_to_object(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let target = match self.key {
            TypeKey::Bool => rt::object_from_bool(),
            TypeKey::Float => rt::object_from_float(),
            _ => rt::object_from_int(),
        };
        let object = ctx.wrapper(&TypeKey::Object);
        Ok(Some(ctx.push_owned(&object, target.call(vec![value.nonref_expr()]))?))
    }
}
