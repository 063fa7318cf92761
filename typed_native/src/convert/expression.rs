//! Expression conversion
//!
//! Walks an expression tree and asks each operand's wrapper to generate the
//! code for the operation. The only control flow built here is for the
//! short-circuiting forms (`and`, `or`, conditional expressions and
//! comparison chains), whose result temporaries are initialized on every
//! path before their teardown is activated.

use typed_native_runtime::{BinOp, ExceptionKind, UnaryOp};

use super::context::ExpressionContext;
use super::function::{read_local, resolve_global};
use crate::ast::{BoolOperator, CompareOperator, Expr, Literal, Operator, UnaryOperator};
use crate::error::{conversion_error, ConversionError};
use crate::native::NativeExpr;
use crate::runtime_functions;
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::lattice::join;
use crate::types::TypeKey;
use crate::wrappers::{list, tuple, WrapperRef};

pub(crate) fn binop_for(op: Operator) -> BinOp {
    match op {
        Operator::Add => BinOp::Add,
        Operator::Sub => BinOp::Sub,
        Operator::Mult => BinOp::Mul,
        Operator::Div => BinOp::Div,
        Operator::FloorDiv => BinOp::FloorDiv,
        Operator::Mod => BinOp::Mod,
        Operator::Pow => BinOp::Pow,
        Operator::LShift => BinOp::LShift,
        Operator::RShift => BinOp::RShift,
        Operator::BitOr => BinOp::BitOr,
        Operator::BitXor => BinOp::BitXor,
        Operator::BitAnd => BinOp::BitAnd,
    }
}

fn unaryop_for(op: UnaryOperator) -> UnaryOp {
    match op {
        UnaryOperator::Not => UnaryOp::Not,
        UnaryOperator::USub => UnaryOp::Neg,
        UnaryOperator::UAdd => UnaryOp::Pos,
        UnaryOperator::Invert => UnaryOp::Invert,
    }
}

pub(crate) fn convert_expr(ctx: &mut ExpressionContext<'_, '_>, expr: &Expr) -> ConvertResult {
    convert_expr_inner(ctx, expr).map_err(|err| err.with_span(expr.span()))
}

/// Convert every expression in order, stopping at the first that does not continue.
pub(crate) fn convert_all(ctx: &mut ExpressionContext<'_, '_>, exprs: &[Expr]) -> CResult<Option<Vec<TypedValue>>> {
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        match convert_expr(ctx, expr)? {
            Some(value) => values.push(value),
            None => return Ok(None),
        }
    }
    Ok(Some(values))
}

fn convert_expr_inner(ctx: &mut ExpressionContext<'_, '_>, expr: &Expr) -> ConvertResult {
    match expr {
        Expr::Literal(literal, _) => convert_literal(ctx, literal),
        Expr::Name(name, _) => {
            if ctx.func.function.locals.iter().any(|local| local == name) {
                read_local(ctx, name)
            } else {
                resolve_global(ctx, name)
            }
        }
        Expr::BinOp { left, op, right, .. } => {
            let Some(left) = convert_expr(ctx, left)? else {
                return Ok(None);
            };
            let Some(right) = convert_expr(ctx, right)? else {
                return Ok(None);
            };
            left.convert_bin_op(ctx, binop_for(*op), &right)
        }
        Expr::UnaryOp { op, operand, .. } => {
            let Some(operand) = convert_expr(ctx, operand)? else {
                return Ok(None);
            };
            operand.convert_unary_op(ctx, unaryop_for(*op))
        }
        Expr::BoolOp { op, values, .. } => {
            if values.is_empty() {
                return conversion_error("boolean operation without operands");
            }
            convert_bool_op(ctx, *op, values)
        }
        Expr::Compare {
            left,
            ops,
            comparators,
            ..
        } => {
            if ops.len() != comparators.len() || ops.is_empty() {
                return conversion_error("malformed comparison");
            }
            let Some(left) = convert_expr(ctx, left)? else {
                return Ok(None);
            };
            convert_compare(ctx, left, ops, comparators)
        }
        Expr::Call { func, args, .. } => {
            if let Expr::Attribute { value, attr, .. } = &**func {
                let Some(receiver) = convert_expr(ctx, value)? else {
                    return Ok(None);
                };
                let Some(args) = convert_all(ctx, args)? else {
                    return Ok(None);
                };
                return receiver.convert_method_call(ctx, attr, &args);
            }
            let Some(callee) = convert_expr(ctx, func)? else {
                return Ok(None);
            };
            let Some(args) = convert_all(ctx, args)? else {
                return Ok(None);
            };
            callee.convert_call(ctx, &args)
        }
        Expr::Attribute { value, attr, .. } => {
            let Some(value) = convert_expr(ctx, value)? else {
                return Ok(None);
            };
            value.convert_attribute(ctx, attr)
        }
        Expr::Subscript { value, index, .. } => {
            let Some(container) = convert_expr(ctx, value)? else {
                return Ok(None);
            };
            if let Expr::Slice {
                lower, upper, step, ..
            } = &**index
            {
                if step.is_some() {
                    return conversion_error("slices with a step are not supported");
                }
                let lower = match lower {
                    Some(lower) => match convert_expr(ctx, lower)? {
                        Some(value) => Some(value),
                        None => return Ok(None),
                    },
                    None => None,
                };
                let upper = match upper {
                    Some(upper) => match convert_expr(ctx, upper)? {
                        Some(value) => Some(value),
                        None => return Ok(None),
                    },
                    None => None,
                };
                return container.convert_getslice(ctx, lower.as_ref(), upper.as_ref());
            }
            let Some(index) = convert_expr(ctx, index)? else {
                return Ok(None);
            };
            container.convert_getitem(ctx, &index)
        }
        Expr::Slice { .. } => conversion_error("slice outside of a subscript"),
        Expr::IfExp {
            test, body, orelse, ..
        } => convert_if_exp(ctx, test, body, orelse),
        Expr::Tuple(elements, _) => {
            let Some(values) = convert_all(ctx, elements)? else {
                return Ok(None);
            };
            tuple::build_tuple(ctx, &values)
        }
        Expr::List(elements, _) => {
            let Some(values) = convert_all(ctx, elements)? else {
                return Ok(None);
            };
            list::build_list(ctx, &values)
        }
        Expr::Lambda(lambda) => Err(ConversionError::at(
            "lambdas nested inside a compiled function are not supported",
            lambda.span,
        )),
    }
}

fn convert_literal(ctx: &mut ExpressionContext<'_, '_>, literal: &Literal) -> ConvertResult {
    Ok(Some(match literal {
        Literal::None => ctx.constant_none(),
        Literal::Bool(b) => ctx.constant_bool(*b),
        Literal::Int(i) => ctx.constant_int(*i),
        Literal::Float(f) => ctx.constant_float(*f),
        Literal::Str(s) => ctx.constant_str(s)?,
    }))
}

// ========== Short-circuiting forms ==========

/// Copy `value` into `slot`, a temporary of `wrapper`'s type.
fn initialize(
    ctx: &mut ExpressionContext<'_, '_>,
    value: &TypedValue,
    wrapper: &WrapperRef,
    slot: &NativeExpr,
) -> CResult<()> {
    let Some(value) = value.convert_to_type(ctx, wrapper)? else {
        return Ok(());
    };
    if value.is_empty() {
        return Ok(());
    }
    let value = if value.is_pod() {
        value
    } else {
        ctx.ensure_reference(value)?
    };
    let init = wrapper.copy_initialize(ctx.session(), slot.clone(), value.nonref_expr())?;
    ctx.push_effect(init);
    Ok(())
}

/// Join two separately generated code paths that each may produce a value.
///
/// A path whose value is `None` never continues, so the other path's value
/// can be used directly. When both continue, their values are copied into a
/// temporary of the joined type.
fn merge_branches(
    ctx: &mut ExpressionContext<'_, '_>,
    cond: NativeExpr,
    then: (NativeExpr, Option<TypedValue>),
    otherwise: (NativeExpr, Option<TypedValue>),
) -> ConvertResult {
    let (then_block, otherwise_block, then_value, otherwise_value) = match (then.1, otherwise.1) {
        (None, None) => {
            ctx.push_effect(NativeExpr::branch(cond, then.0, otherwise.0));
            return Ok(None);
        }
        (Some(value), None) | (None, Some(value)) => {
            ctx.push_effect(NativeExpr::branch(cond, then.0, otherwise.0));
            return Ok(Some(value));
        }
        (Some(a), Some(b)) => (then.0, otherwise.0, a, b),
    };

    let joined = join(then_value.key(), otherwise_value.key());
    let wrapper = ctx.wrapper(&joined);
    if wrapper.is_empty() {
        ctx.push_effect(NativeExpr::branch(cond, then_block, otherwise_block));
        return Ok(Some(TypedValue::empty(wrapper)));
    }
    let (slot, tag) = ctx.declare_temp(&wrapper)?;
    let (then_init, ()) = ctx.capture(|ctx| initialize(ctx, &then_value, &wrapper, &slot))?;
    let (otherwise_init, ()) = ctx.capture(|ctx| initialize(ctx, &otherwise_value, &wrapper, &slot))?;
    ctx.push_effect(NativeExpr::branch(
        cond,
        NativeExpr::sequence(vec![then_block, then_init]),
        NativeExpr::sequence(vec![otherwise_block, otherwise_init]),
    ));
    ctx.activate(tag);
    Ok(Some(TypedValue::new(slot, wrapper, true)))
}

/// Store a truth value so it can be tested after more code has run.
fn stash_bool(ctx: &mut ExpressionContext<'_, '_>, truth: &TypedValue) -> NativeExpr {
    let wrapper = truth.wrapper.clone();
    ctx.push_pod(&wrapper, truth.nonref_expr()).nonref_expr()
}

/// `a and b and c` / `a or b or c`, returning the deciding operand.
fn convert_bool_op(ctx: &mut ExpressionContext<'_, '_>, op: BoolOperator, values: &[Expr]) -> ConvertResult {
    let Some(first) = convert_expr(ctx, &values[0])? else {
        return Ok(None);
    };
    if values.len() == 1 {
        return Ok(Some(first));
    }
    let Some(truth) = first.convert_bool_cast(ctx)? else {
        return Ok(None);
    };
    if ctx.constant_folding() {
        if let Some(truth) = truth.constant_bool() {
            let decided = match op {
                BoolOperator::And => !truth,
                BoolOperator::Or => truth,
            };
            if decided {
                return Ok(Some(first));
            }
            return convert_bool_op(ctx, op, &values[1..]);
        }
    }
    let flag = stash_bool(ctx, &truth);
    let evaluate_rest = match op {
        BoolOperator::And => flag,
        BoolOperator::Or => flag.logical_not(),
    };
    let rest = ctx.capture(|ctx| convert_bool_op(ctx, op, &values[1..]))?;
    merge_branches(ctx, evaluate_rest, rest, (NativeExpr::void(), Some(first)))
}

fn convert_if_exp(ctx: &mut ExpressionContext<'_, '_>, test: &Expr, body: &Expr, orelse: &Expr) -> ConvertResult {
    let Some(test) = convert_expr(ctx, test)? else {
        return Ok(None);
    };
    let Some(truth) = test.convert_bool_cast(ctx)? else {
        return Ok(None);
    };
    if ctx.constant_folding() {
        if let Some(truth) = truth.constant_bool() {
            return convert_expr(ctx, if truth { body } else { orelse });
        }
    }
    let cond = stash_bool(ctx, &truth);
    let then = ctx.capture(|ctx| convert_expr(ctx, body))?;
    let otherwise = ctx.capture(|ctx| convert_expr(ctx, orelse))?;
    merge_branches(ctx, cond, then, otherwise)
}

// ========== Comparisons ==========

fn convert_compare(
    ctx: &mut ExpressionContext<'_, '_>,
    left: TypedValue,
    ops: &[CompareOperator],
    comparators: &[Expr],
) -> ConvertResult {
    let Some(right) = convert_expr(ctx, &comparators[0])? else {
        return Ok(None);
    };
    let Some(result) = compare_one(ctx, &left, ops[0], &right)? else {
        return Ok(None);
    };
    if ops.len() == 1 {
        return Ok(Some(result));
    }
    // `a < b < c` is `a < b and b < c` with `b` evaluated once
    let Some(truth) = result.convert_bool_cast(ctx)? else {
        return Ok(None);
    };
    if ctx.constant_folding() && truth.constant_bool() == Some(false) {
        return Ok(Some(truth));
    }
    let flag = stash_bool(ctx, &truth);
    let (rest_block, rest) = ctx.capture(|ctx| {
        let Some(rest) = convert_compare(ctx, right, &ops[1..], &comparators[1..])? else {
            return Ok(None);
        };
        rest.convert_bool_cast(ctx)
    })?;
    let false_value = ctx.constant_bool(false);
    merge_branches(ctx, flag, (rest_block, rest), (NativeExpr::void(), Some(false_value)))
}

fn compare_one(
    ctx: &mut ExpressionContext<'_, '_>,
    left: &TypedValue,
    op: CompareOperator,
    right: &TypedValue,
) -> ConvertResult {
    match op {
        CompareOperator::Eq => left.convert_bin_op(ctx, BinOp::Eq, right),
        CompareOperator::NotEq => left.convert_bin_op(ctx, BinOp::NotEq, right),
        CompareOperator::Lt => left.convert_bin_op(ctx, BinOp::Lt, right),
        CompareOperator::LtE => left.convert_bin_op(ctx, BinOp::LtE, right),
        CompareOperator::Gt => left.convert_bin_op(ctx, BinOp::Gt, right),
        CompareOperator::GtE => left.convert_bin_op(ctx, BinOp::GtE, right),
        CompareOperator::In => right.convert_contains(ctx, left),
        CompareOperator::NotIn => match right.convert_contains(ctx, left)? {
            Some(found) => found.convert_unary_op(ctx, UnaryOp::Not),
            None => Ok(None),
        },
        CompareOperator::Is => convert_is(ctx, left, right),
        CompareOperator::IsNot => match convert_is(ctx, left, right)? {
            Some(same) => same.convert_unary_op(ctx, UnaryOp::Not),
            None => Ok(None),
        },
    }
}

/// Identity comparison. Values of different static types are never
/// identical, except that an `object` may hold `None`.
fn convert_is(ctx: &mut ExpressionContext<'_, '_>, left: &TypedValue, right: &TypedValue) -> ConvertResult {
    let (left_key, right_key) = (left.key().clone(), right.key().clone());
    match (&left_key, &right_key) {
        (TypeKey::None, TypeKey::None) => Ok(Some(ctx.constant_bool(true))),
        (TypeKey::None, TypeKey::Object) => Ok(Some(object_is_none(ctx, right)?)),
        (TypeKey::Object, TypeKey::None) => Ok(Some(object_is_none(ctx, left)?)),
        (TypeKey::None, _) | (_, TypeKey::None) => Ok(Some(ctx.constant_bool(false))),
        _ if left_key != right_key => Ok(Some(ctx.constant_bool(false))),
        _ if left.is_empty() => Ok(Some(ctx.constant_bool(true))),
        _ => conversion_error(format!(
            "'is' between two values of type '{}' is only supported against None",
            left_key
        )),
    }
}

fn object_is_none(ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> CResult<TypedValue> {
    let value = ctx.ensure_reference(value.clone())?;
    let test = runtime_functions::object_is_none().call(vec![value.as_call_argument()]);
    Ok(ctx.bool_value(test))
}

/// Raise `TypeError` for a builtin called with the wrong number of arguments.
pub(crate) fn arity_error(ctx: &mut ExpressionContext<'_, '_>, name: &str, expected: &str, given: usize) -> ConvertResult {
    ctx.push_exception(
        ExceptionKind::TypeError,
        &format!("{}() takes {} ({} given)", name, expected, given),
    )
}
