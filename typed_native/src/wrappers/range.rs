//! `range` and its iterator
//!
//! A range is three integers and is copied by value. The iterator counts
//! down the items left instead of comparing against `stop`, so a step that
//! would carry past `i64::MAX` still ends the loop.

use typed_native_runtime::{BinOp, ExceptionKind};

use super::{unsupported_bin_op, Wrapper};
use crate::convert::ExpressionContext;
use crate::native::{NativeBinaryOp, NativeExpr, NativeType};
use crate::runtime_functions as rt;
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::TypeKey;

const START: usize = 0;
const STOP: usize = 1;
const STEP: usize = 2;

const CURRENT: usize = 0;
const REMAINING: usize = 1;

fn int_struct(names: [&str; 3]) -> NativeType {
    NativeType::Struct(
        names
            .iter()
            .map(|name| (name.to_string(), NativeType::int64()))
            .collect(),
    )
}

fn as_int(value: &TypedValue) -> NativeExpr {
    match value.key() {
        TypeKey::Int => value.nonref_expr(),
        _ => value.nonref_expr().cast(NativeType::int64()),
    }
}

fn require_int(ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> CResult<bool> {
    if matches!(value.key(), TypeKey::Int | TypeKey::Bool) {
        return Ok(true);
    }
    ctx.push_exception(
        ExceptionKind::TypeError,
        &format!(
            "'{}' object cannot be interpreted as an integer",
            value.wrapper.type_name()
        ),
    )?;
    Ok(false)
}

/// `range(stop)`, `range(start, stop)` or `range(start, stop, step)`.
pub(super) fn construct(ctx: &mut ExpressionContext<'_, '_>, args: &[TypedValue]) -> ConvertResult {
    let (start, stop, step) = match args {
        [stop] => (None, stop, None),
        [start, stop] => (Some(start), stop, None),
        [start, stop, step] => (Some(start), stop, Some(step)),
        [] => {
            return ctx.push_exception(ExceptionKind::TypeError, "range expected at least 1 argument, got 0");
        }
        _ => {
            return ctx.push_exception(
                ExceptionKind::TypeError,
                &format!("range expected at most 3 arguments, got {}", args.len()),
            );
        }
    };
    for arg in args {
        if !require_int(ctx, arg)? {
            return Ok(None);
        }
    }
    let start = start.map(as_int).unwrap_or_else(|| NativeExpr::int(0));
    let stop = as_int(stop);
    let step_expr = step.map(as_int).unwrap_or_else(|| NativeExpr::int(1));

    match step.and_then(TypedValue::constant_int) {
        Some(0) => {
            return ctx.push_exception(ExceptionKind::ValueError, "range() arg 3 must not be zero");
        }
        Some(_) => {}
        None if step.is_some() => ctx.raise_if(
            step_expr.clone().eq(NativeExpr::int(0)),
            ExceptionKind::ValueError,
            "range() arg 3 must not be zero",
        ),
        None => {}
    }

    let wrapper = ctx.wrapper(&TypeKey::Range);
    let range = ctx.push(&wrapper, |_, slot| {
        Ok(NativeExpr::sequence(vec![
            slot.clone().field(START).store(start),
            slot.clone().field(STOP).store(stop),
            slot.field(STEP).store(step_expr),
        ]))
    })?;
    Ok(Some(range))
}

/// Fields of a range value that is already a reference.
struct Bounds {
    start: NativeExpr,
    stop: NativeExpr,
    step: NativeExpr,
}

impl Bounds {
    fn of(range: &TypedValue) -> Self {
        Self {
            start: range.expr.clone().field(START).load(),
            stop: range.expr.clone().field(STOP).load(),
            step: range.expr.clone().field(STEP).load(),
        }
    }

    fn args(&self) -> Vec<NativeExpr> {
        vec![self.start.clone(), self.stop.clone(), self.step.clone()]
    }

    /// `len()`, which raises once the count no longer fits an int.
    fn length(&self) -> NativeExpr {
        rt::range_len().call(self.args())
    }

    /// Number of elements, saturating at `i64::MAX`.
    fn count(&self) -> NativeExpr {
        rt::range_count().call(self.args())
    }
}

#[derive(Debug)]
pub struct RangeWrapper {
    key: TypeKey,
}

impl RangeWrapper {
    pub fn new() -> Self {
        Self { key: TypeKey::Range }
    }

    fn length(&self, ctx: &mut ExpressionContext<'_, '_>, range: &TypedValue) -> CResult<TypedValue> {
        let range = ctx.ensure_reference(range.clone())?;
        let int = ctx.wrapper(&TypeKey::Int);
        Ok(ctx.push_pod(&int, Bounds::of(&range).length()))
    }

    fn count(&self, ctx: &mut ExpressionContext<'_, '_>, range: &TypedValue) -> CResult<TypedValue> {
        let range = ctx.ensure_reference(range.clone())?;
        let int = ctx.wrapper(&TypeKey::Int);
        Ok(ctx.push_pod(&int, Bounds::of(&range).count()))
    }
}

impl Default for RangeWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Wrapper for RangeWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        int_struct(["start", "stop", "step"])
    }

    fn iterated_type(&self) -> Option<TypeKey> {
        Some(TypeKey::Int)
    }

    fn convert_attribute(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, attr: &str) -> ConvertResult {
        let field = match attr {
            "start" => START,
            "stop" => STOP,
            "step" => STEP,
            _ => {
                return ctx.push_exception(
                    ExceptionKind::AttributeError,
                    &format!("'range' object has no attribute '{}'", attr),
                )
            }
        };
        let value = ctx.ensure_reference(value.clone())?;
        Ok(Some(ctx.int_value(value.expr.field(field).load())))
    }

    fn convert_len(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        Ok(Some(self.length(ctx, value)?))
    }

    fn convert_bool_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let count = self.count(ctx, value)?;
        Ok(Some(ctx.bool_value(count.nonref_expr().ne(NativeExpr::int(0)))))
    }

    fn convert_getitem(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, index: &TypedValue) -> ConvertResult {
        if !matches!(index.key(), TypeKey::Int | TypeKey::Bool) {
            return ctx.push_exception(
                ExceptionKind::TypeError,
                &format!(
                    "range indices must be integers or slices, not {}",
                    index.wrapper.type_name()
                ),
            );
        }
        let range = ctx.ensure_reference(value.clone())?;
        let length = self.count(ctx, &range)?.nonref_expr();
        let int = ctx.wrapper(&TypeKey::Int);
        let raw = as_int(index);
        let position = ctx.push_pod(
            &int,
            NativeExpr::branch(raw.clone().lt(NativeExpr::int(0)), raw.clone().add(length.clone()), raw),
        );
        let position = position.nonref_expr();
        ctx.raise_if(
            position
                .clone()
                .lt(NativeExpr::int(0))
                .binop(NativeBinaryOp::BitOr, position.clone().ge(length)),
            ExceptionKind::IndexError,
            "range object index out of range",
        );
        let bounds = Bounds::of(&range);
        let item = bounds.start.add(position.binop(NativeBinaryOp::Mul, bounds.step));
        Ok(Some(ctx.push_pod(&int, item)))
    }

    fn convert_contains(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        container: &TypedValue,
        item: &TypedValue,
    ) -> ConvertResult {
        if !matches!(item.key(), TypeKey::Int | TypeKey::Bool) {
            return super::list::contains_by_iteration(ctx, container, item);
        }
        let range = ctx.ensure_reference(container.clone())?;
        let bounds = Bounds::of(&range);
        let x = as_int(item);
        let int = ctx.wrapper(&TypeKey::Int);
        let x = ctx.push_pod(&int, x).nonref_expr();
        let within = NativeExpr::branch(
            bounds.step.clone().gt(NativeExpr::int(0)),
            bounds
                .start
                .clone()
                .binop(NativeBinaryOp::LtE, x.clone())
                .binop(NativeBinaryOp::BitAnd, x.clone().lt(bounds.stop.clone())),
            bounds
                .start
                .clone()
                .ge(x.clone())
                .binop(NativeBinaryOp::BitAnd, x.clone().gt(bounds.stop.clone())),
        );
        // the modulus is only taken once the bounds test passed
        let on_step = rt::int64_binary("int64_mod")
            .call(vec![x.sub(bounds.start), bounds.step])
            .eq(NativeExpr::int(0));
        let test = NativeExpr::branch(within, on_step, NativeExpr::bool(false));
        let bool_wrapper = ctx.wrapper(&TypeKey::Bool);
        Ok(Some(ctx.push_pod(&bool_wrapper, test)))
    }

    fn convert_bin_op(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        left: &TypedValue,
        op: BinOp,
        right: &TypedValue,
    ) -> ConvertResult {
        if right.key() != &TypeKey::Range || !matches!(op, BinOp::Eq | BinOp::NotEq) {
            return unsupported_bin_op(ctx, left, op, right);
        }
        // equal as sequences: same length, same first element, same step when
        // there is more than one element
        let a = ctx.ensure_reference(left.clone())?;
        let b = ctx.ensure_reference(right.clone())?;
        let len_a = self.count(ctx, &a)?.nonref_expr();
        let len_b = self.count(ctx, &b)?.nonref_expr();
        let (ba, bb) = (Bounds::of(&a), Bounds::of(&b));
        let same = NativeExpr::branch(
            len_a.clone().ne(len_b),
            NativeExpr::bool(false),
            NativeExpr::branch(
                len_a.clone().eq(NativeExpr::int(0)),
                NativeExpr::bool(true),
                ba.start.eq(bb.start).binop(
                    NativeBinaryOp::BitAnd,
                    len_a.eq(NativeExpr::int(1)).binop(NativeBinaryOp::BitOr, ba.step.eq(bb.step)),
                ),
            ),
        );
        let same = if op == BinOp::Eq { same } else { same.logical_not() };
        Ok(Some(ctx.bool_value(same)))
    }

    fn convert_iter(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let range = ctx.ensure_reference(value.clone())?;
        let bounds = Bounds::of(&range);
        let wrapper = ctx.wrapper(&TypeKey::RangeIterator);
        let iterator = ctx.push(&wrapper, |_, slot| {
            Ok(NativeExpr::sequence(vec![
                slot.clone().field(CURRENT).store(bounds.start.clone()),
                slot.clone().field(REMAINING).store(bounds.count()),
                slot.field(STEP).store(bounds.step),
            ]))
        })?;
        Ok(Some(iterator))
    }
}

/// `{current, remaining, step}`
#[derive(Debug)]
pub struct RangeIteratorWrapper {
    key: TypeKey,
}

impl RangeIteratorWrapper {
    pub fn new() -> Self {
        Self {
            key: TypeKey::RangeIterator,
        }
    }
}

impl Default for RangeIteratorWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Wrapper for RangeIteratorWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        int_struct(["current", "remaining", "step"])
    }

    fn iterated_type(&self) -> Option<TypeKey> {
        Some(TypeKey::Int)
    }

    fn convert_iter(&self, _ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        Ok(Some(value.clone()))
    }

    fn convert_next(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        iterator: &TypedValue,
    ) -> CResult<Option<(TypedValue, NativeExpr)>> {
        let current = iterator.expr.clone().field(CURRENT);
        let remaining = iterator.expr.clone().field(REMAINING);
        let step = iterator.expr.clone().field(STEP).load();
        let int = ctx.wrapper(&TypeKey::Int);
        let bool_wrapper = ctx.wrapper(&TypeKey::Bool);
        let value = ctx.push_pod(&int, current.clone().load());
        let more = ctx.push_pod(&bool_wrapper, remaining.clone().load().gt(NativeExpr::int(0)));
        // the add after the last item may wrap; that value is never read
        ctx.push_effect(current.clone().store(current.load().add(step)));
        ctx.push_effect(remaining.clone().store(remaining.load().sub(NativeExpr::int(1))));
        Ok(Some((value, more.nonref_expr())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_are_pod() {
        let range = RangeWrapper::new();
        assert!(range.is_pod());
        assert_eq!(range.layout().field_index("step"), Some(STEP));
        let iterator = RangeIteratorWrapper::new();
        assert!(iterator.is_pod());
        assert_eq!(iterator.layout().field_index("current"), Some(CURRENT));
        assert_eq!(iterator.layout().field_index("remaining"), Some(REMAINING));
    }
}
