//! The dynamic `object` type
//!
//! Values whose static type widened past every concrete type are boxed into
//! reference-counted runtime handles. Every operation on them dispatches at
//! run time through the runtime library, so they support whatever Python
//! supports for the underlying value, at the cost of a call per operation.

use typed_native_runtime::{BinOp, UnaryOp};

use super::{cannot_convert, refcounted, Wrapper, WrapperRef};
use crate::convert::ExpressionContext;
use crate::driver::CompilationSession;
use crate::error::conversion_error;
use crate::native::{NativeExpr, NativeType};
use crate::runtime_functions as rt;
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::TypeKey;

fn free(handle: NativeExpr) -> NativeExpr {
    rt::object_free().call(vec![handle])
}

/// Box `value` and give it storage, so its handle can be passed to the runtime.
fn boxed(ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> CResult<Option<TypedValue>> {
    let Some(object) = ctx.convert_to(value, &TypeKey::Object)? else {
        return Ok(None);
    };
    Ok(Some(ctx.ensure_reference(object)?))
}

#[derive(Debug)]
pub struct ObjectWrapper {
    key: TypeKey,
}

impl ObjectWrapper {
    pub fn new() -> Self {
        Self { key: TypeKey::Object }
    }

    fn dispatch(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        left: &TypedValue,
        op: BinOp,
        right: &TypedValue,
    ) -> ConvertResult {
        let Some(left) = boxed(ctx, left)? else {
            return Ok(None);
        };
        let Some(right) = boxed(ctx, right)? else {
            return Ok(None);
        };
        let call = rt::object_binop().call(vec![
            NativeExpr::int(op.code()),
            left.nonref_expr(),
            right.nonref_expr(),
        ]);
        let object = ctx.wrapper(&self.key);
        Ok(Some(ctx.push_owned(&object, call)?))
    }
}

impl Default for ObjectWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Wrapper for ObjectWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        rt::object_handle()
    }

    fn is_pod(&self) -> bool {
        false
    }

    fn copy_initialize(
        &self,
        _session: &mut CompilationSession,
        target: NativeExpr,
        source: NativeExpr,
    ) -> CResult<NativeExpr> {
        Ok(refcounted::copy_initialize(target, source, &self.layout()))
    }

    fn assign(&self, _session: &mut CompilationSession, target: NativeExpr, source: NativeExpr) -> CResult<NativeExpr> {
        Ok(refcounted::assign(target, source, &self.layout(), free))
    }

    fn destroy(&self, _session: &mut CompilationSession, target: NativeExpr) -> CResult<NativeExpr> {
        Ok(refcounted::destroy(target, &self.layout(), free))
    }

    fn convert_bin_op(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        left: &TypedValue,
        op: BinOp,
        right: &TypedValue,
    ) -> ConvertResult {
        self.dispatch(ctx, left, op, right)
    }

    fn convert_bin_op_reverse(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        right: &TypedValue,
        op: BinOp,
        left: &TypedValue,
    ) -> ConvertResult {
        self.dispatch(ctx, left, op, right)
    }

    fn convert_unary_op(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, op: UnaryOp) -> ConvertResult {
        if op == UnaryOp::Not {
            let Some(truth) = self.convert_bool_cast(ctx, value)? else {
                return Ok(None);
            };
            return Ok(Some(ctx.bool_value(truth.nonref_expr().logical_not())));
        }
        let call = rt::object_unaryop().call(vec![NativeExpr::int(op.code()), value.nonref_expr()]);
        let object = ctx.wrapper(&self.key);
        Ok(Some(ctx.push_owned(&object, call)?))
    }

    fn convert_contains(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        container: &TypedValue,
        item: &TypedValue,
    ) -> ConvertResult {
        let Some(item) = boxed(ctx, item)? else {
            return Ok(None);
        };
        let call = rt::object_contains().call(vec![container.nonref_expr(), item.nonref_expr()]);
        let bool_wrapper = ctx.wrapper(&TypeKey::Bool);
        Ok(Some(ctx.push_pod(&bool_wrapper, call)))
    }

    fn convert_getitem(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, index: &TypedValue) -> ConvertResult {
        let Some(index) = boxed(ctx, index)? else {
            return Ok(None);
        };
        let call = rt::object_getitem().call(vec![value.nonref_expr(), index.nonref_expr()]);
        let object = ctx.wrapper(&self.key);
        Ok(Some(ctx.push_owned(&object, call)?))
    }

    fn convert_len(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let int = ctx.wrapper(&TypeKey::Int);
        Ok(Some(ctx.push_pod(&int, rt::object_len().call(vec![value.nonref_expr()]))))
    }

    fn convert_bool_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        Ok(Some(ctx.bool_value(rt::object_truthy().call(vec![value.nonref_expr()]))))
    }

    fn convert_int_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let int = ctx.wrapper(&TypeKey::Int);
        Ok(Some(ctx.push_pod(&int, rt::object_to_int().call(vec![value.nonref_expr()]))))
    }

    fn convert_float_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let float = ctx.wrapper(&TypeKey::Float);
        Ok(Some(ctx.push_pod(&float, rt::object_to_float().call(vec![value.nonref_expr()]))))
    }

    fn convert_str_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let string = ctx.wrapper(&TypeKey::Str);
        Ok(Some(ctx.push_owned(&string, rt::object_to_str().call(vec![value.nonref_expr()]))?))
    }

    fn convert_iter(&self, _ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        conversion_error("iterating over a value of static type 'object' is not supported")
    }

    fn convert_to_type(
        &self,
        _ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        target: &WrapperRef,
    ) -> ConvertResult {
        if target.key() == &self.key {
            return Ok(Some(value.clone()));
        }
        Err(cannot_convert(&self.key, target.key()))
    }

    fn box_to_object(&self, _ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        Ok(Some(value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_is_refcounted_handle() {
        let object = ObjectWrapper::new();
        assert!(!object.is_pod() && object.is_pass_by_ref());
        assert_eq!(object.layout(), rt::object_handle());
        assert_eq!(object.type_name(), "object");
    }
}
