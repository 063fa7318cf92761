use typed_native_runtime::BinOp;

use super::{unsupported_bin_op, Wrapper};
use crate::convert::ExpressionContext;
use crate::native::NativeType;
use crate::runtime_functions as rt;
use crate::typed_value::{ConvertResult, TypedValue};
use crate::types::TypeKey;

/// `None`: a single value, so it needs no storage at all.
#[derive(Debug)]
pub struct NoneWrapper {
    key: TypeKey,
}

impl NoneWrapper {
    pub fn new() -> Self {
        Self { key: TypeKey::None }
    }
}

impl Default for NoneWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Wrapper for NoneWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        NativeType::Void
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn convert_bin_op(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        left: &TypedValue,
        op: BinOp,
        right: &TypedValue,
    ) -> ConvertResult {
        match (op, right.key()) {
            (BinOp::Eq, TypeKey::None) => Ok(Some(ctx.constant_bool(true))),
            (BinOp::NotEq, TypeKey::None) => Ok(Some(ctx.constant_bool(false))),
            (_, TypeKey::Object) => right.wrapper.clone().convert_bin_op_reverse(ctx, right, op, left),
            _ => unsupported_bin_op(ctx, left, op, right),
        }
    }

    fn convert_bool_cast(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        Ok(Some(ctx.constant_bool(false)))
    }

    fn convert_str_cast(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        Ok(Some(ctx.constant_str("None")?))
    }

    fn box_to_object(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        let object = ctx.wrapper(&TypeKey::Object);
        Ok(Some(ctx.push_owned(&object, rt::object_from_none().call(vec![]))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_empty() {
        let wrapper = NoneWrapper::new();
        assert!(wrapper.is_empty() && wrapper.is_pod());
        assert_eq!(wrapper.passing_layout(), NativeType::Void);
        assert_eq!(wrapper.type_name(), "NoneType");
    }
}
