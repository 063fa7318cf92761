//! Class objects: `int`, `str`, `range`, ... and builtin exception classes
//!
//! Calling a class converts or constructs; the class itself has no storage.

use typed_native_runtime::{BinOp, ExceptionKind};

use super::{list, range, unsupported_bin_op, Wrapper};
use crate::convert::ExpressionContext;
use crate::error::conversion_error;
use crate::native::NativeType;
use crate::typed_value::{ConvertResult, TypedValue};
use crate::types::TypeKey;

#[derive(Debug)]
pub struct TypeObjectWrapper {
    key: TypeKey,
    of: TypeKey,
}

impl TypeObjectWrapper {
    pub fn new(of: TypeKey) -> Self {
        Self {
            key: TypeKey::type_object(of.clone()),
            of,
        }
    }

    fn too_many(&self, ctx: &mut ExpressionContext<'_, '_>, given: usize) -> ConvertResult {
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!(
                "{}() takes at most 1 argument ({} given)",
                self.of.python_name(),
                given
            ),
        )
    }
}

impl Wrapper for TypeObjectWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        NativeType::Void
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn type_name(&self) -> String {
        "type".to_string()
    }

    fn convert_call(&self, ctx: &mut ExpressionContext<'_, '_>, _callee: &TypedValue, args: &[TypedValue]) -> ConvertResult {
        match (&self.of, args) {
            (TypeKey::Range, _) => range::construct(ctx, args),
            (TypeKey::ListOf(_), _) => list::construct(ctx, args),
            (TypeKey::Bool, []) => Ok(Some(ctx.constant_bool(false))),
            (TypeKey::Bool, [value]) => value.convert_bool_cast(ctx),
            (TypeKey::Int, []) => Ok(Some(ctx.constant_int(0))),
            (TypeKey::Int, [value]) => value.convert_int_cast(ctx),
            (TypeKey::Float, []) => Ok(Some(ctx.constant_float(0.0))),
            (TypeKey::Float, [value]) => value.convert_float_cast(ctx),
            (TypeKey::Str, []) => Ok(Some(ctx.constant_str("")?)),
            (TypeKey::Str, [value]) => value.convert_str_cast(ctx),
            (TypeKey::Bool | TypeKey::Int | TypeKey::Float | TypeKey::Str, _) => self.too_many(ctx, args.len()),
            // `type(x)`: the static type of `x`
            (TypeKey::Object, [value]) => Ok(Some(ctx.empty_value(&TypeKey::type_object(value.key().clone())))),
            (other, _) => conversion_error(format!("calling '{}' is not supported", other)),
        }
    }

    fn convert_bin_op(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        left: &TypedValue,
        op: BinOp,
        right: &TypedValue,
    ) -> ConvertResult {
        match (op, right.key()) {
            (BinOp::Eq, TypeKey::TypeObject(_)) => Ok(Some(ctx.constant_bool(left.key() == right.key()))),
            (BinOp::NotEq, TypeKey::TypeObject(_)) => Ok(Some(ctx.constant_bool(left.key() != right.key()))),
            _ => unsupported_bin_op(ctx, left, op, right),
        }
    }

    fn convert_str_cast(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        Ok(Some(ctx.constant_str(&format!("<class '{}'>", self.of.python_name()))?))
    }
}

/// A builtin exception class such as `ValueError`.
#[derive(Debug)]
pub struct ExceptionTypeWrapper {
    key: TypeKey,
    kind: ExceptionKind,
}

impl ExceptionTypeWrapper {
    pub fn new(kind: ExceptionKind) -> Self {
        Self {
            key: TypeKey::ExceptionType(kind),
            kind,
        }
    }
}

impl Wrapper for ExceptionTypeWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        NativeType::Void
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn type_name(&self) -> String {
        "type".to_string()
    }

    fn convert_call(&self, _ctx: &mut ExpressionContext<'_, '_>, _callee: &TypedValue, _args: &[TypedValue]) -> ConvertResult {
        conversion_error(format!(
            "{} instances can only be created in a raise statement",
            self.kind
        ))
    }

    fn convert_str_cast(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        Ok(Some(ctx.constant_str(&format!("<class '{}'>", self.kind))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_objects_are_empty() {
        let int = TypeObjectWrapper::new(TypeKey::Int);
        assert!(int.is_empty());
        assert_eq!(int.key().to_string(), "type[int]");
        let error = ExceptionTypeWrapper::new(ExceptionKind::ValueError);
        assert!(error.is_empty());
        assert_eq!(error.key().to_string(), "type[ValueError]");
    }
}
