//! Typed values
//!
//! A `TypedValue` is one compiled sub-expression: a native expression, the
//! wrapper describing its static type, whether the expression yields the
//! value itself or the address of it, and the value when it is a
//! compile-time constant.
//!
//! Every operation forwards to the wrapper, which is where type-specific
//! code generation lives.

use typed_native_runtime::{BinOp, UnaryOp, Value};

use crate::convert::ExpressionContext;
use crate::error::ConversionError;
use crate::native::NativeExpr;
use crate::types::TypeKey;
use crate::wrappers::WrapperRef;

/// Outcome of a code-generation step.
///
/// - `Ok(Some(v))`: the operation produced `v`.
/// - `Ok(None)`: control does not continue past this point (an exception was
///   raised or the code is unreachable). Callers stop generating code and
///   propagate `None`.
/// - `Err(e)`: the operation has no valid lowering.
pub type ConvertResult = Result<Option<TypedValue>, ConversionError>;

pub type CResult<T> = Result<T, ConversionError>;

#[derive(Debug, Clone)]
pub struct TypedValue {
    pub expr: NativeExpr,
    pub wrapper: WrapperRef,
    /// `expr` evaluates to a pointer to the value rather than the value.
    pub is_reference: bool,
    pub constant: Option<Value>,
}

impl TypedValue {
    pub fn new(expr: NativeExpr, wrapper: WrapperRef, is_reference: bool) -> Self {
        Self {
            expr,
            wrapper,
            is_reference,
            constant: None,
        }
    }

    /// A value of an empty type; it has no native representation.
    pub fn empty(wrapper: WrapperRef) -> Self {
        Self::new(NativeExpr::void(), wrapper, false)
    }

    pub fn with_constant(mut self, value: Value) -> Self {
        self.constant = Some(value);
        self
    }

    pub fn key(&self) -> &TypeKey {
        self.wrapper.key()
    }

    pub fn is_pod(&self) -> bool {
        self.wrapper.is_pod()
    }

    pub fn is_empty(&self) -> bool {
        self.wrapper.is_empty()
    }

    /// An expression producing the value itself.
    pub fn nonref_expr(&self) -> NativeExpr {
        if self.is_reference {
            self.expr.clone().load()
        } else {
            self.expr.clone()
        }
    }

    /// Form used at the native call boundary: POD values by value, everything
    /// else by address.
    ///
    /// # Panics
    ///
    /// Panics if the value is neither POD nor a reference. Such a value is a
    /// temporary that was never given storage, which is a compiler bug.
    pub fn as_call_argument(&self) -> NativeExpr {
        if self.wrapper.is_pod() {
            self.nonref_expr()
        } else {
            assert!(
                self.is_reference,
                "non-POD value of type '{}' passed by value",
                self.key()
            );
            self.expr.clone()
        }
    }

    /// The same storage viewed through a different wrapper with the same layout.
    pub fn change_type(&self, wrapper: WrapperRef) -> TypedValue {
        TypedValue {
            expr: self.expr.clone(),
            wrapper,
            is_reference: self.is_reference,
            constant: self.constant.clone(),
        }
    }

    pub fn constant_int(&self) -> Option<i64> {
        match &self.constant {
            Some(Value::Int(i)) => Some(*i),
            Some(Value::Bool(b)) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn constant_bool(&self) -> Option<bool> {
        self.constant.as_ref().map(Value::truthy)
    }

    // ========== Forwarding ==========

    pub fn convert_call(&self, ctx: &mut ExpressionContext<'_, '_>, args: &[TypedValue]) -> ConvertResult {
        self.wrapper.clone().convert_call(ctx, self, args)
    }

    pub fn convert_attribute(&self, ctx: &mut ExpressionContext<'_, '_>, attr: &str) -> ConvertResult {
        self.wrapper.clone().convert_attribute(ctx, self, attr)
    }

    pub fn convert_method_call(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        method: &str,
        args: &[TypedValue],
    ) -> ConvertResult {
        self.wrapper.clone().convert_method_call(ctx, self, method, args)
    }

    pub fn convert_bin_op(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        op: BinOp,
        right: &TypedValue,
    ) -> ConvertResult {
        self.wrapper.clone().convert_bin_op(ctx, self, op, right)
    }

    pub fn convert_unary_op(&self, ctx: &mut ExpressionContext<'_, '_>, op: UnaryOp) -> ConvertResult {
        self.wrapper.clone().convert_unary_op(ctx, self, op)
    }

    /// `item in self`
    pub fn convert_contains(&self, ctx: &mut ExpressionContext<'_, '_>, item: &TypedValue) -> ConvertResult {
        self.wrapper.clone().convert_contains(ctx, self, item)
    }

    pub fn convert_getitem(&self, ctx: &mut ExpressionContext<'_, '_>, index: &TypedValue) -> ConvertResult {
        self.wrapper.clone().convert_getitem(ctx, self, index)
    }

    pub fn convert_getslice(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        lower: Option<&TypedValue>,
        upper: Option<&TypedValue>,
    ) -> ConvertResult {
        self.wrapper.clone().convert_getslice(ctx, self, lower, upper)
    }

    pub fn convert_setitem(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        index: &TypedValue,
        item: &TypedValue,
    ) -> ConvertResult {
        self.wrapper.clone().convert_setitem(ctx, self, index, item)
    }

    pub fn convert_len(&self, ctx: &mut ExpressionContext<'_, '_>) -> ConvertResult {
        self.wrapper.clone().convert_len(ctx, self)
    }

    pub fn convert_bool_cast(&self, ctx: &mut ExpressionContext<'_, '_>) -> ConvertResult {
        if let Some(truth) = self.constant_bool() {
            return Ok(Some(ctx.constant_bool(truth)));
        }
        self.wrapper.clone().convert_bool_cast(ctx, self)
    }

    pub fn convert_int_cast(&self, ctx: &mut ExpressionContext<'_, '_>) -> ConvertResult {
        self.wrapper.clone().convert_int_cast(ctx, self)
    }

    pub fn convert_float_cast(&self, ctx: &mut ExpressionContext<'_, '_>) -> ConvertResult {
        self.wrapper.clone().convert_float_cast(ctx, self)
    }

    pub fn convert_str_cast(&self, ctx: &mut ExpressionContext<'_, '_>) -> ConvertResult {
        self.wrapper.clone().convert_str_cast(ctx, self)
    }

    pub fn convert_iter(&self, ctx: &mut ExpressionContext<'_, '_>) -> ConvertResult {
        self.wrapper.clone().convert_iter(ctx, self)
    }

    /// Advance an iterator. See [`crate::wrappers::Wrapper::convert_next`].
    pub fn convert_next(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
    ) -> CResult<Option<(TypedValue, NativeExpr)>> {
        self.wrapper.clone().convert_next(ctx, self)
    }

    pub fn convert_to_type(&self, ctx: &mut ExpressionContext<'_, '_>, target: &WrapperRef) -> ConvertResult {
        if target.key() == self.key() {
            return Ok(Some(self.clone()));
        }
        self.wrapper.clone().convert_to_type(ctx, self, target)
    }

    // ========== Comparison sugar ==========

    pub fn eq(&self, ctx: &mut ExpressionContext<'_, '_>, other: &TypedValue) -> ConvertResult {
        self.convert_bin_op(ctx, BinOp::Eq, other)
    }

    pub fn ne(&self, ctx: &mut ExpressionContext<'_, '_>, other: &TypedValue) -> ConvertResult {
        self.convert_bin_op(ctx, BinOp::NotEq, other)
    }

    pub fn lt(&self, ctx: &mut ExpressionContext<'_, '_>, other: &TypedValue) -> ConvertResult {
        self.convert_bin_op(ctx, BinOp::Lt, other)
    }

    pub fn gt(&self, ctx: &mut ExpressionContext<'_, '_>, other: &TypedValue) -> ConvertResult {
        self.convert_bin_op(ctx, BinOp::Gt, other)
    }

    pub fn bitand(&self, ctx: &mut ExpressionContext<'_, '_>, other: &TypedValue) -> ConvertResult {
        self.convert_bin_op(ctx, BinOp::BitAnd, other)
    }

    pub fn bitor(&self, ctx: &mut ExpressionContext<'_, '_>, other: &TypedValue) -> ConvertResult {
        self.convert_bin_op(ctx, BinOp::BitOr, other)
    }
}
