//! Type wrappers
//!
//! A wrapper is the code-generation strategy for one concrete type key: it
//! knows the native layout of values of that type, how to copy and destroy
//! them, and how every Python operation on them lowers to native code.
//!
//! The conversion engine never matches on types itself. It asks the typed
//! value's wrapper, and new builtin types are supported by adding a wrapper
//! here.
//!
//! Every operation follows the same protocol (see [`ConvertResult`]):
//! a value, `None` for "control does not continue", or a conversion error.
//! Operations a Python program could legitimately attempt but which fail
//! for the static types involved (e.g. `1 + "a"`) raise the Python
//! exception at run time rather than failing compilation.

mod arithmetic;
mod bound_method;
mod builtins;
mod function;
pub(crate) mod list;
mod math;
mod none;
mod object;
mod range;
pub(crate) mod refcounted;
mod string;
pub(crate) mod tuple;
mod type_object;

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use typed_native_runtime::{BinOp, ExceptionKind, UnaryOp};

use crate::convert::ExpressionContext;
use crate::driver::CompilationSession;
use crate::error::{conversion_error, ConversionError};
use crate::native::{NativeExpr, NativeType};
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::TypeKey;

pub use arithmetic::ArithmeticWrapper;
pub use bound_method::BoundMethodWrapper;
pub use builtins::BuiltinWrapper;
pub use function::FunctionWrapper;
pub use list::{ListIteratorWrapper, ListWrapper};
pub use math::{MathFunctionWrapper, ModuleWrapper};
pub use none::NoneWrapper;
pub use object::ObjectWrapper;
pub use range::{RangeIteratorWrapper, RangeWrapper};
pub use string::{StrIteratorWrapper, StrWrapper};
pub use tuple::TupleWrapper;
pub use type_object::{ExceptionTypeWrapper, TypeObjectWrapper};

pub type WrapperRef = Rc<dyn Wrapper>;

/// Code-generation strategy and layout descriptor for one type key.
///
/// Lifecycle methods (`copy_initialize`, `assign`, `destroy`) take the
/// session rather than an expression context: they are also used to build
/// standalone native helpers such as list destructors. `target` is always
/// an expression producing the address of storage with this wrapper's
/// layout; `source` is a side-effect-free expression producing a value.
pub trait Wrapper: fmt::Debug {
    fn key(&self) -> &TypeKey;

    /// Native layout of a value.
    fn layout(&self) -> NativeType;

    /// Copyable and destroyable with no side effects.
    fn is_pod(&self) -> bool {
        true
    }

    /// Has no native representation at all (functions, modules, `None`).
    fn is_empty(&self) -> bool {
        false
    }

    fn is_pass_by_ref(&self) -> bool {
        !self.is_pod()
    }

    /// Layout at the native call boundary.
    fn passing_layout(&self) -> NativeType {
        if self.is_pass_by_ref() {
            self.layout().pointer()
        } else {
            self.layout()
        }
    }

    fn type_name(&self) -> String {
        self.key().python_name()
    }

    /// Element type produced by iterating a value of this type.
    fn iterated_type(&self) -> Option<TypeKey> {
        None
    }

    // ========== Lifecycle ==========

    /// Initialize uninitialized storage at `target` with a copy of `source`.
    fn copy_initialize(
        &self,
        _session: &mut CompilationSession,
        target: NativeExpr,
        source: NativeExpr,
    ) -> CResult<NativeExpr> {
        if self.is_empty() {
            return Ok(NativeExpr::void());
        }
        Ok(target.store(source))
    }

    /// Replace the initialized value at `target` with a copy of `source`.
    fn assign(
        &self,
        session: &mut CompilationSession,
        target: NativeExpr,
        source: NativeExpr,
    ) -> CResult<NativeExpr> {
        self.copy_initialize(session, target, source)
    }

    /// Release the value at `target`. Storage holding a zero value must be
    /// accepted.
    fn destroy(&self, _session: &mut CompilationSession, _target: NativeExpr) -> CResult<NativeExpr> {
        Ok(NativeExpr::void())
    }

    // ========== Operations ==========

    fn convert_call(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        _callee: &TypedValue,
        _args: &[TypedValue],
    ) -> ConvertResult {
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!("'{}' object is not callable", self.type_name()),
        )
    }

    fn convert_attribute(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        _value: &TypedValue,
        attr: &str,
    ) -> ConvertResult {
        ctx.push_exception(
            ExceptionKind::AttributeError,
            &format!("'{}' object has no attribute '{}'", self.type_name(), attr),
        )
    }

    fn convert_method_call(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        method: &str,
        args: &[TypedValue],
    ) -> ConvertResult {
        match self.convert_attribute(ctx, value, method)? {
            Some(bound) => bound.convert_call(ctx, args),
            None => Ok(None),
        }
    }

    /// `left op right` with `left` of this type. Falls back to the right
    /// operand's reverse hook.
    fn convert_bin_op(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        left: &TypedValue,
        op: BinOp,
        right: &TypedValue,
    ) -> ConvertResult {
        right.wrapper.clone().convert_bin_op_reverse(ctx, right, op, left)
    }

    /// `left op right` with `right` of this type, after the left operand's
    /// wrapper declined.
    fn convert_bin_op_reverse(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        right: &TypedValue,
        op: BinOp,
        left: &TypedValue,
    ) -> ConvertResult {
        unsupported_bin_op(ctx, left, op, right)
    }

    fn convert_unary_op(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        op: UnaryOp,
    ) -> ConvertResult {
        if op == UnaryOp::Not {
            let Some(truth) = value.convert_bool_cast(ctx)? else {
                return Ok(None);
            };
            return Ok(Some(ctx.bool_value(truth.nonref_expr().logical_not())));
        }
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!("bad operand type for unary {}: '{}'", op.as_str(), self.type_name()),
        )
    }

    /// `item in container`
    fn convert_contains(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        _container: &TypedValue,
        _item: &TypedValue,
    ) -> ConvertResult {
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!("argument of type '{}' is not iterable", self.type_name()),
        )
    }

    fn convert_getitem(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        _value: &TypedValue,
        _index: &TypedValue,
    ) -> ConvertResult {
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!("'{}' object is not subscriptable", self.type_name()),
        )
    }

    fn convert_getslice(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        _value: &TypedValue,
        _lower: Option<&TypedValue>,
        _upper: Option<&TypedValue>,
    ) -> ConvertResult {
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!("'{}' object is not subscriptable", self.type_name()),
        )
    }

    fn convert_setitem(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        _value: &TypedValue,
        _index: &TypedValue,
        _item: &TypedValue,
    ) -> ConvertResult {
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!("'{}' object does not support item assignment", self.type_name()),
        )
    }

    fn convert_len(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!("object of type '{}' has no len()", self.type_name()),
        )
    }

    /// Python truthiness. Objects without a length are always true.
    fn convert_bool_cast(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        Ok(Some(ctx.constant_bool(true)))
    }

    fn convert_int_cast(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!(
                "int() argument must be a string, a bytes-like object or a real number, not '{}'",
                self.type_name()
            ),
        )
    }

    fn convert_float_cast(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!(
                "float() argument must be a string or a real number, not '{}'",
                self.type_name()
            ),
        )
    }

    fn convert_str_cast(&self, _ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        conversion_error(format!("str() of a '{}' value is not supported", self.type_name()))
    }

    fn convert_iter(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!("'{}' object is not iterable", self.type_name()),
        )
    }

    /// Advance the iterator stored at `iterator` (always a reference).
    ///
    /// Emits the advancing code into `ctx` and returns the item together
    /// with a boolean expression that is true while the iterator produced
    /// an item. The item's expression is only valid, and must only be
    /// evaluated, where that condition holds.
    fn convert_next(
        &self,
        _ctx: &mut ExpressionContext<'_, '_>,
        _iterator: &TypedValue,
    ) -> CResult<Option<(TypedValue, NativeExpr)>> {
        conversion_error(format!("'{}' is not an iterator", self.type_name()))
    }

    /// Implicit conversion to another type, used when a variable or return
    /// type has widened. Only boxing into `object` is available by default.
    fn convert_to_type(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        target: &WrapperRef,
    ) -> ConvertResult {
        if target.key() == self.key() {
            return Ok(Some(value.clone()));
        }
        if *target.key() == TypeKey::Object {
            return self.box_to_object(ctx, value);
        }
        Err(cannot_convert(self.key(), target.key()))
    }

    /// Wrap a value in a dynamic `object` handle.
    fn box_to_object(&self, _ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        Err(cannot_convert(self.key(), &TypeKey::Object))
    }
}

pub(crate) fn cannot_convert(from: &TypeKey, to: &TypeKey) -> ConversionError {
    ConversionError::new(format!("cannot convert a value of type '{}' to '{}'", from, to))
}

/// Python's result for an operator neither operand's type implements:
/// `==`/`!=` fall back to identity, everything else raises `TypeError`.
pub(crate) fn unsupported_bin_op(
    ctx: &mut ExpressionContext<'_, '_>,
    left: &TypedValue,
    op: BinOp,
    right: &TypedValue,
) -> ConvertResult {
    match op {
        BinOp::Eq => Ok(Some(ctx.constant_bool(false))),
        BinOp::NotEq => Ok(Some(ctx.constant_bool(true))),
        _ if op.is_comparison() => ctx.push_exception(
            ExceptionKind::TypeError,
            &format!(
                "'{}' not supported between instances of '{}' and '{}'",
                op.as_str(),
                left.wrapper.type_name(),
                right.wrapper.type_name()
            ),
        ),
        _ => ctx.push_exception(
            ExceptionKind::TypeError,
            &format!(
                "unsupported operand type(s) for {}: '{}' and '{}'",
                op.as_str(),
                left.wrapper.type_name(),
                right.wrapper.type_name()
            ),
        ),
    }
}

/// One wrapper per type key, created on first use.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    wrappers: HashMap<TypeKey, WrapperRef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &TypeKey) -> WrapperRef {
        if let Some(wrapper) = self.wrappers.get(key) {
            return wrapper.clone();
        }
        let wrapper = self.create(key);
        self.wrappers.insert(key.clone(), wrapper.clone());
        wrapper
    }

    pub fn len(&self) -> usize {
        self.wrappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }

    fn create(&mut self, key: &TypeKey) -> WrapperRef {
        match key {
            TypeKey::None => Rc::new(NoneWrapper::new()),
            TypeKey::Bool | TypeKey::Int | TypeKey::Float => Rc::new(ArithmeticWrapper::new(key.clone())),
            TypeKey::Str => Rc::new(StrWrapper::new()),
            TypeKey::StrIterator => Rc::new(StrIteratorWrapper::new(self.get(&TypeKey::Str))),
            TypeKey::Object => Rc::new(ObjectWrapper::new()),
            TypeKey::Range => Rc::new(RangeWrapper::new()),
            TypeKey::RangeIterator => Rc::new(RangeIteratorWrapper::new()),
            TypeKey::ListOf(element) => Rc::new(ListWrapper::new(self.get(element))),
            TypeKey::ListIterator(element) => {
                let list = self.get(&TypeKey::ListOf(element.clone()));
                Rc::new(ListIteratorWrapper::new(list, self.get(element)))
            }
            TypeKey::Tuple(elements) => {
                let wrappers = elements.iter().map(|element| self.get(element)).collect();
                Rc::new(TupleWrapper::new(key.clone(), wrappers))
            }
            TypeKey::TypeObject(of) => Rc::new(TypeObjectWrapper::new((**of).clone())),
            TypeKey::Function(function) => Rc::new(FunctionWrapper::new(function.clone())),
            TypeKey::Builtin(builtin) => Rc::new(BuiltinWrapper::new(*builtin)),
            TypeKey::Module(module) => Rc::new(ModuleWrapper::new(*module)),
            TypeKey::MathFunction(name) => Rc::new(MathFunctionWrapper::new(name.clone())),
            TypeKey::BoundMethod(receiver, name) => {
                Rc::new(BoundMethodWrapper::new(self.get(receiver), name.clone()))
            }
            TypeKey::ExceptionType(kind) => Rc::new(ExceptionTypeWrapper::new(*kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_memoizes() {
        let mut registry = TypeRegistry::new();
        let first = registry.get(&TypeKey::list_of(TypeKey::Str));
        let second = registry.get(&TypeKey::list_of(TypeKey::Str));
        assert!(Rc::ptr_eq(&first, &second));
        // the element wrapper was registered on the way
        assert!(Rc::ptr_eq(&registry.get(&TypeKey::Str), &registry.get(&TypeKey::Str)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_flags() {
        let mut registry = TypeRegistry::new();
        let int = registry.get(&TypeKey::Int);
        assert!(int.is_pod() && !int.is_pass_by_ref() && !int.is_empty());
        let string = registry.get(&TypeKey::Str);
        assert!(!string.is_pod() && string.is_pass_by_ref());
        assert_eq!(string.passing_layout(), string.layout().pointer());
        assert!(registry.get(&TypeKey::None).is_empty());
        let pod_tuple = registry.get(&TypeKey::Tuple(vec![TypeKey::Int, TypeKey::Float]));
        assert!(pod_tuple.is_pod());
        let tuple = registry.get(&TypeKey::Tuple(vec![TypeKey::Int, TypeKey::Str]));
        assert!(!tuple.is_pod());
    }
}
