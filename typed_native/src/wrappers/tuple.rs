//! Fixed-size heterogeneous tuples
//!
//! A tuple is a struct with one field per element, so its static type
//! records every element type and indexing is only possible with a
//! constant index. A tuple is POD exactly when all of its elements are.

use typed_native_runtime::{BinOp, ExceptionKind};

use super::{unsupported_bin_op, Wrapper, WrapperRef};
use crate::convert::ExpressionContext;
use crate::driver::CompilationSession;
use crate::error::conversion_error;
use crate::native::{NativeBinaryOp, NativeExpr, NativeType};
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::TypeKey;

/// `(a, b, ...)`: a new tuple holding copies of `values`.
pub(crate) fn build_tuple(ctx: &mut ExpressionContext<'_, '_>, values: &[TypedValue]) -> ConvertResult {
    let key = TypeKey::Tuple(values.iter().map(|v| v.key().clone()).collect());
    let wrapper = ctx.wrapper(&key);
    let mut sources = Vec::with_capacity(values.len());
    for value in values {
        let value = if value.is_pod() {
            value.clone()
        } else {
            ctx.ensure_reference(value.clone())?
        };
        sources.push(value);
    }
    let tuple = ctx.push(&wrapper, |ctx, slot| {
        let mut init = Vec::with_capacity(sources.len());
        for (i, source) in sources.iter().enumerate() {
            if source.is_empty() {
                continue;
            }
            let element = source.wrapper.clone();
            init.push(element.copy_initialize(ctx.session(), slot.clone().field(i), source.nonref_expr())?);
        }
        Ok(NativeExpr::sequence(init))
    })?;
    Ok(Some(tuple))
}

#[derive(Debug)]
pub struct TupleWrapper {
    key: TypeKey,
    elements: Vec<WrapperRef>,
}

impl TupleWrapper {
    pub fn new(key: TypeKey, elements: Vec<WrapperRef>) -> Self {
        Self { key, elements }
    }

    /// Element `index` of a tuple that already has storage.
    fn element(&self, tuple: &TypedValue, index: usize) -> TypedValue {
        let wrapper = self.elements[index].clone();
        if wrapper.is_empty() {
            return TypedValue::empty(wrapper);
        }
        TypedValue::new(tuple.expr.clone().field(index), wrapper, true)
    }

    /// Combine per-element truth values with a native `&` or `|`.
    fn combine(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        parts: Vec<TypedValue>,
        op: NativeBinaryOp,
        empty: bool,
    ) -> ConvertResult {
        let mut combined: Option<NativeExpr> = None;
        for part in parts {
            let Some(truth) = part.convert_bool_cast(ctx)? else {
                return Ok(None);
            };
            let truth = truth.nonref_expr();
            combined = Some(match combined {
                None => truth,
                Some(previous) => previous.binop(op, truth),
            });
        }
        match combined {
            Some(expr) => {
                let bool_wrapper = ctx.wrapper(&TypeKey::Bool);
                Ok(Some(ctx.push_pod(&bool_wrapper, expr)))
            }
            None => Ok(Some(ctx.constant_bool(empty))),
        }
    }
}

impl Wrapper for TupleWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        NativeType::Struct(
            self.elements
                .iter()
                .enumerate()
                .map(|(i, element)| (format!("e{}", i), element.layout()))
                .collect(),
        )
    }

    fn is_pod(&self) -> bool {
        self.elements.iter().all(|element| element.is_pod())
    }

    fn copy_initialize(
        &self,
        session: &mut CompilationSession,
        target: NativeExpr,
        source: NativeExpr,
    ) -> CResult<NativeExpr> {
        if self.is_pod() {
            return Ok(target.store(source));
        }
        let mut init = Vec::with_capacity(self.elements.len());
        for (i, element) in self.elements.iter().enumerate() {
            if element.is_empty() {
                continue;
            }
            init.push(element.copy_initialize(session, target.clone().field(i), source.clone().extract(i))?);
        }
        Ok(NativeExpr::sequence(init))
    }

    fn assign(&self, session: &mut CompilationSession, target: NativeExpr, source: NativeExpr) -> CResult<NativeExpr> {
        if self.is_pod() {
            return Ok(target.store(source));
        }
        let stash = NativeExpr::slot(".assign_tuple", self.layout());
        Ok(NativeExpr::sequence(vec![
            self.copy_initialize(session, stash.clone(), source)?,
            self.destroy(session, target.clone())?,
            target.store(stash.load()),
        ]))
    }

    fn destroy(&self, session: &mut CompilationSession, target: NativeExpr) -> CResult<NativeExpr> {
        let mut teardown = Vec::new();
        for (i, element) in self.elements.iter().enumerate() {
            if !element.is_pod() {
                teardown.push(element.destroy(session, target.clone().field(i))?);
            }
        }
        Ok(NativeExpr::sequence(teardown))
    }

    fn convert_getitem(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, index: &TypedValue) -> ConvertResult {
        if !matches!(index.key(), TypeKey::Int | TypeKey::Bool) {
            return ctx.push_exception(
                ExceptionKind::TypeError,
                &format!(
                    "tuple indices must be integers or slices, not {}",
                    index.wrapper.type_name()
                ),
            );
        }
        let Some(raw) = index.constant_int() else {
            return conversion_error(format!(
                "a value of type '{}' can only be indexed with a constant",
                self.key
            ));
        };
        let len = self.elements.len() as i64;
        let position = if raw < 0 { raw + len } else { raw };
        if position < 0 || position >= len {
            return conversion_error(format!("tuple index {} out of range for '{}'", raw, self.key));
        }
        let tuple = ctx.ensure_reference(value.clone())?;
        Ok(Some(self.element(&tuple, position as usize)))
    }

    fn convert_len(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        Ok(Some(ctx.constant_int(self.elements.len() as i64)))
    }

    fn convert_bool_cast(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        Ok(Some(ctx.constant_bool(!self.elements.is_empty())))
    }

    fn convert_contains(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        container: &TypedValue,
        item: &TypedValue,
    ) -> ConvertResult {
        let tuple = ctx.ensure_reference(container.clone())?;
        let mut parts = Vec::with_capacity(self.elements.len());
        for i in 0..self.elements.len() {
            let element = self.element(&tuple, i);
            let Some(same) = element.eq(ctx, item)? else {
                return Ok(None);
            };
            parts.push(same);
        }
        self.combine(ctx, parts, NativeBinaryOp::BitOr, false)
    }

    fn convert_bin_op(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        left: &TypedValue,
        op: BinOp,
        right: &TypedValue,
    ) -> ConvertResult {
        let TypeKey::Tuple(others) = right.key() else {
            return unsupported_bin_op(ctx, left, op, right);
        };
        if !matches!(op, BinOp::Eq | BinOp::NotEq) {
            return unsupported_bin_op(ctx, left, op, right);
        }
        let equal = if others.len() != self.elements.len() {
            ctx.constant_bool(false)
        } else {
            let a = ctx.ensure_reference(left.clone())?;
            let b = ctx.ensure_reference(right.clone())?;
            let other = b.wrapper.clone();
            let mut parts = Vec::with_capacity(self.elements.len());
            for i in 0..self.elements.len() {
                let index = ctx.constant_int(i as i64);
                let x = self.element(&a, i);
                let Some(y) = other.convert_getitem(ctx, &b, &index)? else {
                    return Ok(None);
                };
                let Some(same) = x.eq(ctx, &y)? else {
                    return Ok(None);
                };
                parts.push(same);
            }
            let Some(equal) = self.combine(ctx, parts, NativeBinaryOp::BitAnd, true)? else {
                return Ok(None);
            };
            equal
        };
        if op == BinOp::Eq {
            return Ok(Some(equal));
        }
        match equal.constant_bool() {
            Some(b) => Ok(Some(ctx.constant_bool(!b))),
            None => Ok(Some(ctx.bool_value(equal.nonref_expr().logical_not()))),
        }
    }

    fn convert_iter(&self, _ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue) -> ConvertResult {
        conversion_error(format!(
            "iterating over '{}' is not supported; its elements have different static types",
            self.key
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrappers::TypeRegistry;

    #[test]
    fn test_layout_fields_follow_elements() {
        let mut registry = TypeRegistry::new();
        let key = TypeKey::Tuple(vec![TypeKey::Int, TypeKey::Str, TypeKey::Float]);
        let tuple = registry.get(&key);
        let NativeType::Struct(fields) = tuple.layout() else {
            panic!("tuple layout must be a struct");
        };
        let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["e0", "e1", "e2"]);
        assert_eq!(fields[1].1, registry.get(&TypeKey::Str).layout());
    }
}
