//! Builtin functions: `len`, `abs`, `min`, `max`, `ord`, `chr`, `sum`

use typed_native_runtime::{strings, ExceptionKind, Value};

use super::{Wrapper, WrapperRef};
use crate::convert::{arity_error, ExpressionContext};
use crate::error::conversion_error;
use crate::native::{NativeExpr, NativeType, NativeUnaryOp};
use crate::runtime_functions as rt;
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::{Builtin, TypeKey};

/// Copy `initial` into a new temporary of `wrapper`'s type; returns its
/// address, or `None` if control does not continue.
fn hold(ctx: &mut ExpressionContext<'_, '_>, wrapper: &WrapperRef, initial: &TypedValue) -> CResult<Option<NativeExpr>> {
    let Some(value) = initial.convert_to_type(ctx, wrapper)? else {
        return Ok(None);
    };
    let value = ctx.ensure_reference(value)?;
    let (slot, tag) = ctx.declare_temp(wrapper)?;
    let init = wrapper.copy_initialize(ctx.session(), slot.clone(), value.nonref_expr())?;
    ctx.push_effect(init);
    ctx.activate(tag);
    Ok(Some(slot))
}

/// Overwrite the temporary at `slot` with `value`.
fn replace(ctx: &mut ExpressionContext<'_, '_>, wrapper: &WrapperRef, slot: &NativeExpr, value: &TypedValue) -> CResult<bool> {
    let Some(value) = value.convert_to_type(ctx, wrapper)? else {
        return Ok(false);
    };
    let value = ctx.ensure_reference(value)?;
    let assign = wrapper.assign(ctx.session(), slot.clone(), value.nonref_expr())?;
    ctx.push_effect(assign);
    Ok(true)
}

/// Common type of `min`/`max` candidates. Mixed arithmetic candidates are
/// compared and returned as floats.
fn candidate_type(keys: &[TypeKey]) -> TypeKey {
    let Some(first) = keys.first() else {
        return TypeKey::Object;
    };
    if keys.iter().all(|key| key == first) {
        return first.clone();
    }
    if keys.iter().all(TypeKey::is_arithmetic) {
        if keys.contains(&TypeKey::Float) {
            return TypeKey::Float;
        }
        return TypeKey::Int;
    }
    TypeKey::Object
}

#[derive(Debug)]
pub struct BuiltinWrapper {
    key: TypeKey,
    builtin: Builtin,
}

impl BuiltinWrapper {
    pub fn new(builtin: Builtin) -> Self {
        Self {
            key: TypeKey::Builtin(builtin),
            builtin,
        }
    }

    fn abs(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        if ctx.constant_folding() {
            match &value.constant {
                Some(Value::Int(i)) => return Ok(Some(ctx.constant_int(i.wrapping_abs()))),
                Some(Value::Bool(b)) => return Ok(Some(ctx.constant_int(i64::from(*b)))),
                Some(Value::Float(f)) => return Ok(Some(ctx.constant_float(f.abs()))),
                _ => {}
            }
        }
        match value.key() {
            TypeKey::Float => {
                let call = rt::float_unary_intrinsic("fabs64").call(vec![value.nonref_expr()]);
                Ok(Some(ctx.float_value(call)))
            }
            TypeKey::Int | TypeKey::Bool => {
                let Some(int) = value.convert_int_cast(ctx)? else {
                    return Ok(None);
                };
                let x = int.nonref_expr();
                let negated = NativeExpr::Unaryop {
                    op: NativeUnaryOp::Negate,
                    operand: Box::new(x.clone()),
                };
                Ok(Some(ctx.int_value(NativeExpr::branch(
                    x.clone().lt(NativeExpr::int(0)),
                    negated,
                    x,
                ))))
            }
            TypeKey::Object => conversion_error("abs() of a value of static type 'object' is not supported"),
            _ => ctx.push_exception(
                ExceptionKind::TypeError,
                &format!("bad operand type for abs(): '{}'", value.wrapper.type_name()),
            ),
        }
    }

    /// Whether `candidate` should replace `best`.
    fn better(&self, ctx: &mut ExpressionContext<'_, '_>, candidate: &TypedValue, best: &TypedValue) -> CResult<Option<NativeExpr>> {
        let compared = if self.builtin == Builtin::Min {
            candidate.lt(ctx, best)?
        } else {
            candidate.gt(ctx, best)?
        };
        let Some(compared) = compared else {
            return Ok(None);
        };
        let Some(truth) = compared.convert_bool_cast(ctx)? else {
            return Ok(None);
        };
        Ok(Some(truth.nonref_expr()))
    }

    fn min_max(&self, ctx: &mut ExpressionContext<'_, '_>, args: &[TypedValue]) -> ConvertResult {
        let name = self.builtin.name();
        match args {
            [] => ctx.push_exception(
                ExceptionKind::TypeError,
                &format!("{} expected at least 1 argument, got 0", name),
            ),
            [iterable] => self.min_max_iterable(ctx, iterable),
            _ => {
                let keys: Vec<TypeKey> = args.iter().map(|arg| arg.key().clone()).collect();
                let wrapper = ctx.wrapper(&candidate_type(&keys));
                let Some(slot) = hold(ctx, &wrapper, &args[0])? else {
                    return Ok(None);
                };
                let best = TypedValue::new(slot.clone(), wrapper.clone(), true);
                for candidate in &args[1..] {
                    let Some(candidate) = candidate.convert_to_type(ctx, &wrapper)? else {
                        return Ok(None);
                    };
                    let Some(better) = self.better(ctx, &candidate, &best)? else {
                        return Ok(None);
                    };
                    let (update, _) = ctx.capture(|ctx| replace(ctx, &wrapper, &slot, &candidate))?;
                    ctx.push_effect(NativeExpr::when(better, update));
                }
                Ok(Some(best))
            }
        }
    }

    fn min_max_iterable(&self, ctx: &mut ExpressionContext<'_, '_>, iterable: &TypedValue) -> ConvertResult {
        let Some(iterator) = iterable.convert_iter(ctx)? else {
            return Ok(None);
        };
        let iterator = ctx.ensure_reference(iterator)?;
        let Some((first, more)) = iterator.convert_next(ctx)? else {
            return Ok(None);
        };
        ctx.raise_if(
            more.logical_not(),
            ExceptionKind::ValueError,
            &format!("{}() arg is an empty sequence", self.builtin.name()),
        );
        let wrapper = first.wrapper.clone();
        let first = ctx.ensure_reference(first)?;
        let Some(slot) = hold(ctx, &wrapper, &first)? else {
            return Ok(None);
        };
        let best = TypedValue::new(slot.clone(), wrapper.clone(), true);
        let iterated = ctx.for_each(&iterator, |ctx, candidate| {
            let Some(better) = self.better(ctx, &candidate, &best)? else {
                return Ok(());
            };
            let (update, _) = ctx.capture(|ctx| replace(ctx, &wrapper, &slot, &candidate))?;
            ctx.push_effect(NativeExpr::when(better, update));
            Ok(())
        })?;
        Ok(iterated.then_some(best))
    }

    fn sum(&self, ctx: &mut ExpressionContext<'_, '_>, args: &[TypedValue]) -> ConvertResult {
        let (iterable, start) = match args {
            [iterable] => (iterable, None),
            [iterable, start] => (iterable, Some(start)),
            _ => {
                return ctx.push_exception(
                    ExceptionKind::TypeError,
                    &format!("sum() takes at most 2 arguments ({} given)", args.len()),
                )
            }
        };
        let start = match start {
            Some(start) => start.clone(),
            None => ctx.constant_int(0),
        };
        if start.key() == &TypeKey::Str {
            return ctx.push_exception(
                ExceptionKind::TypeError,
                "sum() can't sum strings [use ''.join(seq) instead]",
            );
        }
        let element = iterable.wrapper.iterated_type();
        let total_key = match (element.as_ref(), start.key()) {
            (None, _) => {
                if iterable.convert_iter(ctx)?.is_none() {
                    return Ok(None);
                }
                return conversion_error(format!("sum() over '{}' is not supported", iterable.key()));
            }
            (Some(TypeKey::Object), _) | (_, TypeKey::Object) => TypeKey::Object,
            (Some(TypeKey::Float), s) if s.is_arithmetic() => TypeKey::Float,
            (Some(TypeKey::Int | TypeKey::Bool), TypeKey::Float) => TypeKey::Float,
            (Some(TypeKey::Int | TypeKey::Bool), TypeKey::Int | TypeKey::Bool) => TypeKey::Int,
            (Some(other), s) => {
                return ctx.push_exception(
                    ExceptionKind::TypeError,
                    &format!(
                        "unsupported operand type(s) for +: '{}' and '{}'",
                        s.python_name(),
                        other.python_name()
                    ),
                )
            }
        };
        let wrapper = ctx.wrapper(&total_key);
        let Some(slot) = hold(ctx, &wrapper, &start)? else {
            return Ok(None);
        };
        let total = TypedValue::new(slot.clone(), wrapper.clone(), true);
        let iterated = ctx.for_each(iterable, |ctx, item| {
            let Some(next) = total.convert_bin_op(ctx, typed_native_runtime::BinOp::Add, &item)? else {
                return Ok(());
            };
            replace(ctx, &wrapper, &slot, &next)?;
            Ok(())
        })?;
        Ok(iterated.then_some(total))
    }

    fn ord(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        if value.key() != &TypeKey::Str {
            return ctx.push_exception(
                ExceptionKind::TypeError,
                &format!(
                    "ord() expected string of length 1, but {} found",
                    value.wrapper.type_name()
                ),
            );
        }
        if let Some(Value::Str(s)) = &value.constant {
            if let (true, Ok(code)) = (ctx.constant_folding(), strings::ord(s)) {
                return Ok(Some(ctx.constant_int(code)));
            }
        }
        let int = ctx.wrapper(&TypeKey::Int);
        Ok(Some(ctx.push_pod(&int, rt::str_ord().call(vec![value.nonref_expr()]))))
    }

    fn chr(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        if !matches!(value.key(), TypeKey::Int | TypeKey::Bool) {
            return ctx.push_exception(
                ExceptionKind::TypeError,
                &format!(
                    "'{}' object cannot be interpreted as an integer",
                    value.wrapper.type_name()
                ),
            );
        }
        if let Some(code) = value.constant_int() {
            if let (true, Ok(text)) = (ctx.constant_folding(), strings::chr(code)) {
                return Ok(Some(ctx.constant_str(&text)?));
            }
        }
        let code = match value.key() {
            TypeKey::Int => value.nonref_expr(),
            _ => value.nonref_expr().cast(NativeType::int64()),
        };
        let string = ctx.wrapper(&TypeKey::Str);
        Ok(Some(ctx.push_owned(&string, rt::str_chr().call(vec![code]))?))
    }
}

impl Wrapper for BuiltinWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        NativeType::Void
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn convert_call(&self, ctx: &mut ExpressionContext<'_, '_>, _callee: &TypedValue, args: &[TypedValue]) -> ConvertResult {
        let name = self.builtin.name();
        match self.builtin {
            Builtin::Min | Builtin::Max => self.min_max(ctx, args),
            Builtin::Sum => self.sum(ctx, args),
            _ => {
                let [arg] = args else {
                    return arity_error(ctx, name, "exactly one argument", args.len());
                };
                match self.builtin {
                    Builtin::Len => arg.convert_len(ctx),
                    Builtin::Abs => self.abs(ctx, arg),
                    Builtin::Ord => self.ord(ctx, arg),
                    _ => self.chr(ctx, arg),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_type() {
        assert_eq!(candidate_type(&[TypeKey::Int, TypeKey::Int]), TypeKey::Int);
        assert_eq!(candidate_type(&[TypeKey::Bool, TypeKey::Int]), TypeKey::Int);
        assert_eq!(candidate_type(&[TypeKey::Int, TypeKey::Float]), TypeKey::Float);
        assert_eq!(candidate_type(&[TypeKey::Str, TypeKey::Str]), TypeKey::Str);
        assert_eq!(candidate_type(&[TypeKey::Str, TypeKey::Int]), TypeKey::Object);
    }
}
