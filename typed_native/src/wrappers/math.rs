//! The `math` module
//!
//! `math` is bound as a free variable; attribute access on it yields either
//! a float constant or a function value with no storage. Function calls
//! lower to IEEE intrinsics guarded by explicit domain checks. Every check
//! is phrased as a comparison that is false for NaN, so NaN arguments flow
//! through to a NaN result as they do in CPython.

use typed_native_runtime::ExceptionKind;

use super::Wrapper;
use crate::convert::{arity_error, ExpressionContext};
use crate::native::{NativeBinaryOp, NativeExpr, NativeType};
use crate::runtime_functions as rt;
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::{Module, TypeKey};

const DOMAIN_ERROR: &str = "math domain error";
const RANGE_ERROR: &str = "math range error";

/// Argument values for which a unary function raises `ValueError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Domain {
    Any,
    /// `x < 0`
    NonNegative,
    /// `x <= 0`
    Positive,
    /// `x <= -1`
    AboveMinusOne,
    /// `x < -1 or x > 1`
    Unit,
    /// `x < 1`
    AtLeastOne,
    /// `x <= -1 or x >= 1`
    OpenUnit,
    /// `x` infinite
    Finite,
}

/// `(name, extern, domain, can overflow)`
const UNARY: &[(&str, &str, Domain, bool)] = &[
    ("sqrt", "sqrt64", Domain::NonNegative, false),
    ("exp", "exp64", Domain::Any, true),
    ("expm1", "expm1_64", Domain::Any, true),
    ("log2", "log2_64", Domain::Positive, false),
    ("log10", "log10_64", Domain::Positive, false),
    ("log1p", "log1p64", Domain::AboveMinusOne, false),
    ("sin", "sin64", Domain::Finite, false),
    ("cos", "cos64", Domain::Finite, false),
    ("tan", "tan64", Domain::Finite, false),
    ("asin", "asin64", Domain::Unit, false),
    ("acos", "acos64", Domain::Unit, false),
    ("atan", "atan64", Domain::Any, false),
    ("sinh", "sinh64", Domain::Any, true),
    ("cosh", "cosh64", Domain::Any, true),
    ("tanh", "tanh64", Domain::Any, false),
    ("asinh", "asinh64", Domain::Any, false),
    ("acosh", "acosh64", Domain::AtLeastOne, false),
    ("atanh", "atanh64", Domain::OpenUnit, false),
    ("fabs", "fabs64", Domain::Any, false),
    ("degrees", "degrees64", Domain::Any, false),
    ("radians", "radians64", Domain::Any, false),
];

const BINARY: &[(&str, &str)] = &[
    ("atan2", "atan2_64"),
    ("copysign", "copysign64"),
    ("hypot", "hypot64"),
];

const OTHER_FUNCTIONS: &[&str] = &[
    "log", "floor", "ceil", "trunc", "factorial", "gcd", "isnan", "isinf", "isfinite", "pow", "fsum",
];

fn constant(name: &str) -> Option<f64> {
    Some(match name {
        "pi" => std::f64::consts::PI,
        "e" => std::f64::consts::E,
        "tau" => std::f64::consts::TAU,
        "inf" => f64::INFINITY,
        "nan" => f64::NAN,
        _ => return None,
    })
}

fn is_function(name: &str) -> bool {
    UNARY.iter().any(|(n, ..)| *n == name) || BINARY.iter().any(|(n, _)| *n == name) || OTHER_FUNCTIONS.contains(&name)
}

fn or(a: NativeExpr, b: NativeExpr) -> NativeExpr {
    a.binop(NativeBinaryOp::BitOr, b)
}

fn and(a: NativeExpr, b: NativeExpr) -> NativeExpr {
    a.binop(NativeBinaryOp::BitAnd, b)
}

fn float(value: f64) -> NativeExpr {
    NativeExpr::float(value)
}

/// The condition under which `x` is outside `domain`.
fn outside(domain: Domain, x: &NativeExpr) -> Option<NativeExpr> {
    let x = x.clone();
    Some(match domain {
        Domain::Any => return None,
        Domain::NonNegative => x.lt(float(0.0)),
        Domain::Positive => x.binop(NativeBinaryOp::LtE, float(0.0)),
        Domain::AboveMinusOne => x.binop(NativeBinaryOp::LtE, float(-1.0)),
        Domain::Unit => or(x.clone().lt(float(-1.0)), x.gt(float(1.0))),
        Domain::AtLeastOne => x.lt(float(1.0)),
        Domain::OpenUnit => or(
            x.clone().binop(NativeBinaryOp::LtE, float(-1.0)),
            x.ge(float(1.0)),
        ),
        Domain::Finite => is_infinite(&x),
    })
}

fn is_infinite(x: &NativeExpr) -> NativeExpr {
    or(
        x.clone().eq(float(f64::INFINITY)),
        x.clone().eq(float(f64::NEG_INFINITY)),
    )
}

#[derive(Debug)]
pub struct ModuleWrapper {
    key: TypeKey,
    module: Module,
}

impl ModuleWrapper {
    pub fn new(module: Module) -> Self {
        Self {
            key: TypeKey::Module(module),
            module,
        }
    }
}

impl Wrapper for ModuleWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        NativeType::Void
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn convert_attribute(&self, ctx: &mut ExpressionContext<'_, '_>, _value: &TypedValue, attr: &str) -> ConvertResult {
        match self.module {
            Module::Math => {
                if let Some(value) = constant(attr) {
                    return Ok(Some(ctx.constant_float(value)));
                }
                if is_function(attr) {
                    return Ok(Some(ctx.empty_value(&TypeKey::MathFunction(attr.to_string()))));
                }
            }
        }
        ctx.push_exception(
            ExceptionKind::AttributeError,
            &format!("module '{}' has no attribute '{}'", self.module.name(), attr),
        )
    }
}

#[derive(Debug)]
pub struct MathFunctionWrapper {
    key: TypeKey,
    name: String,
}

impl MathFunctionWrapper {
    pub fn new(name: String) -> Self {
        Self {
            key: TypeKey::MathFunction(name.clone()),
            name,
        }
    }

    fn qualified(&self) -> String {
        format!("math.{}", self.name)
    }

    /// A float operand, evaluated once. `None` if a `TypeError` was raised.
    fn real(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> CResult<Option<NativeExpr>> {
        if !value.key().is_arithmetic() && value.key() != &TypeKey::Object {
            ctx.push_exception(
                ExceptionKind::TypeError,
                &format!("must be real number, not {}", value.wrapper.type_name()),
            )?;
            return Ok(None);
        }
        let Some(float) = value.convert_float_cast(ctx)? else {
            return Ok(None);
        };
        let wrapper = float.wrapper.clone();
        Ok(Some(ctx.push_pod(&wrapper, float.nonref_expr()).nonref_expr()))
    }

    fn integer(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> CResult<Option<NativeExpr>> {
        if !matches!(value.key(), TypeKey::Int | TypeKey::Bool) {
            ctx.push_exception(
                ExceptionKind::TypeError,
                &format!(
                    "'{}' object cannot be interpreted as an integer",
                    value.wrapper.type_name()
                ),
            )?;
            return Ok(None);
        }
        let Some(int) = value.convert_int_cast(ctx)? else {
            return Ok(None);
        };
        Ok(Some(int.nonref_expr()))
    }

    fn float_result(&self, ctx: &mut ExpressionContext<'_, '_>, expr: NativeExpr) -> TypedValue {
        let wrapper = ctx.wrapper(&TypeKey::Float);
        ctx.push_pod(&wrapper, expr)
    }

    fn unary(&self, ctx: &mut ExpressionContext<'_, '_>, target: &str, domain: Domain, overflows: bool, arg: &TypedValue) -> ConvertResult {
        let Some(x) = self.real(ctx, arg)? else {
            return Ok(None);
        };
        if let Some(cond) = outside(domain, &x) {
            ctx.raise_if(cond, ExceptionKind::ValueError, DOMAIN_ERROR);
        }
        let result = self.float_result(ctx, rt::float_unary_intrinsic(target).call(vec![x.clone()]));
        if overflows {
            // a finite argument with an infinite result
            let r = result.nonref_expr();
            ctx.raise_if(
                and(is_infinite(&r), x.clone().sub(x).eq(float(0.0))),
                ExceptionKind::OverflowError,
                RANGE_ERROR,
            );
        }
        Ok(Some(result))
    }

    fn log(&self, ctx: &mut ExpressionContext<'_, '_>, args: &[TypedValue]) -> ConvertResult {
        let log = rt::float_unary_intrinsic("log64");
        match args {
            [value] => self.unary(ctx, "log64", Domain::Positive, false, value),
            [value, base] => {
                let Some(x) = self.real(ctx, value)? else {
                    return Ok(None);
                };
                let Some(b) = self.real(ctx, base)? else {
                    return Ok(None);
                };
                ctx.raise_if(
                    or(
                        x.clone().binop(NativeBinaryOp::LtE, float(0.0)),
                        b.clone().binop(NativeBinaryOp::LtE, float(0.0)),
                    ),
                    ExceptionKind::ValueError,
                    DOMAIN_ERROR,
                );
                ctx.raise_if(
                    b.clone().eq(float(1.0)),
                    ExceptionKind::ZeroDivisionError,
                    "float division by zero",
                );
                let quotient = log
                    .call(vec![x])
                    .binop(NativeBinaryOp::Div, log.call(vec![b]));
                Ok(Some(self.float_result(ctx, quotient)))
            }
            _ => arity_error(ctx, &self.qualified(), "1 or 2 arguments", args.len()),
        }
    }

    /// `floor`, `ceil` and `trunc` return ints.
    fn rounding(&self, ctx: &mut ExpressionContext<'_, '_>, target: &str, arg: &TypedValue) -> ConvertResult {
        if matches!(arg.key(), TypeKey::Int | TypeKey::Bool) {
            return arg.convert_int_cast(ctx);
        }
        let Some(x) = self.real(ctx, arg)? else {
            return Ok(None);
        };
        let rounded = rt::float_unary_intrinsic(target).call(vec![x]);
        let int = ctx.wrapper(&TypeKey::Int);
        Ok(Some(ctx.push_pod(&int, rt::float64_to_int().call(vec![rounded]))))
    }

    fn factorial(&self, ctx: &mut ExpressionContext<'_, '_>, arg: &TypedValue) -> ConvertResult {
        let n = match arg.key() {
            TypeKey::Float => {
                let Some(x) = self.real(ctx, arg)? else {
                    return Ok(None);
                };
                let floor = rt::float_unary_intrinsic("floor64").call(vec![x.clone()]);
                ctx.raise_if(
                    or(x.clone().ne(floor), is_infinite(&x)),
                    ExceptionKind::ValueError,
                    "factorial() only accepts integral values",
                );
                let int = ctx.wrapper(&TypeKey::Int);
                ctx.push_pod(&int, rt::float64_to_int().call(vec![x])).nonref_expr()
            }
            _ => {
                let Some(n) = self.integer(ctx, arg)? else {
                    return Ok(None);
                };
                n
            }
        };
        let int = ctx.wrapper(&TypeKey::Int);
        Ok(Some(ctx.push_pod(&int, rt::math_factorial().call(vec![n]))))
    }

    fn classify(&self, ctx: &mut ExpressionContext<'_, '_>, arg: &TypedValue) -> ConvertResult {
        let Some(x) = self.real(ctx, arg)? else {
            return Ok(None);
        };
        let test = match self.name.as_str() {
            "isnan" => x.clone().ne(x),
            "isinf" => is_infinite(&x),
            // x - x is 0 for finite x and NaN otherwise
            _ => x.clone().sub(x).eq(float(0.0)),
        };
        Ok(Some(ctx.bool_value(test)))
    }

    fn fsum(&self, ctx: &mut ExpressionContext<'_, '_>, iterable: &TypedValue) -> ConvertResult {
        let accumulator = ctx.push_resource(rt::fsum_handle(), rt::fsum_new().call(vec![]), |handle| {
            rt::fsum_free().call(vec![handle])
        });
        let iterated = ctx.for_each(iterable, |ctx, item| {
            let Some(x) = self.real(ctx, &item)? else {
                return Ok(());
            };
            ctx.push_effect(rt::fsum_add().call(vec![accumulator.clone().load(), x]));
            Ok(())
        })?;
        if !iterated {
            return Ok(None);
        }
        Ok(Some(self.float_result(ctx, rt::fsum_total().call(vec![accumulator.load()]))))
    }
}

impl Wrapper for MathFunctionWrapper {
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
        let name = self.name.as_str();
        if name == "log" {
            return self.log(ctx, args);
        }
        if let Some((_, target)) = BINARY.iter().find(|(n, _)| *n == name) {
            let [a, b] = args else {
                return arity_error(ctx, &self.qualified(), "exactly 2 arguments", args.len());
            };
            let Some(x) = self.real(ctx, a)? else {
                return Ok(None);
            };
            let Some(y) = self.real(ctx, b)? else {
                return Ok(None);
            };
            return Ok(Some(self.float_result(ctx, rt::float_binary_intrinsic(target).call(vec![x, y]))));
        }
        match (name, args) {
            ("gcd", [a, b]) => {
                let Some(a) = self.integer(ctx, a)? else {
                    return Ok(None);
                };
                let Some(b) = self.integer(ctx, b)? else {
                    return Ok(None);
                };
                Ok(Some(ctx.int_value(rt::math_gcd().call(vec![a, b]))))
            }
            ("gcd", _) => arity_error(ctx, &self.qualified(), "exactly 2 arguments", args.len()),
            ("pow", [a, b]) => {
                let Some(x) = self.real(ctx, a)? else {
                    return Ok(None);
                };
                let Some(y) = self.real(ctx, b)? else {
                    return Ok(None);
                };
                Ok(Some(self.float_result(ctx, rt::math_pow().call(vec![x, y]))))
            }
            ("pow", _) => arity_error(ctx, &self.qualified(), "exactly 2 arguments", args.len()),
            (_, [arg]) => match name {
                "floor" => self.rounding(ctx, "floor64", arg),
                "ceil" => self.rounding(ctx, "ceil64", arg),
                "trunc" => self.rounding(ctx, "trunc64", arg),
                "factorial" => self.factorial(ctx, arg),
                "isnan" | "isinf" | "isfinite" => self.classify(ctx, arg),
                "fsum" => self.fsum(ctx, arg),
                _ => match UNARY.iter().find(|(n, ..)| *n == name) {
                    Some((_, target, domain, overflows)) => self.unary(ctx, target, *domain, *overflows, arg),
                    None => ctx.push_exception(
                        ExceptionKind::AttributeError,
                        &format!("module 'math' has no attribute '{}'", name),
                    ),
                },
            },
            _ => arity_error(ctx, &self.qualified(), "exactly one argument", args.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_unary_function_has_an_intrinsic() {
        for (name, target, ..) in UNARY {
            assert!(
                typed_native_runtime::intrinsics::unary_float_function(target).is_some(),
                "math.{} lowers to missing intrinsic {}",
                name,
                target
            );
        }
        for (_, target) in BINARY {
            assert!(typed_native_runtime::intrinsics::binary_float_function(target).is_some());
        }
    }

    #[test]
    fn test_domain_checks_are_nan_safe() {
        // every domain condition is a plain comparison on x, false for NaN
        let x = NativeExpr::variable("x");
        for domain in [Domain::NonNegative, Domain::Positive, Domain::Unit, Domain::Finite] {
            assert!(outside(domain, &x).is_some());
        }
        assert!(outside(Domain::Any, &x).is_none());
        assert!(is_function("fsum") && is_function("atan2") && !is_function("pi"));
        assert_eq!(constant("tau"), Some(std::f64::consts::TAU));
    }
}
