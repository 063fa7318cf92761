//! Expression contexts
//!
//! An `ExpressionContext` collects the native code for one statement (or
//! one nested block) together with the teardowns of the temporaries it
//! creates. Finishing the context wraps the code in a `Finally` so every
//! temporary is destroyed exactly once on every exit path: each teardown
//! is guarded by a tag that is activated only after the temporary has been
//! initialized.

use typed_native_runtime::{ExceptionKind, Value};

use super::function::FunctionConverter;
use crate::driver::{CallResolution, CompilationSession, CompiledTarget};
use crate::error::{conversion_error, ConversionError};
use crate::native::{NativeExpr, NativeType, Teardown};
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::TypeKey;
use crate::value::FunctionRef;
use crate::wrappers::WrapperRef;

#[derive(Debug, Default)]
struct Frame {
    effects: Vec<NativeExpr>,
    teardowns: Vec<Teardown>,
}

#[derive(Debug)]
pub struct ExpressionContext<'a, 's> {
    pub(crate) func: &'a mut FunctionConverter<'s>,
    frames: Vec<Frame>,
}

impl<'a, 's> ExpressionContext<'a, 's> {
    pub fn new(func: &'a mut FunctionConverter<'s>) -> Self {
        Self {
            func,
            frames: vec![Frame::default()],
        }
    }

    pub fn session(&mut self) -> &mut CompilationSession {
        &mut *self.func.session
    }

    pub fn wrapper(&mut self, key: &TypeKey) -> WrapperRef {
        self.func.session.wrapper(key)
    }

    pub fn constant_folding(&self) -> bool {
        self.func.session.config().constant_folding
    }

    /// A name unique within the function being converted.
    pub fn fresh(&mut self, prefix: &str) -> String {
        self.func.counter += 1;
        format!(".{}{}", prefix, self.func.counter)
    }

    fn frame(&mut self) -> &mut Frame {
        // the base frame is never popped
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn push_effect(&mut self, expr: NativeExpr) {
        if !expr.is_void_constant() {
            self.frame().effects.push(expr);
        }
    }

    /// Fresh uninitialized storage; evaluates to its address.
    pub fn alloc_slot(&mut self, ty: NativeType) -> NativeExpr {
        let name = self.fresh("t");
        NativeExpr::slot(name, ty)
    }

    /// Evaluate `expr` once, now, into a slot.
    pub fn push_pod(&mut self, wrapper: &WrapperRef, expr: NativeExpr) -> TypedValue {
        if wrapper.is_empty() {
            self.push_effect(expr);
            return TypedValue::empty(wrapper.clone());
        }
        let slot = self.alloc_slot(wrapper.layout());
        self.push_effect(slot.clone().store(expr));
        TypedValue::new(slot, wrapper.clone(), true)
    }

    /// Create a temporary: `init` receives the address of fresh storage and
    /// returns the code initializing it. Non-POD temporaries are destroyed
    /// when the enclosing statement exits.
    pub fn push<F>(&mut self, wrapper: &WrapperRef, init: F) -> CResult<TypedValue>
    where
        F: FnOnce(&mut Self, NativeExpr) -> CResult<NativeExpr>,
    {
        let (slot, tag) = self.declare_temp(wrapper)?;
        let initializer = init(self, slot.clone())?;
        self.push_effect(initializer);
        self.activate(tag);
        Ok(TypedValue::new(slot, wrapper.clone(), true))
    }

    /// Storage for a temporary that is initialized later, possibly on only
    /// some paths. The returned tag (none for POD types) must be activated
    /// once the storage holds a value on every path that continues.
    pub fn declare_temp(&mut self, wrapper: &WrapperRef) -> CResult<(NativeExpr, Option<String>)> {
        let slot = self.alloc_slot(wrapper.layout());
        if wrapper.is_pod() {
            return Ok((slot, None));
        }
        let tag = self.fresh("tag");
        let destroy = wrapper.destroy(self.func.session, slot.clone())?;
        self.frame().teardowns.push(Teardown::ByTag {
            tag: tag.clone(),
            expr: destroy,
        });
        Ok((slot, Some(tag)))
    }

    pub fn activate(&mut self, tag: Option<String>) {
        if let Some(tag) = tag {
            self.push_effect(NativeExpr::ActivatesTeardown(tag));
        }
    }

    /// Take ownership of a freshly created value (e.g. a handle returned by
    /// the runtime) without copying it.
    pub fn push_owned(&mut self, wrapper: &WrapperRef, value: NativeExpr) -> CResult<TypedValue> {
        self.push(wrapper, |_, slot| Ok(slot.store(value)))
    }

    pub fn push_copy(&mut self, value: &TypedValue) -> CResult<TypedValue> {
        let wrapper = value.wrapper.clone();
        let source = value.nonref_expr();
        self.push(&wrapper, |ctx, slot| {
            wrapper.copy_initialize(ctx.func.session, slot, source)
        })
    }

    /// Give a value storage if it does not have any yet.
    pub fn ensure_reference(&mut self, value: TypedValue) -> CResult<TypedValue> {
        if value.is_reference || value.is_empty() {
            return Ok(value);
        }
        let constant = value.constant.clone();
        let mut stored = if value.is_pod() {
            self.push_pod(&value.wrapper, value.expr)
        } else {
            self.push_owned(&value.wrapper, value.expr)?
        };
        stored.constant = constant;
        Ok(stored)
    }

    /// A statement-scoped resource that is not a Python value, such as an
    /// accumulator handle. Returns the slot holding it.
    pub fn push_resource<F>(&mut self, ty: NativeType, init: NativeExpr, release: F) -> NativeExpr
    where
        F: FnOnce(NativeExpr) -> NativeExpr,
    {
        let slot = self.alloc_slot(ty);
        let tag = self.fresh("tag");
        self.push_effect(slot.clone().store(init));
        self.push_effect(NativeExpr::ActivatesTeardown(tag.clone()));
        let expr = release(slot.clone().load());
        self.frame().teardowns.push(Teardown::ByTag { tag, expr });
        slot
    }

    /// Raise a Python exception; control does not continue.
    pub fn push_exception(&mut self, kind: ExceptionKind, message: &str) -> ConvertResult {
        self.push_effect(NativeExpr::throw(kind.name(), NativeExpr::utf8(message)));
        Ok(None)
    }

    pub fn raise_if(&mut self, cond: NativeExpr, kind: ExceptionKind, message: &str) {
        self.push_effect(NativeExpr::when(
            cond,
            NativeExpr::throw(kind.name(), NativeExpr::utf8(message)),
        ));
    }

    // ========== Constants and plain values ==========

    pub fn constant_bool(&mut self, value: bool) -> TypedValue {
        let wrapper = self.wrapper(&TypeKey::Bool);
        TypedValue::new(NativeExpr::bool(value), wrapper, false).with_constant(Value::Bool(value))
    }

    pub fn constant_int(&mut self, value: i64) -> TypedValue {
        let wrapper = self.wrapper(&TypeKey::Int);
        TypedValue::new(NativeExpr::int(value), wrapper, false).with_constant(Value::Int(value))
    }

    pub fn constant_float(&mut self, value: f64) -> TypedValue {
        let wrapper = self.wrapper(&TypeKey::Float);
        TypedValue::new(NativeExpr::float(value), wrapper, false).with_constant(Value::Float(value))
    }

    pub fn constant_none(&mut self) -> TypedValue {
        let wrapper = self.wrapper(&TypeKey::None);
        TypedValue::empty(wrapper).with_constant(Value::None)
    }

    pub fn constant_str(&mut self, text: &str) -> CResult<TypedValue> {
        let wrapper = self.wrapper(&TypeKey::Str);
        let handle = crate::runtime_functions::str_from_utf8().call(vec![NativeExpr::utf8(text)]);
        Ok(self
            .push_owned(&wrapper, handle)?
            .with_constant(Value::Str(text.to_string())))
    }

    pub fn constant(&mut self, value: &Value) -> CResult<TypedValue> {
        match value {
            Value::None => Ok(self.constant_none()),
            Value::Bool(b) => Ok(self.constant_bool(*b)),
            Value::Int(i) => Ok(self.constant_int(*i)),
            Value::Float(f) => Ok(self.constant_float(*f)),
            Value::Str(s) => self.constant_str(s),
            other => conversion_error(format!("cannot embed a '{}' constant", other.type_name())),
        }
    }

    pub fn bool_value(&mut self, expr: NativeExpr) -> TypedValue {
        let wrapper = self.wrapper(&TypeKey::Bool);
        TypedValue::new(expr, wrapper, false)
    }

    pub fn int_value(&mut self, expr: NativeExpr) -> TypedValue {
        let wrapper = self.wrapper(&TypeKey::Int);
        TypedValue::new(expr, wrapper, false)
    }

    pub fn float_value(&mut self, expr: NativeExpr) -> TypedValue {
        let wrapper = self.wrapper(&TypeKey::Float);
        TypedValue::new(expr, wrapper, false)
    }

    pub fn none_value(&mut self) -> TypedValue {
        self.constant_none()
    }

    /// A value of the given key with no native representation.
    pub fn empty_value(&mut self, key: &TypeKey) -> TypedValue {
        let wrapper = self.wrapper(key);
        TypedValue::empty(wrapper)
    }

    // ========== Nested blocks ==========

    /// Generate code into a separate block. Temporaries created inside stay
    /// owned by the enclosing statement; they are destroyed only if the
    /// block actually ran far enough to initialize them.
    pub fn capture<T, F>(&mut self, f: F) -> CResult<(NativeExpr, T)>
    where
        F: FnOnce(&mut Self) -> CResult<T>,
    {
        self.frames.push(Frame::default());
        let result = f(self);
        let frame = self.frames.pop().unwrap_or_default();
        let value = result?;
        self.frame().teardowns.extend(frame.teardowns);
        Ok((NativeExpr::sequence(frame.effects), value))
    }

    /// Generate code into a block that destroys its own temporaries when it
    /// exits. Used for code that runs repeatedly, such as loop conditions.
    pub fn scoped<T, F>(&mut self, f: F) -> CResult<(NativeExpr, T)>
    where
        F: FnOnce(&mut Self) -> CResult<T>,
    {
        self.frames.push(Frame::default());
        let result = f(self);
        let frame = self.frames.pop().unwrap_or_default();
        let value = result?;
        Ok((close(frame), value))
    }

    /// `while cond(): body()`; `cond` yields the continuation flag and may
    /// emit code of its own. Both run in their own scopes.
    pub fn while_loop<C, B>(&mut self, cond: C, body: B) -> CResult<()>
    where
        C: FnOnce(&mut Self) -> CResult<NativeExpr>,
        B: FnOnce(&mut Self) -> CResult<()>,
    {
        let (cond_block, flag) = self.scoped(|ctx| {
            let flag = cond(ctx)?;
            let slot = ctx.alloc_slot(NativeType::bool());
            ctx.push_effect(slot.clone().store(flag));
            Ok(slot)
        })?;
        let cond_expr = NativeExpr::sequence(vec![cond_block, flag.load()]);
        let (body_block, ()) = self.scoped(body)?;
        self.push_effect(NativeExpr::while_loop(cond_expr, body_block, NativeExpr::void()));
        Ok(())
    }

    /// Run `body` for each item of `iterable`. Returns false if the iterable
    /// cannot be iterated (an exception was emitted instead).
    pub fn for_each<F>(&mut self, iterable: &TypedValue, mut body: F) -> CResult<bool>
    where
        F: FnMut(&mut Self, TypedValue) -> CResult<()>,
    {
        let Some(iterator) = iterable.convert_iter(self)? else {
            return Ok(false);
        };
        let iterator = self.ensure_reference(iterator)?;
        let flag = self.alloc_slot(NativeType::bool());
        let (cond, reachable) = self.scoped(|ctx| {
            let Some((item, more)) = iterator.convert_next(ctx)? else {
                return Ok(false);
            };
            ctx.push_effect(flag.clone().store(more));
            let (step, ()) = ctx.scoped(|ctx| {
                let item = ctx.ensure_reference(item)?;
                body(ctx, item)
            })?;
            ctx.push_effect(NativeExpr::when(flag.clone().load(), step));
            Ok(true)
        })?;
        if !reachable {
            self.push_effect(cond);
            return Ok(false);
        }
        let cond = NativeExpr::sequence(vec![cond, flag.load()]);
        self.push_effect(NativeExpr::while_loop(cond, NativeExpr::void(), NativeExpr::void()));
        Ok(true)
    }

    // ========== Calls and conversions ==========

    /// Call a Python function with the given arguments, compiling the
    /// specialization for their types if needed.
    pub fn call_function(&mut self, function: &FunctionRef, args: &[TypedValue]) -> ConvertResult {
        let params = function.ast.args().len();
        if params != args.len() {
            return ctx_arity_error(function.name(), params, args.len());
        }
        let inputs: Vec<TypeKey> = args.iter().map(|arg| arg.key().clone()).collect();
        let resolution = self.func.session.convert_function(function, &inputs, None)?;
        let (name, output) = match resolution {
            CallResolution::Compiled(target) => (target.name.clone(), target.output_type.clone()),
            CallResolution::InFlight {
                name,
                output: Some(output),
            } => (name, output),
            CallResolution::InFlight { output: None, .. } => {
                // a self-call before any return type is known: try again next pass
                self.func.mark_unresolved(function.name());
                return Ok(None);
            }
        };
        self.emit_call(&name, args, &output)
    }

    /// Emit a call to a compiled function and take ownership of its result.
    pub fn emit_call(&mut self, name: &str, args: &[TypedValue], output: &TypeKey) -> ConvertResult {
        let input_wrappers: Vec<WrapperRef> = args.iter().map(|arg| arg.wrapper.clone()).collect();
        let output_wrapper = self.wrapper(output);
        let target = CompiledTarget::call_target_for(name, &input_wrappers, &output_wrapper);
        let mut native_args = Vec::new();
        for arg in args {
            if arg.is_empty() {
                continue;
            }
            let arg = if arg.is_pod() {
                arg.clone()
            } else {
                self.ensure_reference(arg.clone())?
            };
            native_args.push(arg.as_call_argument());
        }
        if output_wrapper.is_empty() {
            self.push_effect(target.call(native_args));
            return Ok(Some(TypedValue::empty(output_wrapper)));
        }
        if output_wrapper.is_pass_by_ref() {
            let result = self.push(&output_wrapper, |_, slot| {
                let mut all = vec![slot];
                all.extend(native_args);
                Ok(target.call(all))
            })?;
            return Ok(Some(result));
        }
        Ok(Some(self.push_pod(&output_wrapper, target.call(native_args))))
    }

    /// Implicit conversion of `value` to `key`.
    pub fn convert_to(&mut self, value: &TypedValue, key: &TypeKey) -> ConvertResult {
        let target = self.wrapper(key);
        value.convert_to_type(self, &target)
    }

    /// Close the base frame: the statement's code wrapped with its teardowns.
    pub fn finish(mut self) -> NativeExpr {
        let frame = self.frames.drain(..).fold(Frame::default(), |mut acc, frame| {
            acc.effects.extend(frame.effects);
            acc.teardowns.extend(frame.teardowns);
            acc
        });
        close(frame)
    }
}

fn close(frame: Frame) -> NativeExpr {
    let body = NativeExpr::sequence(frame.effects);
    if frame.teardowns.is_empty() {
        body
    } else {
        NativeExpr::Finally {
            body: Box::new(body),
            teardowns: frame.teardowns,
        }
    }
}

fn ctx_arity_error(name: &str, expected: usize, given: usize) -> ConvertResult {
    Err(ConversionError::new(format!(
        "{}() takes {} positional argument{} but {} {} given",
        name,
        expected,
        if expected == 1 { "" } else { "s" },
        given,
        if given == 1 { "was" } else { "were" }
    )))
}
