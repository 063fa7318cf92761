//! Function conversion
//!
//! Converts one Python function for one tuple of argument types. The body is
//! converted repeatedly: each pass starts from the widest local-variable and
//! return types seen so far, and the loop stops at the first pass that
//! widens nothing. The lattice is flat, so this takes at most a few passes.

use std::collections::BTreeMap;

use tracing::debug;
use typed_native_runtime::ExceptionKind;

use super::context::ExpressionContext;
use super::expression::convert_expr;
use crate::ast::FunctionAst;
use crate::driver::CompilationSession;
use crate::error::ConversionError;
use crate::native::{NativeExpr, NativeFunction, NativeType, Teardown};
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::lattice::join_optional;
use crate::types::TypeKey;
use crate::value::FunctionRef;
use crate::wrappers::WrapperRef;

/// Result of converting one specialization.
#[derive(Debug, Clone)]
pub struct ConvertedFunction {
    pub function: NativeFunction,
    pub output: TypeKey,
    pub variable_types: BTreeMap<String, TypeKey>,
    pub passes: usize,
}

/// Why a pass could not finish typing every path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Unresolved {
    /// A local was read before any assignment gave it a type.
    Local(String),
    /// A self-call happened before any return statement was typed.
    Recursion(String),
}

#[derive(Debug, Default)]
pub(crate) struct LoopState {
    pub has_break: bool,
}

#[derive(Debug)]
pub struct FunctionConverter<'s> {
    pub(crate) session: &'s mut CompilationSession,
    pub(crate) function: FunctionRef,
    input_types: Vec<TypeKey>,
    declared_output: Option<TypeKey>,
    variable_types: BTreeMap<String, TypeKey>,
    return_type: Option<TypeKey>,
    types_changed: bool,
    unresolved: Option<Unresolved>,
    pub(crate) counter: usize,
    pub(crate) loops: Vec<LoopState>,
}

impl<'s> FunctionConverter<'s> {
    pub fn new(
        session: &'s mut CompilationSession,
        function: FunctionRef,
        input_types: Vec<TypeKey>,
        declared_output: Option<TypeKey>,
    ) -> Self {
        let mut variable_types = BTreeMap::new();
        for (arg, key) in function.ast.args().iter().zip(&input_types) {
            variable_types.insert(arg.name.clone(), key.clone());
        }
        Self {
            session,
            function,
            input_types,
            declared_output,
            variable_types,
            return_type: None,
            types_changed: false,
            unresolved: None,
            counter: 0,
            loops: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.function.name()
    }

    /// Run passes until the inferred types are stable.
    pub fn convert(mut self) -> CResult<ConvertedFunction> {
        let max_passes = self.session.config().max_type_passes;
        let mut passes = 0;
        loop {
            passes += 1;
            if passes > max_passes {
                return Err(ConversionError::new(format!(
                    "type inference did not converge after {} passes",
                    max_passes
                ))
                .in_function(self.name()));
            }
            self.types_changed = false;
            self.unresolved = None;
            self.counter = 0;
            self.loops.clear();

            let result = self.convert_pass();
            self.session.record_pass();
            debug!(
                function = self.name(),
                pass = passes,
                widened = self.types_changed,
                "type inference pass"
            );

            match result {
                Ok(body) if !self.types_changed => {
                    if let Some(unresolved) = self.unresolved.take() {
                        return Err(self.unresolved_error(unresolved));
                    }
                    let output = self.output_key();
                    let function = self.native_function(body, &output);
                    return Ok(ConvertedFunction {
                        function,
                        output,
                        variable_types: self.variable_types,
                        passes,
                    });
                }
                Ok(_) => {}
                Err(err) if self.types_changed => {
                    debug!(function = self.name(), error = %err, "retrying after widening");
                }
                Err(err) => return Err(err.in_function(self.name())),
            }
        }
    }

    fn unresolved_error(&self, unresolved: Unresolved) -> ConversionError {
        let message = match unresolved {
            Unresolved::Local(name) => {
                format!("local variable '{}' referenced before assignment", name)
            }
            Unresolved::Recursion(name) => format!(
                "cannot infer the return type of '{}': every path recurses before returning",
                name
            ),
        };
        ConversionError::at(message, self.function.ast.span()).in_function(self.name())
    }

    /// The output type as currently known; a function that never returns
    /// produces `None`.
    pub fn output_key(&self) -> TypeKey {
        self.declared_output
            .clone()
            .or_else(|| self.return_type.clone())
            .unwrap_or(TypeKey::None)
    }

    pub(crate) fn mark_unresolved(&mut self, function_name: &str) {
        self.unresolved
            .get_or_insert_with(|| Unresolved::Recursion(function_name.to_string()));
    }

    fn mark_uninferred(&mut self, local: &str) {
        self.unresolved
            .get_or_insert_with(|| Unresolved::Local(local.to_string()));
    }

    pub(crate) fn variable_type(&self, name: &str) -> Option<&TypeKey> {
        self.variable_types.get(name)
    }

    fn convert_pass(&mut self) -> CResult<NativeExpr> {
        let mut entry = Vec::new();
        let mut teardowns = Vec::new();
        for (name, key) in self.variable_types.clone() {
            entry.push(bound_flag(&name).store(NativeExpr::bool(false)));
            let wrapper = self.session.wrapper(&key);
            if wrapper.is_empty() {
                continue;
            }
            let slot = local_slot(&name, &wrapper);
            entry.push(slot.clone().store(NativeExpr::zero(wrapper.layout())));
            if !wrapper.is_pod() {
                teardowns.push(Teardown::Always(wrapper.destroy(self.session, slot)?));
            }
        }

        let function = self.function.clone();
        let inputs = self.input_types.clone();
        {
            let mut ctx = ExpressionContext::new(self);
            for (arg, key) in function.ast.args().iter().zip(&inputs) {
                let wrapper = ctx.wrapper(key);
                let value = if wrapper.is_empty() {
                    TypedValue::empty(wrapper)
                } else {
                    let by_ref = wrapper.is_pass_by_ref();
                    TypedValue::new(NativeExpr::variable(format!("a.{}", arg.name)), wrapper, by_ref)
                };
                assign_local(&mut ctx, &arg.name, &value)?;
            }
            entry.push(ctx.finish());
        }

        let (body, reachable) = match &function.ast {
            FunctionAst::Def(def) => self.convert_block(&def.body)?,
            FunctionAst::Lambda(lambda) => {
                let mut ctx = ExpressionContext::new(self);
                if let Some(value) = convert_expr(&mut ctx, &lambda.body)? {
                    convert_return(&mut ctx, Some(value))?;
                }
                (ctx.finish(), false)
            }
        };
        entry.push(body);
        if reachable {
            let mut ctx = ExpressionContext::new(self);
            convert_return(&mut ctx, None)?;
            entry.push(ctx.finish());
        }

        let body = NativeExpr::sequence(entry);
        if teardowns.is_empty() {
            Ok(body)
        } else {
            Ok(NativeExpr::Finally {
                body: Box::new(body),
                teardowns,
            })
        }
    }

    fn native_function(&mut self, body: NativeExpr, output: &TypeKey) -> NativeFunction {
        let output_wrapper = self.session.wrapper(output);
        let mut args = Vec::new();
        if output_wrapper.is_pass_by_ref() {
            args.push((".return".to_string(), output_wrapper.layout().pointer()));
        }
        let function = self.function.clone();
        for (arg, key) in function.ast.args().iter().zip(&self.input_types) {
            let wrapper = self.session.wrapper(key);
            if !wrapper.is_empty() {
                args.push((format!("a.{}", arg.name), wrapper.passing_layout()));
            }
        }
        let output_type = if output_wrapper.is_empty() || output_wrapper.is_pass_by_ref() {
            NativeType::Void
        } else {
            output_wrapper.layout()
        };
        NativeFunction::new(args, output_type, body)
    }

    /// Record that `name` holds a value of `key`, widening its type if needed.
    fn observe_local(&mut self, name: &str, key: &TypeKey) -> TypeKey {
        let joined = join_optional(self.variable_types.get(name), key);
        if self.variable_types.get(name) != Some(&joined) {
            debug!(function = self.name(), local = name, to = %joined, "local widened");
            self.variable_types.insert(name.to_string(), joined.clone());
            self.types_changed = true;
        }
        joined
    }

    fn observe_return(&mut self, key: &TypeKey) -> TypeKey {
        if let Some(declared) = &self.declared_output {
            return declared.clone();
        }
        let joined = join_optional(self.return_type.as_ref(), key);
        if self.return_type.as_ref() != Some(&joined) {
            self.return_type = Some(joined.clone());
            self.types_changed = true;
            self.session.set_provisional_output(joined.clone());
        }
        joined
    }
}

fn local_slot(name: &str, wrapper: &WrapperRef) -> NativeExpr {
    NativeExpr::slot(format!("v.{}", name), wrapper.layout())
}

/// Set once the local has been assigned on the path taken at run time.
fn bound_flag(name: &str) -> NativeExpr {
    NativeExpr::slot(format!("b.{}", name), NativeType::bool())
}

/// `name = value` for a local. Returns false if control does not continue.
pub(crate) fn assign_local(ctx: &mut ExpressionContext<'_, '_>, name: &str, value: &TypedValue) -> CResult<bool> {
    let key = ctx.func.observe_local(name, value.key());
    let wrapper = ctx.wrapper(&key);
    let Some(value) = value.convert_to_type(ctx, &wrapper)? else {
        return Ok(false);
    };
    ctx.push_effect(bound_flag(name).store(NativeExpr::bool(true)));
    if wrapper.is_empty() {
        return Ok(true);
    }
    let value = if value.is_pod() {
        value
    } else {
        ctx.ensure_reference(value)?
    };
    let slot = local_slot(name, &wrapper);
    let assign = wrapper.assign(ctx.session(), slot, value.nonref_expr())?;
    ctx.push_effect(assign);
    Ok(true)
}

/// Read a local. A local with no type yet makes the rest of the path
/// unreachable for this pass; a typed one may still be unassigned on the
/// path taken at run time.
pub(crate) fn read_local(ctx: &mut ExpressionContext<'_, '_>, name: &str) -> ConvertResult {
    let Some(key) = ctx.func.variable_type(name).cloned() else {
        ctx.func.mark_uninferred(name);
        return Ok(None);
    };
    ctx.raise_if(
        bound_flag(name).load().logical_not(),
        ExceptionKind::UnboundLocalError,
        &format!("local variable '{}' referenced before assignment", name),
    );
    let wrapper = ctx.wrapper(&key);
    if wrapper.is_empty() {
        return Ok(Some(TypedValue::empty(wrapper)));
    }
    Ok(Some(TypedValue::new(local_slot(name, &wrapper), wrapper, true)))
}

/// `return value` (or `return` when `value` is `None`).
pub(crate) fn convert_return(ctx: &mut ExpressionContext<'_, '_>, value: Option<TypedValue>) -> CResult<()> {
    let value = match value {
        Some(value) => value,
        None => ctx.constant_none(),
    };
    let output = ctx.func.observe_return(value.key());
    let wrapper = ctx.wrapper(&output);
    let Some(value) = value.convert_to_type(ctx, &wrapper)? else {
        return Ok(());
    };
    if wrapper.is_empty() {
        ctx.push_effect(NativeExpr::ret(None));
    } else if wrapper.is_pass_by_ref() {
        let value = ctx.ensure_reference(value)?;
        let init = wrapper.copy_initialize(ctx.session(), NativeExpr::variable(".return"), value.nonref_expr())?;
        ctx.push_effect(init);
        ctx.push_effect(NativeExpr::ret(None));
    } else {
        ctx.push_effect(NativeExpr::ret(Some(value.nonref_expr())));
    }
    Ok(())
}

/// Resolve a name that is not a local: free variables first, then builtins.
pub(crate) fn resolve_global(ctx: &mut ExpressionContext<'_, '_>, name: &str) -> ConvertResult {
    use crate::types::Builtin;
    use crate::value::PyValue;

    if let Some(value) = ctx.func.function.globals.get(name) {
        let typed = match value {
            PyValue::None => ctx.constant_none(),
            PyValue::Bool(b) => ctx.constant_bool(b),
            PyValue::Int(i) => ctx.constant_int(i),
            PyValue::Float(f) => ctx.constant_float(f),
            PyValue::Str(s) => ctx.constant_str(&s)?,
            PyValue::Function(function) => ctx.empty_value(&TypeKey::Function(function)),
            PyValue::Builtin(builtin) => ctx.empty_value(&TypeKey::Builtin(builtin)),
            PyValue::Type(key) => ctx.empty_value(&TypeKey::type_object(key)),
            PyValue::Module(module) => ctx.empty_value(&TypeKey::Module(module)),
            PyValue::Exception(kind) => ctx.empty_value(&TypeKey::ExceptionType(kind)),
        };
        return Ok(Some(typed));
    }
    if let Some(builtin) = Builtin::from_name(name) {
        return Ok(Some(ctx.empty_value(&TypeKey::Builtin(builtin))));
    }
    if let Some(key) = builtin_type(name) {
        return Ok(Some(ctx.empty_value(&TypeKey::type_object(key))));
    }
    if let Some(kind) = ExceptionKind::from_name(name) {
        return Ok(Some(ctx.empty_value(&TypeKey::ExceptionType(kind))));
    }
    ctx.push_exception(ExceptionKind::NameError, &format!("name '{}' is not defined", name))
}

/// Builtin class names. `list` stands for `list[object]` and `type` for
/// the metaclass.
fn builtin_type(name: &str) -> Option<TypeKey> {
    Some(match name {
        "bool" => TypeKey::Bool,
        "int" => TypeKey::Int,
        "float" => TypeKey::Float,
        "str" => TypeKey::Str,
        "range" => TypeKey::Range,
        "list" => TypeKey::list_of(TypeKey::Object),
        "type" => TypeKey::type_object(TypeKey::Object),
        _ => return None,
    })
}

#[cfg(test)]
mod tests;
