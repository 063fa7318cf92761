//! Runtime facade
//!
//! Ties one compilation session to one backend: compile a function for
//! argument types, hand the new definitions to the backend, and call the
//! result with Python values. Entry points take `&self` and guard the
//! session and backend with `RefCell`, so calling back into the same
//! runtime while an entry point is active fails with
//! [`CompileError::Reentrant`] instead of corrupting either.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use tracing::{debug, instrument, warn};
use typed_native_runtime::Value;

use crate::backend::{Backend, BackendError, NativeInterpreter};
use crate::config::CompilerConfig;
use crate::driver::{CompilationSession, CompiledTarget, SessionStats};
use crate::error::CompileError;
use crate::native::CallTarget;
use crate::types::lattice::join;
use crate::types::TypeKey;
use crate::value::FunctionRef;

#[derive(Debug, Default)]
pub struct Runtime {
    session: RefCell<CompilationSession>,
    backend: RefCell<NativeInterpreter>,
}

thread_local! {
    static THREAD_RUNTIME: Runtime = Runtime::from_env_or_default();
}

impl Runtime {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            session: RefCell::new(CompilationSession::new(config)),
            backend: RefCell::new(NativeInterpreter::new()),
        }
    }

    pub fn from_env() -> Result<Self, CompileError> {
        Ok(Self::new(CompilerConfig::from_env()?))
    }

    fn from_env_or_default() -> Self {
        match Self::from_env() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(error = %err, "ignoring invalid compiler configuration");
                Self::default()
            }
        }
    }

    /// Run `f` with this thread's shared runtime.
    pub fn with_thread_local<R>(f: impl FnOnce(&Runtime) -> R) -> R {
        THREAD_RUNTIME.with(f)
    }

    fn session(&self) -> Result<RefMut<'_, CompilationSession>, CompileError> {
        self.session.try_borrow_mut().map_err(|_| CompileError::Reentrant)
    }

    fn backend(&self) -> Result<RefMut<'_, NativeInterpreter>, CompileError> {
        self.backend.try_borrow_mut().map_err(|_| CompileError::Reentrant)
    }

    /// Compile `function` for `inputs` and load everything new into the backend.
    pub fn compile(&self, function: &FunctionRef, inputs: &[TypeKey]) -> Result<Rc<CompiledTarget>, CompileError> {
        self.compile_with_output(function, inputs, None)
    }

    /// Like [`compile`](Self::compile), with the return type fixed to `output`.
    #[instrument(level = "debug", skip_all, fields(function = function.name()))]
    pub fn compile_with_output(
        &self,
        function: &FunctionRef,
        inputs: &[TypeKey],
        output: Option<TypeKey>,
    ) -> Result<Rc<CompiledTarget>, CompileError> {
        let mut session = self.session()?;
        let target = session.compile(function, inputs, output)?;
        if session.config().generate_call_converters {
            session.generate_call_converter(&target)?;
        }
        let definitions = session.extract_new_definitions();
        drop(session);
        if !definitions.is_empty() {
            self.backend()?.add_definitions(definitions);
        }
        Ok(target)
    }

    fn prepare(&self, function: &FunctionRef, inputs: &[TypeKey]) -> Result<(Rc<CompiledTarget>, CallTarget), CompileError> {
        let mut session = self.session()?;
        let target = session.compile(function, inputs, None)?;
        let converter = session.generate_call_converter(&target)?;
        let definitions = session.extract_new_definitions();
        drop(session);
        if !definitions.is_empty() {
            self.backend()?.add_definitions(definitions);
        }
        Ok((target, converter))
    }

    /// Call `function` with `args`, compiling the specialization for their
    /// types on first use.
    #[instrument(level = "debug", skip_all, fields(function = function.name()))]
    pub fn call(&self, function: &FunctionRef, args: &[Value]) -> Result<Value, CompileError> {
        let inputs = args.iter().map(type_of_value).collect::<Result<Vec<_>, _>>()?;
        let (target, converter) = self.prepare(function, &inputs)?;
        debug!(converter = %converter.name, "invoking");
        let result = self
            .backend()?
            .invoke_converter(&converter.name, &target.input_types, &target.output_type, args);
        result.map_err(|err| match err {
            BackendError::Raised(err) => CompileError::Runtime(err),
            other => CompileError::Backend(other),
        })
    }

    pub fn stats(&self) -> Result<SessionStats, CompileError> {
        Ok(self.session()?.stats())
    }

    /// Heap allocations owned by compiled code that are still alive.
    pub fn live_allocations(&self) -> Result<usize, CompileError> {
        Ok(self.backend()?.live_allocations())
    }

    pub fn has_definition(&self, name: &str) -> Result<bool, CompileError> {
        Ok(self.backend()?.has_definition(name))
    }
}

/// The specialization type for an argument value. A list takes the join of
/// its element types; an empty list has none to take.
pub fn type_of_value(value: &Value) -> Result<TypeKey, CompileError> {
    let key = match value {
        Value::None => TypeKey::None,
        Value::Bool(_) => TypeKey::Bool,
        Value::Int(_) => TypeKey::Int,
        Value::Float(_) => TypeKey::Float,
        Value::Str(_) => TypeKey::Str,
        Value::Tuple(items) => TypeKey::Tuple(items.iter().map(type_of_value).collect::<Result<_, _>>()?),
        Value::List(items) => {
            let mut element: Option<TypeKey> = None;
            for item in items {
                let key = type_of_value(item)?;
                element = Some(match element {
                    Some(current) => join(&current, &key),
                    None => key,
                });
            }
            match element {
                Some(element) => TypeKey::list_of(element),
                None => return Err(CompileError::UnsupportedArgument("empty list".to_string())),
            }
        }
    };
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_types() {
        assert_eq!(type_of_value(&Value::Int(1)).unwrap(), TypeKey::Int);
        assert_eq!(
            type_of_value(&Value::List(vec![Value::Int(1), Value::Float(2.0)])).unwrap(),
            TypeKey::list_of(TypeKey::Object)
        );
        assert_eq!(
            type_of_value(&Value::List(vec![Value::Int(1), Value::Int(2)])).unwrap(),
            TypeKey::list_of(TypeKey::Int)
        );
        assert_eq!(
            type_of_value(&Value::Tuple(vec![Value::Str("a".into()), Value::None])).unwrap(),
            TypeKey::Tuple(vec![TypeKey::Str, TypeKey::None])
        );
        assert!(matches!(
            type_of_value(&Value::List(vec![])),
            Err(CompileError::UnsupportedArgument(_))
        ));
    }

    #[test]
    fn test_reentrant_entry_is_reported() {
        let runtime = Runtime::default();
        let _held = runtime.session.borrow_mut();
        assert!(matches!(runtime.stats(), Err(CompileError::Reentrant)));
    }
}
