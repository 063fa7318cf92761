//! Backends
//!
//! A backend receives finished native definitions and runs them through
//! their call converters. The bundled [`NativeInterpreter`] executes the IR
//! directly against a model of native memory; a machine-code backend would
//! implement the same trait.

pub mod interp;

use std::collections::BTreeMap;

use thiserror::Error;
use typed_native_runtime::{RuntimeError, Value};

use crate::native::NativeFunction;
use crate::types::TypeKey;

pub use interp::NativeInterpreter;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("function '{0}' is not defined")]
    UndefinedFunction(String),

    /// The native code raised a Python exception.
    #[error(transparent)]
    Raised(RuntimeError),

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The native code violated the memory model.
    #[error("native code fault: {0}")]
    Fault(String),
}

pub trait Backend {
    /// Take ownership of newly extracted definitions. Names are unique
    /// across calls.
    fn add_definitions(&mut self, definitions: BTreeMap<String, NativeFunction>);

    fn has_definition(&self, name: &str) -> bool;

    /// Call the converter `name`, marshaling `args` as `inputs` and the
    /// result back from `output`.
    fn invoke_converter(
        &mut self,
        name: &str,
        inputs: &[TypeKey],
        output: &TypeKey,
        args: &[Value],
    ) -> Result<Value, BackendError>;
}
