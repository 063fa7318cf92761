//! typed_native: a type-directed native compiler for Python functions
//!
//! Given the AST of a Python function and concrete argument types, the
//! compiler infers a stable static type for every local, lowers the body to
//! a typed native IR with explicit reference counting, and caches one
//! specialization per function and type signature. Every specialization
//! also gets a call converter with the uniform signature
//! `(return: void*, input: void**) -> void`.
//!
//! # Layout
//!
//! - [`ast`]: the function AST a front end hands over
//! - [`types`]: canonical type keys and the inference lattice
//! - [`wrappers`]: one code-generation strategy per type
//! - [`convert`]: the per-function conversion engine and its fixed point
//! - [`driver`]: the compilation session, cache, naming and call converters
//! - [`native`]: the IR handed to backends
//! - [`backend`]: the backend trait and the reference interpreter
//! - [`runtime`]: a facade that compiles and calls in one step
//!
//! # Example
//!
//! ```
//! use typed_native::ast::build::*;
//! use typed_native::ast::Operator;
//! use typed_native::prelude::*;
//!
//! let globals = Globals::new();
//! let add_two = FunctionRef::define(
//!     function("add_two", &["a"], vec![ret(binop(name("a"), Operator::Add, int(2)))]),
//!     &globals,
//! );
//! let runtime = Runtime::default();
//! assert_eq!(runtime.call(&add_two, &[Value::Int(40)]).unwrap(), Value::Int(42));
//! ```

pub mod ast;
pub mod backend;
pub mod config;
pub mod convert;
pub mod driver;
pub mod error;
pub mod native;
pub mod runtime;
pub mod runtime_functions;
pub mod span;
pub mod typed_value;
pub mod types;
pub mod value;
pub mod wrappers;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{Backend, BackendError, NativeInterpreter};
    pub use crate::config::CompilerConfig;
    pub use crate::driver::{CallResolution, CompilationSession, CompiledTarget};
    pub use crate::error::{CompileError, ConversionError};
    pub use crate::native::{NativeExpr, NativeFunction, NativeType};
    pub use crate::runtime::Runtime;
    pub use crate::types::TypeKey;
    pub use crate::value::{FunctionRef, Globals, PyValue};
    pub use typed_native_runtime::{ExceptionKind, RuntimeError, Value};
}
