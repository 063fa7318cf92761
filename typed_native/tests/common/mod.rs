//! Shared fixtures for integration tests.
#![allow(dead_code)]

use typed_native::ast::FunctionAst;
use typed_native::prelude::*;

/// A module namespace with `math` bound.
pub fn module() -> Globals {
    Globals::new().with_standard_names()
}

pub fn define(globals: &Globals, ast: FunctionAst) -> FunctionRef {
    FunctionRef::define(ast, globals)
}

pub fn run(runtime: &Runtime, function: &FunctionRef, args: &[Value]) -> Value {
    match runtime.call(function, args) {
        Ok(value) => value,
        Err(err) => panic!("{}({:?}) failed: {}", function.name(), args, err),
    }
}

/// The Python exception a call raised.
pub fn raised(runtime: &Runtime, function: &FunctionRef, args: &[Value]) -> RuntimeError {
    match runtime.call(function, args) {
        Err(CompileError::Runtime(err)) => err,
        Err(other) => panic!("expected a Python exception, got {}", other),
        Ok(value) => panic!("expected a Python exception, got {:?}", value),
    }
}

pub fn s(text: &str) -> Value {
    Value::Str(text.to_string())
}
