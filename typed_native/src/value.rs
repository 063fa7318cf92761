//! Python-level values seen by the compiler
//!
//! A `FunctionRef` is the compiler's view of a Python function object: its
//! AST plus the table of free variables it closes over. Identity (not
//! structure) is what the compilation cache keys on.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use typed_native_runtime::ExceptionKind;

use crate::ast::{local_variables, FunctionAst};
use crate::types::{Builtin, Module, TypeKey};

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u64);

impl FunctionId {
    fn fresh() -> Self {
        FunctionId(NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A value bound to a free variable.
#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Function(FunctionRef),
    Builtin(Builtin),
    /// A class object such as `int` or `str`.
    Type(TypeKey),
    Module(Module),
    Exception(ExceptionKind),
}

impl PyValue {
    pub fn function(function: &FunctionRef) -> Self {
        PyValue::Function(function.clone())
    }
}

/// Shared free-variable table. Functions defined in the same module share
/// one table, so a binding added after a function is created is still
/// visible when it is compiled.
#[derive(Clone, Default)]
pub struct Globals(Rc<RefCell<BTreeMap<String, PyValue>>>);

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, value: PyValue) {
        self.0.borrow_mut().insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<PyValue> {
        self.0.borrow().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Bind the usual module-level names: `math` and the builtin classes.
    pub fn with_standard_names(self) -> Self {
        self.set("math", PyValue::Module(Module::Math));
        self
    }
}

impl fmt::Debug for Globals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.borrow().keys()).finish()
    }
}

#[derive(Debug)]
pub struct PyFunction {
    pub id: FunctionId,
    pub ast: FunctionAst,
    pub globals: Globals,
    /// Parameters first, then every name the body binds.
    pub locals: Vec<String>,
}

/// Reference-counted handle to a function; equality and hashing are by identity.
#[derive(Clone)]
pub struct FunctionRef(Rc<PyFunction>);

impl FunctionRef {
    pub fn new(ast: FunctionAst, globals: &Globals) -> Self {
        let locals = local_variables(&ast);
        FunctionRef(Rc::new(PyFunction {
            id: FunctionId::fresh(),
            ast,
            globals: globals.clone(),
            locals,
        }))
    }

    /// Create the function and bind it under its own name in `globals`.
    pub fn define(ast: FunctionAst, globals: &Globals) -> Self {
        let function = Self::new(ast, globals);
        if !function.ast.is_lambda() {
            globals.set(function.name(), PyValue::Function(function.clone()));
        }
        function
    }

    pub fn id(&self) -> FunctionId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        self.0.ast.name()
    }
}

impl std::ops::Deref for FunctionRef {
    type Target = PyFunction;

    fn deref(&self) -> &PyFunction {
        &self.0
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for FunctionRef {}

impl Hash for FunctionRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {} #{}>", self.name(), self.0.id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    #[test]
    fn test_identity_equality() {
        let globals = Globals::new();
        let body = vec![ret(name("a"))];
        let first = FunctionRef::new(function("f", &["a"], body.clone()), &globals);
        let second = FunctionRef::new(function("f", &["a"], body), &globals);
        assert_eq!(first, first.clone());
        assert_ne!(first, second);
        assert_eq!(first.locals, vec!["a"]);
    }

    #[test]
    fn test_define_binds_late() {
        let globals = Globals::new();
        let f = FunctionRef::define(function("f", &[], vec![ret(call(name("g"), vec![]))]), &globals);
        assert!(f.globals.get("g").is_none());
        let g = FunctionRef::define(function("g", &[], vec![ret(int(1))]), &globals);
        assert_eq!(f.globals.get("g"), Some(PyValue::Function(g)));
    }
}
