use std::fmt;

use crate::types::TypeKey;
use crate::value::{FunctionId, FunctionRef};

/// Cache key of one compiled definition.
///
/// Two requests with equal identities always resolve to the same target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompilationIdentity {
    /// A `def` specialized to argument types and an optional declared output.
    Function(FunctionId, Vec<TypeKey>, Option<TypeKey>),
    Lambda(FunctionId, Vec<TypeKey>, Option<TypeKey>),
    /// The call converter of the named target.
    CallConverter(String),
    /// A helper built by `define_native_function`, e.g. a list destructor.
    Native(String, Vec<TypeKey>),
    /// A prebuilt definition registered with `define`.
    Defined(String),
}

impl CompilationIdentity {
    pub fn for_function(function: &FunctionRef, inputs: &[TypeKey], output: Option<&TypeKey>) -> Self {
        let inputs = inputs.to_vec();
        let output = output.cloned();
        if function.ast.is_lambda() {
            CompilationIdentity::Lambda(function.id(), inputs, output)
        } else {
            CompilationIdentity::Function(function.id(), inputs, output)
        }
    }

    /// Namespace prefix of generated symbol names for this kind.
    pub fn name_prefix(&self) -> &'static str {
        match self {
            CompilationIdentity::Function(..) | CompilationIdentity::Lambda(..) => "py.",
            CompilationIdentity::CallConverter(_) => "",
            CompilationIdentity::Native(..) => "runtime.",
            CompilationIdentity::Defined(_) => "defined.",
        }
    }
}

impl fmt::Display for CompilationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = |keys: &[TypeKey]| keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        match self {
            CompilationIdentity::Function(id, inputs, _) => write!(f, "function #{}({})", id.0, types(inputs)),
            CompilationIdentity::Lambda(id, inputs, _) => write!(f, "lambda #{}({})", id.0, types(inputs)),
            CompilationIdentity::CallConverter(name) => write!(f, "call converter of {}", name),
            CompilationIdentity::Native(key, types_) => write!(f, "{}[{}]", key, types(types_)),
            CompilationIdentity::Defined(key) => write!(f, "defined {}", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::value::Globals;

    #[test]
    fn test_kind_follows_ast() {
        let globals = Globals::new();
        let def = FunctionRef::new(function("f", &["x"], vec![ret(name("x"))]), &globals);
        let lam = FunctionRef::new(lambda(&["x"], name("x")), &globals);
        let a = CompilationIdentity::for_function(&def, &[TypeKey::Int], None);
        let b = CompilationIdentity::for_function(&lam, &[TypeKey::Int], None);
        assert!(matches!(a, CompilationIdentity::Function(..)));
        assert!(matches!(b, CompilationIdentity::Lambda(..)));
        assert_eq!(a, CompilationIdentity::for_function(&def, &[TypeKey::Int], None));
        assert_ne!(a, CompilationIdentity::for_function(&def, &[TypeKey::Float], None));
        assert_ne!(a, CompilationIdentity::for_function(&def, &[TypeKey::Int], Some(&TypeKey::Float)));
    }
}
