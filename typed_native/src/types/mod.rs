//! Canonical type keys.
//!
//! A `TypeKey` names one concrete static type the compiler can generate
//! code for. Keys are hashable and compare structurally, so the wrapper
//! registry and the compilation cache can use them directly as map keys.

pub mod lattice;

use std::fmt;

use typed_native_runtime::ExceptionKind;

use crate::value::FunctionRef;

/// Builtin functions available without a binding in the function's globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Builtin {
    Len,
    Abs,
    Min,
    Max,
    Ord,
    Chr,
    Sum,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::Len,
        Builtin::Abs,
        Builtin::Min,
        Builtin::Max,
        Builtin::Ord,
        Builtin::Chr,
        Builtin::Sum,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Ord => "ord",
            Builtin::Chr => "chr",
            Builtin::Sum => "sum",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Self::ALL.iter().copied().find(|b| b.name() == name)
    }
}

/// Modules a front end can bind as free variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Module {
    Math,
}

impl Module {
    pub fn name(&self) -> &'static str {
        match self {
            Module::Math => "math",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    None,
    Bool,
    Int,
    Float,
    Str,
    /// The universal dynamic type; top of the lattice.
    Object,
    Range,
    RangeIterator,
    StrIterator,
    ListOf(Box<TypeKey>),
    ListIterator(Box<TypeKey>),
    Tuple(Vec<TypeKey>),
    /// The class object `T` itself, e.g. the value bound to the name `int`.
    TypeObject(Box<TypeKey>),
    Function(FunctionRef),
    Builtin(Builtin),
    Module(Module),
    MathFunction(String),
    /// `receiver.name` before it is called.
    BoundMethod(Box<TypeKey>, String),
    ExceptionType(ExceptionKind),
}

impl TypeKey {
    pub fn list_of(element: TypeKey) -> TypeKey {
        TypeKey::ListOf(Box::new(element))
    }

    pub fn type_object(of: TypeKey) -> TypeKey {
        TypeKey::TypeObject(Box::new(of))
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, TypeKey::Bool | TypeKey::Int | TypeKey::Float)
    }

    /// Name of the Python class, as it appears in error messages.
    pub fn python_name(&self) -> String {
        match self {
            TypeKey::None => "NoneType".to_string(),
            TypeKey::Bool => "bool".to_string(),
            TypeKey::Int => "int".to_string(),
            TypeKey::Float => "float".to_string(),
            TypeKey::Str => "str".to_string(),
            TypeKey::Object => "object".to_string(),
            TypeKey::Range => "range".to_string(),
            TypeKey::RangeIterator => "range_iterator".to_string(),
            TypeKey::StrIterator => "str_iterator".to_string(),
            TypeKey::ListOf(_) => "list".to_string(),
            TypeKey::ListIterator(_) => "list_iterator".to_string(),
            TypeKey::Tuple(_) => "tuple".to_string(),
            TypeKey::TypeObject(_) => "type".to_string(),
            TypeKey::Function(_) => "function".to_string(),
            TypeKey::Builtin(_) | TypeKey::MathFunction(_) => {
                "builtin_function_or_method".to_string()
            }
            TypeKey::Module(_) => "module".to_string(),
            TypeKey::BoundMethod(..) => "method".to_string(),
            TypeKey::ExceptionType(_) => "type".to_string(),
        }
    }
}

/// Full structural spelling, e.g. `list[tuple[int, str]]`.
impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::ListOf(element) => write!(f, "list[{}]", element),
            TypeKey::ListIterator(element) => write!(f, "list_iterator[{}]", element),
            TypeKey::Tuple(elements) => {
                f.write_str("tuple[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                f.write_str("]")
            }
            TypeKey::TypeObject(of) => write!(f, "type[{}]", of),
            TypeKey::Function(function) => write!(f, "function[{}]", function.name()),
            TypeKey::Builtin(builtin) => write!(f, "builtin[{}]", builtin.name()),
            TypeKey::Module(module) => write!(f, "module[{}]", module.name()),
            TypeKey::MathFunction(name) => write!(f, "math.{}", name),
            TypeKey::BoundMethod(receiver, name) => write!(f, "method[{}.{}]", receiver, name),
            TypeKey::ExceptionType(kind) => write!(f, "type[{}]", kind),
            other => f.write_str(&other.python_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let key = TypeKey::list_of(TypeKey::Tuple(vec![TypeKey::Int, TypeKey::Str]));
        assert_eq!(key.to_string(), "list[tuple[int, str]]");
        assert_eq!(key.python_name(), "list");
        assert_eq!(TypeKey::None.to_string(), "NoneType");
        assert_eq!(
            TypeKey::BoundMethod(Box::new(TypeKey::Str), "find".into()).to_string(),
            "method[str.find]"
        );
    }

    #[test]
    fn test_builtin_names() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
        }
        assert_eq!(Builtin::from_name("print"), None);
    }
}
