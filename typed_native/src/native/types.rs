use std::fmt;

use serde::{Deserialize, Serialize};

/// Native memory types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeType {
    Void,
    Int { bits: u8, signed: bool },
    Float { bits: u8 },
    Pointer(Box<NativeType>),
    /// Named fields, laid out in order.
    Struct(Vec<(String, NativeType)>),
    Function {
        args: Vec<NativeType>,
        output: Box<NativeType>,
        varargs: bool,
    },
}

impl NativeType {
    pub fn int64() -> Self {
        NativeType::Int {
            bits: 64,
            signed: true,
        }
    }

    pub fn bool() -> Self {
        NativeType::Int {
            bits: 1,
            signed: false,
        }
    }

    pub fn uint8() -> Self {
        NativeType::Int {
            bits: 8,
            signed: false,
        }
    }

    pub fn float64() -> Self {
        NativeType::Float { bits: 64 }
    }

    /// `void*` at the call boundary.
    pub fn void_ptr() -> Self {
        NativeType::Pointer(Box::new(NativeType::uint8()))
    }

    pub fn pointer(self) -> Self {
        NativeType::Pointer(Box::new(self))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, NativeType::Void)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, NativeType::Pointer(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, NativeType::Float { .. })
    }

    /// Target of a pointer type.
    pub fn pointee(&self) -> Option<&NativeType> {
        match self {
            NativeType::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        match self {
            NativeType::Struct(fields) => fields.iter().position(|(field, _)| field == name),
            _ => None,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Void => f.write_str("void"),
            NativeType::Int { bits: 1, .. } => f.write_str("bool"),
            NativeType::Int { bits, signed: true } => write!(f, "int{}", bits),
            NativeType::Int {
                bits,
                signed: false,
            } => write!(f, "uint{}", bits),
            NativeType::Float { bits } => write!(f, "float{}", bits),
            NativeType::Pointer(inner) => write!(f, "{}*", inner),
            NativeType::Struct(fields) => {
                f.write_str("{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                f.write_str("}")
            }
            NativeType::Function {
                args,
                output,
                varargs,
            } => {
                f.write_str("fn(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                if *varargs {
                    f.write_str(", ...")?;
                }
                write!(f, ") -> {}", output)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let handle = NativeType::Struct(vec![
            ("refcount".into(), NativeType::int64()),
            ("data".into(), NativeType::uint8().pointer()),
        ])
        .pointer();
        assert_eq!(handle.to_string(), "{refcount: int64, data: uint8*}*");
        assert_eq!(NativeType::bool().to_string(), "bool");
        assert_eq!(handle.pointee().and_then(|s| s.field_index("data")), Some(1));
    }
}
