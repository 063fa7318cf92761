//! Runtime error types for natively compiled code
//!
//! Every error raised by generated code carries a Python exception category
//! and a message. Generated `Throw` nodes name the category through
//! [`ExceptionKind`]; runtime helpers return [`RuntimeError`] directly.

use std::fmt;

use thiserror::Error;

/// Exception categories that generated code can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExceptionKind {
    ValueError,
    TypeError,
    IndexError,
    KeyError,
    ZeroDivisionError,
    OverflowError,
    AttributeError,
    AssertionError,
    NameError,
    UnboundLocalError,
    NotImplementedError,
    RuntimeError,
}

impl ExceptionKind {
    /// All categories, in declaration order.
    pub const ALL: [ExceptionKind; 12] = [
        ExceptionKind::ValueError,
        ExceptionKind::TypeError,
        ExceptionKind::IndexError,
        ExceptionKind::KeyError,
        ExceptionKind::ZeroDivisionError,
        ExceptionKind::OverflowError,
        ExceptionKind::AttributeError,
        ExceptionKind::AssertionError,
        ExceptionKind::NameError,
        ExceptionKind::UnboundLocalError,
        ExceptionKind::NotImplementedError,
        ExceptionKind::RuntimeError,
    ];

    /// The Python-visible class name.
    pub fn name(&self) -> &'static str {
        match self {
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::ZeroDivisionError => "ZeroDivisionError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::AssertionError => "AssertionError",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::UnboundLocalError => "UnboundLocalError",
            ExceptionKind::NotImplementedError => "NotImplementedError",
            ExceptionKind::RuntimeError => "RuntimeError",
        }
    }

    /// Look up a category by its class name.
    pub fn from_name(name: &str) -> Option<ExceptionKind> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime error type
///
/// Represents an exception raised while executing compiled code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("ValueError: {0}")]
    ValueError(String),

    #[error("TypeError: {0}")]
    TypeError(String),

    #[error("IndexError: {0}")]
    IndexError(String),

    #[error("KeyError: {0}")]
    KeyError(String),

    #[error("ZeroDivisionError: {0}")]
    ZeroDivisionError(String),

    #[error("OverflowError: {0}")]
    OverflowError(String),

    #[error("AttributeError: {0}")]
    AttributeError(String),

    #[error("AssertionError: {0}")]
    AssertionError(String),

    #[error("NameError: {0}")]
    NameError(String),

    #[error("UnboundLocalError: {0}")]
    UnboundLocalError(String),

    #[error("NotImplementedError: {0}")]
    NotImplementedError(String),

    /// Python's own `RuntimeError` category, also used for internal failures.
    #[error("RuntimeError: {0}")]
    RuntimeError(String),
}

impl RuntimeError {
    /// Build an error of the given category.
    pub fn new<S: Into<String>>(kind: ExceptionKind, msg: S) -> Self {
        let msg = msg.into();
        match kind {
            ExceptionKind::ValueError => RuntimeError::ValueError(msg),
            ExceptionKind::TypeError => RuntimeError::TypeError(msg),
            ExceptionKind::IndexError => RuntimeError::IndexError(msg),
            ExceptionKind::KeyError => RuntimeError::KeyError(msg),
            ExceptionKind::ZeroDivisionError => RuntimeError::ZeroDivisionError(msg),
            ExceptionKind::OverflowError => RuntimeError::OverflowError(msg),
            ExceptionKind::AttributeError => RuntimeError::AttributeError(msg),
            ExceptionKind::AssertionError => RuntimeError::AssertionError(msg),
            ExceptionKind::NameError => RuntimeError::NameError(msg),
            ExceptionKind::UnboundLocalError => RuntimeError::UnboundLocalError(msg),
            ExceptionKind::NotImplementedError => RuntimeError::NotImplementedError(msg),
            ExceptionKind::RuntimeError => RuntimeError::RuntimeError(msg),
        }
    }

    /// The category of this error.
    pub fn kind(&self) -> ExceptionKind {
        match self {
            RuntimeError::ValueError(_) => ExceptionKind::ValueError,
            RuntimeError::TypeError(_) => ExceptionKind::TypeError,
            RuntimeError::IndexError(_) => ExceptionKind::IndexError,
            RuntimeError::KeyError(_) => ExceptionKind::KeyError,
            RuntimeError::ZeroDivisionError(_) => ExceptionKind::ZeroDivisionError,
            RuntimeError::OverflowError(_) => ExceptionKind::OverflowError,
            RuntimeError::AttributeError(_) => ExceptionKind::AttributeError,
            RuntimeError::AssertionError(_) => ExceptionKind::AssertionError,
            RuntimeError::NameError(_) => ExceptionKind::NameError,
            RuntimeError::UnboundLocalError(_) => ExceptionKind::UnboundLocalError,
            RuntimeError::NotImplementedError(_) => ExceptionKind::NotImplementedError,
            RuntimeError::RuntimeError(_) => ExceptionKind::RuntimeError,
        }
    }

    /// The message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            RuntimeError::ValueError(m)
            | RuntimeError::TypeError(m)
            | RuntimeError::IndexError(m)
            | RuntimeError::KeyError(m)
            | RuntimeError::ZeroDivisionError(m)
            | RuntimeError::OverflowError(m)
            | RuntimeError::AttributeError(m)
            | RuntimeError::AssertionError(m)
            | RuntimeError::NameError(m)
            | RuntimeError::UnboundLocalError(m)
            | RuntimeError::NotImplementedError(m)
            | RuntimeError::RuntimeError(m) => m,
        }
    }

    /// Create a value error
    pub fn value_error<S: Into<String>>(msg: S) -> Self {
        RuntimeError::ValueError(msg.into())
    }

    /// Create a type error
    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        RuntimeError::TypeError(msg.into())
    }

    /// Create an index error
    pub fn index_error<S: Into<String>>(msg: S) -> Self {
        RuntimeError::IndexError(msg.into())
    }

    /// `ValueError("math domain error")`, raised by math functions outside their domain.
    pub fn domain_error() -> Self {
        RuntimeError::ValueError(MATH_DOMAIN_ERROR.to_string())
    }

    /// `OverflowError("math range error")`
    pub fn range_error() -> Self {
        RuntimeError::OverflowError(MATH_RANGE_ERROR.to_string())
    }

    /// Create a division-by-zero error
    pub fn zero_division<S: Into<String>>(msg: S) -> Self {
        RuntimeError::ZeroDivisionError(msg.into())
    }

    /// Create an overflow error
    pub fn overflow_error<S: Into<String>>(msg: S) -> Self {
        RuntimeError::OverflowError(msg.into())
    }

    /// Create an attribute error
    pub fn attribute_error<S: Into<String>>(msg: S) -> Self {
        RuntimeError::AttributeError(msg.into())
    }

    /// Create an internal failure
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        RuntimeError::RuntimeError(msg.into())
    }
}

/// Message used for every math domain failure.
pub const MATH_DOMAIN_ERROR: &str = "math domain error";

/// Message used when a math result does not fit a float.
pub const MATH_RANGE_ERROR: &str = "math range error";

/// Result type alias for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RuntimeError::domain_error();
        assert_eq!(format!("{}", err), "ValueError: math domain error");

        let err = RuntimeError::index_error("string index out of range");
        assert_eq!(format!("{}", err), "IndexError: string index out of range");
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in ExceptionKind::ALL {
            let err = RuntimeError::new(kind, "boom");
            assert_eq!(err.kind(), kind);
            assert_eq!(err.message(), "boom");
            assert_eq!(ExceptionKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ExceptionKind::from_name("StopIteration"), None);
    }
}
