//! typed_native runtime library
//!
//! This crate provides the functions that natively compiled code calls
//! into. It includes:
//!
//! - `RuntimeError` and `ExceptionKind` for Python-categorized exceptions
//! - `Value` for the dynamically-typed `object` type
//! - Dynamic operator dispatch with Python semantics
//! - String algorithms indexed by code point
//! - Intrinsic math functions and exact summation
//! - Number/string conversion utilities

pub mod convert;
pub mod dispatch;
pub mod error;
pub mod intrinsics;
pub mod strings;
pub mod value;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use typed_native_runtime::prelude::*;
/// ```
pub mod prelude {
    pub use super::dispatch::{dynamic_binop, dynamic_unaryop, BinOp, UnaryOp};
    pub use super::error::{ExceptionKind, RuntimeError, RuntimeResult};
    pub use super::intrinsics::FSum;
    pub use super::value::Value;
}

pub use prelude::*;
