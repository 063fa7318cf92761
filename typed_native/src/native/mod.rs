//! Native intermediate representation
//!
//! The compiler's output: typed expressions over a small machine model
//! (integers, floats, pointers, structs), structured control flow, and
//! `Finally` blocks whose teardowns run on every exit path. A backend turns
//! these into machine code, or in the case of the bundled reference
//! backend, executes them directly.

pub mod expr;
pub mod function;
pub mod types;

pub use expr::{CallTarget, Constant, NativeBinaryOp, NativeExpr, NativeUnaryOp, Teardown};
pub use function::NativeFunction;
pub use types::NativeType;
