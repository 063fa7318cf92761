//! Function conversion engine
//!
//! Turns the AST of one Python function, specialized to concrete argument
//! types, into a native function. `function` drives the type-stability
//! fixed point, `statement` and `expression` walk the tree, and `context`
//! owns the temporaries of the statement being converted.

mod context;
mod expression;
mod function;
mod statement;

pub use context::ExpressionContext;
pub use function::{ConvertedFunction, FunctionConverter};

pub(crate) use expression::arity_error;
