//! Compilation driver
//!
//! [`CompilationSession`] owns every cross-function table: the identity
//! cache guaranteeing each specialization is compiled once, stable symbol
//! naming, reservation-then-fill definition of native helpers, call
//! converter synthesis, and the pending set of definitions a backend has
//! not received yet.

pub mod call_converter;
mod identity;
mod naming;
mod session;
mod target;

pub use identity::CompilationIdentity;
pub use naming::NameAllocator;
pub use session::{CallResolution, CompilationSession, SessionStats};
pub use target::CompiledTarget;
