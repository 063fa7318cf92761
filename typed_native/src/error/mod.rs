pub mod conversion;

pub use conversion::{conversion_error, ConversionError};

use thiserror::Error;
use typed_native_runtime::RuntimeError;

use crate::backend::BackendError;
use crate::config::ConfigError;

/// Errors surfaced by the runtime facade.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The compiled code raised an exception.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A facade entry point was called while another one was still running on this thread.
    #[error("runtime entry point re-entered while a compilation is in progress")]
    Reentrant,

    #[error("cannot pass a value of type '{0}' across the call boundary")]
    UnsupportedArgument(String),
}

impl CompileError {
    /// The Python exception raised by compiled code, if that is what this is.
    pub fn as_runtime(&self) -> Option<&RuntimeError> {
        match self {
            CompileError::Runtime(err) => Some(err),
            _ => None,
        }
    }
}
