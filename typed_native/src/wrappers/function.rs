//! Python function values.
//!
//! A function value is known statically, so it occupies no storage; calling
//! it compiles (or reuses) the specialization for the argument types.

use super::Wrapper;
use crate::convert::ExpressionContext;
use crate::native::NativeType;
use crate::typed_value::{ConvertResult, TypedValue};
use crate::types::TypeKey;
use crate::value::FunctionRef;

#[derive(Debug)]
pub struct FunctionWrapper {
    key: TypeKey,
    function: FunctionRef,
}

impl FunctionWrapper {
    pub fn new(function: FunctionRef) -> Self {
        Self {
            key: TypeKey::Function(function.clone()),
            function,
        }
    }
}

impl Wrapper for FunctionWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        NativeType::Void
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn convert_call(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        _callee: &TypedValue,
        args: &[TypedValue],
    ) -> ConvertResult {
        ctx.call_function(&self.function, args)
    }
}
