//! Bound methods such as `s.find`
//!
//! A bound method shares its receiver's storage: the value is the receiver
//! viewed through this wrapper, so it can be stored in a variable or
//! passed around and still be called later.

use super::{Wrapper, WrapperRef};
use crate::convert::ExpressionContext;
use crate::driver::CompilationSession;
use crate::native::{NativeExpr, NativeType};
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::TypeKey;

#[derive(Debug)]
pub struct BoundMethodWrapper {
    key: TypeKey,
    receiver: WrapperRef,
    name: String,
}

impl BoundMethodWrapper {
    pub fn new(receiver: WrapperRef, name: String) -> Self {
        Self {
            key: TypeKey::BoundMethod(Box::new(receiver.key().clone()), name.clone()),
            receiver,
            name,
        }
    }
}

impl Wrapper for BoundMethodWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        self.receiver.layout()
    }

    fn is_pod(&self) -> bool {
        self.receiver.is_pod()
    }

    fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    fn type_name(&self) -> String {
        "builtin_function_or_method".to_string()
    }

    fn copy_initialize(
        &self,
        session: &mut CompilationSession,
        target: NativeExpr,
        source: NativeExpr,
    ) -> CResult<NativeExpr> {
        self.receiver.copy_initialize(session, target, source)
    }

    fn assign(&self, session: &mut CompilationSession, target: NativeExpr, source: NativeExpr) -> CResult<NativeExpr> {
        self.receiver.assign(session, target, source)
    }

    fn destroy(&self, session: &mut CompilationSession, target: NativeExpr) -> CResult<NativeExpr> {
        self.receiver.destroy(session, target)
    }

    fn convert_call(&self, ctx: &mut ExpressionContext<'_, '_>, callee: &TypedValue, args: &[TypedValue]) -> ConvertResult {
        let receiver = callee.change_type(self.receiver.clone());
        self.receiver.convert_method_call(ctx, &receiver, &self.name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrappers::TypeRegistry;

    #[test]
    fn test_shares_receiver_layout() {
        let mut registry = TypeRegistry::new();
        let method = registry.get(&TypeKey::BoundMethod(Box::new(TypeKey::Str), "upper".into()));
        let string = registry.get(&TypeKey::Str);
        assert_eq!(method.layout(), string.layout());
        assert!(!method.is_pod());
        assert_eq!(method.key().to_string(), "method[str.upper]");
    }
}
