use crate::native::{CallTarget, NativeType};
use crate::types::TypeKey;
use crate::wrappers::WrapperRef;

/// A compiled Python specialization: its symbol and native signature.
///
/// Values passed by reference (and a result returned by reference) are
/// pointers in the native signature; an output returned by reference is
/// written through an extra first parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTarget {
    pub name: String,
    pub input_types: Vec<TypeKey>,
    pub output_type: TypeKey,
    pub arg_types: Vec<NativeType>,
    pub output_native: NativeType,
    pub returns_by_reference: bool,
}

impl CompiledTarget {
    pub fn new(name: String, input_types: Vec<TypeKey>, inputs: &[WrapperRef], output: &WrapperRef) -> Self {
        let call = Self::call_target_for(&name, inputs, output);
        Self {
            name,
            input_types,
            output_type: output.key().clone(),
            arg_types: call.arg_types,
            output_native: call.output_type,
            returns_by_reference: output.is_pass_by_ref(),
        }
    }

    /// The call target for a specialization with these wrappers. Empty
    /// inputs have no native parameter.
    pub fn call_target_for(name: &str, inputs: &[WrapperRef], output: &WrapperRef) -> CallTarget {
        let mut args = Vec::with_capacity(inputs.len() + 1);
        if output.is_pass_by_ref() {
            args.push(output.layout().pointer());
        }
        args.extend(inputs.iter().filter(|w| !w.is_empty()).map(|w| w.passing_layout()));
        let output_type = if output.is_empty() || output.is_pass_by_ref() {
            NativeType::Void
        } else {
            output.layout()
        };
        CallTarget::internal(name, args, output_type)
    }

    pub fn call_target(&self) -> CallTarget {
        CallTarget::internal(self.name.clone(), self.arg_types.clone(), self.output_native.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrappers::TypeRegistry;

    #[test]
    fn test_signature_shapes() {
        let mut registry = TypeRegistry::new();
        let int = registry.get(&TypeKey::Int);
        let string = registry.get(&TypeKey::Str);
        let none = registry.get(&TypeKey::None);

        let target = CompiledTarget::new("py.f".into(), vec![TypeKey::Int, TypeKey::None], &[int.clone(), none], &string);
        assert!(target.returns_by_reference);
        assert_eq!(target.arg_types, vec![string.layout().pointer(), NativeType::int64()]);
        assert_eq!(target.output_native, NativeType::Void);

        let target = CompiledTarget::new("py.g".into(), vec![TypeKey::Str], &[string.clone()], &int);
        assert!(!target.returns_by_reference);
        assert_eq!(target.arg_types, vec![string.layout().pointer()]);
        assert_eq!(target.call_target().output_type, NativeType::int64());
        assert!(!target.call_target().external && target.call_target().can_throw);
    }
}
