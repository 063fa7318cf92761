//! Moving Python values across the call converter boundary.

use typed_native_runtime::Value;

use super::memory::{fault, Memory, RtValue, Trap};
use crate::backend::BackendError;
use crate::types::TypeKey;
use crate::wrappers::TypeRegistry;

/// Whether values of `key` can be passed in and out of compiled code.
pub fn is_marshalable(key: &TypeKey) -> bool {
    match key {
        TypeKey::None | TypeKey::Bool | TypeKey::Int | TypeKey::Float | TypeKey::Str | TypeKey::Object => true,
        TypeKey::Tuple(elements) => elements.iter().all(is_marshalable),
        TypeKey::ListOf(element) => is_marshalable(element),
        _ => false,
    }
}

fn mismatch(key: &TypeKey, value: &Value) -> BackendError {
    BackendError::Unsupported(format!("cannot pass a '{}' value as '{}'", value.type_name(), key))
}

/// Build the native representation of `value`. Handles are created with a
/// reference count of one and belong to the caller.
pub fn to_native(
    memory: &mut Memory,
    registry: &mut TypeRegistry,
    key: &TypeKey,
    value: &Value,
) -> Result<RtValue, BackendError> {
    let native = match (key, value) {
        (TypeKey::None, Value::None) => RtValue::Void,
        (TypeKey::Bool, Value::Bool(b)) => RtValue::bool(*b),
        (TypeKey::Int, Value::Int(i)) => RtValue::Int(*i),
        (TypeKey::Int, Value::Bool(b)) => RtValue::Int(i64::from(*b)),
        (TypeKey::Float, Value::Float(x)) => RtValue::Float(*x),
        (TypeKey::Float, Value::Int(i)) => RtValue::Float(*i as f64),
        (TypeKey::Str, Value::Str(s)) => memory.new_str(s.clone()),
        (TypeKey::Object, value) => memory.new_object(value.clone()),
        (TypeKey::Tuple(keys), Value::Tuple(items)) if keys.len() == items.len() => {
            let mut fields = Vec::with_capacity(items.len());
            for (key, item) in keys.iter().zip(items) {
                fields.push(to_native(memory, registry, key, item)?);
            }
            RtValue::Struct(fields)
        }
        (TypeKey::ListOf(element), Value::List(items)) => {
            let mut natives = Vec::with_capacity(items.len());
            for item in items {
                natives.push(to_native(memory, registry, element, item)?);
            }
            let layout = registry.get(element).layout();
            let reserved = natives.len();
            memory.new_list(&layout, natives, reserved)
        }
        (key, value) => return Err(mismatch(key, value)),
    };
    Ok(native)
}

/// Read a native value back as a Python value without consuming it.
pub fn from_native(memory: &Memory, key: &TypeKey, native: &RtValue) -> Result<Value, Trap> {
    let value = match key {
        TypeKey::None => Value::None,
        TypeKey::Bool => Value::Bool(native.as_bool()?),
        TypeKey::Int => Value::Int(native.as_int()?),
        TypeKey::Float => Value::Float(native.as_float()?),
        TypeKey::Str => Value::Str(memory.read_str(native)?),
        TypeKey::Object => memory.read_object(native)?,
        TypeKey::Tuple(keys) => {
            let RtValue::Struct(fields) = native else {
                return fault(format!("expected a struct for '{}', got {:?}", key, native));
            };
            let mut items = Vec::with_capacity(keys.len());
            for (key, field) in keys.iter().zip(fields) {
                items.push(from_native(memory, key, field)?);
            }
            Value::Tuple(items)
        }
        TypeKey::ListOf(element) => {
            let mut items = Vec::new();
            for item in memory.list_items(native)? {
                items.push(from_native(memory, element, &item)?);
            }
            Value::List(items)
        }
        other => return fault(format!("cannot read a '{}' value", other)),
    };
    Ok(value)
}

/// Give up one reference held in `native`, freeing whatever that releases.
pub fn release(memory: &mut Memory, key: &TypeKey, native: &RtValue) -> Result<(), Trap> {
    match key {
        TypeKey::Str | TypeKey::Object => {
            if let Some(handle) = native.as_ptr()? {
                let handle = handle.clone();
                if memory.decref(&handle)? {
                    memory.free(&handle)?;
                }
            }
        }
        TypeKey::ListOf(element) => {
            if let Some(handle) = native.as_ptr()? {
                let handle = handle.clone();
                if memory.decref(&handle)? {
                    for item in memory.list_items(native)? {
                        release(memory, element, &item)?;
                    }
                    memory.free_list(&handle)?;
                }
            }
        }
        TypeKey::Tuple(keys) => {
            if let RtValue::Struct(fields) = native {
                for (key, field) in keys.iter().zip(fields) {
                    release(memory, key, field)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_values_release_completely() {
        let mut memory = Memory::new();
        let mut registry = TypeRegistry::new();
        let key = TypeKey::list_of(TypeKey::Tuple(vec![TypeKey::Str, TypeKey::Int]));
        let value = Value::List(vec![
            Value::Tuple(vec![Value::Str("a".into()), Value::Int(1)]),
            Value::Tuple(vec![Value::Str("b".into()), Value::Int(2)]),
        ]);
        let native = to_native(&mut memory, &mut registry, &key, &value).unwrap();
        assert_eq!(memory.live_heap_allocations(), 4);
        assert_eq!(from_native(&memory, &key, &native).unwrap(), value);
        release(&mut memory, &key, &native).unwrap();
        assert_eq!(memory.live_heap_allocations(), 0);
    }

    #[test]
    fn test_mismatched_values_are_rejected() {
        let mut memory = Memory::new();
        let mut registry = TypeRegistry::new();
        let err = to_native(&mut memory, &mut registry, &TypeKey::Int, &Value::Str("x".into())).unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
        assert!(!is_marshalable(&TypeKey::Range));
        assert!(is_marshalable(&TypeKey::list_of(TypeKey::Object)));
    }
}
