//! Memory model of the reference interpreter.
//!
//! Memory is a set of allocations, each a vector of cells. A cell holds a
//! whole value; struct values are navigated by field index, so an address
//! is an allocation id plus a path: the cell index first, then one field
//! index per nested struct. Allocations made for handles (strings, objects,
//! lists, accumulators) are heap allocations and are counted by
//! [`Memory::live_heap_allocations`]; everything else belongs to a frame.

use std::collections::HashMap;

use thiserror::Error;
use typed_native_runtime::intrinsics::FSum;
use typed_native_runtime::{RuntimeError, Value};

use crate::native::NativeType;
use crate::runtime_functions::{LIST_COUNT_FIELD, LIST_DATA_FIELD, LIST_RESERVED_FIELD, REFCOUNT_FIELD};

/// Abnormal termination of interpreted code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Trap {
    /// A Python exception.
    #[error(transparent)]
    Raise(#[from] RuntimeError),

    /// The code did something no valid program does.
    #[error("memory fault: {0}")]
    Fault(String),
}

pub(crate) fn fault<T>(message: impl Into<String>) -> Result<T, Trap> {
    Err(Trap::Fault(message.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub alloc: usize,
    pub path: Vec<usize>,
}

impl Address {
    fn root(alloc: usize) -> Self {
        Self { alloc, path: vec![0] }
    }

    /// Pointer arithmetic on the outermost index, then field selection.
    pub fn offset(&self, offsets: &[i64]) -> Result<Address, Trap> {
        let mut address = self.clone();
        let Some((first, fields)) = offsets.split_first() else {
            return Ok(address);
        };
        let Some(last) = address.path.last_mut() else {
            return fault("empty address path");
        };
        let index = *last as i64 + first;
        if index < 0 {
            return fault(format!("negative element offset {}", index));
        }
        *last = index as usize;
        for &field in fields {
            if field < 0 {
                return fault(format!("negative field index {}", field));
            }
            address.path.push(field as usize);
        }
        Ok(address)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RtValue {
    Void,
    Int(i64),
    Float(f64),
    /// `None` is the null pointer.
    Ptr(Option<Address>),
    Struct(Vec<RtValue>),
    /// A static string buffer.
    Utf8(String),
}

impl RtValue {
    pub fn zero(ty: &NativeType) -> RtValue {
        match ty {
            NativeType::Void | NativeType::Function { .. } => RtValue::Void,
            NativeType::Int { .. } => RtValue::Int(0),
            NativeType::Float { .. } => RtValue::Float(0.0),
            NativeType::Pointer(_) => RtValue::Ptr(None),
            NativeType::Struct(fields) => RtValue::Struct(fields.iter().map(|(_, ty)| RtValue::zero(ty)).collect()),
        }
    }

    pub fn bool(value: bool) -> RtValue {
        RtValue::Int(i64::from(value))
    }

    pub fn as_int(&self) -> Result<i64, Trap> {
        match self {
            RtValue::Int(value) => Ok(*value),
            other => fault(format!("expected an integer, got {:?}", other)),
        }
    }

    pub fn as_float(&self) -> Result<f64, Trap> {
        match self {
            RtValue::Float(value) => Ok(*value),
            other => fault(format!("expected a float, got {:?}", other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, Trap> {
        Ok(self.as_int()? != 0)
    }

    pub fn as_ptr(&self) -> Result<Option<&Address>, Trap> {
        match self {
            RtValue::Ptr(address) => Ok(address.as_ref()),
            other => fault(format!("expected a pointer, got {:?}", other)),
        }
    }

    /// The address a non-null pointer holds.
    pub fn address(&self) -> Result<&Address, Trap> {
        match self.as_ptr()? {
            Some(address) => Ok(address),
            None => fault("null pointer dereference"),
        }
    }
}

#[derive(Debug)]
pub enum Payload {
    Empty,
    Str(String),
    Object(Value),
    FSum(FSum),
}

#[derive(Debug)]
struct Allocation {
    cells: Vec<RtValue>,
    payload: Payload,
    heap: bool,
}

#[derive(Debug, Default)]
pub struct Memory {
    allocations: HashMap<usize, Allocation>,
    next_id: usize,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, cells: Vec<RtValue>, payload: Payload, heap: bool) -> Address {
        let id = self.next_id;
        self.next_id += 1;
        self.allocations.insert(id, Allocation { cells, payload, heap });
        Address::root(id)
    }

    /// Stack storage for one value.
    pub fn allocate_slot(&mut self, value: RtValue) -> Address {
        self.allocate(vec![value], Payload::Empty, false)
    }

    pub fn free(&mut self, address: &Address) -> Result<(), Trap> {
        match self.allocations.remove(&address.alloc) {
            Some(_) => Ok(()),
            None => fault(format!("double free of allocation {}", address.alloc)),
        }
    }

    pub fn live_heap_allocations(&self) -> usize {
        self.allocations.values().filter(|a| a.heap).count()
    }

    fn allocation(&self, alloc: usize) -> Result<&Allocation, Trap> {
        match self.allocations.get(&alloc) {
            Some(allocation) => Ok(allocation),
            None => fault(format!("use of freed allocation {}", alloc)),
        }
    }

    fn allocation_mut(&mut self, alloc: usize) -> Result<&mut Allocation, Trap> {
        match self.allocations.get_mut(&alloc) {
            Some(allocation) => Ok(allocation),
            None => fault(format!("use of freed allocation {}", alloc)),
        }
    }

    fn cell(&self, address: &Address) -> Result<&RtValue, Trap> {
        let allocation = self.allocation(address.alloc)?;
        let Some((first, fields)) = address.path.split_first() else {
            return fault("empty address path");
        };
        let mut value = match allocation.cells.get(*first) {
            Some(value) => value,
            None => return fault(format!("cell {} out of bounds in allocation {}", first, address.alloc)),
        };
        for &field in fields {
            value = match value {
                RtValue::Struct(items) if field < items.len() => &items[field],
                other => return fault(format!("no field {} in {:?}", field, other)),
            };
        }
        Ok(value)
    }

    fn cell_mut(&mut self, address: &Address) -> Result<&mut RtValue, Trap> {
        let alloc = address.alloc;
        let allocation = self.allocation_mut(alloc)?;
        let Some((first, fields)) = address.path.split_first() else {
            return fault("empty address path");
        };
        let mut value = match allocation.cells.get_mut(*first) {
            Some(value) => value,
            None => return fault(format!("cell {} out of bounds in allocation {}", first, alloc)),
        };
        for &field in fields {
            value = match value {
                RtValue::Struct(items) => match items.get_mut(field) {
                    Some(item) => item,
                    None => return fault(format!("no field {} at this address", field)),
                },
                _ => return fault(format!("no field {} at this address", field)),
            };
        }
        Ok(value)
    }

    pub fn load(&self, address: &Address) -> Result<RtValue, Trap> {
        self.cell(address).cloned()
    }

    pub fn store(&mut self, address: &Address, value: RtValue) -> Result<(), Trap> {
        *self.cell_mut(address)? = value;
        Ok(())
    }

    pub fn payload(&self, address: &Address) -> Result<&Payload, Trap> {
        Ok(&self.allocation(address.alloc)?.payload)
    }

    pub fn payload_mut(&mut self, address: &Address) -> Result<&mut Payload, Trap> {
        Ok(&mut self.allocation_mut(address.alloc)?.payload)
    }

    fn header_field(&self, handle: &Address, field: usize) -> Result<RtValue, Trap> {
        self.load(&handle.offset(&[0, field as i64])?)
    }

    fn set_header_field(&mut self, handle: &Address, field: usize, value: RtValue) -> Result<(), Trap> {
        let address = handle.offset(&[0, field as i64])?;
        self.store(&address, value)
    }

    /// Drop one reference; true when this was the last one.
    pub fn decref(&mut self, handle: &Address) -> Result<bool, Trap> {
        let count = self.header_field(handle, REFCOUNT_FIELD)?.as_int()? - 1;
        self.set_header_field(handle, REFCOUNT_FIELD, RtValue::Int(count))?;
        Ok(count == 0)
    }

    // ========== Strings ==========

    pub fn new_str(&mut self, text: String) -> RtValue {
        let header = RtValue::Struct(vec![
            RtValue::Int(1),
            RtValue::Int(text.chars().count() as i64),
            RtValue::Ptr(None),
        ]);
        RtValue::Ptr(Some(self.allocate(vec![header], Payload::Str(text), true)))
    }

    /// Contents of a string handle; null is the empty string.
    pub fn read_str(&self, handle: &RtValue) -> Result<String, Trap> {
        let Some(address) = handle.as_ptr()? else {
            return Ok(String::new());
        };
        match self.payload(address)? {
            Payload::Str(text) => Ok(text.clone()),
            other => fault(format!("expected a string handle, found {:?}", other)),
        }
    }

    // ========== Objects ==========

    pub fn new_object(&mut self, value: Value) -> RtValue {
        let header = RtValue::Struct(vec![RtValue::Int(1), RtValue::Ptr(None)]);
        RtValue::Ptr(Some(self.allocate(vec![header], Payload::Object(value), true)))
    }

    pub fn read_object(&self, handle: &RtValue) -> Result<Value, Trap> {
        let Some(address) = handle.as_ptr()? else {
            return Ok(Value::None);
        };
        match self.payload(address)? {
            Payload::Object(value) => Ok(value.clone()),
            other => fault(format!("expected an object handle, found {:?}", other)),
        }
    }

    // ========== Lists ==========

    pub fn new_list(&mut self, element: &NativeType, mut items: Vec<RtValue>, reserved: usize) -> RtValue {
        let count = items.len();
        let reserved = reserved.max(count);
        items.resize(reserved, RtValue::zero(element));
        let data = self.allocate(items, Payload::Empty, true);
        let header = RtValue::Struct(vec![
            RtValue::Int(1),
            RtValue::Int(count as i64),
            RtValue::Int(reserved as i64),
            RtValue::Ptr(Some(data)),
        ]);
        RtValue::Ptr(Some(self.allocate(vec![header], Payload::Empty, true)))
    }

    fn list_data(&self, handle: &Address) -> Result<Address, Trap> {
        Ok(self.header_field(handle, LIST_DATA_FIELD)?.address()?.clone())
    }

    /// The first `count` elements of a list; null is the empty list.
    pub fn list_items(&self, handle: &RtValue) -> Result<Vec<RtValue>, Trap> {
        let Some(address) = handle.as_ptr()? else {
            return Ok(Vec::new());
        };
        let count = self.header_field(address, LIST_COUNT_FIELD)?.as_int()?;
        let data = self.list_data(address)?;
        let cells = &self.allocation(data.alloc)?.cells;
        match usize::try_from(count) {
            Ok(count) if count <= cells.len() => Ok(cells[..count].to_vec()),
            _ => fault(format!("list count {} exceeds its buffer", count)),
        }
    }

    /// Resize the element buffer to `reserved` slots, keeping the elements.
    pub fn resize_list(&mut self, handle: &Address, reserved: i64, element: &NativeType) -> Result<(), Trap> {
        let count = self.header_field(handle, LIST_COUNT_FIELD)?.as_int()?;
        if reserved < count {
            return fault(format!("cannot shrink a list of {} below {}", count, reserved));
        }
        let data = self.list_data(handle)?;
        self.allocation_mut(data.alloc)?
            .cells
            .resize(reserved as usize, RtValue::zero(element));
        self.set_header_field(handle, LIST_RESERVED_FIELD, RtValue::Int(reserved))
    }

    /// Release the header and buffer. Elements are not touched.
    pub fn free_list(&mut self, handle: &Address) -> Result<(), Trap> {
        let data = self.list_data(handle)?;
        self.free(&data)?;
        self.free(handle)
    }
}

/// Element layout of a `list_handle(element)` type.
pub fn list_element_type(handle: &NativeType) -> Result<NativeType, Trap> {
    match handle.pointee() {
        Some(NativeType::Struct(fields)) => match fields.get(LIST_DATA_FIELD).and_then(|(_, ty)| ty.pointee()) {
            Some(element) => Ok(element.clone()),
            None => fault("list header has no data pointer"),
        },
        _ => fault(format!("{} is not a list handle", handle)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_field_addressing() {
        let mut memory = Memory::new();
        let slot = memory.allocate_slot(RtValue::Struct(vec![RtValue::Int(1), RtValue::Float(2.0)]));
        let field = slot.offset(&[0, 1]).unwrap();
        memory.store(&field, RtValue::Float(3.5)).unwrap();
        assert_eq!(
            memory.load(&slot).unwrap(),
            RtValue::Struct(vec![RtValue::Int(1), RtValue::Float(3.5)])
        );
        assert!(matches!(memory.load(&slot.offset(&[0, 2]).unwrap()), Err(Trap::Fault(_))));
        assert_eq!(memory.live_heap_allocations(), 0);
    }

    #[test]
    fn test_list_resize_keeps_elements() {
        let mut memory = Memory::new();
        let element = NativeType::int64();
        let list = memory.new_list(&element, vec![RtValue::Int(7)], 1);
        let handle = list.address().unwrap().clone();
        memory.resize_list(&handle, 6, &element).unwrap();
        assert_eq!(memory.list_items(&list).unwrap(), vec![RtValue::Int(7)]);
        assert_eq!(memory.live_heap_allocations(), 2);
        memory.free_list(&handle).unwrap();
        assert_eq!(memory.live_heap_allocations(), 0);
        assert!(matches!(memory.free(&handle), Err(Trap::Fault(_))));
    }

    #[test]
    fn test_null_handles() {
        let memory = Memory::new();
        assert_eq!(memory.read_str(&RtValue::Ptr(None)).unwrap(), "");
        assert_eq!(memory.read_object(&RtValue::Ptr(None)).unwrap(), Value::None);
        assert!(memory.list_items(&RtValue::Ptr(None)).unwrap().is_empty());
    }
}
