//! Reference interpreter for native IR.
//!
//! Executes definitions directly: every expression evaluates to an
//! [`RtValue`], control transfer (`Return`, `Break`, `Continue`, a raised
//! exception) unwinds as an error through the evaluator, and `Finally`
//! blocks run their teardowns on every way out. External symbols resolve
//! to `typed_native_runtime` through [`externs`].

pub mod externs;
pub mod marshal;
pub mod memory;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, trace};
use typed_native_runtime::{ExceptionKind, RuntimeError, Value};

use self::memory::{fault, Address, Memory, Payload, RtValue, Trap};
use super::{Backend, BackendError};
use crate::native::{CallTarget, Constant, NativeBinaryOp, NativeExpr, NativeFunction, NativeType, NativeUnaryOp, Teardown};
use crate::types::TypeKey;
use crate::wrappers::TypeRegistry;

/// Nested calls allowed before raising `RuntimeError`.
pub const MAX_CALL_DEPTH: usize = 64;

/// Ways evaluation leaves an expression other than producing a value.
#[derive(Debug)]
enum Unwind {
    Return(RtValue),
    Break,
    Continue,
    Trap(Trap),
}

impl From<Trap> for Unwind {
    fn from(trap: Trap) -> Self {
        Unwind::Trap(trap)
    }
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Trap(Trap::Raise(err))
    }
}

impl From<Trap> for BackendError {
    fn from(trap: Trap) -> Self {
        match trap {
            Trap::Raise(err) => BackendError::Raised(err),
            Trap::Fault(message) => BackendError::Fault(message),
        }
    }
}

type Eval = Result<RtValue, Unwind>;

#[derive(Debug, Default)]
struct Frame {
    args: HashMap<String, RtValue>,
    slots: HashMap<String, Address>,
    /// Teardown tags activated and not yet consumed by their `Finally`.
    active: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct NativeInterpreter {
    functions: HashMap<String, Rc<NativeFunction>>,
    memory: Memory,
    registry: TypeRegistry,
    depth: usize,
}

impl NativeInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Strings, objects, lists and accumulators still allocated.
    pub fn live_allocations(&self) -> usize {
        self.memory.live_heap_allocations()
    }

    pub fn definition_count(&self) -> usize {
        self.functions.len()
    }

    /// Call a defined function with native arguments.
    pub fn call_function(&mut self, name: &str, args: Vec<RtValue>) -> Result<RtValue, Trap> {
        let Some(function) = self.functions.get(name).cloned() else {
            return fault(format!("call to undefined function {}", name));
        };
        if function.args.len() != args.len() {
            return fault(format!(
                "{} takes {} native arguments, got {}",
                name,
                function.args.len(),
                args.len()
            ));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Trap::Raise(RuntimeError::new(
                ExceptionKind::RuntimeError,
                "maximum recursion depth exceeded",
            )));
        }
        trace!(function = name, depth = self.depth, "call");

        let mut frame = Frame {
            args: function.args.iter().map(|(arg, _)| arg.clone()).zip(args).collect(),
            ..Frame::default()
        };
        self.depth += 1;
        let result = self.eval(&mut frame, &function.body);
        self.depth -= 1;
        let released = frame
            .slots
            .values()
            .try_for_each(|address| self.memory.free(address));

        let value = match result {
            Ok(value) | Err(Unwind::Return(value)) => value,
            Err(Unwind::Trap(trap)) => return Err(trap),
            Err(Unwind::Break) | Err(Unwind::Continue) => {
                return fault(format!("break or continue escaped {}", name));
            }
        };
        released?;
        Ok(value)
    }

    /// Run a call converter against storage already in memory.
    pub fn call_converter(&mut self, name: &str, return_slot: &Address, argv: &Address) -> Result<(), Trap> {
        self.call_function(
            name,
            vec![RtValue::Ptr(Some(return_slot.clone())), RtValue::Ptr(Some(argv.clone()))],
        )?;
        Ok(())
    }

    fn eval(&mut self, frame: &mut Frame, expr: &NativeExpr) -> Eval {
        match expr {
            NativeExpr::Constant(constant) => Ok(constant_value(constant)),
            NativeExpr::Variable(name) => match frame.args.get(name) {
                Some(value) => Ok(value.clone()),
                None => Err(Trap::Fault(format!("unbound variable {}", name)).into()),
            },
            NativeExpr::StackSlot { name, ty } => {
                if let Some(address) = frame.slots.get(name) {
                    return Ok(RtValue::Ptr(Some(address.clone())));
                }
                let address = self.memory.allocate_slot(RtValue::zero(ty));
                frame.slots.insert(name.clone(), address.clone());
                Ok(RtValue::Ptr(Some(address)))
            }
            NativeExpr::Load(ptr) => {
                let ptr = self.eval(frame, ptr)?;
                Ok(self.memory.load(ptr.address()?)?)
            }
            NativeExpr::Store { ptr, value } => {
                let ptr = self.eval(frame, ptr)?;
                let value = self.eval(frame, value)?;
                self.memory.store(ptr.address()?, value)?;
                Ok(RtValue::Void)
            }
            NativeExpr::ElementPtr { base, offsets } => self.eval_element_ptr(frame, base, offsets),
            NativeExpr::Field { value, index } => match self.eval(frame, value)? {
                RtValue::Struct(mut fields) if *index < fields.len() => Ok(fields.swap_remove(*index)),
                other => Err(Trap::Fault(format!("no field {} in {:?}", index, other)).into()),
            },
            NativeExpr::Cast { expr, to } => {
                let value = self.eval(frame, expr)?;
                Ok(cast(value, to)?)
            }
            NativeExpr::Binop { op, left, right } => {
                let left = self.eval(frame, left)?;
                let right = self.eval(frame, right)?;
                Ok(binop(*op, left, right)?)
            }
            NativeExpr::Unaryop { op, operand } => {
                let operand = self.eval(frame, operand)?;
                Ok(unaryop(*op, operand)?)
            }
            NativeExpr::Call { target, args } => self.eval_call(frame, target, args),
            NativeExpr::Branch { cond, then, otherwise } => {
                if self.eval(frame, cond)?.as_bool()? {
                    self.eval(frame, then)
                } else {
                    self.eval(frame, otherwise)
                }
            }
            NativeExpr::While { cond, body, orelse } => self.eval_while(frame, cond, body, orelse),
            NativeExpr::Sequence(items) => {
                let mut last = RtValue::Void;
                for item in items {
                    last = self.eval(frame, item)?;
                }
                Ok(last)
            }
            NativeExpr::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(frame, value)?,
                    None => RtValue::Void,
                };
                Err(Unwind::Return(value))
            }
            NativeExpr::Break => Err(Unwind::Break),
            NativeExpr::Continue => Err(Unwind::Continue),
            NativeExpr::Finally { body, teardowns } => self.eval_finally(frame, body, teardowns),
            NativeExpr::ActivatesTeardown(tag) => {
                frame.active.insert(tag.clone());
                Ok(RtValue::Void)
            }
            NativeExpr::Throw { exception, message } => {
                let message = match self.eval(frame, message)? {
                    RtValue::Utf8(text) => text,
                    handle => self.memory.read_str(&handle)?,
                };
                debug!(exception = exception.as_str(), message = message.as_str(), "raise");
                Err(externs::raise(exception, message).into())
            }
        }
    }

    fn eval_element_ptr(&mut self, frame: &mut Frame, base: &NativeExpr, offsets: &[NativeExpr]) -> Eval {
        let base = self.eval(frame, base)?;
        let mut indices = Vec::with_capacity(offsets.len());
        for offset in offsets {
            indices.push(self.eval(frame, offset)?.as_int()?);
        }
        Ok(RtValue::Ptr(Some(base.address()?.offset(&indices)?)))
    }

    fn eval_call(&mut self, frame: &mut Frame, target: &CallTarget, args: &[NativeExpr]) -> Eval {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(frame, arg)?);
        }
        if !target.external {
            return Ok(self.call_function(&target.name, values)?);
        }
        let Some(function) = externs::lookup(target) else {
            return Err(Trap::Fault(format!("unknown runtime symbol {}", target.name)).into());
        };
        Ok(function(&mut self.memory, target, &values)?)
    }

    /// `orelse` runs when the condition turns false, not after a `Break`.
    fn eval_while(&mut self, frame: &mut Frame, cond: &NativeExpr, body: &NativeExpr, orelse: &NativeExpr) -> Eval {
        loop {
            if !self.eval(frame, cond)?.as_bool()? {
                self.eval(frame, orelse)?;
                break;
            }
            match self.eval(frame, body) {
                Ok(_) | Err(Unwind::Continue) => {}
                Err(Unwind::Break) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(RtValue::Void)
    }

    /// Teardowns run in reverse order whichever way `body` exits. A tagged
    /// teardown runs only if its tag was activated, and consumes the tag.
    fn eval_finally(&mut self, frame: &mut Frame, body: &NativeExpr, teardowns: &[Teardown]) -> Eval {
        let mut outcome = self.eval(frame, body);
        for teardown in teardowns.iter().rev() {
            let expr = match teardown {
                Teardown::ByTag { tag, expr } => {
                    if !frame.active.remove(tag) {
                        continue;
                    }
                    expr
                }
                Teardown::Always(expr) => expr,
            };
            if let Err(unwind) = self.eval(frame, expr) {
                // an exception already in flight wins
                if !matches!(outcome, Err(Unwind::Trap(_))) {
                    outcome = Err(unwind);
                }
            }
        }
        outcome
    }
}

fn constant_value(constant: &Constant) -> RtValue {
    match constant {
        Constant::Void => RtValue::Void,
        Constant::Int { bits: 1, value, .. } => RtValue::bool(*value != 0),
        Constant::Int { value, .. } => RtValue::Int(*value),
        Constant::Float { value, .. } => RtValue::Float(*value),
        Constant::NullPointer(_) => RtValue::Ptr(None),
        Constant::Utf8(text) => RtValue::Utf8(text.clone()),
        Constant::Zero(ty) => RtValue::zero(ty),
    }
}

fn cast(value: RtValue, to: &NativeType) -> Result<RtValue, Trap> {
    match (to, value) {
        (NativeType::Int { bits: 1, .. }, RtValue::Int(v)) => Ok(RtValue::bool(v != 0)),
        (NativeType::Int { .. }, RtValue::Int(v)) => Ok(RtValue::Int(v)),
        (NativeType::Int { .. }, RtValue::Float(x)) => Ok(RtValue::Int(x as i64)),
        (NativeType::Float { .. }, RtValue::Int(v)) => Ok(RtValue::Float(v as f64)),
        (NativeType::Float { .. }, RtValue::Float(x)) => Ok(RtValue::Float(x)),
        (NativeType::Pointer(_), value @ RtValue::Ptr(_)) => Ok(value),
        (NativeType::Struct(_), value @ RtValue::Struct(_)) => Ok(value),
        (NativeType::Void, _) => Ok(RtValue::Void),
        (to, value) => fault(format!("cannot cast {:?} to {}", value, to)),
    }
}

fn binop(op: NativeBinaryOp, left: RtValue, right: RtValue) -> Result<RtValue, Trap> {
    use NativeBinaryOp::*;
    match (left, right) {
        (RtValue::Int(a), RtValue::Int(b)) => Ok(match op {
            Add => RtValue::Int(a.wrapping_add(b)),
            Sub => RtValue::Int(a.wrapping_sub(b)),
            Mul => RtValue::Int(a.wrapping_mul(b)),
            Div => return fault("integer division is not a native operation"),
            BitAnd => RtValue::Int(a & b),
            BitOr => RtValue::Int(a | b),
            BitXor => RtValue::Int(a ^ b),
            Eq => RtValue::bool(a == b),
            NotEq => RtValue::bool(a != b),
            Lt => RtValue::bool(a < b),
            LtE => RtValue::bool(a <= b),
            Gt => RtValue::bool(a > b),
            GtE => RtValue::bool(a >= b),
        }),
        (RtValue::Float(a), RtValue::Float(b)) => Ok(match op {
            Add => RtValue::Float(a + b),
            Sub => RtValue::Float(a - b),
            Mul => RtValue::Float(a * b),
            Div => RtValue::Float(a / b),
            Eq => RtValue::bool(a == b),
            NotEq => RtValue::bool(a != b),
            Lt => RtValue::bool(a < b),
            LtE => RtValue::bool(a <= b),
            Gt => RtValue::bool(a > b),
            GtE => RtValue::bool(a >= b),
            BitAnd | BitOr | BitXor => return fault(format!("'{}' on floats", op.as_str())),
        }),
        (RtValue::Ptr(a), RtValue::Ptr(b)) => match op {
            Eq => Ok(RtValue::bool(a == b)),
            NotEq => Ok(RtValue::bool(a != b)),
            _ => fault(format!("'{}' on pointers", op.as_str())),
        },
        (left, right) => fault(format!("'{}' on {:?} and {:?}", op.as_str(), left, right)),
    }
}

fn unaryop(op: NativeUnaryOp, operand: RtValue) -> Result<RtValue, Trap> {
    match (op, operand) {
        (NativeUnaryOp::Negate, RtValue::Int(v)) => Ok(RtValue::Int(v.wrapping_neg())),
        (NativeUnaryOp::Negate, RtValue::Float(x)) => Ok(RtValue::Float(-x)),
        (NativeUnaryOp::LogicalNot, RtValue::Int(v)) => Ok(RtValue::bool(v == 0)),
        (NativeUnaryOp::BitNot, RtValue::Int(v)) => Ok(RtValue::Int(!v)),
        (op, operand) => fault(format!("{:?} on {:?}", op, operand)),
    }
}

impl Backend for NativeInterpreter {
    fn add_definitions(&mut self, definitions: BTreeMap<String, NativeFunction>) {
        for (name, function) in definitions {
            debug!(name = name.as_str(), "definition loaded");
            self.functions.insert(name, Rc::new(function));
        }
    }

    fn has_definition(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    fn invoke_converter(
        &mut self,
        name: &str,
        inputs: &[TypeKey],
        output: &TypeKey,
        args: &[Value],
    ) -> Result<Value, BackendError> {
        if !self.has_definition(name) {
            return Err(BackendError::UndefinedFunction(name.to_string()));
        }
        if inputs.len() != args.len() {
            return Err(BackendError::Unsupported(format!(
                "{} expects {} arguments, got {}",
                name,
                inputs.len(),
                args.len()
            )));
        }
        if let Some(key) = inputs.iter().chain([output]).find(|key| !marshal::is_marshalable(key)) {
            return Err(BackendError::Unsupported(format!("values of type '{}' cannot cross the call boundary", key)));
        }

        // one cell per argument, an array of pointers to them, and the result slot
        let mut cells = Vec::with_capacity(args.len());
        for (key, value) in inputs.iter().zip(args) {
            match marshal::to_native(&mut self.memory, &mut self.registry, key, value) {
                Ok(native) => cells.push(self.memory.allocate_slot(native)),
                Err(err) => {
                    self.release_arguments(inputs, &cells)?;
                    return Err(err);
                }
            }
        }
        let pointers = cells.iter().map(|cell| RtValue::Ptr(Some(cell.clone()))).collect();
        let argv = self.memory.allocate(pointers, Payload::Empty, false);
        let layout = self.registry.get(output).layout();
        let return_slot = self.memory.allocate_slot(RtValue::zero(&layout));

        let result = self.call_converter(name, &return_slot, &argv).and_then(|()| {
            let native = self.memory.load(&return_slot)?;
            let value = marshal::from_native(&self.memory, output, &native)?;
            marshal::release(&mut self.memory, output, &native)?;
            Ok(value)
        });

        self.release_arguments(inputs, &cells)?;
        self.memory.free(&argv)?;
        self.memory.free(&return_slot)?;
        Ok(result?)
    }
}

impl NativeInterpreter {
    fn release_arguments(&mut self, inputs: &[TypeKey], cells: &[Address]) -> Result<(), Trap> {
        for (key, cell) in inputs.iter().zip(cells) {
            let native = self.memory.load(cell)?;
            marshal::release(&mut self.memory, key, &native)?;
            self.memory.free(cell)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
