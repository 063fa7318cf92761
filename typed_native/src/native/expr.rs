use serde::{Deserialize, Serialize};

use super::types::NativeType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Void,
    Int { bits: u8, signed: bool, value: i64 },
    Float { bits: u8, value: f64 },
    NullPointer(NativeType),
    /// A static UTF-8 buffer; only meaningful as an argument to `str_from_utf8`
    /// or as the message of a `Throw`.
    Utf8(String),
    /// All-zero value of a type: integers are 0, pointers are null.
    Zero(NativeType),
}

impl Constant {
    pub fn int(value: i64) -> Self {
        Constant::Int {
            bits: 64,
            signed: true,
            value,
        }
    }

    pub fn bool(value: bool) -> Self {
        Constant::Int {
            bits: 1,
            signed: false,
            value: i64::from(value),
        }
    }

    pub fn float(value: f64) -> Self {
        Constant::Float { bits: 64, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeBinaryOp {
    Add,
    Sub,
    Mul,
    /// Float division; integer division is always lowered through the runtime.
    Div,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl NativeBinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeBinaryOp::Add => "+",
            NativeBinaryOp::Sub => "-",
            NativeBinaryOp::Mul => "*",
            NativeBinaryOp::Div => "/",
            NativeBinaryOp::BitAnd => "&",
            NativeBinaryOp::BitOr => "|",
            NativeBinaryOp::BitXor => "^",
            NativeBinaryOp::Eq => "==",
            NativeBinaryOp::NotEq => "!=",
            NativeBinaryOp::Lt => "<",
            NativeBinaryOp::LtE => "<=",
            NativeBinaryOp::Gt => ">",
            NativeBinaryOp::GtE => ">=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            NativeBinaryOp::Eq
                | NativeBinaryOp::NotEq
                | NativeBinaryOp::Lt
                | NativeBinaryOp::LtE
                | NativeBinaryOp::Gt
                | NativeBinaryOp::GtE
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeUnaryOp {
    Negate,
    /// Logical not of a `bool`.
    LogicalNot,
    /// Bitwise complement of an integer.
    BitNot,
}

/// Code run when a `Finally` block exits, normally or by unwinding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Teardown {
    /// Runs only if `ActivatesTeardown(tag)` executed inside the block.
    ByTag { tag: String, expr: NativeExpr },
    Always(NativeExpr),
}

/// Description of a callable symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallTarget {
    pub name: String,
    pub arg_types: Vec<NativeType>,
    pub output_type: NativeType,
    pub external: bool,
    pub varargs: bool,
    pub intrinsic: bool,
    pub can_throw: bool,
}

impl CallTarget {
    /// A function defined in this compilation session.
    pub fn internal(name: impl Into<String>, arg_types: Vec<NativeType>, output_type: NativeType) -> Self {
        Self {
            name: name.into(),
            arg_types,
            output_type,
            external: false,
            varargs: false,
            intrinsic: false,
            can_throw: true,
        }
    }

    /// A runtime library symbol.
    pub fn external(
        name: impl Into<String>,
        arg_types: Vec<NativeType>,
        output_type: NativeType,
        can_throw: bool,
    ) -> Self {
        Self {
            name: name.into(),
            arg_types,
            output_type,
            external: true,
            varargs: false,
            intrinsic: false,
            can_throw,
        }
    }

    pub fn intrinsic(mut self) -> Self {
        self.intrinsic = true;
        self
    }

    pub fn call(&self, args: Vec<NativeExpr>) -> NativeExpr {
        NativeExpr::Call {
            target: self.clone(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NativeExpr {
    Constant(Constant),
    /// A function argument, by name.
    Variable(String),
    /// Address of a frame-local slot. Every evaluation with the same name in
    /// the same frame yields the same address.
    StackSlot { name: String, ty: NativeType },
    Load(Box<NativeExpr>),
    Store {
        ptr: Box<NativeExpr>,
        value: Box<NativeExpr>,
    },
    /// Address arithmetic: the first offset indexes the pointer, the rest
    /// select struct fields.
    ElementPtr {
        base: Box<NativeExpr>,
        offsets: Vec<NativeExpr>,
    },
    /// Field `index` of a struct value.
    Field {
        value: Box<NativeExpr>,
        index: usize,
    },
    Cast {
        expr: Box<NativeExpr>,
        to: NativeType,
    },
    Binop {
        op: NativeBinaryOp,
        left: Box<NativeExpr>,
        right: Box<NativeExpr>,
    },
    Unaryop {
        op: NativeUnaryOp,
        operand: Box<NativeExpr>,
    },
    Call {
        target: CallTarget,
        args: Vec<NativeExpr>,
    },
    /// Evaluates to the value of the branch taken.
    Branch {
        cond: Box<NativeExpr>,
        then: Box<NativeExpr>,
        otherwise: Box<NativeExpr>,
    },
    While {
        cond: Box<NativeExpr>,
        body: Box<NativeExpr>,
        orelse: Box<NativeExpr>,
    },
    /// Evaluates to the value of its last element.
    Sequence(Vec<NativeExpr>),
    Return(Option<Box<NativeExpr>>),
    Break,
    Continue,
    /// Evaluates to the value of `body`; teardowns run in reverse order on exit.
    Finally {
        body: Box<NativeExpr>,
        teardowns: Vec<Teardown>,
    },
    ActivatesTeardown(String),
    /// Raise a Python exception. `message` is a `Utf8` constant or a string handle.
    Throw {
        exception: String,
        message: Box<NativeExpr>,
    },
}

impl NativeExpr {
    pub fn void() -> Self {
        NativeExpr::Constant(Constant::Void)
    }

    pub fn int(value: i64) -> Self {
        NativeExpr::Constant(Constant::int(value))
    }

    pub fn bool(value: bool) -> Self {
        NativeExpr::Constant(Constant::bool(value))
    }

    pub fn float(value: f64) -> Self {
        NativeExpr::Constant(Constant::float(value))
    }

    pub fn utf8(text: impl Into<String>) -> Self {
        NativeExpr::Constant(Constant::Utf8(text.into()))
    }

    pub fn zero(ty: NativeType) -> Self {
        NativeExpr::Constant(Constant::Zero(ty))
    }

    pub fn null(ty: NativeType) -> Self {
        NativeExpr::Constant(Constant::NullPointer(ty))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        NativeExpr::Variable(name.into())
    }

    pub fn slot(name: impl Into<String>, ty: NativeType) -> Self {
        NativeExpr::StackSlot {
            name: name.into(),
            ty,
        }
    }

    pub fn load(self) -> Self {
        NativeExpr::Load(Box::new(self))
    }

    pub fn store(self, value: NativeExpr) -> Self {
        NativeExpr::Store {
            ptr: Box::new(self),
            value: Box::new(value),
        }
    }

    /// Address of struct field `field` of the value this pointer points to.
    pub fn field(self, field: usize) -> Self {
        self.element_ptr(vec![NativeExpr::int(0), NativeExpr::int(field as i64)])
    }

    pub fn element_ptr(self, offsets: Vec<NativeExpr>) -> Self {
        NativeExpr::ElementPtr {
            base: Box::new(self),
            offsets,
        }
    }

    /// Field `index` of the struct value this expression produces.
    pub fn extract(self, index: usize) -> Self {
        NativeExpr::Field {
            value: Box::new(self),
            index,
        }
    }

    pub fn cast(self, to: NativeType) -> Self {
        NativeExpr::Cast {
            expr: Box::new(self),
            to,
        }
    }

    pub fn binop(self, op: NativeBinaryOp, right: NativeExpr) -> Self {
        NativeExpr::Binop {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn add(self, right: NativeExpr) -> Self {
        self.binop(NativeBinaryOp::Add, right)
    }

    pub fn sub(self, right: NativeExpr) -> Self {
        self.binop(NativeBinaryOp::Sub, right)
    }

    pub fn eq(self, right: NativeExpr) -> Self {
        self.binop(NativeBinaryOp::Eq, right)
    }

    pub fn ne(self, right: NativeExpr) -> Self {
        self.binop(NativeBinaryOp::NotEq, right)
    }

    pub fn lt(self, right: NativeExpr) -> Self {
        self.binop(NativeBinaryOp::Lt, right)
    }

    pub fn gt(self, right: NativeExpr) -> Self {
        self.binop(NativeBinaryOp::Gt, right)
    }

    pub fn ge(self, right: NativeExpr) -> Self {
        self.binop(NativeBinaryOp::GtE, right)
    }

    pub fn logical_not(self) -> Self {
        NativeExpr::Unaryop {
            op: NativeUnaryOp::LogicalNot,
            operand: Box::new(self),
        }
    }

    pub fn branch(cond: NativeExpr, then: NativeExpr, otherwise: NativeExpr) -> Self {
        NativeExpr::Branch {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// `if cond { then }` with no value.
    pub fn when(cond: NativeExpr, then: NativeExpr) -> Self {
        Self::branch(cond, then, NativeExpr::void())
    }

    pub fn while_loop(cond: NativeExpr, body: NativeExpr, orelse: NativeExpr) -> Self {
        NativeExpr::While {
            cond: Box::new(cond),
            body: Box::new(body),
            orelse: Box::new(orelse),
        }
    }

    /// A sequence, collapsing the trivial cases.
    pub fn sequence(mut items: Vec<NativeExpr>) -> Self {
        match items.len() {
            0 => NativeExpr::void(),
            1 => items.remove(0),
            _ => NativeExpr::Sequence(items),
        }
    }

    pub fn ret(value: Option<NativeExpr>) -> Self {
        NativeExpr::Return(value.map(Box::new))
    }

    pub fn throw(exception: &str, message: NativeExpr) -> Self {
        NativeExpr::Throw {
            exception: exception.to_string(),
            message: Box::new(message),
        }
    }

    pub fn is_void_constant(&self) -> bool {
        matches!(self, NativeExpr::Constant(Constant::Void))
    }

    /// Whether control can never fall through this expression.
    pub fn never_returns(&self) -> bool {
        match self {
            NativeExpr::Return(_)
            | NativeExpr::Break
            | NativeExpr::Continue
            | NativeExpr::Throw { .. } => true,
            NativeExpr::Sequence(items) => items.iter().any(NativeExpr::never_returns),
            NativeExpr::Finally { body, .. } => body.never_returns(),
            NativeExpr::Branch {
                cond,
                then,
                otherwise,
            } => cond.never_returns() || (then.never_returns() && otherwise.never_returns()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_collapses() {
        assert_eq!(NativeExpr::sequence(vec![]), NativeExpr::void());
        assert_eq!(NativeExpr::sequence(vec![NativeExpr::int(1)]), NativeExpr::int(1));
    }

    #[test]
    fn test_never_returns() {
        let throw = NativeExpr::throw("ValueError", NativeExpr::utf8("x"));
        assert!(NativeExpr::sequence(vec![NativeExpr::int(1), throw.clone()]).never_returns());
        assert!(!NativeExpr::when(NativeExpr::bool(true), throw.clone()).never_returns());
        assert!(NativeExpr::branch(NativeExpr::bool(true), throw, NativeExpr::Break).never_returns());
    }
}
