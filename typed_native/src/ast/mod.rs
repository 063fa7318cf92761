//! Python function AST
//!
//! The contract between a front end and the compiler: an already-parsed
//! function or lambda with a source span on every node. Only the subset of
//! Python the conversion engine lowers is represented. The types derive
//! serde so a front end in another process can hand a function over as JSON.

pub mod build;
pub mod scope;

use serde::{Deserialize, Serialize};

use crate::span::Span;

pub use scope::local_variables;

/// Literal constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Arithmetic and bitwise operators (`BinOp` / `AugAssign` nodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    USub,
    UAdd,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal, Span),
    Name(String, Span),
    BinOp {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
        span: Span,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
        span: Span,
    },
    /// `a and b and c`: evaluates to the first falsy operand, or the last one.
    BoolOp {
        op: BoolOperator,
        values: Vec<Expr>,
        span: Span,
    },
    /// `a < b <= c`: `ops.len() == comparators.len()`.
    Compare {
        left: Box<Expr>,
        ops: Vec<CompareOperator>,
        comparators: Vec<Expr>,
        span: Span,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
        span: Span,
    },
    /// `value[index]`; slicing stores an `Expr::Slice` as the index.
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
        span: Span,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
        span: Span,
    },
    Tuple(Vec<Expr>, Span),
    List(Vec<Expr>, Span),
    /// A lambda nested inside a function body.
    Lambda(Box<Lambda>),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span)
            | Expr::Name(_, span)
            | Expr::Tuple(_, span)
            | Expr::List(_, span) => *span,
            Expr::BinOp { span, .. }
            | Expr::UnaryOp { span, .. }
            | Expr::BoolOp { span, .. }
            | Expr::Compare { span, .. }
            | Expr::Call { span, .. }
            | Expr::Attribute { span, .. }
            | Expr::Subscript { span, .. }
            | Expr::Slice { span, .. }
            | Expr::IfExp { span, .. } => *span,
            Expr::Lambda(lambda) => lambda.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr, Span),
    /// `a = b = value`
    Assign {
        targets: Vec<Expr>,
        value: Expr,
        span: Span,
    },
    AugAssign {
        target: Expr,
        op: Operator,
        value: Expr,
        span: Span,
    },
    Return(Option<Expr>, Span),
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        span: Span,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        span: Span,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Pass(Span),
    Assert {
        test: Expr,
        msg: Option<Expr>,
        span: Span,
    },
    /// `raise` with no operand re-raises; only `raise E` and `raise E(msg)` are lowered.
    Raise(Option<Expr>, Span),
    FunctionDef(Box<FunctionDef>),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(_, span)
            | Stmt::Return(_, span)
            | Stmt::Break(span)
            | Stmt::Continue(span)
            | Stmt::Pass(span)
            | Stmt::Raise(_, span) => *span,
            Stmt::Assign { span, .. }
            | Stmt::AugAssign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Assert { span, .. } => *span,
            Stmt::FunctionDef(def) => def.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arg {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub args: Vec<Arg>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub args: Vec<Arg>,
    pub body: Expr,
    pub span: Span,
}

/// The two shapes of compilable code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionAst {
    Def(FunctionDef),
    Lambda(Lambda),
}

impl FunctionAst {
    pub fn name(&self) -> &str {
        match self {
            FunctionAst::Def(def) => &def.name,
            FunctionAst::Lambda(_) => "<lambda>",
        }
    }

    pub fn args(&self) -> &[Arg] {
        match self {
            FunctionAst::Def(def) => &def.args,
            FunctionAst::Lambda(lambda) => &lambda.args,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            FunctionAst::Def(def) => def.span,
            FunctionAst::Lambda(lambda) => lambda.span,
        }
    }

    pub fn is_lambda(&self) -> bool {
        matches!(self, FunctionAst::Lambda(_))
    }

    /// Parse a function handed over by a front end as JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
