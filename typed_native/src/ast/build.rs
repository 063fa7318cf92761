//! Constructors for AST nodes with default spans.
//!
//! Used by embedders that synthesize functions programmatically and by tests.

use super::*;

fn boxed(e: Expr) -> Box<Expr> {
    Box::new(e)
}

pub fn name(id: &str) -> Expr {
    Expr::Name(id.to_string(), Span::default())
}

pub fn int(value: i64) -> Expr {
    Expr::Literal(Literal::Int(value), Span::default())
}

pub fn float(value: f64) -> Expr {
    Expr::Literal(Literal::Float(value), Span::default())
}

pub fn string(value: &str) -> Expr {
    Expr::Literal(Literal::Str(value.to_string()), Span::default())
}

pub fn boolean(value: bool) -> Expr {
    Expr::Literal(Literal::Bool(value), Span::default())
}

pub fn none() -> Expr {
    Expr::Literal(Literal::None, Span::default())
}

pub fn binop(left: Expr, op: Operator, right: Expr) -> Expr {
    Expr::BinOp {
        left: boxed(left),
        op,
        right: boxed(right),
        span: Span::default(),
    }
}

pub fn unary(op: UnaryOperator, operand: Expr) -> Expr {
    Expr::UnaryOp {
        op,
        operand: boxed(operand),
        span: Span::default(),
    }
}

pub fn bool_op(op: BoolOperator, values: Vec<Expr>) -> Expr {
    Expr::BoolOp {
        op,
        values,
        span: Span::default(),
    }
}

pub fn compare(left: Expr, op: CompareOperator, right: Expr) -> Expr {
    compare_chain(left, vec![op], vec![right])
}

pub fn compare_chain(left: Expr, ops: Vec<CompareOperator>, comparators: Vec<Expr>) -> Expr {
    Expr::Compare {
        left: boxed(left),
        ops,
        comparators,
        span: Span::default(),
    }
}

pub fn call(func: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call {
        func: boxed(func),
        args,
        span: Span::default(),
    }
}

pub fn attr(value: Expr, attr: &str) -> Expr {
    Expr::Attribute {
        value: boxed(value),
        attr: attr.to_string(),
        span: Span::default(),
    }
}

/// `value.method(args)`
pub fn method(value: Expr, method: &str, args: Vec<Expr>) -> Expr {
    call(attr(value, method), args)
}

pub fn subscript(value: Expr, index: Expr) -> Expr {
    Expr::Subscript {
        value: boxed(value),
        index: boxed(index),
        span: Span::default(),
    }
}

/// `value[lower:upper]`
pub fn slice(value: Expr, lower: Option<Expr>, upper: Option<Expr>) -> Expr {
    subscript(
        value,
        Expr::Slice {
            lower: lower.map(boxed),
            upper: upper.map(boxed),
            step: None,
            span: Span::default(),
        },
    )
}

pub fn if_exp(test: Expr, body: Expr, orelse: Expr) -> Expr {
    Expr::IfExp {
        test: boxed(test),
        body: boxed(body),
        orelse: boxed(orelse),
        span: Span::default(),
    }
}

pub fn tuple(elements: Vec<Expr>) -> Expr {
    Expr::Tuple(elements, Span::default())
}

pub fn list(elements: Vec<Expr>) -> Expr {
    Expr::List(elements, Span::default())
}

pub fn expr_stmt(value: Expr) -> Stmt {
    Stmt::Expr(value, Span::default())
}

/// `target = value` for a plain name.
pub fn assign(target: &str, value: Expr) -> Stmt {
    assign_to(name(target), value)
}

pub fn assign_to(target: Expr, value: Expr) -> Stmt {
    Stmt::Assign {
        targets: vec![target],
        value,
        span: Span::default(),
    }
}

pub fn aug_assign(target: &str, op: Operator, value: Expr) -> Stmt {
    Stmt::AugAssign {
        target: name(target),
        op,
        value,
        span: Span::default(),
    }
}

pub fn ret(value: Expr) -> Stmt {
    Stmt::Return(Some(value), Span::default())
}

pub fn ret_none() -> Stmt {
    Stmt::Return(None, Span::default())
}

pub fn if_then(test: Expr, body: Vec<Stmt>) -> Stmt {
    if_else(test, body, Vec::new())
}

pub fn if_else(test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Stmt {
    Stmt::If {
        test,
        body,
        orelse,
        span: Span::default(),
    }
}

pub fn while_loop(test: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While {
        test,
        body,
        orelse: Vec::new(),
        span: Span::default(),
    }
}

pub fn for_in(target: &str, iter: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::For {
        target: name(target),
        iter,
        body,
        orelse: Vec::new(),
        span: Span::default(),
    }
}

pub fn brk() -> Stmt {
    Stmt::Break(Span::default())
}

pub fn cont() -> Stmt {
    Stmt::Continue(Span::default())
}

pub fn pass() -> Stmt {
    Stmt::Pass(Span::default())
}

pub fn assert_that(test: Expr, msg: Option<Expr>) -> Stmt {
    Stmt::Assert {
        test,
        msg,
        span: Span::default(),
    }
}

pub fn raise(exc: Expr) -> Stmt {
    Stmt::Raise(Some(exc), Span::default())
}

fn args(names: &[&str]) -> Vec<Arg> {
    names
        .iter()
        .map(|name| Arg {
            name: name.to_string(),
            span: Span::default(),
        })
        .collect()
}

pub fn function(name: &str, params: &[&str], body: Vec<Stmt>) -> FunctionAst {
    FunctionAst::Def(FunctionDef {
        name: name.to_string(),
        args: args(params),
        body,
        span: Span::default(),
    })
}

pub fn lambda(params: &[&str], body: Expr) -> FunctionAst {
    FunctionAst::Lambda(Lambda {
        args: args(params),
        body,
        span: Span::default(),
    })
}
