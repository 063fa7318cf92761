//! Statement conversion
//!
//! Each statement is converted in its own expression context, so the
//! temporaries it creates are destroyed when it completes. Every converter
//! returns the native code together with whether control can fall through
//! to the next statement.

use typed_native_runtime::ExceptionKind;

use super::context::ExpressionContext;
use super::expression::{binop_for, convert_expr};
use super::function::{assign_local, convert_return, FunctionConverter, LoopState};
use crate::ast::{Expr, Stmt};
use crate::error::{conversion_error, ConversionError};
use crate::native::{NativeExpr, NativeType};
use crate::typed_value::{CResult, TypedValue};
use crate::types::TypeKey;

/// Converted code and whether control reaches its end.
pub(crate) type Block = (NativeExpr, bool);

impl<'s> FunctionConverter<'s> {
    pub(crate) fn convert_block(&mut self, body: &[Stmt]) -> CResult<Block> {
        let mut code = Vec::new();
        for stmt in body {
            let (expr, reachable) = self.convert_statement(stmt)?;
            code.push(expr);
            if !reachable {
                // the rest of the block is dead code
                return Ok((NativeExpr::sequence(code), false));
            }
        }
        Ok((NativeExpr::sequence(code), true))
    }

    fn convert_statement(&mut self, stmt: &Stmt) -> CResult<Block> {
        self.convert_statement_inner(stmt)
            .map_err(|err| err.with_span(stmt.span()))
    }

    fn convert_statement_inner(&mut self, stmt: &Stmt) -> CResult<Block> {
        match stmt {
            Stmt::Expr(expr, _) => {
                let mut ctx = ExpressionContext::new(self);
                let reachable = convert_expr(&mut ctx, expr)?.is_some();
                Ok((ctx.finish(), reachable))
            }
            Stmt::Assign { targets, value, .. } => {
                let mut ctx = ExpressionContext::new(self);
                let Some(value) = convert_expr(&mut ctx, value)? else {
                    return Ok((ctx.finish(), false));
                };
                for target in targets {
                    if !assign_target(&mut ctx, target, &value)? {
                        return Ok((ctx.finish(), false));
                    }
                }
                Ok((ctx.finish(), true))
            }
            Stmt::AugAssign { target, op, value, .. } => {
                let mut ctx = ExpressionContext::new(self);
                let reachable = convert_aug_assign(&mut ctx, target, binop_for(*op), value)?;
                Ok((ctx.finish(), reachable))
            }
            Stmt::Return(value, _) => {
                let mut ctx = ExpressionContext::new(self);
                let value = match value {
                    Some(expr) => match convert_expr(&mut ctx, expr)? {
                        Some(value) => Some(value),
                        None => return Ok((ctx.finish(), false)),
                    },
                    None => None,
                };
                convert_return(&mut ctx, value)?;
                Ok((ctx.finish(), false))
            }
            Stmt::If {
                test, body, orelse, ..
            } => self.convert_if(test, body, orelse),
            Stmt::While {
                test, body, orelse, ..
            } => self.convert_while(test, body, orelse),
            Stmt::For {
                target,
                iter,
                body,
                orelse,
                ..
            } => self.convert_for(target, iter, body, orelse),
            Stmt::Break(_) => {
                let Some(state) = self.loops.last_mut() else {
                    return conversion_error("'break' outside loop");
                };
                state.has_break = true;
                Ok((NativeExpr::Break, false))
            }
            Stmt::Continue(_) => {
                if self.loops.is_empty() {
                    return conversion_error("'continue' not properly in loop");
                }
                Ok((NativeExpr::Continue, false))
            }
            Stmt::Pass(_) => Ok((NativeExpr::void(), true)),
            Stmt::Assert { test, msg, .. } => {
                let mut ctx = ExpressionContext::new(self);
                let reachable = convert_assert(&mut ctx, test, msg.as_ref())?;
                Ok((ctx.finish(), reachable))
            }
            Stmt::Raise(Some(exc), _) => {
                let mut ctx = ExpressionContext::new(self);
                convert_raise(&mut ctx, exc)?;
                Ok((ctx.finish(), false))
            }
            Stmt::Raise(None, _) => conversion_error("bare 'raise' has no active exception to re-raise"),
            Stmt::FunctionDef(def) => conversion_error(format!(
                "nested function '{}' cannot be compiled; define it at module level",
                def.name
            )),
        }
    }

    fn convert_if(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> CResult<Block> {
        let mut ctx = ExpressionContext::new(self);
        let Some(cond) = convert_condition(&mut ctx, test)? else {
            return Ok((ctx.finish(), false));
        };
        if ctx.constant_folding() {
            if let Some(truth) = cond.constant_bool() {
                let taken = if truth { body } else { orelse };
                let (block, reachable) = ctx.func.convert_block(taken)?;
                ctx.push_effect(block);
                return Ok((ctx.finish(), reachable));
            }
        }
        let (then_block, then_reachable) = ctx.func.convert_block(body)?;
        let (else_block, else_reachable) = ctx.func.convert_block(orelse)?;
        ctx.push_effect(NativeExpr::branch(cond.nonref_expr(), then_block, else_block));
        Ok((ctx.finish(), then_reachable || else_reachable))
    }

    fn convert_while(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> CResult<Block> {
        let mut ctx = ExpressionContext::new(self);
        // the condition runs once per iteration, so its temporaries get their own scope
        let (cond_block, flag) = ctx.scoped(|ctx| {
            let Some(cond) = convert_condition(ctx, test)? else {
                return Ok(None);
            };
            let constant = cond.constant_bool();
            let flag = ctx.alloc_slot(NativeType::bool());
            ctx.push_effect(flag.clone().store(cond.nonref_expr()));
            Ok(Some((flag, constant)))
        })?;
        let Some((flag, constant)) = flag else {
            ctx.push_effect(cond_block);
            return Ok((ctx.finish(), false));
        };
        if constant == Some(false) && ctx.constant_folding() {
            let (else_block, reachable) = ctx.func.convert_block(orelse)?;
            ctx.push_effect(else_block);
            return Ok((ctx.finish(), reachable));
        }

        ctx.func.loops.push(LoopState::default());
        let body = ctx.func.convert_block(body);
        let state = ctx.func.loops.pop().unwrap_or_default();
        let (body_block, _) = body?;
        let (else_block, else_reachable) = ctx.func.convert_block(orelse)?;

        let cond = NativeExpr::sequence(vec![cond_block, flag.load()]);
        ctx.push_effect(NativeExpr::while_loop(cond, body_block, else_block));
        let reachable = if constant == Some(true) {
            state.has_break
        } else {
            state.has_break || else_reachable
        };
        Ok((ctx.finish(), reachable))
    }

    fn convert_for(&mut self, target: &Expr, iter: &Expr, body: &[Stmt], orelse: &[Stmt]) -> CResult<Block> {
        let mut ctx = ExpressionContext::new(self);
        let Some(iterable) = convert_expr(&mut ctx, iter)? else {
            return Ok((ctx.finish(), false));
        };
        let Some(iterator) = iterable.convert_iter(&mut ctx)? else {
            return Ok((ctx.finish(), false));
        };
        let iterator = ctx.ensure_reference(iterator)?;
        let flag = ctx.alloc_slot(NativeType::bool());

        // advance, then bind the loop variable only if an item was produced
        let (cond_block, bound) = ctx.scoped(|ctx| {
            let Some((item, more)) = iterator.convert_next(ctx)? else {
                return Ok(false);
            };
            ctx.push_effect(flag.clone().store(more));
            let (bind, ()) = ctx.scoped(|ctx| {
                let item = ctx.ensure_reference(item)?;
                assign_target(ctx, target, &item)?;
                Ok(())
            })?;
            ctx.push_effect(NativeExpr::when(flag.clone().load(), bind));
            Ok(true)
        })?;
        if !bound {
            ctx.push_effect(cond_block);
            return Ok((ctx.finish(), false));
        }

        ctx.func.loops.push(LoopState::default());
        let body = ctx.func.convert_block(body);
        let state = ctx.func.loops.pop().unwrap_or_default();
        let (body_block, _) = body?;
        let (else_block, else_reachable) = ctx.func.convert_block(orelse)?;

        let cond = NativeExpr::sequence(vec![cond_block, flag.load()]);
        ctx.push_effect(NativeExpr::while_loop(cond, body_block, else_block));
        Ok((ctx.finish(), state.has_break || else_reachable))
    }
}

/// Evaluate a branch condition to a native `bool`.
fn convert_condition(ctx: &mut ExpressionContext<'_, '_>, test: &Expr) -> CResult<Option<TypedValue>> {
    let Some(value) = convert_expr(ctx, test)? else {
        return Ok(None);
    };
    value.convert_bool_cast(ctx)
}

/// Bind `value` to an assignment target. Returns false if control does not continue.
pub(crate) fn assign_target(ctx: &mut ExpressionContext<'_, '_>, target: &Expr, value: &TypedValue) -> CResult<bool> {
    match target {
        Expr::Name(name, _) => assign_local(ctx, name, value),
        Expr::Subscript {
            value: container,
            index,
            ..
        } => {
            if matches!(**index, Expr::Slice { .. }) {
                return conversion_error("slice assignment is not supported");
            }
            let Some(container) = convert_expr(ctx, container)? else {
                return Ok(false);
            };
            let Some(index) = convert_expr(ctx, index)? else {
                return Ok(false);
            };
            Ok(container.convert_setitem(ctx, &index, value)?.is_some())
        }
        Expr::Tuple(elements, _) | Expr::List(elements, _) => unpack(ctx, elements, value),
        other => Err(ConversionError::at("cannot assign to this expression", other.span())),
    }
}

fn unpack(ctx: &mut ExpressionContext<'_, '_>, targets: &[Expr], value: &TypedValue) -> CResult<bool> {
    let TypeKey::Tuple(elements) = value.key() else {
        return conversion_error(format!(
            "cannot unpack a value of static type '{}'; only tuples can be unpacked",
            value.key()
        ));
    };
    if elements.len() != targets.len() {
        let message = if elements.len() > targets.len() {
            format!("too many values to unpack (expected {})", targets.len())
        } else {
            format!(
                "not enough values to unpack (expected {}, got {})",
                targets.len(),
                elements.len()
            )
        };
        ctx.push_exception(ExceptionKind::ValueError, &message)?;
        return Ok(false);
    }
    for (i, target) in targets.iter().enumerate() {
        let index = ctx.constant_int(i as i64);
        let Some(item) = value.convert_getitem(ctx, &index)? else {
            return Ok(false);
        };
        if !assign_target(ctx, target, &item)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn convert_aug_assign(
    ctx: &mut ExpressionContext<'_, '_>,
    target: &Expr,
    op: typed_native_runtime::BinOp,
    value: &Expr,
) -> CResult<bool> {
    if !matches!(target, Expr::Name(..) | Expr::Subscript { .. }) {
        return Err(ConversionError::at(
            "illegal expression for augmented assignment",
            target.span(),
        ));
    }
    let Some(current) = convert_expr(ctx, target)? else {
        return Ok(false);
    };
    let Some(operand) = convert_expr(ctx, value)? else {
        return Ok(false);
    };
    let Some(result) = current.convert_bin_op(ctx, op, &operand)? else {
        return Ok(false);
    };
    assign_target(ctx, target, &result)
}

fn convert_assert(ctx: &mut ExpressionContext<'_, '_>, test: &Expr, msg: Option<&Expr>) -> CResult<bool> {
    let Some(cond) = convert_condition(ctx, test)? else {
        return Ok(false);
    };
    if cond.constant_bool() == Some(true) {
        return Ok(true);
    }
    // the message is only evaluated when the assertion fails
    let (failure, ()) = ctx.capture(|ctx| {
        let message = match msg {
            None => NativeExpr::utf8(""),
            Some(msg) => {
                let Some(message) = convert_expr(ctx, msg)? else {
                    return Ok(());
                };
                let Some(text) = message.convert_str_cast(ctx)? else {
                    return Ok(());
                };
                text.nonref_expr()
            }
        };
        ctx.push_effect(NativeExpr::throw(ExceptionKind::AssertionError.name(), message));
        Ok(())
    })?;
    if cond.constant_bool() == Some(false) {
        ctx.push_effect(failure);
        return Ok(false);
    }
    ctx.push_effect(NativeExpr::when(cond.nonref_expr().logical_not(), failure));
    Ok(true)
}

/// `raise E` and `raise E(message)` for builtin exception classes.
fn convert_raise(ctx: &mut ExpressionContext<'_, '_>, exc: &Expr) -> CResult<()> {
    let (class, args) = match exc {
        Expr::Call { func, args, .. } => (&**func, args.as_slice()),
        other => (other, &[][..]),
    };
    let Some(class) = convert_expr(ctx, class)? else {
        return Ok(());
    };
    let TypeKey::ExceptionType(kind) = class.key().clone() else {
        return Err(ConversionError::at(
            format!(
                "exceptions must be builtin exception classes, not '{}'",
                class.key()
            ),
            exc.span(),
        ));
    };
    let message = match args {
        [] => NativeExpr::utf8(""),
        [arg] => {
            let Some(arg) = convert_expr(ctx, arg)? else {
                return Ok(());
            };
            let Some(text) = arg.convert_str_cast(ctx)? else {
                return Ok(());
            };
            text.nonref_expr()
        }
        _ => return conversion_error("exceptions take at most one argument"),
    };
    ctx.push_effect(NativeExpr::throw(kind.name(), message));
    Ok(())
}
