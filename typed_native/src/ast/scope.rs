//! Local variable analysis.
//!
//! A name is local to a function if it is a parameter or if any statement in
//! the body binds it, regardless of where the binding sits relative to its
//! uses. Nested lambdas and function definitions have their own scopes and
//! are not entered.

use super::{Expr, FunctionAst, Stmt};

/// Parameters first, then bound names in order of first binding.
pub fn local_variables(function: &FunctionAst) -> Vec<String> {
    let mut locals: Vec<String> = function.args().iter().map(|arg| arg.name.clone()).collect();
    if let FunctionAst::Def(def) = function {
        collect_block(&def.body, &mut locals);
    }
    locals
}

fn bind(name: &str, locals: &mut Vec<String>) {
    if !locals.iter().any(|existing| existing == name) {
        locals.push(name.to_string());
    }
}

fn collect_target(target: &Expr, locals: &mut Vec<String>) {
    match target {
        Expr::Name(name, _) => bind(name, locals),
        Expr::Tuple(elements, _) | Expr::List(elements, _) => {
            for element in elements {
                collect_target(element, locals);
            }
        }
        _ => {}
    }
}

fn collect_block(body: &[Stmt], locals: &mut Vec<String>) {
    for stmt in body {
        collect_stmt(stmt, locals);
    }
}

fn collect_stmt(stmt: &Stmt, locals: &mut Vec<String>) {
    match stmt {
        Stmt::Assign { targets, .. } => {
            for target in targets {
                collect_target(target, locals);
            }
        }
        Stmt::AugAssign { target, .. } => collect_target(target, locals),
        Stmt::For {
            target,
            body,
            orelse,
            ..
        } => {
            collect_target(target, locals);
            collect_block(body, locals);
            collect_block(orelse, locals);
        }
        Stmt::If { body, orelse, .. } | Stmt::While { body, orelse, .. } => {
            collect_block(body, locals);
            collect_block(orelse, locals);
        }
        Stmt::FunctionDef(def) => bind(&def.name, locals),
        Stmt::Expr(..)
        | Stmt::Return(..)
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Pass(_)
        | Stmt::Assert { .. }
        | Stmt::Raise(..) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    #[test]
    fn test_locals_in_binding_order() {
        let def = function(
            "f",
            &["a"],
            vec![
                assign("x", int(1)),
                for_in("i", call(name("range"), vec![name("a")]), vec![assign("y", name("x"))]),
                if_else(name("a"), vec![assign("x", int(2))], vec![assign("z", int(3))]),
                ret(name("y")),
            ],
        );
        assert_eq!(local_variables(&def), vec!["a", "x", "i", "y", "z"]);
    }

    #[test]
    fn test_lambda_has_only_parameters() {
        let lam = lambda(&["p", "q"], binop(name("p"), crate::ast::Operator::Add, name("q")));
        assert_eq!(local_variables(&lam), vec!["p", "q"]);
    }
}
