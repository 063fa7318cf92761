use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use super::expr::{Constant, NativeExpr, NativeUnaryOp, Teardown};
use super::types::NativeType;

/// A fully resolved native function definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeFunction {
    pub args: Vec<(String, NativeType)>,
    pub output_type: NativeType,
    pub body: NativeExpr,
}

impl NativeFunction {
    pub fn new(args: Vec<(String, NativeType)>, output_type: NativeType, body: NativeExpr) -> Self {
        Self {
            args,
            output_type,
            body,
        }
    }

    pub fn arg_types(&self) -> Vec<NativeType> {
        self.args.iter().map(|(_, ty)| ty.clone()).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Render with the symbol name it is registered under.
    pub fn pretty(&self, name: &str) -> String {
        let mut out = String::new();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|(arg, ty)| format!("{}: {}", arg, ty))
            .collect();
        let _ = writeln!(out, "def {}({}) -> {}:", name, args.join(", "), self.output_type);
        block(&mut out, &self.body, 1);
        out
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty("<anonymous>"))
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}

/// Statement-position rendering: one line per effect.
fn block(out: &mut String, expr: &NativeExpr, depth: usize) {
    match expr {
        NativeExpr::Sequence(items) => {
            if items.is_empty() {
                indent(out, depth);
                out.push_str("pass\n");
            }
            for item in items {
                block(out, item, depth);
            }
        }
        NativeExpr::Branch {
            cond,
            then,
            otherwise,
        } => {
            indent(out, depth);
            let _ = writeln!(out, "if {}:", inline(cond));
            block(out, then, depth + 1);
            if !otherwise.is_void_constant() {
                indent(out, depth);
                out.push_str("else:\n");
                block(out, otherwise, depth + 1);
            }
        }
        NativeExpr::While { cond, body, orelse } => {
            indent(out, depth);
            let _ = writeln!(out, "while {}:", inline(cond));
            block(out, body, depth + 1);
            if !orelse.is_void_constant() {
                indent(out, depth);
                out.push_str("else:\n");
                block(out, orelse, depth + 1);
            }
        }
        NativeExpr::Finally { body, teardowns } => {
            indent(out, depth);
            out.push_str("try:\n");
            block(out, body, depth + 1);
            indent(out, depth);
            out.push_str("finally:\n");
            for teardown in teardowns.iter().rev() {
                match teardown {
                    Teardown::ByTag { tag, expr } => {
                        indent(out, depth + 1);
                        let _ = writeln!(out, "if {}:", tag);
                        block(out, expr, depth + 2);
                    }
                    Teardown::Always(expr) => block(out, expr, depth + 1),
                }
            }
            if teardowns.is_empty() {
                indent(out, depth + 1);
                out.push_str("pass\n");
            }
        }
        other => {
            indent(out, depth);
            out.push_str(&inline(other));
            out.push('\n');
        }
    }
}

fn list(items: &[NativeExpr]) -> String {
    items.iter().map(inline).collect::<Vec<_>>().join(", ")
}

/// Expression-position rendering on one line.
fn inline(expr: &NativeExpr) -> String {
    match expr {
        NativeExpr::Constant(constant) => match constant {
            Constant::Void => "void".to_string(),
            Constant::Int { bits: 1, value, .. } => (*value != 0).to_string(),
            Constant::Int { value, .. } => value.to_string(),
            Constant::Float { value, .. } => format!("{:?}", value),
            Constant::NullPointer(_) => "null".to_string(),
            Constant::Utf8(text) => format!("{:?}", text),
            Constant::Zero(ty) => format!("zero<{}>", ty),
        },
        NativeExpr::Variable(name) => name.clone(),
        NativeExpr::StackSlot { name, .. } => format!("&{}", name),
        NativeExpr::Load(ptr) => format!("load({})", inline(ptr)),
        NativeExpr::Store { ptr, value } => format!("store({}, {})", inline(ptr), inline(value)),
        NativeExpr::ElementPtr { base, offsets } => {
            format!("gep({}, {})", inline(base), list(offsets))
        }
        NativeExpr::Field { value, index } => format!("{}.{}", inline(value), index),
        NativeExpr::Cast { expr, to } => format!("cast<{}>({})", to, inline(expr)),
        NativeExpr::Binop { op, left, right } => {
            format!("({} {} {})", inline(left), op.as_str(), inline(right))
        }
        NativeExpr::Unaryop { op, operand } => {
            let symbol = match op {
                NativeUnaryOp::Negate => "-",
                NativeUnaryOp::LogicalNot => "!",
                NativeUnaryOp::BitNot => "~",
            };
            format!("{}{}", symbol, inline(operand))
        }
        NativeExpr::Call { target, args } => format!("{}({})", target.name, list(args)),
        NativeExpr::Branch {
            cond,
            then,
            otherwise,
        } => format!("({} ? {} : {})", inline(cond), inline(then), inline(otherwise)),
        NativeExpr::While { cond, body, .. } => {
            format!("while {} {{ {} }}", inline(cond), inline(body))
        }
        NativeExpr::Sequence(items) => {
            let parts: Vec<String> = items.iter().map(inline).collect();
            format!("{{ {} }}", parts.join("; "))
        }
        NativeExpr::Return(None) => "return".to_string(),
        NativeExpr::Return(Some(value)) => format!("return {}", inline(value)),
        NativeExpr::Break => "break".to_string(),
        NativeExpr::Continue => "continue".to_string(),
        NativeExpr::Finally { body, teardowns } => {
            format!("try {{ {} }} finally[{}]", inline(body), teardowns.len())
        }
        NativeExpr::ActivatesTeardown(tag) => format!("activate {}", tag),
        NativeExpr::Throw { exception, message } => {
            format!("raise {}({})", exception, inline(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::expr::CallTarget;

    #[test]
    fn test_pretty_print() {
        let slot = NativeExpr::slot("v.x", NativeType::int64());
        let function = NativeFunction::new(
            vec![("a.x".into(), NativeType::int64())],
            NativeType::int64(),
            NativeExpr::sequence(vec![
                slot.clone().store(NativeExpr::variable("a.x")),
                NativeExpr::when(
                    slot.clone().load().lt(NativeExpr::int(0)),
                    NativeExpr::throw("ValueError", NativeExpr::utf8("negative")),
                ),
                NativeExpr::ret(Some(
                    CallTarget::external("int64_pow", vec![], NativeType::int64(), true)
                        .call(vec![slot.load(), NativeExpr::int(2)]),
                )),
            ]),
        );
        insta::assert_snapshot!(function.pretty("py.square").trim_end(), @r###"
        def py.square(a.x: int64) -> int64:
            store(&v.x, a.x)
            if (load(&v.x) < 0):
                raise ValueError("negative")
            return int64_pow(load(&v.x), 2)
        "###);
    }
}
