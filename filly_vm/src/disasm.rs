//! Opcode tree pretty-printer.
//!
//! Renders a loaded program as indented text for inspection: the CLI's
//! `--dump` flag and failing-test output both go through here. The format
//! is one statement per line, nested expressions inline, blocks indented
//! two spaces.

use std::fmt::Write;

use crate::opcode::{CaseClause, OpArg, OpCode, OpNode, ParamSpec, Program};

/// Render a whole program.
pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();
    dump_block(&mut out, &program.body, 0);
    out
}

/// Render one node as a standalone line (no trailing newline).
pub fn dump_node(node: &OpNode) -> String {
    let mut out = String::new();
    write_node(&mut out, node, 0, false);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn dump_block(out: &mut String, body: &[OpNode], depth: usize) {
    for node in body {
        write_node(out, node, depth, true);
    }
}

fn write_node(out: &mut String, node: &OpNode, depth: usize, as_statement: bool) {
    if as_statement {
        indent(out, depth);
    }
    match &node.op {
        OpCode::Assign => {
            write_arg(out, arg(node, 0), depth);
            out.push_str(" = ");
            write_arg(out, arg(node, 1), depth);
        }
        OpCode::ArrayAssign => {
            write_arg(out, arg(node, 0), depth);
            out.push('[');
            write_arg(out, arg(node, 1), depth);
            out.push_str("] = ");
            write_arg(out, arg(node, 2), depth);
        }
        OpCode::ArrayAccess => {
            write_arg(out, arg(node, 0), depth);
            out.push('[');
            write_arg(out, arg(node, 1), depth);
            out.push(']');
        }
        OpCode::BinaryOp(op) => {
            out.push('(');
            write_arg(out, arg(node, 0), depth);
            let _ = write!(out, " {} ", binop_symbol(*op));
            write_arg(out, arg(node, 1), depth);
            out.push(')');
        }
        OpCode::UnaryOp(op) => {
            out.push_str(match op {
                crate::opcode::UnOp::Neg => "-",
                crate::opcode::UnOp::Not => "!",
            });
            write_arg(out, arg(node, 0), depth);
        }
        OpCode::If => {
            out.push_str("if ");
            write_arg(out, arg(node, 0), depth);
            out.push_str(" {\n");
            dump_block(out, block(node, 1), depth + 1);
            indent(out, depth);
            out.push('}');
            if node.args.len() == 3 {
                out.push_str(" else {\n");
                dump_block(out, block(node, 2), depth + 1);
                indent(out, depth);
                out.push('}');
            }
        }
        OpCode::For => {
            out.push_str("for (");
            write_arg(out, arg(node, 0), depth);
            out.push_str("; ");
            write_arg(out, arg(node, 1), depth);
            out.push_str("; ");
            write_arg(out, arg(node, 2), depth);
            out.push_str(") {\n");
            dump_block(out, block(node, 3), depth + 1);
            indent(out, depth);
            out.push('}');
        }
        OpCode::While => {
            out.push_str("while ");
            write_arg(out, arg(node, 0), depth);
            out.push_str(" {\n");
            dump_block(out, block(node, 1), depth + 1);
            indent(out, depth);
            out.push('}');
        }
        OpCode::DoWhile => {
            out.push_str("do {\n");
            dump_block(out, block(node, 0), depth + 1);
            indent(out, depth);
            out.push_str("} while ");
            write_arg(out, arg(node, 1), depth);
        }
        OpCode::Switch => {
            out.push_str("switch ");
            write_arg(out, arg(node, 0), depth);
            out.push_str(" {\n");
            if let Some(OpArg::Cases(cases)) = node.args.get(1) {
                for CaseClause { value, body } in cases {
                    indent(out, depth + 1);
                    out.push_str("case ");
                    write_arg(out, Some(value), depth + 1);
                    out.push_str(":\n");
                    dump_block(out, body, depth + 2);
                }
            }
            if node.args.len() == 3 {
                indent(out, depth + 1);
                out.push_str("default:\n");
                dump_block(out, block(node, 2), depth + 2);
            }
            indent(out, depth);
            out.push('}');
        }
        OpCode::Break => out.push_str("break"),
        OpCode::Call(name) => {
            out.push_str(name);
            out.push('(');
            for (i, a) in node.args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_arg(out, Some(a), depth);
            }
            out.push(')');
        }
        OpCode::DefineFunction(name) => {
            let _ = write!(out, "function {}(", name);
            if let Some(OpArg::Params(params)) = node.args.first() {
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_param(out, p);
                }
            }
            out.push_str(") {\n");
            dump_block(out, block(node, 1), depth + 1);
            indent(out, depth);
            out.push('}');
        }
        OpCode::RegisterEventHandler(ty) => {
            let _ = write!(out, "mes({}) {{\n", ty);
            dump_block(out, block(node, 0), depth + 1);
            indent(out, depth);
            out.push('}');
        }
        OpCode::SetStep => {
            out.push_str("step(");
            write_arg(out, arg(node, 0), depth);
            out.push(')');
        }
        OpCode::Wait => {
            out.push_str("wait(");
            write_arg(out, arg(node, 0), depth);
            out.push(')');
        }
    }
    if as_statement {
        out.push('\n');
    }
}

fn write_param(out: &mut String, p: &ParamSpec) {
    out.push_str(&p.name);
    if p.is_array {
        out.push_str("[]");
    }
    if let Some(default) = &p.default {
        let _ = write!(out, " = {}", default);
    }
}

fn write_arg(out: &mut String, arg: Option<&OpArg>, depth: usize) {
    match arg {
        Some(OpArg::Literal(v)) => match v {
            crate::vm::value::Value::Str(s) => {
                let _ = write!(out, "{:?}", s);
            }
            other => {
                let _ = write!(out, "{}", other);
            }
        },
        Some(OpArg::Variable(name)) => out.push_str(name),
        Some(OpArg::Op(node)) => write_node(out, node, depth, false),
        Some(OpArg::Block(_)) => out.push_str("{...}"),
        Some(OpArg::Cases(_)) => out.push_str("<cases>"),
        Some(OpArg::Params(_)) => out.push_str("<params>"),
        None => out.push_str("<missing>"),
    }
}

fn binop_symbol(op: crate::opcode::BinOp) -> &'static str {
    use crate::opcode::BinOp;
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

fn arg<'a>(node: &'a OpNode, index: usize) -> Option<&'a OpArg> {
    node.args.get(index)
}

fn block<'a>(node: &'a OpNode, index: usize) -> &'a [OpNode] {
    match node.args.get(index) {
        Some(OpArg::Block(body)) => body,
        _ => &[],
    }
}
