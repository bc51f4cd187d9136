//! The opcode tree - the compiled form of a FILLY program.
//!
//! A program is a list of `OpNode`s. Each node is a tag (`OpCode`) plus an
//! ordered argument list; arguments are literals, variable references,
//! nested opcodes, or the typed sub-structures a handful of tags require
//! (case clauses, parameter descriptors, statement blocks).
//!
//! The compiler that produces these trees is a separate program; this crate
//! receives them as JSON (see `loader`). `Program::validate` checks every
//! node's argument count and argument kinds up front so the interpreter can
//! assume structural sanity.

use serde::{Deserialize, Serialize};

use crate::vm::error::LoadError;
use crate::vm::events::EventType;
use crate::vm::value::Value;

/// Binary operator selector for `OpCode::BinaryOp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Logical and. Both sides are evaluated; no short circuit.
    And,
    /// Logical or. Both sides are evaluated; no short circuit.
    Or,
}

/// Unary operator selector for `OpCode::UnaryOp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

/// Declared parameter type hint. Binding is dynamic either way; the hint is
/// what the compiler recorded from the source signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    Int,
    Float,
    Str,
}

/// One declared parameter of a user function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default)]
    pub ty: Option<ParamType>,
    /// Array parameters bind the caller's `ArrayRef` itself; mutations are
    /// visible to the caller.
    #[serde(default)]
    pub is_array: bool,
    /// Bound when the caller supplies no positional argument.
    #[serde(default)]
    pub default: Option<Value>,
}

/// One `case` of a `Switch`: a guard expression and a statement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseClause {
    pub value: OpArg,
    pub body: Vec<OpNode>,
}

/// Instruction tags. Payload-free tags take all their operands through the
/// node's argument list; tags with a payload carry the part the compiler
/// resolved statically (operator, callee name, event type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpCode {
    /// `[Variable, expr]` - walking assignment; yields the assigned value.
    Assign,
    /// `[Variable, index expr, value expr]` - element write, autocreating
    /// the array.
    ArrayAssign,
    /// `[array expr, index expr]` - element read.
    ArrayAccess,
    /// `[left expr, right expr]`.
    BinaryOp(BinOp),
    /// `[operand expr]`.
    UnaryOp(UnOp),
    /// `[cond expr, then Block, (else Block)]`.
    If,
    /// `[init, cond expr, post, body Block]`.
    For,
    /// `[cond expr, body Block]`.
    While,
    /// `[body Block, cond expr]` - body runs before the first test.
    DoWhile,
    /// `[subject expr, Cases, (default Block)]` - first match only, no
    /// fallthrough.
    Switch,
    /// No arguments. Exits the innermost enclosing loop or switch.
    Break,
    /// Arguments are the call's argument expressions. The name `return`
    /// is distinguished: it emits a Return signal instead of calling.
    Call(String),
    /// `[Params, body Block]` - registers in the function table.
    DefineFunction(String),
    /// `[body Block]` - registers a handler capturing the current scope.
    RegisterEventHandler(EventType),
    /// `[count expr]` - stores the step count on the executing handler.
    SetStep,
    /// `[count expr]` - suspends the executing handler.
    Wait,
}

impl OpCode {
    /// Tag name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Assign => "Assign",
            OpCode::ArrayAssign => "ArrayAssign",
            OpCode::ArrayAccess => "ArrayAccess",
            OpCode::BinaryOp(_) => "BinaryOp",
            OpCode::UnaryOp(_) => "UnaryOp",
            OpCode::If => "If",
            OpCode::For => "For",
            OpCode::While => "While",
            OpCode::DoWhile => "DoWhile",
            OpCode::Switch => "Switch",
            OpCode::Break => "Break",
            OpCode::Call(_) => "Call",
            OpCode::DefineFunction(_) => "DefineFunction",
            OpCode::RegisterEventHandler(_) => "RegisterEventHandler",
            OpCode::SetStep => "SetStep",
            OpCode::Wait => "Wait",
        }
    }
}

/// One argument of an opcode node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OpArg {
    /// A literal scalar.
    Literal(Value),
    /// A variable reference, resolved against the scope chain at
    /// evaluation time.
    Variable(String),
    /// A nested opcode, evaluated recursively.
    Op(OpNode),
    /// A statement block.
    Block(Vec<OpNode>),
    /// Switch cases.
    Cases(Vec<CaseClause>),
    /// Function parameter descriptors.
    Params(Vec<ParamSpec>),
}

impl OpArg {
    /// Whether this argument can stand in value position.
    fn is_expr(&self) -> bool {
        matches!(self, OpArg::Literal(_) | OpArg::Variable(_) | OpArg::Op(_))
    }

}

/// A tagged instruction node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpNode {
    pub op: OpCode,
    #[serde(default)]
    pub args: Vec<OpArg>,
}

impl OpNode {
    pub fn new(op: OpCode, args: Vec<OpArg>) -> Self {
        Self { op, args }
    }
}

/// A complete compiled program: the top-level statement stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<OpNode>,
}

impl Program {
    pub fn new(body: Vec<OpNode>) -> Self {
        Self { body }
    }

    /// Structural validation: argument counts and kinds for every node,
    /// recursively. A program that passes cannot produce "missing argument"
    /// conditions at runtime.
    pub fn validate(&self) -> Result<(), LoadError> {
        for node in &self.body {
            validate_node(node)?;
        }
        Ok(())
    }
}

fn expect_expr(op: &'static str, args: &[OpArg], index: usize) -> Result<(), LoadError> {
    match args.get(index) {
        Some(a) if a.is_expr() => Ok(()),
        Some(_) => Err(LoadError::BadArg {
            op,
            index,
            expected: "an expression (literal, variable, or opcode)",
        }),
        None => Err(LoadError::arity(op, format!("at least {}", index + 1), args.len())),
    }
}

fn expect_variable(op: &'static str, args: &[OpArg], index: usize) -> Result<(), LoadError> {
    match args.get(index) {
        Some(OpArg::Variable(_)) => Ok(()),
        Some(_) => Err(LoadError::BadArg {
            op,
            index,
            expected: "a variable reference",
        }),
        None => Err(LoadError::arity(op, format!("at least {}", index + 1), args.len())),
    }
}

fn expect_block<'a>(
    op: &'static str,
    args: &'a [OpArg],
    index: usize,
) -> Result<&'a [OpNode], LoadError> {
    match args.get(index) {
        Some(OpArg::Block(body)) => Ok(body),
        Some(_) => Err(LoadError::BadArg {
            op,
            index,
            expected: "a statement block",
        }),
        None => Err(LoadError::arity(op, format!("at least {}", index + 1), args.len())),
    }
}

fn expect_count(op: &'static str, expected: &str, args: &[OpArg]) -> Result<(), LoadError> {
    // Exact counts are written "2"; optional tails "2 or 3".
    let found = args.len();
    let ok = expected
        .split(" or ")
        .filter_map(|s| s.trim().parse::<usize>().ok())
        .any(|n| n == found);
    if ok {
        Ok(())
    } else {
        Err(LoadError::arity(op, expected, found))
    }
}

fn validate_block(body: &[OpNode]) -> Result<(), LoadError> {
    for node in body {
        validate_node(node)?;
    }
    Ok(())
}

fn validate_expr_arg(arg: &OpArg) -> Result<(), LoadError> {
    if let OpArg::Op(node) = arg {
        validate_node(node)?;
    }
    Ok(())
}

fn validate_node(node: &OpNode) -> Result<(), LoadError> {
    let args = &node.args;
    match &node.op {
        OpCode::Assign => {
            expect_count("Assign", "2", args)?;
            expect_variable("Assign", args, 0)?;
            expect_expr("Assign", args, 1)?;
        }
        OpCode::ArrayAssign => {
            expect_count("ArrayAssign", "3", args)?;
            expect_variable("ArrayAssign", args, 0)?;
            expect_expr("ArrayAssign", args, 1)?;
            expect_expr("ArrayAssign", args, 2)?;
        }
        OpCode::ArrayAccess => {
            expect_count("ArrayAccess", "2", args)?;
            expect_expr("ArrayAccess", args, 0)?;
            expect_expr("ArrayAccess", args, 1)?;
        }
        OpCode::BinaryOp(_) => {
            expect_count("BinaryOp", "2", args)?;
            expect_expr("BinaryOp", args, 0)?;
            expect_expr("BinaryOp", args, 1)?;
        }
        OpCode::UnaryOp(_) => {
            expect_count("UnaryOp", "1", args)?;
            expect_expr("UnaryOp", args, 0)?;
        }
        OpCode::If => {
            expect_count("If", "2 or 3", args)?;
            expect_expr("If", args, 0)?;
            validate_block(expect_block("If", args, 1)?)?;
            if args.len() == 3 {
                validate_block(expect_block("If", args, 2)?)?;
            }
        }
        OpCode::For => {
            expect_count("For", "4", args)?;
            expect_expr("For", args, 0)?;
            expect_expr("For", args, 1)?;
            expect_expr("For", args, 2)?;
            validate_block(expect_block("For", args, 3)?)?;
        }
        OpCode::While => {
            expect_count("While", "2", args)?;
            expect_expr("While", args, 0)?;
            validate_block(expect_block("While", args, 1)?)?;
        }
        OpCode::DoWhile => {
            expect_count("DoWhile", "2", args)?;
            validate_block(expect_block("DoWhile", args, 0)?)?;
            expect_expr("DoWhile", args, 1)?;
        }
        OpCode::Switch => {
            expect_count("Switch", "2 or 3", args)?;
            expect_expr("Switch", args, 0)?;
            match args.get(1) {
                Some(OpArg::Cases(cases)) => {
                    for case in cases {
                        if !case.value.is_expr() {
                            return Err(LoadError::BadArg {
                                op: "Switch",
                                index: 1,
                                expected: "case values that are expressions",
                            });
                        }
                        validate_expr_arg(&case.value)?;
                        validate_block(&case.body)?;
                    }
                }
                _ => {
                    return Err(LoadError::BadArg {
                        op: "Switch",
                        index: 1,
                        expected: "a case list",
                    })
                }
            }
            if args.len() == 3 {
                validate_block(expect_block("Switch", args, 2)?)?;
            }
        }
        OpCode::Break => {
            expect_count("Break", "0", args)?;
        }
        OpCode::Call(_) => {
            for (i, _) in args.iter().enumerate() {
                expect_expr("Call", args, i)?;
            }
        }
        OpCode::DefineFunction(_) => {
            expect_count("DefineFunction", "2", args)?;
            match args.first() {
                Some(OpArg::Params(_)) => {}
                _ => {
                    return Err(LoadError::BadArg {
                        op: "DefineFunction",
                        index: 0,
                        expected: "a parameter list",
                    })
                }
            }
            validate_block(expect_block("DefineFunction", args, 1)?)?;
        }
        OpCode::RegisterEventHandler(_) => {
            expect_count("RegisterEventHandler", "1", args)?;
            validate_block(expect_block("RegisterEventHandler", args, 0)?)?;
        }
        OpCode::SetStep => {
            expect_count("SetStep", "1", args)?;
            expect_expr("SetStep", args, 0)?;
        }
        OpCode::Wait => {
            expect_count("Wait", "1", args)?;
            expect_expr("Wait", args, 0)?;
        }
    }
    // Recurse into nested opcode expressions.
    for arg in args {
        validate_expr_arg(arg)?;
    }
    Ok(())
}

/// Convenience constructors for building opcode trees in Rust (hosts and
/// tests; the compiler emits JSON directly).
pub mod build {
    use super::*;

    pub fn int(v: i64) -> OpArg {
        OpArg::Literal(Value::I64(v))
    }

    pub fn float(v: f64) -> OpArg {
        OpArg::Literal(Value::F64(v))
    }

    pub fn text(s: &str) -> OpArg {
        OpArg::Literal(Value::Str(s.to_string()))
    }

    pub fn var(name: &str) -> OpArg {
        OpArg::Variable(name.to_string())
    }

    pub fn op(node: OpNode) -> OpArg {
        OpArg::Op(node)
    }

    pub fn assign(name: &str, expr: OpArg) -> OpNode {
        OpNode::new(OpCode::Assign, vec![var(name), expr])
    }

    pub fn array_assign(name: &str, index: OpArg, value: OpArg) -> OpNode {
        OpNode::new(OpCode::ArrayAssign, vec![var(name), index, value])
    }

    pub fn array_access(array: OpArg, index: OpArg) -> OpNode {
        OpNode::new(OpCode::ArrayAccess, vec![array, index])
    }

    pub fn binary(op_: BinOp, left: OpArg, right: OpArg) -> OpNode {
        OpNode::new(OpCode::BinaryOp(op_), vec![left, right])
    }

    pub fn unary(op_: UnOp, operand: OpArg) -> OpNode {
        OpNode::new(OpCode::UnaryOp(op_), vec![operand])
    }

    pub fn if_(cond: OpArg, then_block: Vec<OpNode>) -> OpNode {
        OpNode::new(OpCode::If, vec![cond, OpArg::Block(then_block)])
    }

    pub fn if_else(cond: OpArg, then_block: Vec<OpNode>, else_block: Vec<OpNode>) -> OpNode {
        OpNode::new(
            OpCode::If,
            vec![cond, OpArg::Block(then_block), OpArg::Block(else_block)],
        )
    }

    pub fn for_(init: OpNode, cond: OpArg, post: OpNode, body: Vec<OpNode>) -> OpNode {
        OpNode::new(
            OpCode::For,
            vec![op(init), cond, op(post), OpArg::Block(body)],
        )
    }

    pub fn while_(cond: OpArg, body: Vec<OpNode>) -> OpNode {
        OpNode::new(OpCode::While, vec![cond, OpArg::Block(body)])
    }

    pub fn do_while(body: Vec<OpNode>, cond: OpArg) -> OpNode {
        OpNode::new(OpCode::DoWhile, vec![OpArg::Block(body), cond])
    }

    pub fn switch(subject: OpArg, cases: Vec<CaseClause>) -> OpNode {
        OpNode::new(OpCode::Switch, vec![subject, OpArg::Cases(cases)])
    }

    pub fn switch_default(
        subject: OpArg,
        cases: Vec<CaseClause>,
        default: Vec<OpNode>,
    ) -> OpNode {
        OpNode::new(
            OpCode::Switch,
            vec![subject, OpArg::Cases(cases), OpArg::Block(default)],
        )
    }

    pub fn case(value: OpArg, body: Vec<OpNode>) -> CaseClause {
        CaseClause { value, body }
    }

    pub fn break_() -> OpNode {
        OpNode::new(OpCode::Break, vec![])
    }

    pub fn call(name: &str, args: Vec<OpArg>) -> OpNode {
        OpNode::new(OpCode::Call(name.to_string()), args)
    }

    pub fn ret(value: OpArg) -> OpNode {
        call("return", vec![value])
    }

    pub fn param(name: &str) -> ParamSpec {
        ParamSpec {
            name: name.to_string(),
            ty: None,
            is_array: false,
            default: None,
        }
    }

    pub fn array_param(name: &str) -> ParamSpec {
        ParamSpec {
            name: name.to_string(),
            ty: None,
            is_array: true,
            default: None,
        }
    }

    pub fn define(name: &str, params: Vec<ParamSpec>, body: Vec<OpNode>) -> OpNode {
        OpNode::new(
            OpCode::DefineFunction(name.to_string()),
            vec![OpArg::Params(params), OpArg::Block(body)],
        )
    }

    pub fn handler(event: EventType, body: Vec<OpNode>) -> OpNode {
        OpNode::new(OpCode::RegisterEventHandler(event), vec![OpArg::Block(body)])
    }

    pub fn wait(count: OpArg) -> OpNode {
        OpNode::new(OpCode::Wait, vec![count])
    }

    pub fn set_step(count: OpArg) -> OpNode {
        OpNode::new(OpCode::SetStep, vec![count])
    }
}

#[cfg(test)]
mod tests {
    use super::build::*;
    use super::*;

    #[test]
    fn test_valid_program_passes_validation() {
        let program = Program::new(vec![
            assign("x", int(0)),
            for_(
                assign("i", int(0)),
                op(binary(BinOp::Lt, var("i"), int(5))),
                assign("i", op(binary(BinOp::Add, var("i"), int(1)))),
                vec![assign("x", op(binary(BinOp::Add, var("x"), var("i"))))],
            ),
        ]);
        program.validate().unwrap();
    }

    #[test]
    fn test_assign_arity_is_checked() {
        let program = Program::new(vec![OpNode::new(OpCode::Assign, vec![var("x")])]);
        let err = program.validate().unwrap_err();
        assert!(err.to_string().contains("Assign"));
    }

    #[test]
    fn test_assign_target_must_be_variable() {
        let program = Program::new(vec![OpNode::new(OpCode::Assign, vec![int(1), int(2)])]);
        let err = program.validate().unwrap_err();
        assert!(err.to_string().contains("variable reference"));
    }

    #[test]
    fn test_nested_bad_node_is_found() {
        let bad_inner = OpNode::new(OpCode::Break, vec![int(1)]);
        let program = Program::new(vec![if_(int(1), vec![bad_inner])]);
        let err = program.validate().unwrap_err();
        assert!(err.to_string().contains("Break"));
    }

    #[test]
    fn test_if_block_argument_kind_is_checked() {
        let program = Program::new(vec![OpNode::new(OpCode::If, vec![int(1), int(2)])]);
        let err = program.validate().unwrap_err();
        assert!(err.to_string().contains("statement block"));
    }

    #[test]
    fn test_switch_requires_case_list() {
        let program = Program::new(vec![OpNode::new(OpCode::Switch, vec![int(1), int(2)])]);
        let err = program.validate().unwrap_err();
        assert!(err.to_string().contains("case list"));
    }

    #[test]
    fn test_program_serde_round_trip() {
        let program = Program::new(vec![
            define(
                "f",
                vec![param("a"), array_param("xs")],
                vec![ret(var("a"))],
            ),
            handler(EventType::Time, vec![wait(int(2)), assign("x", int(1))]),
            call("PostMes", vec![int(3), text("hello")]),
        ]);
        let json = serde_json::to_string_pretty(&program).unwrap();
        let back: Program = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(back.body.len(), 3);
        match &back.body[1].op {
            OpCode::RegisterEventHandler(ev) => assert_eq!(*ev, EventType::Time),
            other => panic!("expected handler registration, got {:?}", other),
        }
    }
}
