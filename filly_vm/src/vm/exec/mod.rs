//! The interpreter: one `execute` call per opcode node.
//!
//! `execute` returns a [`Flow`]: either a plain value or a control signal
//! travelling upward. Signals are consumed by the construct that owns them
//! (`Break` by loops and `Switch`, `Return` by user-function frames, `Wait`
//! and `EndStep` by the handler run loop) and propagate through everything
//! else.
//!
//! Builtins cannot return a `Flow` through the `(Value, error)` seam, so
//! the two signal-raising builtins (`Wait`, `end_step`) park a
//! [`PendingSignal`] on the VM; block execution converts it into a `Flow`
//! at the next statement boundary. The same slot carries signals that
//! surface while a nested expression is being evaluated.
//!
//! Non-fatal faults never surface as `Err`: they are logged where they
//! occur and a default value takes their place. `Err` from `execute` means
//! a fatal fault (stack overflow) and aborts the current top-level entry.

mod array_ops;
mod binary;
mod call;

use crate::opcode::{OpArg, OpCode, OpNode};
use crate::vm::error::VmError;
use crate::vm::value::Value;
use crate::vm::Vm;

use std::sync::Arc;

/// Result of executing one opcode.
#[derive(Debug, Clone)]
pub enum Flow {
    /// Ordinary evaluation result.
    Value(Value),
    /// `return` - consumed by the enclosing user-function frame.
    Return(Value),
    /// `break` - consumed by the innermost loop or switch.
    Break,
    /// Suspend the enclosing handler for this many events.
    Wait(i64),
    /// Force the enclosing handler body to complete now.
    EndStep,
}

impl Flow {
    pub fn value(self) -> Value {
        match self {
            Flow::Value(v) | Flow::Return(v) => v,
            Flow::Break | Flow::Wait(_) | Flow::EndStep => Value::I64(0),
        }
    }

    fn is_signal(&self) -> bool {
        !matches!(self, Flow::Value(_))
    }
}

/// Control raised from inside a builtin call, parked on the VM until the
/// enclosing statement finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingSignal {
    Wait(i64),
    EndStep,
}

impl PendingSignal {
    pub(crate) fn into_flow(self) -> Flow {
        match self {
            PendingSignal::Wait(n) => Flow::Wait(n),
            PendingSignal::EndStep => Flow::EndStep,
        }
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            PendingSignal::Wait(_) => "wait",
            PendingSignal::EndStep => "end_step",
        }
    }
}

impl Vm {
    /// Execute one opcode node against the current scope.
    pub fn execute(&mut self, node: &OpNode) -> Result<Flow, VmError> {
        let args = &node.args;
        match &node.op {
            OpCode::Assign => {
                let Some(name) = arg_variable(args, 0) else {
                    log::error!("Assign without a variable target; skipped");
                    return Ok(Flow::Value(Value::I64(0)));
                };
                let value = self.eval_arg(arg_expr(args, 1))?;
                self.current_scope.set(name, value.clone());
                Ok(Flow::Value(value))
            }
            OpCode::ArrayAssign => self.exec_array_assign(args),
            OpCode::ArrayAccess => self.exec_array_access(args),
            OpCode::BinaryOp(op) => self.exec_binary(*op, args),
            OpCode::UnaryOp(op) => self.exec_unary(*op, args),
            OpCode::If => {
                let cond = self.eval_arg(arg_expr(args, 0))?.truthy();
                if cond {
                    self.exec_block(arg_block(args, 1))
                } else if args.len() == 3 {
                    self.exec_block(arg_block(args, 2))
                } else {
                    Ok(Flow::Value(Value::I64(0)))
                }
            }
            OpCode::For => self.exec_for(args),
            OpCode::While => self.exec_while(args),
            OpCode::DoWhile => self.exec_do_while(args),
            OpCode::Switch => self.exec_switch(args),
            OpCode::Break => Ok(Flow::Break),
            OpCode::Call(name) => self.exec_call(name, args),
            OpCode::DefineFunction(name) => {
                let params = match args.first() {
                    Some(OpArg::Params(params)) => params.clone(),
                    _ => Vec::new(),
                };
                let body = arg_block(args, 1).to_vec();
                self.define_function(name, params, Arc::new(body));
                Ok(Flow::Value(Value::I64(0)))
            }
            OpCode::RegisterEventHandler(ty) => {
                let body = arg_block(args, 0).to_vec();
                let scope = Arc::clone(&self.current_scope);
                let handler = self.registry.register(*ty, Arc::new(body), scope);
                let seq = handler.lock().unwrap().seq;
                Ok(Flow::Value(Value::I64(seq as i64)))
            }
            OpCode::SetStep => {
                let count = self.eval_i64(arg_expr(args, 0))?;
                self.set_step_value(count);
                Ok(Flow::Value(Value::I64(0)))
            }
            OpCode::Wait => {
                let count = self.eval_i64(arg_expr(args, 0))?;
                if count > 0 {
                    Ok(Flow::Wait(count))
                } else {
                    // Wait(0) and negative waits are observational no-ops.
                    Ok(Flow::Value(Value::I64(0)))
                }
            }
        }
    }

    /// Execute a statement block. Plain values fall through; the first
    /// control signal (direct or parked by a builtin) ends the block.
    pub(crate) fn exec_block(&mut self, body: &[OpNode]) -> Result<Flow, VmError> {
        for node in body {
            let flow = self.execute(node)?;
            if flow.is_signal() {
                return Ok(flow);
            }
            if let Some(pending) = self.pending_signal.take() {
                return Ok(pending.into_flow());
            }
        }
        Ok(Flow::Value(Value::I64(0)))
    }

    /// Resolve an argument in value position: literals pass through,
    /// variables consult the scope chain, nested opcodes recurse. A read
    /// with no answer yields `I64(0)` with a warning. A control signal that
    /// surfaces in value position is parked for the enclosing statement and
    /// the expression yields `I64(0)` (a returned value stays usable).
    pub(crate) fn eval_arg(&mut self, arg: &OpArg) -> Result<Value, VmError> {
        match arg {
            OpArg::Literal(v) => Ok(v.clone()),
            OpArg::Variable(name) => match self.current_scope.get(name) {
                Some(v) => Ok(v),
                None => {
                    log::warn!("unknown variable `{}`; using 0", name);
                    Ok(Value::I64(0))
                }
            },
            OpArg::Op(node) => {
                let flow = self.execute(node)?;
                match flow {
                    Flow::Value(v) => Ok(v),
                    Flow::Return(v) => {
                        log::warn!("`return` in expression position; value used in place");
                        Ok(v)
                    }
                    Flow::Break => {
                        log::warn!("`break` in expression position; ignored");
                        Ok(Value::I64(0))
                    }
                    Flow::Wait(n) => {
                        if self.pending_signal.is_none() {
                            self.pending_signal = Some(PendingSignal::Wait(n));
                        }
                        Ok(Value::I64(0))
                    }
                    Flow::EndStep => {
                        if self.pending_signal.is_none() {
                            self.pending_signal = Some(PendingSignal::EndStep);
                        }
                        Ok(Value::I64(0))
                    }
                }
            }
            OpArg::Block(_) | OpArg::Cases(_) | OpArg::Params(_) => {
                log::error!("structural argument in value position; using 0");
                Ok(Value::I64(0))
            }
        }
    }

    /// Evaluate to an integer, logging a coercion failure and substituting
    /// 0.
    pub(crate) fn eval_i64(&mut self, arg: &OpArg) -> Result<i64, VmError> {
        let v = self.eval_arg(arg)?;
        Ok(coerce_i64_logged(&v))
    }

    fn exec_for(&mut self, args: &[OpArg]) -> Result<Flow, VmError> {
        self.eval_arg(arg_expr(args, 0))?;
        loop {
            if let Some(pending) = self.pending_signal.take() {
                return Ok(pending.into_flow());
            }
            if !self.eval_arg(arg_expr(args, 1))?.truthy() {
                break;
            }
            match self.exec_block(arg_block(args, 3))? {
                Flow::Break => break,
                Flow::Value(_) => {}
                signal => return Ok(signal),
            }
            self.eval_arg(arg_expr(args, 2))?;
        }
        Ok(Flow::Value(Value::I64(0)))
    }

    fn exec_while(&mut self, args: &[OpArg]) -> Result<Flow, VmError> {
        loop {
            if let Some(pending) = self.pending_signal.take() {
                return Ok(pending.into_flow());
            }
            if !self.eval_arg(arg_expr(args, 0))?.truthy() {
                break;
            }
            match self.exec_block(arg_block(args, 1))? {
                Flow::Break => break,
                Flow::Value(_) => {}
                signal => return Ok(signal),
            }
        }
        Ok(Flow::Value(Value::I64(0)))
    }

    fn exec_do_while(&mut self, args: &[OpArg]) -> Result<Flow, VmError> {
        loop {
            match self.exec_block(arg_block(args, 0))? {
                Flow::Break => break,
                Flow::Value(_) => {}
                signal => return Ok(signal),
            }
            if !self.eval_arg(arg_expr(args, 1))?.truthy() {
                break;
            }
            if let Some(pending) = self.pending_signal.take() {
                return Ok(pending.into_flow());
            }
        }
        Ok(Flow::Value(Value::I64(0)))
    }

    fn exec_switch(&mut self, args: &[OpArg]) -> Result<Flow, VmError> {
        let subject = self.eval_arg(arg_expr(args, 0))?;
        let cases = match args.get(1) {
            Some(OpArg::Cases(cases)) => cases,
            _ => {
                log::error!("Switch without a case list; skipped");
                return Ok(Flow::Value(Value::I64(0)));
            }
        };
        for case in cases {
            let candidate = self.eval_arg(&case.value)?;
            let matched = match binary::eq_values(&subject, &candidate) {
                Some(eq) => eq,
                None => {
                    log::error!(
                        "switch comparison between {} and {} is undefined; case skipped",
                        subject.kind(),
                        candidate.kind()
                    );
                    false
                }
            };
            if matched {
                // First match only; a Break ends the switch, nothing falls
                // through either way.
                return match self.exec_block(&case.body)? {
                    Flow::Break => Ok(Flow::Value(Value::I64(0))),
                    Flow::Value(_) => Ok(Flow::Value(Value::I64(0))),
                    signal => Ok(signal),
                };
            }
        }
        if args.len() == 3 {
            return match self.exec_block(arg_block(args, 2))? {
                Flow::Break => Ok(Flow::Value(Value::I64(0))),
                Flow::Value(_) => Ok(Flow::Value(Value::I64(0))),
                signal => Ok(signal),
            };
        }
        Ok(Flow::Value(Value::I64(0)))
    }
}

/// Integer coercion with the standard non-fatal fault handling.
pub(crate) fn coerce_i64_logged(v: &Value) -> i64 {
    match v.coerce_i64() {
        Some(n) => n,
        None => {
            log::warn!("cannot coerce {} to an integer; using 0", v.kind());
            0
        }
    }
}

/// Float coercion with the standard non-fatal fault handling.
pub(crate) fn coerce_f64_logged(v: &Value) -> f64 {
    match v.coerce_f64() {
        Some(x) => x,
        None => {
            log::warn!("cannot coerce {} to a float; using 0", v.kind());
            0.0
        }
    }
}

static EMPTY_BLOCK: [OpNode; 0] = [];
static MISSING_EXPR: OpArg = OpArg::Literal(Value::I64(0));

/// Fetch an expression argument. Validation guarantees presence for loaded
/// programs; hand-built trees that miss one read as the literal 0.
fn arg_expr(args: &[OpArg], index: usize) -> &OpArg {
    args.get(index).unwrap_or(&MISSING_EXPR)
}

/// Fetch a block argument, tolerating a missing or mistyped one.
fn arg_block(args: &[OpArg], index: usize) -> &[OpNode] {
    match args.get(index) {
        Some(OpArg::Block(body)) => body,
        _ => &EMPTY_BLOCK,
    }
}

fn arg_variable(args: &[OpArg], index: usize) -> Option<&str> {
    match args.get(index) {
        Some(OpArg::Variable(name)) => Some(name),
        _ => None,
    }
}
