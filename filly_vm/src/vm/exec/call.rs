//! Call dispatch: the distinguished `return`, builtins, and user
//! functions.
//!
//! Resolution order is fixed: exact-match builtin, case-insensitive
//! builtin, exact-match user function, case-insensitive user function.
//! An unknown name logs and yields `I64(0)`.

use std::sync::Arc;

use crate::opcode::OpArg;
use crate::vm::error::VmError;
use crate::vm::frame::{CallFrame, MAX_STACK_DEPTH};
use crate::vm::scope::Scope;
use crate::vm::value::Value;
use crate::vm::{FunctionDef, Vm};

use super::{Flow, PendingSignal};

/// The call name that emits a Return signal instead of dispatching.
const RETURN_NAME: &str = "return";

impl Vm {
    pub(super) fn exec_call(&mut self, name: &str, args: &[OpArg]) -> Result<Flow, VmError> {
        if name == RETURN_NAME {
            let value = match args.first() {
                Some(arg) => self.eval_arg(arg)?,
                None => Value::I64(0),
            };
            return Ok(Flow::Return(value));
        }

        let mut argv = Vec::with_capacity(args.len());
        for arg in args {
            argv.push(self.eval_arg(arg)?);
        }

        if let Some(builtin) = self.lookup_builtin(name) {
            return match builtin.as_ref()(self, &argv) {
                Ok(v) => Ok(Flow::Value(v)),
                Err(e) if e.is_fatal() => Err(e),
                Err(e) => {
                    log::error!("{}", e);
                    Ok(Flow::Value(Value::I64(0)))
                }
            };
        }

        if let Some(def) = self.lookup_function(name) {
            let value = self.call_user_function(def, argv)?;
            return Ok(Flow::Value(value));
        }

        log::error!("unknown function `{}`; using 0", name);
        Ok(Flow::Value(Value::I64(0)))
    }

    /// Invoke a user function: fresh scope parented on the global scope,
    /// positional binding with defaults, a bounded stack frame, and a body
    /// run that stops at the first Return.
    ///
    /// Suspension signals surfacing inside the body abandon the remainder
    /// of the function and propagate to the enclosing handler.
    pub fn call_user_function(
        &mut self,
        def: Arc<FunctionDef>,
        args: Vec<Value>,
    ) -> Result<Value, VmError> {
        if self.call_stack.len() >= MAX_STACK_DEPTH {
            return Err(VmError::StackOverflow {
                function: def.name.clone(),
                max: MAX_STACK_DEPTH,
            });
        }

        let scope = Scope::child(&self.global_scope);
        for (i, param) in def.params.iter().enumerate() {
            // Positional argument, declared default, then 0. An array
            // argument binds the caller's handle itself; no copy.
            let value = args
                .get(i)
                .cloned()
                .or_else(|| param.default.clone())
                .unwrap_or(Value::I64(0));
            scope.set_local(&param.name, value);
        }

        self.call_stack
            .push(CallFrame::new(&def.name, Arc::clone(&scope)));
        let saved_scope = std::mem::replace(&mut self.current_scope, scope);

        let mut fatal: Option<VmError> = None;
        for node in def.body.iter() {
            match self.execute(node) {
                Ok(Flow::Value(_)) => {}
                Ok(Flow::Return(v)) => {
                    if let Some(frame) = self.call_stack.last_mut() {
                        frame.return_value = Some(v);
                    }
                    break;
                }
                Ok(Flow::Break) => {
                    log::warn!("`break` outside any loop in `{}`; ignored", def.name);
                }
                Ok(Flow::Wait(n)) => {
                    self.pending_signal = Some(PendingSignal::Wait(n));
                    break;
                }
                Ok(Flow::EndStep) => {
                    self.pending_signal = Some(PendingSignal::EndStep);
                    break;
                }
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            }
            if self.pending_signal.is_some() {
                // A builtin parked a suspension mid-statement; leave it for
                // the handler loop and abandon the rest of the body.
                break;
            }
        }

        self.current_scope = saved_scope;
        let frame = self.call_stack.pop();
        if let Some(e) = fatal {
            return Err(e);
        }
        Ok(frame
            .and_then(|f| f.return_value)
            .unwrap_or(Value::I64(0)))
    }

    /// Current user-function call depth; balanced across any completed
    /// call.
    pub fn stack_depth(&self) -> usize {
        self.call_stack.len()
    }
}
