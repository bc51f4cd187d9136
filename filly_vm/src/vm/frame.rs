//! Call stack frames for user-function dispatch.

use super::scope::ScopeRef;
use super::value::Value;

/// Hard bound on user-function call depth. Pushing past this is the VM's
/// only fatal runtime fault.
pub const MAX_STACK_DEPTH: usize = 1024;

/// One user-function activation. The local scope parents onto the global
/// scope, never onto the caller's scope: FILLY functions capture nothing.
#[derive(Debug)]
pub struct CallFrame {
    pub name: String,
    pub scope: ScopeRef,
    /// Stashed by a `return` statement; `None` when the body fell off the
    /// end, in which case the call yields `I64(0)`.
    pub return_value: Option<Value>,
}

impl CallFrame {
    pub fn new(name: impl Into<String>, scope: ScopeRef) -> Self {
        Self {
            name: name.into(),
            scope,
            return_value: None,
        }
    }
}
