//! Runtime and load-time error types.
//!
//! Runtime faults come in two strata. Non-fatal faults (bad index, unknown
//! name, coercion failure, a builtin reporting an error) are logged at the
//! point of occurrence and execution continues with a substituted default;
//! they normally never surface as `Err`. The sole fatal fault is stack
//! overflow, which aborts the current top-level entry into the interpreter.
//! `LoadError` covers structurally invalid programs and is reported before
//! the VM starts.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    #[error("stack overflow: call depth exceeded {max} frames calling `{function}`")]
    StackOverflow { function: String, max: usize },

    /// An error reported by a host builtin. Non-fatal: the call site logs it
    /// and substitutes `I64(0)`.
    #[error("builtin `{name}`: {message}")]
    Builtin { name: String, message: String },

    /// A capability (audio, file I/O, graphics) reported a failure.
    #[error("host capability: {0}")]
    Capability(String),
}

impl VmError {
    pub fn builtin(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Builtin {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Fatal errors abort the current dispatch or `run` entry instead of
    /// being logged and substituted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VmError::StackOverflow { .. })
    }
}

/// Structural problems in an opcode tree, discovered before execution.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("`{op}` expects {expected} argument(s), found {found}")]
    Arity {
        op: &'static str,
        expected: String,
        found: usize,
    },

    #[error("`{op}` argument {index} must be {expected}")]
    BadArg {
        op: &'static str,
        index: usize,
        expected: &'static str,
    },

    #[error("invalid program JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read program: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub fn arity(op: &'static str, expected: impl Into<String>, found: usize) -> Self {
        Self::Arity {
            op,
            expected: expected.into(),
            found,
        }
    }
}

/// Everything `Vm::run` can report: a program that failed validation, or a
/// fatal runtime fault.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Runtime(#[from] VmError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_stack_overflow_is_fatal() {
        let fatal = VmError::StackOverflow {
            function: "f".into(),
            max: 1024,
        };
        assert!(fatal.is_fatal());
        assert!(!VmError::builtin("Wait", "bad argument").is_fatal());
        assert!(!VmError::Capability("no audio device".into()).is_fatal());
    }

    #[test]
    fn test_error_messages_name_the_offender() {
        let e = VmError::StackOverflow {
            function: "recurse".into(),
            max: 1024,
        };
        let msg = e.to_string();
        assert!(msg.contains("recurse"));
        assert!(msg.contains("1024"));
    }

    #[test]
    fn test_load_error_arity_message() {
        let e = LoadError::arity("If", "2 or 3", 1);
        assert_eq!(e.to_string(), "`If` expects 2 or 3 argument(s), found 1");
    }
}
