//! Core of the FILLY virtual machine.
//!
//! FILLY programs arrive pre-compiled as opcode trees (see [`opcode`] and
//! [`loader`]). The [`vm`] module interprets them: a dynamically-typed
//! value domain, a lexical scope chain, user-function dispatch, and the
//! event system whose resumable handlers define the platform.
//!
//! The core registers no builtins and performs no I/O of its own. Host
//! programs supply builtins through [`vm::Vm::register_builtin`] and the
//! capability implementations of [`host`]; the `filly_vm_host` crate is the
//! standard such host.

// Diagnostics go through `log`, never stderr (CLI binaries live elsewhere).
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

pub mod api;
pub mod disasm;
pub mod host;
pub mod loader;
pub mod opcode;
pub mod vm;

pub use api::{load_and_prepare, run_program_file};
pub use loader::{load_program_path, load_program_str};
pub use opcode::{BinOp, CaseClause, OpArg, OpCode, OpNode, ParamSpec, ParamType, Program, UnOp};
pub use vm::{
    Event, EventQueue, EventType, Flow, LoadError, RunError, Value, Vm, VmError, VmOptions,
};
