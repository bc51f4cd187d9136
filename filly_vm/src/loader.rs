//! Program loader: opcode-tree JSON in, validated `Program` out.
//!
//! The FILLY compiler is a separate program; its output is a JSON rendering
//! of the opcode tree. Loading validates the structure eagerly so a
//! malformed program is rejected before the VM starts.

use std::fs;
use std::path::Path;

use crate::opcode::Program;
use crate::vm::error::LoadError;

/// Parse and validate a program from a JSON string.
pub fn load_program_str(json: &str) -> Result<Program, LoadError> {
    let program: Program = serde_json::from_str(json)?;
    program.validate()?;
    Ok(program)
}

/// Read, parse, and validate a program file.
pub fn load_program_path(path: impl AsRef<Path>) -> Result<Program, LoadError> {
    let json = fs::read_to_string(path)?;
    load_program_str(&json)
}
