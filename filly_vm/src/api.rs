//! Convenience entry points for embedding the VM.
//!
//! These wrap the load → construct → run sequence for hosts that do not
//! need to customize every step. The VM comes back from the non-blocking
//! variants so callers can inspect globals, push events, and pump.

use crate::loader::{load_program_path, load_program_str};
use crate::opcode::Program;
use crate::vm::{RunError, Vm, VmOptions};
use std::path::Path;

/// Load a JSON program and run its top-level stream, without entering the
/// event loop. The returned VM holds whatever the program registered;
/// callers drive events with `post_event` + `pump`, or hand the VM to
/// `Vm::run`.
pub fn load_and_prepare(json: &str, options: VmOptions) -> Result<(Vm, Program), RunError> {
    let program = load_program_str(json)?;
    let mut vm = Vm::new(options);
    vm.run_toplevel(&program)?;
    Ok((vm, program))
}

/// Load a program file and run it to completion (top-level stream plus the
/// event loop, until `Stop` or the configured timeout).
pub fn run_program_file(path: impl AsRef<Path>, options: VmOptions) -> Result<Vm, RunError> {
    let program = load_program_path(path)?;
    let mut vm = Vm::new(options);
    vm.run(&program)?;
    Ok(vm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::build::*;
    use crate::opcode::BinOp;

    fn as_json(program: &Program) -> String {
        serde_json::to_string(program).unwrap()
    }

    #[test]
    fn test_load_and_prepare_runs_toplevel() {
        let program = Program::new(vec![assign(
            "x",
            op(binary(BinOp::Add, int(40), int(2))),
        )]);
        let (vm, loaded) = load_and_prepare(&as_json(&program), VmOptions::default()).unwrap();
        assert_eq!(vm.get_global("x").unwrap().coerce_i64(), Some(42));
        assert_eq!(loaded.body.len(), 1);
    }

    #[test]
    fn test_load_and_prepare_rejects_malformed_programs() {
        let err = load_and_prepare("{\"body\":0}", VmOptions::default()).unwrap_err();
        assert!(matches!(err, RunError::Load(_)));
    }

    #[test]
    fn test_run_program_file_with_timeout() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("filly-api-test-{}.json", std::process::id()));
        let program = Program::new(vec![assign("done", int(1))]);
        std::fs::write(&path, as_json(&program)).unwrap();

        let options = VmOptions {
            timeout: Some(std::time::Duration::from_millis(20)),
            ..VmOptions::default()
        };
        let vm = run_program_file(&path, options).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(vm.get_global("done").unwrap().coerce_i64(), Some(1));
        assert!(vm.is_stopped());
    }
}
