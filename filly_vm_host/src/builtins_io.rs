//! File builtins over the `FileIo` capability: handle-based line access
//! and the INI helpers.

use filly_vm::host::FileMode;
use filly_vm::vm::{Value, Vm, VmError};

use crate::args::{arg_i64, arg_text};

pub fn register(vm: &mut Vm) {
    // FileOpen(path, mode): mode 0 reads, 1 writes (truncating), 2
    // appends. Returns the handle, or -1 on failure (logged).
    vm.register_builtin("FileOpen", |vm, args| {
        let path = arg_text(args, 0);
        let mode = match arg_i64(args, 1) {
            0 => FileMode::Read,
            1 => FileMode::Write,
            2 => FileMode::Append,
            other => {
                return Err(VmError::builtin(
                    "FileOpen",
                    format!("unknown mode {}", other),
                ))
            }
        };
        match vm.host_mut().file_io.open(&path, mode) {
            Ok(handle) => Ok(Value::I64(handle)),
            Err(e) => {
                log::error!("FileOpen {}: {}", path, e);
                Ok(Value::I64(-1))
            }
        }
    });

    vm.register_builtin("FileClose", |vm, args| {
        let handle = arg_i64(args, 0);
        vm.host_mut().file_io.close(handle)?;
        Ok(Value::I64(0))
    });

    vm.register_builtin("FileSeek", |vm, args| {
        let handle = arg_i64(args, 0);
        let pos = arg_i64(args, 1).max(0) as u64;
        vm.host_mut().file_io.seek(handle, pos)?;
        Ok(Value::I64(0))
    });

    // ReadLine(h): the next line without its terminator; Nothing at end of
    // file, which reads as false in a condition.
    vm.register_builtin("ReadLine", |vm, args| {
        let handle = arg_i64(args, 0);
        match vm.host_mut().file_io.read_line(handle)? {
            Some(line) => Ok(Value::Str(line)),
            None => Ok(Value::Nothing),
        }
    });

    vm.register_builtin("WriteLine", |vm, args| {
        let handle = arg_i64(args, 0);
        let line = arg_text(args, 1);
        vm.host_mut().file_io.write_line(handle, &line)?;
        Ok(Value::I64(0))
    });

    // ReadIni(path, section, key, default): the stored text, or the
    // default when the key is absent.
    vm.register_builtin("ReadIni", |vm, args| {
        let path = arg_text(args, 0);
        let section = arg_text(args, 1);
        let key = arg_text(args, 2);
        match vm.host_mut().file_io.read_ini(&path, &section, &key)? {
            Some(text) => Ok(Value::Str(text)),
            None => Ok(args.get(3).cloned().unwrap_or(Value::Str(String::new()))),
        }
    });

    vm.register_builtin("WriteIni", |vm, args| {
        let path = arg_text(args, 0);
        let section = arg_text(args, 1);
        let key = arg_text(args, 2);
        let value = arg_text(args, 3);
        vm.host_mut().file_io.write_ini(&path, &section, &key, &value)?;
        Ok(Value::I64(0))
    });
}
