//! Array builtins: length, splice insert/delete, clear.
//!
//! Arrays arrive by reference, so every mutation here is visible to the
//! calling script.

use filly_vm::vm::{Value, Vm, VmError};

use crate::args::{arg_array, arg_i64, arg_value};

pub fn register(vm: &mut Vm) {
    vm.register_builtin("ArrayLen", |_vm, args| {
        match arg_array(args, 0) {
            Some(arr) => Ok(Value::I64(arr.read().unwrap().len() as i64)),
            // A plain value reads as a length-1 array.
            None if !args.is_empty() => Ok(Value::I64(1)),
            None => Ok(Value::I64(0)),
        }
    });

    // InsArray(a, i, v): splice v in before position i; i == len appends.
    vm.register_builtin("InsArray", |_vm, args| {
        let Some(arr) = arg_array(args, 0) else {
            return Err(VmError::builtin("InsArray", "first argument must be an array"));
        };
        let index = arg_i64(args, 1);
        let value = arg_value(args, 2);
        if !arr.write().unwrap().insert_at(index, value) {
            return Err(VmError::builtin(
                "InsArray",
                format!("index {} out of range", index),
            ));
        }
        Ok(Value::I64(0))
    });

    // DelArray(a, i): splice out position i.
    vm.register_builtin("DelArray", |_vm, args| {
        let Some(arr) = arg_array(args, 0) else {
            return Err(VmError::builtin("DelArray", "first argument must be an array"));
        };
        let index = arg_i64(args, 1);
        let mut guard = arr.write().unwrap();
        let result = guard.delete_at(index);
        drop(guard);
        match result {
            Some(removed) => Ok(removed),
            None => Err(VmError::builtin(
                "DelArray",
                format!("index {} out of range", index),
            )),
        }
    });

    vm.register_builtin("ClearArray", |_vm, args| {
        let Some(arr) = arg_array(args, 0) else {
            return Err(VmError::builtin("ClearArray", "first argument must be an array"));
        };
        arr.write().unwrap().clear();
        Ok(Value::I64(0))
    });
}
