//! Argument coercion helpers shared by the builtin modules.
//!
//! Builtins are permissive the way the rest of the platform is: a missing
//! or miscoerced argument logs and reads as the default, it never faults
//! the program.

use filly_vm::vm::{ArrayRef, Value};

pub fn arg_value(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::I64(0))
}

pub fn arg_i64(args: &[Value], index: usize) -> i64 {
    match args.get(index) {
        Some(v) => v.coerce_i64().unwrap_or_else(|| {
            log::warn!("argument {} is {}, not a number; using 0", index + 1, v.kind());
            0
        }),
        None => 0,
    }
}

pub fn arg_f64(args: &[Value], index: usize) -> f64 {
    match args.get(index) {
        Some(v) => v.coerce_f64().unwrap_or_else(|| {
            log::warn!("argument {} is {}, not a number; using 0", index + 1, v.kind());
            0.0
        }),
        None => 0.0,
    }
}

pub fn arg_text(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_text).unwrap_or_default()
}

pub fn arg_array(args: &[Value], index: usize) -> Option<ArrayRef> {
    match args.get(index) {
        Some(Value::Array(arr)) => Some(arr.clone()),
        _ => None,
    }
}
