//! Numeric builtins.

use filly_vm::vm::{Value, Vm};

use crate::args::{arg_i64, arg_value};

pub fn register(vm: &mut Vm) {
    vm.register_builtin("Abs", |_vm, args| {
        Ok(match arg_value(args, 0) {
            Value::F64(v) => Value::F64(v.abs()),
            other => Value::I64(other.coerce_i64().unwrap_or(0).wrapping_abs()),
        })
    });

    vm.register_builtin("Min", |_vm, args| Ok(fold_extreme(args, true)));
    vm.register_builtin("Max", |_vm, args| Ok(fold_extreme(args, false)));

    // Sgn(x): -1, 0, or 1.
    vm.register_builtin("Sgn", |_vm, args| {
        let v = match arg_value(args, 0) {
            Value::F64(x) => {
                if x > 0.0 {
                    1
                } else if x < 0.0 {
                    -1
                } else {
                    0
                }
            }
            other => other.coerce_i64().unwrap_or(0).signum(),
        };
        Ok(Value::I64(v))
    });

    // Random(hi) is uniform in [0, hi); Random(lo, hi) in [lo, hi).
    vm.register_builtin("Random", |vm, args| {
        let (lo, hi) = if args.len() >= 2 {
            (arg_i64(args, 0), arg_i64(args, 1))
        } else {
            (0, arg_i64(args, 0))
        };
        Ok(Value::I64(vm.host_mut().random.below(lo, hi)))
    });
}

/// Fold numeric arguments to their minimum or maximum, promoting to float
/// when any argument is a float.
fn fold_extreme(args: &[Value], want_min: bool) -> Value {
    if args.is_empty() {
        return Value::I64(0);
    }
    let any_float = args.iter().any(|v| matches!(v, Value::F64(_)));
    if any_float {
        let mut best = f64::NAN;
        for v in args {
            let x = v.coerce_f64().unwrap_or(0.0);
            if best.is_nan() || (want_min && x < best) || (!want_min && x > best) {
                best = x;
            }
        }
        Value::F64(best)
    } else {
        let iter = args.iter().map(|v| v.coerce_i64().unwrap_or(0));
        let best = if want_min { iter.min() } else { iter.max() };
        Value::I64(best.unwrap_or(0))
    }
}
