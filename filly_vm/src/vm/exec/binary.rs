//! Binary and unary operators: numeric promotion, text concatenation,
//! comparisons, and the logical pair.
//!
//! Promotion is decided by the operand variants alone: a `F64` on either
//! side moves the operation to floating point, otherwise it runs on wrapped
//! 64-bit integers. Text coerces through the standard rules when it meets
//! an arithmetic operator, except `+`, which concatenates when either side
//! is text. Division and modulo by zero are non-fatal: they log and yield
//! the zero of the operating kind.

use crate::opcode::{BinOp, OpArg, UnOp};
use crate::vm::error::VmError;
use crate::vm::value::Value;
use crate::vm::Vm;

use super::{coerce_f64_logged, coerce_i64_logged, Flow};

impl Vm {
    pub(super) fn exec_binary(&mut self, op: BinOp, args: &[OpArg]) -> Result<Flow, VmError> {
        let left = self.eval_arg(super::arg_expr(args, 0))?;
        let right = self.eval_arg(super::arg_expr(args, 1))?;
        Ok(Flow::Value(binary_value(op, &left, &right)))
    }

    pub(super) fn exec_unary(&mut self, op: UnOp, args: &[OpArg]) -> Result<Flow, VmError> {
        let operand = self.eval_arg(super::arg_expr(args, 0))?;
        let result = match op {
            UnOp::Neg => match operand {
                Value::I64(v) => Value::I64(v.wrapping_neg()),
                Value::F64(v) => Value::F64(-v),
                other => {
                    log::warn!("cannot negate {}; using 0", other.kind());
                    Value::I64(0)
                }
            },
            UnOp::Not => Value::from_bool(!operand.truthy()),
        };
        Ok(Flow::Value(result))
    }
}

/// Apply a binary operator to two evaluated operands.
pub(crate) fn binary_value(op: BinOp, left: &Value, right: &Value) -> Value {
    match op {
        BinOp::Add => add_values(left, right),
        BinOp::Sub => arith(left, right, i64::wrapping_sub, |a, b| a - b),
        BinOp::Mul => arith(left, right, i64::wrapping_mul, |a, b| a * b),
        BinOp::Div => {
            if is_float_pair(left, right) {
                let b = coerce_f64_logged(right);
                if b == 0.0 {
                    log::error!("division by zero; using 0");
                    Value::F64(0.0)
                } else {
                    Value::F64(coerce_f64_logged(left) / b)
                }
            } else {
                let b = coerce_i64_logged(right);
                if b == 0 {
                    log::error!("division by zero; using 0");
                    Value::I64(0)
                } else {
                    Value::I64(coerce_i64_logged(left).wrapping_div(b))
                }
            }
        }
        BinOp::Mod => {
            if is_float_pair(left, right) {
                let b = coerce_f64_logged(right);
                if b == 0.0 {
                    log::error!("modulo by zero; using 0");
                    Value::F64(0.0)
                } else {
                    Value::F64(coerce_f64_logged(left) % b)
                }
            } else {
                let b = coerce_i64_logged(right);
                if b == 0 {
                    log::error!("modulo by zero; using 0");
                    Value::I64(0)
                } else {
                    Value::I64(coerce_i64_logged(left).wrapping_rem(b))
                }
            }
        }
        BinOp::Eq => match eq_values(left, right) {
            Some(eq) => Value::from_bool(eq),
            None => cross_kind(left, right),
        },
        BinOp::Ne => match eq_values(left, right) {
            Some(eq) => Value::from_bool(!eq),
            None => cross_kind(left, right),
        },
        BinOp::Lt => ordered(left, right, |o| o == std::cmp::Ordering::Less),
        BinOp::Le => ordered(left, right, |o| o != std::cmp::Ordering::Greater),
        BinOp::Gt => ordered(left, right, |o| o == std::cmp::Ordering::Greater),
        BinOp::Ge => ordered(left, right, |o| o != std::cmp::Ordering::Less),
        // Both sides already evaluated by the caller: no short circuit.
        BinOp::And => Value::from_bool(left.truthy() && right.truthy()),
        BinOp::Or => Value::from_bool(left.truthy() || right.truthy()),
    }
}

fn is_float_pair(left: &Value, right: &Value) -> bool {
    matches!(left, Value::F64(_)) || matches!(right, Value::F64(_))
}

fn arith(
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Value {
    if is_float_pair(left, right) {
        Value::F64(float_op(coerce_f64_logged(left), coerce_f64_logged(right)))
    } else {
        Value::I64(int_op(coerce_i64_logged(left), coerce_i64_logged(right)))
    }
}

/// `+`: concatenation when either side is text, arithmetic otherwise.
fn add_values(left: &Value, right: &Value) -> Value {
    if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
        let mut s = left.to_text();
        s.push_str(&right.to_text());
        return Value::Str(s);
    }
    arith(left, right, i64::wrapping_add, |a, b| a + b)
}

/// Equality within a kind. `None` means the pair has no defined comparison
/// (text against a number); the caller logs and yields false.
pub(crate) fn eq_values(left: &Value, right: &Value) -> Option<bool> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a == b),
        (a, b) if a.is_numeric() && b.is_numeric() => {
            if is_float_pair(a, b) {
                Some(coerce_f64_logged(a) == coerce_f64_logged(b))
            } else {
                Some(coerce_i64_logged(a) == coerce_i64_logged(b))
            }
        }
        (Value::Array(a), Value::Array(b)) => Some(std::sync::Arc::ptr_eq(a, b)),
        (Value::Host(a), Value::Host(b)) => Some(a.same_identity(b)),
        (Value::Nothing, Value::Nothing) => Some(true),
        (Value::Nothing, _) | (_, Value::Nothing) => Some(false),
        _ => None,
    }
}

/// Ordering within a kind; cross-kind pairs log and yield false.
fn ordered(left: &Value, right: &Value, accept: fn(std::cmp::Ordering) -> bool) -> Value {
    let ord = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (a, b) if a.is_numeric() && b.is_numeric() => {
            if is_float_pair(a, b) {
                coerce_f64_logged(a).partial_cmp(&coerce_f64_logged(b))
            } else {
                Some(coerce_i64_logged(a).cmp(&coerce_i64_logged(b)))
            }
        }
        _ => None,
    };
    match ord {
        Some(o) => Value::from_bool(accept(o)),
        None => cross_kind(left, right),
    }
}

fn cross_kind(left: &Value, right: &Value) -> Value {
    log::error!(
        "comparison between {} and {} is undefined; using 0",
        left.kind(),
        right.kind()
    );
    Value::I64(0)
}
