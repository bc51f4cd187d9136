//! Array element opcodes: `ArrayAssign` and `ArrayAccess`.

use crate::opcode::OpArg;
use crate::vm::array::new_array_ref;
use crate::vm::error::VmError;
use crate::vm::value::Value;
use crate::vm::Vm;

use super::{arg_expr, arg_variable, coerce_i64_logged, Flow};

impl Vm {
    /// `ArrayAssign(var, index, value)`: write one element, autocreating
    /// the array when the name is unbound and promoting a scalar binding to
    /// a one-element array on first indexed write.
    pub(super) fn exec_array_assign(&mut self, args: &[OpArg]) -> Result<Flow, VmError> {
        let Some(name) = arg_variable(args, 0) else {
            log::error!("ArrayAssign without a variable target; skipped");
            return Ok(Flow::Value(Value::I64(0)));
        };
        let name = name.to_string();
        let index = self.eval_i64(arg_expr(args, 1))?;
        let value = self.eval_arg(arg_expr(args, 2))?;

        let array = match self.current_scope.get(&name) {
            Some(Value::Array(arr)) => arr,
            Some(Value::Nothing) | None => {
                let arr = new_array_ref(Vec::new());
                self.current_scope
                    .set(&name, Value::Array(std::sync::Arc::clone(&arr)));
                arr
            }
            Some(scalar) => {
                // A plain value under an indexed write becomes cell 0 of a
                // fresh array.
                log::debug!("promoting `{}` from {} to an array", name, scalar.kind());
                let arr = new_array_ref(vec![scalar]);
                self.current_scope
                    .set(&name, Value::Array(std::sync::Arc::clone(&arr)));
                arr
            }
        };

        if index < 0 {
            log::warn!("negative array index {} on `{}`; write skipped", index, name);
            return Ok(Flow::Value(value));
        }
        array.write().unwrap().set(index, value.clone());
        Ok(Flow::Value(value))
    }

    /// `ArrayAccess(array, index)`: read one element. A non-array value is
    /// readable as a length-1 array at index 0 only; every out-of-domain
    /// read logs and yields `I64(0)`.
    pub(super) fn exec_array_access(&mut self, args: &[OpArg]) -> Result<Flow, VmError> {
        let target = self.eval_arg(arg_expr(args, 0))?;
        let index_value = self.eval_arg(arg_expr(args, 1))?;
        let index = coerce_i64_logged(&index_value);

        let result = match target {
            Value::Array(arr) => {
                if index < 0 {
                    log::error!("negative array index {}; using 0", index);
                    Value::I64(0)
                } else {
                    let guard = arr.read().unwrap();
                    match guard.get(index) {
                        Some(v) => v,
                        None => {
                            log::error!(
                                "array index {} out of range (len {}); using 0",
                                index,
                                guard.len()
                            );
                            Value::I64(0)
                        }
                    }
                }
            }
            scalar => {
                if index == 0 {
                    scalar
                } else {
                    log::error!(
                        "index {} into non-array {}; using 0",
                        index,
                        scalar.kind()
                    );
                    Value::I64(0)
                }
            }
        };
        Ok(Flow::Value(result))
    }
}
