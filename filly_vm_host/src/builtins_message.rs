//! Message-control builtins: the names handlers use to suspend, remove
//! themselves, and post messages.

use filly_vm::vm::{Event, Value, Vm, VmError};

use crate::args::{arg_i64, arg_text};

/// Register the message-control builtin set.
pub fn register(vm: &mut Vm) {
    // Wait(n): suspend the executing handler for n events of its type.
    // n <= 0 is a no-op. The suspension is parked on the VM and takes
    // effect at the enclosing statement boundary.
    vm.register_builtin("Wait", |vm, args| {
        let count = arg_i64(args, 0);
        vm.signal_wait(count);
        Ok(Value::I64(0))
    });

    // del_me: tombstone the executing handler. The dispatch in progress
    // completes; the post-dispatch sweep removes the handler.
    vm.register_builtin("del_me", |vm, _args| {
        if !vm.remove_current_handler() {
            log::warn!("del_me outside a message handler; ignored");
        }
        Ok(Value::I64(0))
    });

    // del_us: same removal, the name scripts use inside shared bodies.
    vm.register_builtin("del_us", |vm, _args| {
        if !vm.remove_current_handler() {
            log::warn!("del_us outside a message handler; ignored");
        }
        Ok(Value::I64(0))
    });

    // del_all: drop every handler immediately.
    vm.register_builtin("del_all", |vm, _args| {
        vm.remove_all_handlers();
        Ok(Value::I64(0))
    });

    // end_step: force the executing handler's body to complete now, wait
    // and step counters cleared.
    vm.register_builtin("end_step", |vm, _args| {
        vm.signal_end_step();
        Ok(Value::I64(0))
    });

    // SetStep(n): store the step count on the executing handler (or the VM
    // outside a dispatch). Float counts truncate.
    vm.register_builtin("SetStep", |vm, args| {
        vm.set_step_value(arg_i64(args, 0));
        Ok(Value::I64(0))
    });

    // PostMes(type, p1, p2, p3, p4): queue a USER event. Handlers observe
    // the message number as MessageType and the payload as MesP1..MesP4.
    vm.register_builtin("PostMes", |vm, args| {
        let message_type = arg_i64(args, 0);
        let params = args.get(1..).unwrap_or(&[]);
        vm.post_event(Event::user(message_type, params));
        Ok(Value::I64(0))
    });

    // GetMesNo(): the executing handler's registration number.
    vm.register_builtin("GetMesNo", |vm, _args| match vm.current_handler_seq() {
        Some(seq) => Ok(Value::I64(seq as i64)),
        None => {
            log::warn!("GetMesNo outside a message handler; using 0");
            Ok(Value::I64(0))
        }
    });

    // DelMes(n): tombstone the handler registered as number n.
    vm.register_builtin("DelMes", |vm, args| {
        let seq = arg_i64(args, 0);
        if seq < 0 || !vm.remove_handler_by_seq(seq as u64) {
            return Err(VmError::builtin(
                "DelMes",
                format!("no handler numbered {}", seq),
            ));
        }
        Ok(Value::I64(0))
    });

    // ExitTitle(): graceful shutdown - stop audio, drop all handlers, stop
    // the event loop.
    vm.register_builtin("ExitTitle", |vm, _args| {
        vm.host_mut().audio.shutdown();
        vm.remove_all_handlers();
        vm.stop();
        Ok(Value::I64(0))
    });

    // Print(...): join arguments and log them; the platform's debug output.
    vm.register_builtin("Print", |_vm, args| {
        let line: Vec<String> = args.iter().map(|v| v.to_text()).collect();
        log::info!("{}", line.join(""));
        Ok(Value::I64(0))
    });

    vm.register_builtin("DebugLog", |_vm, args| {
        log::debug!("{}", arg_text(args, 0));
        Ok(Value::I64(0))
    });

    // GetTime(): the monotonic clock in milliseconds; the same timebase
    // event timestamps use.
    vm.register_builtin("GetTime", |vm, _args| {
        Ok(Value::I64(vm.clock_now() as i64))
    });
}
