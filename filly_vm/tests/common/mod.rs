//! Shared helpers for the integration tests.

#![allow(dead_code)]

use filly_vm::opcode::OpNode;
use filly_vm::vm::{Event, EventType, Vm, VmOptions};
use filly_vm::Program;

pub fn vm() -> Vm {
    Vm::new(VmOptions::default())
}

/// Run a top-level statement stream and hand back the VM for inspection.
pub fn run_program(body: Vec<OpNode>) -> Vm {
    let mut vm = vm();
    vm.run_toplevel(&Program::new(body)).unwrap();
    vm
}

pub fn get_i64(vm: &Vm, name: &str) -> i64 {
    vm.get_global(name)
        .unwrap_or_else(|| panic!("variable `{}` is unbound", name))
        .coerce_i64()
        .unwrap_or_else(|| panic!("variable `{}` is not numeric", name))
}

pub fn get_text(vm: &Vm, name: &str) -> String {
    vm.get_global(name)
        .unwrap_or_else(|| panic!("variable `{}` is unbound", name))
        .to_text()
}

/// Deliver one event of `ty` and dispatch it.
pub fn fire(vm: &mut Vm, ty: EventType) {
    vm.post_event(Event::new(ty));
    assert_eq!(vm.pump(), 1);
}

/// Deliver `n` TIME events one at a time, reading `var` after each.
pub fn fire_time_reading(vm: &mut Vm, n: usize, var: &str) -> Vec<i64> {
    (0..n)
        .map(|_| {
            fire(vm, EventType::Time);
            get_i64(vm, var)
        })
        .collect()
}
