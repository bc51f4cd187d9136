//! Integration tests: loading compiler-emitted JSON from disk and running
//! it, plus the pretty-printer over a loaded tree.

mod common;
use common::*;

use filly_vm::disasm::dump_program;
use filly_vm::loader::load_program_path;
use filly_vm::vm::EventType;

const COUNTER_JSON: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/counter.json");

#[test]
fn test_load_counter_program_from_disk_and_run() {
    let program = load_program_path(COUNTER_JSON).unwrap();
    let mut machine = vm();
    machine.run_toplevel(&program).unwrap();
    assert_eq!(get_i64(&machine, "x"), 10);

    // The file also registers a TIME handler with a one-event wait.
    assert_eq!(machine.registry().len(), 1);
    machine.set_global("ticked", filly_vm::Value::I64(0));
    fire(&mut machine, EventType::Time);
    assert_eq!(get_i64(&machine, "ticked"), 0);
    fire(&mut machine, EventType::Time);
    assert_eq!(get_i64(&machine, "ticked"), 1);
}

#[test]
fn test_loaded_program_pretty_prints() {
    let program = load_program_path(COUNTER_JSON).unwrap();
    let text = dump_program(&program);
    assert!(text.contains("for (i = 0; (i < 5); i = (i + 1))"));
    assert!(text.contains("mes(TIME) {"));
    assert!(text.contains("wait(1)"));
}
