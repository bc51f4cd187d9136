//! Integration tests: the standard builtin library driving a real VM.

use filly_vm::opcode::build::*;
use filly_vm::opcode::BinOp;
use filly_vm::vm::{Event, EventType, Vm, VmOptions};
use filly_vm::Program;

fn host_vm() -> Vm {
    let mut vm = Vm::new(VmOptions::default());
    filly_vm_host::install(&mut vm);
    vm
}

fn run(body: Vec<filly_vm::OpNode>) -> Vm {
    let mut vm = host_vm();
    vm.run_toplevel(&Program::new(body)).unwrap();
    vm
}

fn get_i64(vm: &Vm, name: &str) -> i64 {
    vm.get_global(name).unwrap().coerce_i64().unwrap()
}

fn fire_time(vm: &mut Vm) {
    vm.post_event(Event::new(EventType::Time));
    vm.pump();
}

// ==================== Message control ====================

#[test]
fn test_wait_builtin_suspends_like_the_opcode() {
    let mut vm = run(vec![
        assign("hits", int(0)),
        handler(
            EventType::Time,
            vec![
                call("Wait", vec![int(2)]),
                assign("hits", op(binary(BinOp::Add, var("hits"), int(1)))),
            ],
        ),
    ]);
    let mut observed = Vec::new();
    for _ in 0..3 {
        fire_time(&mut vm);
        observed.push(get_i64(&vm, "hits"));
    }
    // Wait(2) on event 1; event 3 brings the counter to zero and resumes.
    assert_eq!(observed, vec![0, 0, 1]);
}

#[test]
fn test_wait_is_callable_case_insensitively() {
    let mut vm = run(vec![
        assign("done", int(0)),
        handler(
            EventType::Time,
            vec![call("wait", vec![int(1)]), assign("done", int(1))],
        ),
    ]);
    fire_time(&mut vm);
    assert_eq!(get_i64(&vm, "done"), 0);
    fire_time(&mut vm);
    assert_eq!(get_i64(&vm, "done"), 1);
}

#[test]
fn test_del_me_removes_after_the_dispatch() {
    let mut vm = run(vec![
        assign("h1", int(0)),
        assign("h2", int(0)),
        handler(
            EventType::Time,
            vec![
                assign("h1", op(binary(BinOp::Add, var("h1"), int(1)))),
                call("del_me", vec![]),
            ],
        ),
        handler(
            EventType::Time,
            vec![assign("h2", op(binary(BinOp::Add, var("h2"), int(1))))],
        ),
    ]);
    fire_time(&mut vm);
    assert_eq!((get_i64(&vm, "h1"), get_i64(&vm, "h2")), (1, 1));
    assert_eq!(vm.registry().len(), 1);
    fire_time(&mut vm);
    assert_eq!((get_i64(&vm, "h1"), get_i64(&vm, "h2")), (1, 2));
}

#[test]
fn test_get_mes_no_and_del_mes() {
    // The first handler learns its own number and deletes the second
    // handler by its number (registration numbers are sequential).
    let mut vm = run(vec![
        assign("my_no", int(0)),
        assign("victim_runs", int(0)),
        handler(
            EventType::Time,
            vec![
                assign("my_no", op(call("GetMesNo", vec![]))),
                call("DelMes", vec![op(binary(BinOp::Add, var("my_no"), int(1)))]),
            ],
        ),
        handler(
            EventType::Time,
            vec![assign("victim_runs", op(binary(BinOp::Add, var("victim_runs"), int(1))))],
        ),
    ]);
    fire_time(&mut vm);
    assert_eq!(get_i64(&vm, "my_no"), 1);
    // The victim was tombstoned mid-dispatch and skipped.
    assert_eq!(get_i64(&vm, "victim_runs"), 0);
    fire_time(&mut vm);
    assert_eq!(get_i64(&vm, "victim_runs"), 0);
    assert_eq!(vm.registry().len(), 1);
}

#[test]
fn test_post_mes_reaches_user_handler_with_params() {
    let mut vm = run(vec![
        assign("kind", int(0)),
        assign("p1", int(0)),
        assign("p2", int(0)),
        handler(
            EventType::User,
            vec![
                assign("kind", var("MessageType")),
                assign("p1", var("MesP1")),
                assign("p2", var("MesP2")),
            ],
        ),
        call("PostMes", vec![int(5), int(10), int(20)]),
    ]);
    vm.pump();
    assert_eq!(get_i64(&vm, "kind"), 5);
    assert_eq!(get_i64(&vm, "p1"), 10);
    assert_eq!(get_i64(&vm, "p2"), 20);
}

#[test]
fn test_end_step_builtin_skips_rest_of_body() {
    let mut vm = run(vec![
        assign("phase", int(0)),
        handler(
            EventType::Time,
            vec![
                assign("phase", int(1)),
                call("end_step", vec![]),
                assign("phase", int(2)),
            ],
        ),
    ]);
    fire_time(&mut vm);
    assert_eq!(get_i64(&vm, "phase"), 1);
}

#[test]
fn test_exit_title_stops_vm_and_clears_handlers() {
    let mut vm = run(vec![
        handler(EventType::Time, vec![call("ExitTitle", vec![])]),
        handler(EventType::Time, vec![]),
    ]);
    fire_time(&mut vm);
    assert!(vm.is_stopped());
    assert!(vm.registry().is_empty());
}

#[test]
fn test_set_step_builtin_stores_on_handler() {
    let mut vm = run(vec![handler(
        EventType::Time,
        vec![call("SetStep", vec![float(3.7)])],
    )]);
    fire_time(&mut vm);
    let snap = vm.registry().snapshot(EventType::Time);
    // Float step counts truncate.
    assert_eq!(snap[0].lock().unwrap().step_counter, 3);
}

// ==================== Math / strings / arrays ====================

#[test]
fn test_math_builtins() {
    let vm = run(vec![
        assign("a", op(call("Abs", vec![int(-5)]))),
        assign("mn", op(call("Min", vec![int(3), int(-2), int(7)]))),
        assign("mx", op(call("Max", vec![int(3), int(-2), int(7)]))),
        assign("sg", op(call("Sgn", vec![int(-9)]))),
        assign("r", op(call("Random", vec![int(10)]))),
    ]);
    assert_eq!(get_i64(&vm, "a"), 5);
    assert_eq!(get_i64(&vm, "mn"), -2);
    assert_eq!(get_i64(&vm, "mx"), 7);
    assert_eq!(get_i64(&vm, "sg"), -1);
    let r = get_i64(&vm, "r");
    assert!((0..10).contains(&r));
}

#[test]
fn test_string_builtins() {
    let vm = run(vec![
        assign("len", op(call("StrLen", vec![text("こんにちは")]))),
        assign("sub", op(call("SubStr", vec![text("abcdef"), int(2), int(3)]))),
        assign("found", op(call("StrFind", vec![text("hello"), text("ll")]))),
        assign("missing", op(call("StrFind", vec![text("hello"), text("zz")]))),
        assign("s", op(call("Str", vec![int(12)]))),
        assign("v", op(call("Val", vec![text("34")]))),
        assign(
            "fmt",
            op(call("Format", vec![text("%s=%d"), text("x"), int(9)])),
        ),
    ]);
    assert_eq!(get_i64(&vm, "len"), 5);
    assert_eq!(vm.get_global("sub").unwrap().to_text(), "cde");
    assert_eq!(get_i64(&vm, "found"), 2);
    assert_eq!(get_i64(&vm, "missing"), -1);
    assert_eq!(vm.get_global("s").unwrap().to_text(), "12");
    assert_eq!(get_i64(&vm, "v"), 34);
    assert_eq!(vm.get_global("fmt").unwrap().to_text(), "x=9");
}

#[test]
fn test_array_builtins_mutate_shared_container() {
    let vm = run(vec![
        array_assign("a", int(0), int(10)),
        array_assign("a", int(1), int(20)),
        assign("len", op(call("ArrayLen", vec![var("a")]))),
        call("InsArray", vec![var("a"), int(1), int(15)]),
        assign("len2", op(call("ArrayLen", vec![var("a")]))),
        assign("mid", op(array_access(var("a"), int(1)))),
        call("DelArray", vec![var("a"), int(1)]),
        assign("mid2", op(array_access(var("a"), int(1)))),
        call("ClearArray", vec![var("a")]),
        assign("len3", op(call("ArrayLen", vec![var("a")]))),
    ]);
    assert_eq!(get_i64(&vm, "len"), 2);
    assert_eq!(get_i64(&vm, "len2"), 3);
    assert_eq!(get_i64(&vm, "mid"), 15);
    assert_eq!(get_i64(&vm, "mid2"), 20);
    assert_eq!(get_i64(&vm, "len3"), 0);
}

#[test]
fn test_media_builtins_accept_commands_headless() {
    let mut vm = filly_vm_host::standard_vm(VmOptions::default());
    let program = Program::new(vec![
        call("PlayMIDI", vec![text("title.mid")]),
        call("LoadPic", vec![text("bg.pic"), int(0)]),
        call("OpenWin", vec![int(0)]),
        assign("after", int(1)),
    ]);
    vm.run_toplevel(&program).unwrap();
    assert_eq!(get_i64(&vm, "after"), 1);
}

#[test]
fn test_builtin_error_is_survivable() {
    // DelMes on a nonexistent handler reports an error; the program
    // continues with 0 substituted.
    let vm = run(vec![
        assign("x", op(call("DelMes", vec![int(42)]))),
        assign("after", int(1)),
    ]);
    assert_eq!(get_i64(&vm, "x"), 0);
    assert_eq!(get_i64(&vm, "after"), 1);
}
