//! Media builtins: audio commands plus the graphics-facing names, routed
//! to the capability backends. Headless hosts keep the null graphics
//! backend and every graphics name quietly succeeds.

use filly_vm::vm::{Value, Vm};

use crate::args::arg_text;

/// Graphics vocabulary of the platform. Each name becomes a builtin that
/// forwards to `GraphicsSystem::command`; the backend decides what, if
/// anything, the command draws.
const GRAPHICS_NAMES: &[&str] = &[
    "LoadPic",
    "DelPic",
    "MovePic",
    "OpenWin",
    "CloseWin",
    "MoveWin",
    "Cap",
    "TextWrite",
    "TextColor",
    "TextClear",
];

pub fn register(vm: &mut Vm) {
    vm.register_builtin("PlayMIDI", |vm, args| {
        let path = arg_text(args, 0);
        vm.host_mut().audio.play_midi(&path)?;
        Ok(Value::I64(0))
    });

    vm.register_builtin("PlayWAVE", |vm, args| {
        let path = arg_text(args, 0);
        vm.host_mut().audio.play_wave(&path)?;
        Ok(Value::I64(0))
    });

    vm.register_builtin("StopTimer", |vm, _args| {
        vm.host_mut().audio.stop_timer();
        Ok(Value::I64(0))
    });

    for name in GRAPHICS_NAMES {
        vm.register_builtin(name, move |vm, args| {
            vm.host_mut().graphics.command(name, args)
        });
    }
}
