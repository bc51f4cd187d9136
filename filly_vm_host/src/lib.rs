//! Standard host for the FILLY VM.
//!
//! The core registers no builtins; everything a program can call by name
//! comes from here: message control, math, strings, arrays, file I/O, and
//! the media names routed to the audio/graphics capabilities. `install`
//! wires the whole set onto a VM.

pub mod args;
pub mod audio;
pub mod builtins_arrays;
pub mod builtins_io;
pub mod builtins_math;
pub mod builtins_media;
pub mod builtins_message;
pub mod builtins_strings;
pub mod fileio;
pub mod random;
pub mod timer;

use filly_vm::host::HostHandles;
use filly_vm::vm::Vm;
use filly_vm::VmOptions;

/// Capability handles for a standard headless host: monotonic clock,
/// entropy-seeded randomness, logging audio, null graphics, and real file
/// I/O with the platform's Shift-JIS line codec.
pub fn standard_host() -> HostHandles {
    HostHandles {
        random: Box::new(random::EntropyRandom::new()),
        audio: Box::new(audio::LogAudio::default()),
        file_io: Box::new(fileio::StdFileIo::new()),
        ..HostHandles::default()
    }
}

/// A VM wired with the standard host and the full builtin library.
pub fn standard_vm(options: VmOptions) -> Vm {
    let mut vm = Vm::with_host(options, standard_host());
    install(&mut vm);
    vm
}

/// Register every builtin this host supplies.
pub fn install(vm: &mut Vm) {
    builtins_message::register(vm);
    builtins_math::register(vm);
    builtins_strings::register(vm);
    builtins_arrays::register(vm);
    builtins_io::register(vm);
    builtins_media::register(vm);
}
