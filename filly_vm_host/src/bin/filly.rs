//! `filly` - load a compiled FILLY program and run it.
//!
//! The compiler emits the opcode tree as JSON; this binary loads one,
//! wires the standard host, and runs the VM until the program stops, the
//! timeout fires, or Ctrl-C-shaped signals arrive through the host.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use filly_vm::loader::load_program_path;
use filly_vm::VmOptions;
use filly_vm_host::timer::TimerSource;

#[derive(Debug, Parser)]
#[command(name = "filly", about = "Run a compiled FILLY program")]
struct Cli {
    /// Path to the compiled program (opcode-tree JSON).
    program: String,

    /// Wire a real graphics backend instead of running headless.
    #[arg(long)]
    gui: bool,

    /// Stop after this many seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Event queue capacity.
    #[arg(long, default_value_t = 1000)]
    queue_capacity: usize,

    /// TIME tick interval in milliseconds; 0 disables the timer.
    #[arg(long, default_value_t = 50)]
    tick: u64,

    /// Pretty-print the loaded program and exit without running it.
    #[arg(long)]
    dump: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let program = match load_program_path(&cli.program) {
        Ok(p) => p,
        Err(e) => {
            log::error!("{}: {}", cli.program, e);
            return ExitCode::FAILURE;
        }
    };

    if cli.dump {
        print!("{}", filly_vm::disasm::dump_program(&program));
        return ExitCode::SUCCESS;
    }

    let options = VmOptions {
        headless: !cli.gui,
        timeout: cli.timeout.map(Duration::from_secs),
        queue_capacity: cli.queue_capacity,
    };
    if cli.gui {
        // No real graphics backend ships with this host yet; the null
        // backend still accepts the command vocabulary.
        log::warn!("--gui requested, but only the null graphics backend is available");
    }
    let mut vm = filly_vm_host::standard_vm(options);

    let mut timer = (cli.tick > 0)
        .then(|| TimerSource::start(Arc::clone(vm.queue()), Duration::from_millis(cli.tick)));

    let result = vm.run(&program);

    if let Some(timer) = timer.as_mut() {
        timer.stop();
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
