//! Capability interfaces consumed by the core.
//!
//! The VM core touches the outside world only through these traits: a
//! monotonic clock, a random source, audio, graphics, and file I/O. Host
//! programs supply real implementations; the null implementations here keep
//! a headless VM self-contained and make tests deterministic.
//!
//! Logging is deliberately not a trait: diagnostics flow through the `log`
//! facade, which is the seam the rest of the ecosystem already plugs into.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::vm::error::VmError;
use crate::vm::value::Value;

/// Monotonic time in milliseconds, comparable under `<`. Event timestamps
/// come from here.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> u64;
}

/// Uniform integers for the `Random` builtin family.
pub trait Random: Send + fmt::Debug {
    /// A uniform integer in `[lo, hi)`. `hi <= lo` yields `lo`.
    fn below(&mut self, lo: i64, hi: i64) -> i64;
}

/// MIDI/WAVE playback. The core only issues commands; mixing, devices, and
/// codecs are the host's problem.
pub trait AudioSystem: Send + fmt::Debug {
    fn play_midi(&mut self, path: &str) -> Result<(), VmError>;
    fn play_wave(&mut self, path: &str) -> Result<(), VmError>;
    fn stop_timer(&mut self);
    fn shutdown(&mut self);
}

/// Picture/window/sprite/text primitives, behind one opaque command entry
/// point: the host's builtin adapters know the command vocabulary, the core
/// does not.
pub trait GraphicsSystem: Send + fmt::Debug {
    fn command(&mut self, name: &str, args: &[Value]) -> Result<Value, VmError>;
}

/// Mode for `FileIO::open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
    Append,
}

/// Line-oriented file access plus INI helpers, indexed by small-integer
/// handles that the host closes on VM shutdown.
pub trait FileIo: Send + fmt::Debug {
    fn open(&mut self, path: &str, mode: FileMode) -> Result<i64, VmError>;
    fn close(&mut self, handle: i64) -> Result<(), VmError>;
    fn seek(&mut self, handle: i64, pos: u64) -> Result<(), VmError>;
    /// `None` at end of file.
    fn read_line(&mut self, handle: i64) -> Result<Option<String>, VmError>;
    fn write_line(&mut self, handle: i64, line: &str) -> Result<(), VmError>;
    fn read_ini(&mut self, path: &str, section: &str, key: &str)
        -> Result<Option<String>, VmError>;
    fn write_ini(
        &mut self,
        path: &str,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<(), VmError>;
    /// Close every open handle; called when the VM shuts down.
    fn close_all(&mut self);
}

/// The bundle of capability handles a VM owns.
pub struct HostHandles {
    pub clock: Arc<dyn Clock>,
    pub random: Box<dyn Random>,
    pub audio: Box<dyn AudioSystem>,
    pub graphics: Box<dyn GraphicsSystem>,
    pub file_io: Box<dyn FileIo>,
}

impl fmt::Debug for HostHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostHandles").finish_non_exhaustive()
    }
}

impl Default for HostHandles {
    fn default() -> Self {
        Self {
            clock: Arc::new(MonotonicClock::new()),
            random: Box::new(SplitMixRandom::new(0x9e3779b97f4a7c15)),
            audio: Box::new(NullAudio),
            graphics: Box::new(NullGraphics),
            file_io: Box::new(NullFileIo),
        }
    }
}

/// Wall-clock-independent monotonic clock: milliseconds since construction.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// A clock tests advance by hand.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Deterministic default random source (splitmix64). Hosts that want real
/// entropy install their own `Random`; the default keeps headless runs
/// reproducible.
#[derive(Debug)]
pub struct SplitMixRandom {
    state: u64,
}

impl SplitMixRandom {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }
}

impl Random for SplitMixRandom {
    fn below(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo) as u64;
        lo + (self.next_u64() % span) as i64
    }
}

/// Audio backend that accepts every command and plays nothing.
#[derive(Debug)]
pub struct NullAudio;

impl AudioSystem for NullAudio {
    fn play_midi(&mut self, path: &str) -> Result<(), VmError> {
        log::debug!("audio (null): PlayMIDI {}", path);
        Ok(())
    }

    fn play_wave(&mut self, path: &str) -> Result<(), VmError> {
        log::debug!("audio (null): PlayWAVE {}", path);
        Ok(())
    }

    fn stop_timer(&mut self) {
        log::debug!("audio (null): stop timer");
    }

    fn shutdown(&mut self) {
        log::debug!("audio (null): shutdown");
    }
}

/// Graphics backend for headless runs: every command succeeds with `I64(0)`.
#[derive(Debug)]
pub struct NullGraphics;

impl GraphicsSystem for NullGraphics {
    fn command(&mut self, name: &str, args: &[Value]) -> Result<Value, VmError> {
        log::debug!("graphics (null): {} ({} args)", name, args.len());
        Ok(Value::I64(0))
    }
}

/// File backend that refuses every operation; hosts needing real file
/// builtins install their own.
#[derive(Debug)]
pub struct NullFileIo;

impl NullFileIo {
    fn refused(op: &str) -> VmError {
        VmError::Capability(format!("file I/O not available ({})", op))
    }
}

impl FileIo for NullFileIo {
    fn open(&mut self, _path: &str, _mode: FileMode) -> Result<i64, VmError> {
        Err(Self::refused("open"))
    }

    fn close(&mut self, _handle: i64) -> Result<(), VmError> {
        Err(Self::refused("close"))
    }

    fn seek(&mut self, _handle: i64, _pos: u64) -> Result<(), VmError> {
        Err(Self::refused("seek"))
    }

    fn read_line(&mut self, _handle: i64) -> Result<Option<String>, VmError> {
        Err(Self::refused("read"))
    }

    fn write_line(&mut self, _handle: i64, _line: &str) -> Result<(), VmError> {
        Err(Self::refused("write"))
    }

    fn read_ini(
        &mut self,
        _path: &str,
        _section: &str,
        _key: &str,
    ) -> Result<Option<String>, VmError> {
        Err(Self::refused("read_ini"))
    }

    fn write_ini(
        &mut self,
        _path: &str,
        _section: &str,
        _key: &str,
        _value: &str,
    ) -> Result<(), VmError> {
        Err(Self::refused("write_ini"))
    }

    fn close_all(&mut self) {}
}
