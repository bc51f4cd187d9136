//! Audio backend for hosts without a sound device: commands are accepted
//! and logged, playback state is tracked so scripts that poll it behave.

use filly_vm::host::AudioSystem;
use filly_vm::vm::VmError;

#[derive(Debug, Default)]
pub struct LogAudio {
    playing_midi: Option<String>,
}

impl AudioSystem for LogAudio {
    fn play_midi(&mut self, path: &str) -> Result<(), VmError> {
        log::info!("PlayMIDI {}", path);
        self.playing_midi = Some(path.to_string());
        Ok(())
    }

    fn play_wave(&mut self, path: &str) -> Result<(), VmError> {
        log::info!("PlayWAVE {}", path);
        Ok(())
    }

    fn stop_timer(&mut self) {
        log::info!("audio timer stopped");
    }

    fn shutdown(&mut self) {
        if let Some(path) = self.playing_midi.take() {
            log::info!("stopping MIDI {}", path);
        }
    }
}
