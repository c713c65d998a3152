//! Audio boundary consumed by `play_audio` steps.

use thiserror::Error;
use vrx_core::Resume;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("audio output unavailable")]
    Unavailable,

    #[error("failed to load clip '{name}': {reason}")]
    Load { name: String, reason: String },
}

/// A playable sound owned by the audio subsystem.
pub trait AudioClip {
    fn name(&self) -> &str;

    /// Prepare the clip for playback. Called once, right before `play`.
    fn create(&mut self) -> Result<(), AudioError>;

    /// Start playback; `on_ended` must be fired when the clip finishes.
    fn play(&mut self, on_ended: Resume);
}
