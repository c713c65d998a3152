//! Scripted step sequences driven by the frame clock.
//!
//! A [`Sequence`] is authored up front with `call`, `wait_for`, `sleep`,
//! `play_audio` and `select` steps, then handed to a [`Sequencer`] which runs
//! it cooperatively: a step that suspends is resumed on a later
//! [`Sequencer::tick`] once its timer elapses or its [`Resume`] fires.
//!
//! [`Resume`]: vrx_core::Resume

pub mod audio;
pub mod runner;
pub mod sequence;

pub use audio::{AudioClip, AudioError};
pub use runner::{Completion, SequenceHandle, Sequencer};
pub use sequence::{Sequence, Step};
