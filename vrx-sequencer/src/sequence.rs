//! Authoring side of scripted sequences.

use std::fmt;

use vrx_core::Resume;

use crate::audio::AudioClip;

/// One scripted step. Steps run once, in order.
pub enum Step {
    /// Run a closure and continue immediately.
    Call(Box<dyn FnOnce()>),
    /// Hand out a [`Resume`] and suspend until it fires.
    WaitFor(Box<dyn FnOnce(Resume)>),
    /// Suspend for the given number of milliseconds of unpaused frame time.
    Sleep(f32),
    /// Play a clip and suspend until it ends.
    PlayAudio(Box<dyn AudioClip>),
    /// Build a branch when reached; the rest of this sequence runs after it.
    Select(Box<dyn FnOnce() -> Sequence>),
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Call(_) => write!(f, "Call"),
            Step::WaitFor(_) => write!(f, "WaitFor"),
            Step::Sleep(ms) => write!(f, "Sleep({ms}ms)"),
            Step::PlayAudio(clip) => write!(f, "PlayAudio({})", clip.name()),
            Step::Select(_) => write!(f, "Select"),
        }
    }
}

/// An ordered list of steps, built with chained calls:
///
/// ```ignore
/// let intro = Sequence::new()
///     .play_audio(Box::new(welcome))
///     .sleep(500.0)
///     .call(|| show_hint())
///     .select(|| if returning { Sequence::new() } else { tutorial() });
/// ```
#[derive(Debug, Default)]
pub struct Sequence {
    steps: Vec<Step>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call(mut self, f: impl FnOnce() + 'static) -> Self {
        self.steps.push(Step::Call(Box::new(f)));
        self
    }

    pub fn wait_for(mut self, f: impl FnOnce(Resume) + 'static) -> Self {
        self.steps.push(Step::WaitFor(Box::new(f)));
        self
    }

    pub fn sleep(mut self, ms: f32) -> Self {
        self.steps.push(Step::Sleep(ms));
        self
    }

    pub fn play_audio(mut self, clip: Box<dyn AudioClip>) -> Self {
        self.steps.push(Step::PlayAudio(clip));
        self
    }

    pub fn select(mut self, decide: impl FnOnce() -> Sequence + 'static) -> Self {
        self.steps.push(Step::Select(Box::new(decide)));
        self
    }

    /// Append all steps of `other`.
    pub fn then(mut self, other: Sequence) -> Self {
        self.steps.extend(other.steps);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn into_steps(self) -> std::vec::IntoIter<Step> {
        self.steps.into_iter()
    }
}
