//! Experiments and the transitions between them.
//!
//! An [`Experiment`] is a scene subtree with lifecycle hooks. The
//! [`ExperimentTransitionManager`] keeps exactly one of them in the scene and
//! cross-fades to another on request, re-anchoring the camera rig in between.

pub mod experiment;
pub mod fade;
pub mod transition;

pub use experiment::{
    Anchor, Experiment, ExperimentId, ExperimentLoader, ExperimentRegistry, LoadError,
};
pub use fade::Fade;
pub use transition::{
    Completion, DEFAULT_FADE_MS, ExperimentTransitionManager, FocusOutcome, RenderSurface,
    TransitionConfig, TransitionContext, TransitionError, TransitionOutcome, TransitionState,
};
