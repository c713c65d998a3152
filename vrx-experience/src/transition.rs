//! Cross-fade transitions between experiments.
//!
//! A transition runs Idle → FadingOut → Swapping → FadingIn → Idle and never
//! skips a phase. Only one runs at a time; requests arriving mid-flight wait
//! in a single pending slot where the latest request wins and the request it
//! replaces is reported as superseded. A transition that fails is abandoned
//! and the pending request, if any, starts in its place.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use vrx_controls::{ControlError, ControlsCoordinator};
use vrx_core::{Resume, SceneError, SceneGraph};

use crate::experiment::{Experiment, ExperimentId, ExperimentRegistry, LoadError};
use crate::fade::Fade;

/// Duration of each half of a cross-fade.
pub const DEFAULT_FADE_MS: f32 = 1000.0;

/// Boundary to the render loop's opacity uniform and draw trigger.
pub trait RenderSurface {
    fn set_opacity(&mut self, opacity: f32);

    /// Draw one frame immediately.
    fn render_now(&mut self);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub fade_ms: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            fade_ms: DEFAULT_FADE_MS,
        }
    }
}

/// Observable phase of the transition state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    FadingOut,
    Swapping,
    FadingIn,
}

/// What a focus request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
    /// The experiment is already shown or being transitioned to.
    AlreadyFocused,
    /// A transition started.
    Started,
    /// Deferred until the running transition completes.
    Queued,
}

/// How a focus request ended, passed to its [`Completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The experiment is fully shown.
    Shown,
    /// A later request took the pending slot before this one started.
    Superseded,
    /// Loading, hooks or scene changes failed and the transition was dropped.
    Failed,
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("experiment load failed: {0}")]
    Load(#[from] LoadError),

    #[error("experiment '{0}' is not registered")]
    UnknownExperiment(ExperimentId),

    #[error("scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("camera re-anchoring failed: {0}")]
    Controls(#[from] ControlError),
}

/// Collaborators a transition touches.
pub struct TransitionContext<'a> {
    pub scene: &'a mut dyn SceneGraph,
    pub controls: &'a mut ControlsCoordinator,
    pub surface: &'a mut dyn RenderSurface,
}

/// Called exactly once when a focus request is settled.
pub type Completion = Box<dyn FnOnce(&ExperimentId, TransitionOutcome)>;

struct Transition {
    target: ExperimentId,
    on_complete: Option<Completion>,
}

impl Transition {
    fn report(self, outcome: TransitionOutcome) {
        if let Some(callback) = self.on_complete {
            callback(&self.target, outcome);
        }
    }

    /// Run `then` after any callback already attached.
    fn also_notify(&mut self, then: Completion) {
        let chained: Completion = match self.on_complete.take() {
            Some(first) => Box::new(move |id: &ExperimentId, outcome: TransitionOutcome| {
                first(id, outcome);
                then(id, outcome);
            }),
            None => then,
        };
        self.on_complete = Some(chained);
    }
}

enum Phase {
    Idle,
    AwaitHide(Resume),
    FadeOut(Fade),
    Swap,
    AwaitShow(Resume),
    FadeIn(Fade),
}

impl Phase {
    fn state(&self) -> TransitionState {
        match self {
            Phase::Idle => TransitionState::Idle,
            Phase::AwaitHide(_) | Phase::FadeOut(_) => TransitionState::FadingOut,
            Phase::Swap => TransitionState::Swapping,
            Phase::AwaitShow(_) | Phase::FadeIn(_) => TransitionState::FadingIn,
        }
    }
}

/// Owns the experiment registry and the single active experiment.
pub struct ExperimentTransitionManager {
    registry: ExperimentRegistry,
    config: TransitionConfig,
    active: Option<ExperimentId>,
    phase: Phase,
    current: Option<Transition>,
    pending: Option<Transition>,
    opacity: f32,
}

impl ExperimentTransitionManager {
    pub fn new(registry: ExperimentRegistry, config: TransitionConfig) -> Self {
        Self {
            registry,
            config,
            active: None,
            phase: Phase::Idle,
            current: None,
            pending: None,
            opacity: 0.0,
        }
    }

    pub fn state(&self) -> TransitionState {
        self.phase.state()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// Experiment currently in the scene. While fading out this is the
    /// outgoing one.
    pub fn active_experiment(&self) -> Option<&ExperimentId> {
        self.active.as_ref()
    }

    /// Target of the running transition.
    pub fn target(&self) -> Option<&ExperimentId> {
        self.current.as_ref().map(|t| &t.target)
    }

    /// Request waiting for the running transition to finish.
    pub fn pending(&self) -> Option<&ExperimentId> {
        self.pending.as_ref().map(|t| &t.target)
    }

    /// Last opacity pushed to the surface.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn registry(&self) -> &ExperimentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ExperimentRegistry {
        &mut self.registry
    }

    /// Bring `id` into view. `on_complete` runs once the request settles:
    /// shown, superseded by a later request, or failed.
    pub fn focus_experiment(
        &mut self,
        id: ExperimentId,
        on_complete: Option<Completion>,
        ctx: &mut TransitionContext<'_>,
    ) -> Result<FocusOutcome, TransitionError> {
        if let Some(current) = self.current.as_mut() {
            if current.target == id {
                if let Some(callback) = on_complete {
                    current.also_notify(callback);
                }
                return Ok(FocusOutcome::AlreadyFocused);
            }
            info!(%id, running = %current.target, "transition in progress, queueing focus request");
            let replaced = self.pending.replace(Transition {
                target: id,
                on_complete,
            });
            if let Some(replaced) = replaced {
                debug!(replaced = %replaced.target, "queued focus request superseded");
                replaced.report(TransitionOutcome::Superseded);
            }
            return Ok(FocusOutcome::Queued);
        }

        if self.active.as_ref() == Some(&id) {
            if let Some(callback) = on_complete {
                callback(&id, TransitionOutcome::Shown);
            }
            return Ok(FocusOutcome::AlreadyFocused);
        }

        self.registry
            .ensure_loaded(&id, ctx.scene)
            .inspect_err(|err| warn!(%id, %err, "cannot focus experiment"))?;
        self.begin(Transition {
            target: id,
            on_complete,
        });
        self.advance(0.0, ctx)?;
        Ok(FocusOutcome::Started)
    }

    /// Per-frame driver: progresses the running transition, then forwards
    /// the frame to the experiment in the scene.
    pub fn update(&mut self, dt_ms: f32, ctx: &mut TransitionContext<'_>) -> Result<(), TransitionError> {
        self.advance(dt_ms, ctx)?;
        if let Some(id) = self.active.clone() {
            if let Some(experiment) = self.registry.get_mut(&id) {
                experiment.on_update(dt_ms);
            }
        }
        Ok(())
    }

    fn begin(&mut self, transition: Transition) {
        info!(experiment = %transition.target, from = ?self.active, "starting transition");
        self.current = Some(transition);
        self.phase = match self.active.clone() {
            Some(previous) => match self.registry.get_mut(&previous) {
                Some(experiment) => {
                    let resume = Resume::new();
                    experiment.on_will_hide(resume.clone());
                    Phase::AwaitHide(resume)
                }
                None => Phase::Swap,
            },
            None => Phase::Swap,
        };
    }

    fn experiment_mut(&mut self, id: &ExperimentId) -> Result<&mut (dyn Experiment + 'static), TransitionError> {
        self.registry
            .get_mut(id)
            .ok_or_else(|| TransitionError::UnknownExperiment(id.clone()))
    }

    fn set_opacity(&mut self, opacity: f32, ctx: &mut TransitionContext<'_>) {
        self.opacity = opacity;
        ctx.surface.set_opacity(opacity);
    }

    /// Run phases until one has to wait for time or a hook. On failure the
    /// running transition is abandoned before the error is returned.
    fn advance(&mut self, dt_ms: f32, ctx: &mut TransitionContext<'_>) -> Result<(), TransitionError> {
        let result = self.run_phases(dt_ms, ctx);
        if result.is_err() {
            self.abort(ctx);
        }
        result
    }

    /// `dt_ms` is spent by the first fade that runs.
    fn run_phases(&mut self, dt_ms: f32, ctx: &mut TransitionContext<'_>) -> Result<(), TransitionError> {
        let mut dt = dt_ms;
        loop {
            let phase = std::mem::replace(&mut self.phase, Phase::Idle);
            self.phase = match phase {
                Phase::Idle => return Ok(()),
                Phase::AwaitHide(resume) => {
                    if !resume.is_fired() {
                        self.phase = Phase::AwaitHide(resume);
                        return Ok(());
                    }
                    Phase::FadeOut(Fade::out(self.config.fade_ms))
                }
                Phase::FadeOut(mut fade) => {
                    if dt > 0.0 || fade.is_finished() {
                        let value = fade.advance(dt);
                        dt = 0.0;
                        self.set_opacity(value, ctx);
                    }
                    if !fade.is_finished() {
                        self.phase = Phase::FadeOut(fade);
                        return Ok(());
                    }
                    self.hide_previous(ctx)?;
                    Phase::Swap
                }
                Phase::Swap => self.swap(ctx)?,
                Phase::AwaitShow(resume) => {
                    if !resume.is_fired() {
                        self.phase = Phase::AwaitShow(resume);
                        return Ok(());
                    }
                    Phase::FadeIn(Fade::into_view(self.config.fade_ms))
                }
                Phase::FadeIn(mut fade) => {
                    if dt > 0.0 || fade.is_finished() {
                        let value = fade.advance(dt);
                        dt = 0.0;
                        self.set_opacity(value, ctx);
                    }
                    if !fade.is_finished() {
                        self.phase = Phase::FadeIn(fade);
                        return Ok(());
                    }
                    self.finish(ctx)?;
                    self.next_pending(ctx)
                }
            };
        }
    }

    fn hide_previous(&mut self, ctx: &mut TransitionContext<'_>) -> Result<(), TransitionError> {
        let Some(previous) = self.active.clone() else {
            return Ok(());
        };
        let experiment = self.experiment_mut(&previous)?;
        experiment.on_hidden();
        let root = experiment.root();
        ctx.scene.detach(root)?;
        self.active = None;
        debug!(%previous, "removed experiment from scene");
        Ok(())
    }

    fn swap(&mut self, ctx: &mut TransitionContext<'_>) -> Result<Phase, TransitionError> {
        let Some(target) = self.current.as_ref().map(|t| t.target.clone()) else {
            return Ok(Phase::Idle);
        };
        let experiment = self.experiment_mut(&target)?;
        let root = experiment.root();
        let anchor = experiment.anchor();

        let scene_root = ctx.scene.root();
        ctx.scene.add_child(scene_root, root)?;
        self.active = Some(target.clone());
        ctx.controls
            .zero(ctx.scene, anchor.position, anchor.direction)
            .inspect_err(|err| error!(%err, experiment = %target, "failed to re-anchor camera"))?;
        self.set_opacity(0.0, ctx);

        let resume = Resume::new();
        self.experiment_mut(&target)?.on_will_show(resume.clone());
        debug!(experiment = %target, "swapped experiment into scene");
        Ok(Phase::AwaitShow(resume))
    }

    fn finish(&mut self, ctx: &mut TransitionContext<'_>) -> Result<(), TransitionError> {
        let Some(target) = self.current.as_ref().map(|t| t.target.clone()) else {
            return Ok(());
        };
        self.experiment_mut(&target)?.on_shown();
        ctx.surface.render_now();
        info!(experiment = %target, "transition complete");
        if let Some(transition) = self.current.take() {
            transition.report(TransitionOutcome::Shown);
        }
        Ok(())
    }

    /// Drop the failed transition and start whatever is queued. With nothing
    /// queued the surviving experiment is made visible again.
    fn abort(&mut self, ctx: &mut TransitionContext<'_>) {
        if let Some(failed) = self.current.take() {
            warn!(experiment = %failed.target, active = ?self.active, "transition abandoned");
            failed.report(TransitionOutcome::Failed);
        }
        self.phase = self.next_pending(ctx);
        if matches!(self.phase, Phase::Idle) && self.active.is_some() {
            self.set_opacity(1.0, ctx);
        }
    }

    /// Start the queued request, if it still needs a transition.
    fn next_pending(&mut self, ctx: &mut TransitionContext<'_>) -> Phase {
        let Some(next) = self.pending.take() else {
            return Phase::Idle;
        };
        if self.active.as_ref() == Some(&next.target) {
            debug!(experiment = %next.target, "queued experiment already focused");
            next.report(TransitionOutcome::Shown);
            return Phase::Idle;
        }
        if let Err(err) = self.registry.ensure_loaded(&next.target, ctx.scene) {
            warn!(experiment = %next.target, %err, "dropping queued focus request");
            next.report(TransitionOutcome::Failed);
            return Phase::Idle;
        }
        self.begin(next);
        std::mem::replace(&mut self.phase, Phase::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::Anchor;
    use glam::Vec3;
    use std::cell::RefCell;
    use std::rc::Rc;
    use vrx_controls::{MouseLookConfig, NullDevice};
    use vrx_core::{MemoryScene, NodeId};

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        id: ExperimentId,
        root: NodeId,
        anchor: Anchor,
        log: Log,
        hold: Rc<RefCell<Option<Resume>>>,
        defer_hooks: bool,
    }

    impl Recorder {
        fn push(&self, event: &str) {
            self.log.borrow_mut().push(format!("{}:{}", self.id, event));
        }
    }

    impl Experiment for Recorder {
        fn id(&self) -> &ExperimentId {
            &self.id
        }

        fn root(&self) -> NodeId {
            self.root
        }

        fn anchor(&self) -> Anchor {
            self.anchor
        }

        fn on_will_show(&mut self, resume: Resume) {
            self.push("will_show");
            if self.defer_hooks {
                *self.hold.borrow_mut() = Some(resume);
            } else {
                resume.resume();
            }
        }

        fn on_shown(&mut self) {
            self.push("shown");
        }

        fn on_will_hide(&mut self, resume: Resume) {
            self.push("will_hide");
            if self.defer_hooks {
                *self.hold.borrow_mut() = Some(resume);
            } else {
                resume.resume();
            }
        }

        fn on_hidden(&mut self) {
            self.push("hidden");
        }
    }

    #[derive(Default)]
    struct Surface {
        log: Option<Log>,
        opacity: Vec<f32>,
        renders: usize,
    }

    impl RenderSurface for Surface {
        fn set_opacity(&mut self, opacity: f32) {
            self.opacity.push(opacity);
            if let (Some(log), true) = (&self.log, opacity == 0.0 || opacity == 1.0) {
                log.borrow_mut().push(format!("opacity:{opacity}"));
            }
        }

        fn render_now(&mut self) {
            self.renders += 1;
        }
    }

    struct Harness {
        scene: MemoryScene,
        controls: ControlsCoordinator,
        surface: Surface,
        manager: ExperimentTransitionManager,
        log: Log,
        hold: Rc<RefCell<Option<Resume>>>,
    }

    impl Harness {
        fn new(defer_hooks: bool) -> Self {
            let mut scene = MemoryScene::new();
            let controls = ControlsCoordinator::new(
                &mut scene,
                MouseLookConfig::default(),
                Box::new(NullDevice),
            )
            .unwrap();
            let log: Log = Rc::new(RefCell::new(Vec::new()));
            let hold = Rc::new(RefCell::new(None));

            let mut registry = ExperimentRegistry::new();
            for (name, anchor) in [
                ("a", Anchor::default()),
                ("b", Anchor::new(Vec3::new(0.0, 0.0, 5.0), Vec3::X)),
            ] {
                registry.insert(Box::new(Recorder {
                    id: ExperimentId::from(name),
                    root: scene.create_node(name),
                    anchor,
                    log: log.clone(),
                    hold: hold.clone(),
                    defer_hooks,
                }));
            }

            Self {
                scene,
                controls,
                surface: Surface {
                    log: Some(log.clone()),
                    ..Surface::default()
                },
                manager: ExperimentTransitionManager::new(registry, TransitionConfig::default()),
                log,
                hold,
            }
        }

        fn focus(&mut self, id: &str) -> FocusOutcome {
            let mut ctx = TransitionContext {
                scene: &mut self.scene,
                controls: &mut self.controls,
                surface: &mut self.surface,
            };
            self.manager
                .focus_experiment(ExperimentId::from(id), None, &mut ctx)
                .unwrap()
        }

        /// Register an extra experiment whose root is `root`.
        fn add(&mut self, name: &str, root: NodeId) {
            self.manager.registry_mut().insert(Box::new(Recorder {
                id: ExperimentId::from(name),
                root,
                anchor: Anchor::default(),
                log: self.log.clone(),
                hold: self.hold.clone(),
                defer_hooks: false,
            }));
        }

        /// Focus `id`, recording how the request settles into `outcomes`.
        fn focus_tracked(
            &mut self,
            id: &str,
            outcomes: &Log,
        ) -> Result<FocusOutcome, TransitionError> {
            let sink = outcomes.clone();
            let mut ctx = TransitionContext {
                scene: &mut self.scene,
                controls: &mut self.controls,
                surface: &mut self.surface,
            };
            self.manager.focus_experiment(
                ExperimentId::from(id),
                Some(Box::new(move |id: &ExperimentId, outcome: TransitionOutcome| {
                    sink.borrow_mut().push(format!("{id}:{outcome:?}"))
                })),
                &mut ctx,
            )
        }

        fn try_tick(&mut self, dt_ms: f32) -> Result<(), TransitionError> {
            let mut ctx = TransitionContext {
                scene: &mut self.scene,
                controls: &mut self.controls,
                surface: &mut self.surface,
            };
            self.manager.update(dt_ms, &mut ctx)
        }

        fn tick(&mut self, dt_ms: f32) {
            let mut ctx = TransitionContext {
                scene: &mut self.scene,
                controls: &mut self.controls,
                surface: &mut self.surface,
            };
            self.manager.update(dt_ms, &mut ctx).unwrap();
        }

        fn run_frames(&mut self, frames: usize) {
            for _ in 0..frames {
                self.tick(100.0);
            }
        }

        fn root_of(&self, id: &str) -> NodeId {
            self.manager
                .registry()
                .get(&ExperimentId::from(id))
                .unwrap()
                .root()
        }

        fn events(&self) -> Vec<String> {
            self.log.borrow().clone()
        }
    }

    #[test]
    fn test_first_focus_fades_in() {
        let mut h = Harness::new(false);
        assert_eq!(h.focus("a"), FocusOutcome::Started);
        assert_eq!(h.manager.state(), TransitionState::FadingIn);
        assert_eq!(h.scene.parent(h.root_of("a")), Some(h.scene.root()));

        h.run_frames(5);
        assert_eq!(h.manager.state(), TransitionState::FadingIn);
        h.run_frames(5);
        assert_eq!(h.manager.state(), TransitionState::Idle);
        assert_eq!(h.manager.opacity(), 1.0);
        assert_eq!(h.surface.renders, 1);
        assert_eq!(
            h.events(),
            vec!["opacity:0", "a:will_show", "opacity:1", "a:shown"]
        );
    }

    #[test]
    fn test_focus_same_experiment_is_idempotent() {
        let mut h = Harness::new(false);
        assert_eq!(h.focus("a"), FocusOutcome::Started);
        assert_eq!(h.focus("a"), FocusOutcome::AlreadyFocused);
        h.run_frames(20);
        assert_eq!(h.focus("a"), FocusOutcome::AlreadyFocused);
        h.run_frames(20);

        let events = h.events();
        assert_eq!(events.iter().filter(|e| *e == "a:will_show").count(), 1);
        assert_eq!(events.iter().filter(|e| *e == "a:shown").count(), 1);
        assert_eq!(h.surface.renders, 1);
    }

    #[test]
    fn test_focus_during_transition_is_queued_not_interleaved() {
        let mut h = Harness::new(false);
        h.focus("a");
        h.run_frames(3);
        assert_eq!(h.focus("b"), FocusOutcome::Queued);
        assert_eq!(h.manager.pending(), Some(&ExperimentId::from("b")));
        assert_eq!(h.manager.target(), Some(&ExperimentId::from("a")));

        h.run_frames(40);
        assert_eq!(h.manager.state(), TransitionState::Idle);
        assert_eq!(h.manager.active_experiment(), Some(&ExperimentId::from("b")));

        assert_eq!(
            h.events(),
            vec![
                "opacity:0",
                "a:will_show",
                "opacity:1",
                "a:shown",
                "a:will_hide",
                "opacity:0",
                "a:hidden",
                "opacity:0",
                "b:will_show",
                "opacity:1",
                "b:shown",
            ]
        );
        // Opacity never jumps between the two fades.
        for pair in h.surface.opacity.windows(2) {
            assert!((pair[1] - pair[0]).abs() <= 0.1 + 1e-5, "{pair:?}");
        }
    }

    #[test]
    fn test_swap_removes_previous_and_reanchors() {
        let mut h = Harness::new(false);
        h.focus("a");
        h.run_frames(20);
        h.focus("b");
        assert_eq!(h.manager.state(), TransitionState::FadingOut);
        h.run_frames(20);

        assert_eq!(h.scene.parent(h.root_of("a")), None);
        assert_eq!(h.scene.parent(h.root_of("b")), Some(h.scene.root()));
        let zero = h.controls.zero_anchor();
        assert_eq!(h.scene.position(zero).unwrap(), Vec3::new(0.0, 0.0, 5.0));
        let forward = h.scene.rotation(zero).unwrap() * Vec3::NEG_Z;
        assert!((forward - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_hooks_gate_phase_progress() {
        let mut h = Harness::new(true);
        h.focus("a");
        h.run_frames(30);
        assert_eq!(h.manager.state(), TransitionState::FadingIn);
        assert_eq!(h.manager.opacity(), 0.0);

        let resume = h.hold.borrow_mut().take().unwrap();
        resume.resume();
        h.run_frames(11);
        assert_eq!(h.manager.state(), TransitionState::Idle);

        h.focus("b");
        h.run_frames(30);
        assert_eq!(h.manager.state(), TransitionState::FadingOut);
        assert_eq!(h.manager.opacity(), 1.0);
        assert_eq!(h.manager.active_experiment(), Some(&ExperimentId::from("a")));
    }

    #[test]
    fn test_refocusing_running_target_keeps_queue() {
        let mut h = Harness::new(false);
        h.focus("a");
        assert_eq!(h.focus("b"), FocusOutcome::Queued);
        assert_eq!(h.focus("a"), FocusOutcome::AlreadyFocused);
        h.run_frames(40);
        assert_eq!(h.manager.active_experiment(), Some(&ExperimentId::from("b")));
    }

    #[test]
    fn test_unknown_experiment_leaves_state_unchanged() {
        let mut h = Harness::new(false);
        let mut ctx = TransitionContext {
            scene: &mut h.scene,
            controls: &mut h.controls,
            surface: &mut h.surface,
        };
        let result = h
            .manager
            .focus_experiment(ExperimentId::from("missing"), None, &mut ctx);
        assert!(matches!(result, Err(TransitionError::Load(_))));
        assert!(h.manager.is_idle());
        assert!(h.manager.active_experiment().is_none());
    }

    #[test]
    fn test_completion_callback_fires_once() {
        let mut h = Harness::new(false);
        let done = Rc::new(RefCell::new(Vec::new()));
        let sink = done.clone();
        let mut ctx = TransitionContext {
            scene: &mut h.scene,
            controls: &mut h.controls,
            surface: &mut h.surface,
        };
        h.manager
            .focus_experiment(
                ExperimentId::from("a"),
                Some(Box::new(move |id: &ExperimentId, _: TransitionOutcome| {
                    sink.borrow_mut().push(id.to_string())
                })),
                &mut ctx,
            )
            .unwrap();
        h.run_frames(30);
        assert_eq!(*done.borrow(), vec!["a".to_string()]);
    }

    #[test]
    fn test_superseded_request_is_reported() {
        let mut h = Harness::new(false);
        let c = h.scene.create_node("c");
        h.add("c", c);
        let outcomes: Log = Rc::new(RefCell::new(Vec::new()));

        h.focus("a");
        assert_eq!(h.focus_tracked("b", &outcomes).unwrap(), FocusOutcome::Queued);
        assert_eq!(h.focus_tracked("c", &outcomes).unwrap(), FocusOutcome::Queued);
        assert_eq!(*outcomes.borrow(), vec!["b:Superseded"]);

        h.run_frames(40);
        assert_eq!(h.manager.active_experiment(), Some(&ExperimentId::from("c")));
        assert_eq!(*outcomes.borrow(), vec!["b:Superseded", "c:Shown"]);
    }

    #[test]
    fn test_refocus_while_running_notifies_both_callers() {
        let mut h = Harness::new(false);
        let outcomes: Log = Rc::new(RefCell::new(Vec::new()));
        assert_eq!(h.focus_tracked("a", &outcomes).unwrap(), FocusOutcome::Started);
        assert_eq!(
            h.focus_tracked("a", &outcomes).unwrap(),
            FocusOutcome::AlreadyFocused
        );
        h.run_frames(20);
        assert_eq!(*outcomes.borrow(), vec!["a:Shown", "a:Shown"]);

        assert_eq!(
            h.focus_tracked("a", &outcomes).unwrap(),
            FocusOutcome::AlreadyFocused
        );
        assert_eq!(outcomes.borrow().len(), 3);
    }

    #[test]
    fn test_failed_swap_does_not_block_later_focus() {
        let mut h = Harness::new(false);
        let scene_root = h.scene.root();
        h.add("broken", scene_root);
        let outcomes: Log = Rc::new(RefCell::new(Vec::new()));

        let result = h.focus_tracked("broken", &outcomes);
        assert!(matches!(
            result,
            Err(TransitionError::Scene(SceneError::RootReparent))
        ));
        assert!(h.manager.is_idle());
        assert_eq!(h.manager.target(), None);
        assert_eq!(*outcomes.borrow(), vec!["broken:Failed"]);

        assert_eq!(h.focus("a"), FocusOutcome::Started);
        h.run_frames(20);
        assert_eq!(h.manager.active_experiment(), Some(&ExperimentId::from("a")));
        assert_eq!(h.manager.opacity(), 1.0);
    }

    #[test]
    fn test_failed_transition_starts_queued_request() {
        let mut h = Harness::new(false);
        let scene_root = h.scene.root();
        h.add("broken", scene_root);
        let outcomes: Log = Rc::new(RefCell::new(Vec::new()));
        h.focus("a");
        h.run_frames(20);

        assert_eq!(h.focus_tracked("broken", &outcomes).unwrap(), FocusOutcome::Started);
        assert_eq!(h.focus_tracked("b", &outcomes).unwrap(), FocusOutcome::Queued);

        let mut failures = 0;
        for _ in 0..40 {
            if h.try_tick(100.0).is_err() {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
        assert!(h.manager.is_idle());
        assert_eq!(h.manager.active_experiment(), Some(&ExperimentId::from("b")));
        assert_eq!(*outcomes.borrow(), vec!["broken:Failed", "b:Shown"]);
        assert_eq!(h.scene.parent(h.root_of("a")), None);
    }
}
