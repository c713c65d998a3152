//! Application context and headless frame driver.

use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Quat, Vec3};
use thiserror::Error;
use tracing::{debug, info, warn};
use vrx_controls::{
    CatmullRomCurve, ControlError, ControlId, ControlsCoordinator, HmdDevice, HmdEvent,
    NullDevice, PathFollowerControl, PathOptions,
};
use vrx_core::{MemoryScene, Resume, SceneError, SceneGraph};
use vrx_experience::{
    ExperimentId, ExperimentRegistry, ExperimentTransitionManager, FocusOutcome,
    TransitionContext, TransitionError, TransitionOutcome,
};
use vrx_sequencer::{Sequence, SequenceHandle, Sequencer};

use crate::config::{ConfigError, RuntimeConfig};
use crate::demo::{DemoLoader, HeadlessSurface, NarrationClip, SimulatedHmd, demo_ids};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Controls(#[from] ControlError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Requests issued by running sequences, applied after the sequencer tick.
pub enum Command {
    Focus(ExperimentId),
    /// Follow the configured path and fire the resume when it ends.
    FollowPath(Resume),
    ReleaseCamera,
}

pub type CommandQueue = Rc<RefCell<Vec<Command>>>;

fn emit(queue: &CommandQueue, command: Command) -> impl FnOnce() + 'static {
    let queue = queue.clone();
    move || queue.borrow_mut().push(command)
}

/// Options for a headless run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: RuntimeConfig,
    pub frames: u32,
    pub frame_ms: f32,
    pub hmd: bool,
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_tracing() {
    #[cfg(feature = "tracy")]
    {
        use tracing_subscriber::Layer;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        tracing_subscriber::registry()
            .with(tracing_tracy::TracyLayer::default())
            .with(
                tracing_subscriber::fmt::layer().with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info".into()),
                ),
            )
            .init();
    }

    #[cfg(not(feature = "tracy"))]
    {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }
}

/// Owns the scene, the camera controls, the experiment transitions and the
/// sequencer, and drives them in frame order.
pub struct Runtime {
    config: RuntimeConfig,
    scene: MemoryScene,
    controls: ControlsCoordinator,
    transitions: ExperimentTransitionManager,
    sequencer: Sequencer,
    surface: HeadlessSurface,
    commands: CommandQueue,
    path_control: ControlId,
    elapsed_ms: f64,
}

impl Runtime {
    pub fn init(config: RuntimeConfig, hmd: bool) -> Result<Self, AppError> {
        let mut scene = MemoryScene::new();
        let device: Box<dyn HmdDevice> = if hmd {
            Box::new(SimulatedHmd::default())
        } else {
            Box::new(NullDevice)
        };
        let mut controls = ControlsCoordinator::new(&mut scene, config.mouse.clone(), device)?;
        if hmd {
            controls.handle_hmd_event(&mut scene, HmdEvent::Connected)?;
        }
        let path_control = controls.add_control(Box::new(PathFollowerControl::new(&mut scene)));

        let registry = ExperimentRegistry::with_loader(Box::new(DemoLoader));
        let transitions = ExperimentTransitionManager::new(registry, config.transition.clone());
        info!(
            hmd,
            experiments = ?demo_ids().collect::<Vec<_>>(),
            "runtime initialised"
        );

        Ok(Self {
            config,
            scene,
            controls,
            transitions,
            sequencer: Sequencer::new(),
            surface: HeadlessSurface::default(),
            commands: Rc::new(RefCell::new(Vec::new())),
            path_control,
            elapsed_ms: 0.0,
        })
    }

    pub fn scene(&self) -> &MemoryScene {
        &self.scene
    }

    pub fn controls(&self) -> &ControlsCoordinator {
        &self.controls
    }

    pub fn transitions(&self) -> &ExperimentTransitionManager {
        &self.transitions
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn surface(&self) -> &HeadlessSurface {
        &self.surface
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// World pose of the node the rendering camera hangs from.
    pub fn camera_pose(&self) -> Result<(Vec3, Quat), AppError> {
        Ok(self.scene.world_transform(self.controls.camera_gimbal())?)
    }

    pub fn focus(&mut self, id: ExperimentId) -> Result<FocusOutcome, AppError> {
        let mut ctx = TransitionContext {
            scene: &mut self.scene,
            controls: &mut self.controls,
            surface: &mut self.surface,
        };
        let outcome = self.transitions.focus_experiment(
            id,
            Some(Box::new(|id: &ExperimentId, outcome: TransitionOutcome| {
                info!(%id, ?outcome, "focus request settled")
            })),
            &mut ctx,
        )?;
        Ok(outcome)
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.controls.set_paused(paused);
        self.sequencer.set_paused(paused);
        info!(paused, "runtime pause changed");
    }

    pub fn handle_hmd_event(&mut self, event: HmdEvent) -> Result<(), AppError> {
        self.controls.handle_hmd_event(&mut self.scene, event)?;
        Ok(())
    }

    /// Script the guided tour: narration, then either a camera path (mouse)
    /// or a jump to orbit (headset), then the gallery.
    pub fn start_tour(&mut self) -> SequenceHandle {
        let hmd = self.controls.is_hmd();
        let queue = self.commands.clone();
        let branch_queue = queue.clone();
        let path_queue = queue.clone();

        let tour = Sequence::new()
            .sleep(500.0)
            .play_audio(Box::new(NarrationClip::new("welcome")))
            .select(move || {
                if hmd {
                    Sequence::new()
                        .call(emit(&branch_queue, Command::Focus(ExperimentId::from("orbit"))))
                        .sleep(3000.0)
                } else {
                    Sequence::new()
                        .wait_for(move |done| path_queue.borrow_mut().push(Command::FollowPath(done)))
                        .call(emit(&branch_queue, Command::ReleaseCamera))
                }
            })
            .call(emit(&queue, Command::Focus(ExperimentId::from("gallery"))));

        self.sequencer
            .start(tour, Some(Box::new(|| info!("tour finished"))))
    }

    /// One frame: controls, then transitions, then scripted sequences.
    pub fn frame(&mut self, dt_ms: f32) -> Result<(), AppError> {
        let _frame_span = tracing::info_span!("frame").entered();

        self.controls.on_update(dt_ms, &mut self.scene)?;
        let mut ctx = TransitionContext {
            scene: &mut self.scene,
            controls: &mut self.controls,
            surface: &mut self.surface,
        };
        self.transitions.update(dt_ms, &mut ctx)?;
        self.sequencer.tick(dt_ms);
        self.apply_commands()?;

        self.surface.present();
        self.elapsed_ms += f64::from(dt_ms);
        Ok(())
    }

    pub fn run_frames(&mut self, frames: u32, dt_ms: f32) -> Result<(), AppError> {
        for _ in 0..frames {
            self.frame(dt_ms)?;
        }
        Ok(())
    }

    fn apply_commands(&mut self) -> Result<(), AppError> {
        let commands: Vec<Command> = self.commands.borrow_mut().drain(..).collect();
        for command in commands {
            match command {
                Command::Focus(id) => {
                    let outcome = self.focus(id)?;
                    debug!(?outcome, "scripted focus");
                }
                Command::FollowPath(done) => self.follow_path(done)?,
                Command::ReleaseCamera => self.controls.deactivate_last_control(&mut self.scene)?,
            }
        }
        Ok(())
    }

    /// Start the configured path. If it cannot start, the camera is left on
    /// the base control and `done` fires so the waiting script moves on.
    fn follow_path(&mut self, done: Resume) -> Result<(), AppError> {
        let result = self.start_path(done.clone());
        if let Err(err) = &result {
            warn!(%err, "tour path unavailable, skipping");
            if let Some(follower) = self
                .controls
                .control_mut::<PathFollowerControl>(self.path_control)
            {
                follower.stop();
            }
            if self.controls.active_control() == Some(self.path_control) {
                self.controls.deactivate_last_control(&mut self.scene)?;
            }
            done.resume();
        }
        result
    }

    fn start_path(&mut self, done: Resume) -> Result<(), AppError> {
        let path = &self.config.path;
        let curve = CatmullRomCurve::new(path.points.clone(), path.closed)?;
        let options = PathOptions::new(path.speed).with_progress(move |progress| {
            if progress >= 1.0 {
                done.resume();
            }
        });

        self.controls
            .control_mut::<PathFollowerControl>(self.path_control)
            .ok_or(ControlError::UnknownControl(self.path_control))?
            .follow_path(Arc::new(curve), options)?;
        self.controls.activate_control(&mut self.scene, self.path_control)?;
        info!(speed = path.speed, points = path.points.len(), "following tour path");
        Ok(())
    }

    pub fn shutdown(&mut self) -> Result<(), AppError> {
        self.sequencer.stop_all();
        self.controls.deactivate_last_control(&mut self.scene)?;
        info!(
            elapsed_ms = self.elapsed_ms,
            frames = self.surface.frames(),
            forced_renders = self.surface.forced_renders(),
            opacity = self.surface.opacity(),
            "runtime shut down"
        );
        Ok(())
    }
}

/// Run the runtime headless for a fixed number of frames.
pub fn run(options: RunOptions) -> Result<(), Box<dyn Error>> {
    let initial = ExperimentId::new(options.config.initial_experiment.clone());
    let mut runtime = Runtime::init(options.config, options.hmd)?;

    runtime.focus(initial)?;
    runtime.start_tour();
    if let Err(err) = runtime.run_frames(options.frames, options.frame_ms) {
        warn!(%err, "frame loop stopped early");
        runtime.shutdown()?;
        return Err(err.into());
    }

    let (position, rotation) = runtime.camera_pose()?;
    info!(
        active = ?runtime.transitions().active_experiment(),
        ?position,
        ?rotation,
        running_sequences = runtime.sequencer().running_count(),
        "finished run"
    );
    runtime.shutdown()?;
    Ok(())
}
