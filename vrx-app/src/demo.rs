//! Built-in experiments and stand-ins for the render, headset and audio
//! layers, so the runtime can be driven without a window or device.

use glam::{Quat, Vec3};
use tracing::{debug, info};
use vrx_controls::{DeviceError, DevicePose, HmdDevice};
use vrx_core::{NodeId, Resume, SceneGraph};
use vrx_experience::{Anchor, Experiment, ExperimentId, ExperimentLoader, LoadError, RenderSurface};
use vrx_sequencer::{AudioClip, AudioError};

/// Static description of a built-in experiment.
struct Blueprint {
    id: &'static str,
    props: &'static [&'static str],
    anchor: fn() -> Anchor,
}

const BLUEPRINTS: &[Blueprint] = &[
    Blueprint {
        id: "lobby",
        props: &["floor", "welcome-sign"],
        anchor: Anchor::default,
    },
    Blueprint {
        id: "gallery",
        props: &["floor", "frame-left", "frame-right", "bench"],
        anchor: || Anchor::new(Vec3::new(0.0, 0.0, 6.0), Vec3::NEG_Z),
    },
    Blueprint {
        id: "orbit",
        props: &["planet", "moon", "starfield"],
        anchor: || Anchor::new(Vec3::new(0.0, 2.0, 10.0), Vec3::new(0.0, -0.2, -1.0)),
    },
];

pub fn demo_ids() -> impl Iterator<Item = &'static str> {
    BLUEPRINTS.iter().map(|b| b.id)
}

/// A scene subtree with a few named props.
pub struct DemoExperiment {
    id: ExperimentId,
    root: NodeId,
    anchor: Anchor,
    elapsed_ms: f32,
    visits: u32,
}

impl Experiment for DemoExperiment {
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
        self.visits += 1;
        debug!(id = %self.id, visits = self.visits, "preparing experiment");
        resume.resume();
    }

    fn on_shown(&mut self) {
        info!(id = %self.id, "experiment shown");
    }

    fn on_hidden(&mut self) {
        info!(id = %self.id, elapsed_ms = self.elapsed_ms, "experiment hidden");
        self.elapsed_ms = 0.0;
    }

    fn on_update(&mut self, dt_ms: f32) {
        self.elapsed_ms += dt_ms;
    }
}

/// Builds the built-in experiments on first use.
#[derive(Debug, Default)]
pub struct DemoLoader;

impl ExperimentLoader for DemoLoader {
    fn load(
        &mut self,
        id: &ExperimentId,
        scene: &mut dyn SceneGraph,
    ) -> Result<Box<dyn Experiment>, LoadError> {
        let blueprint = BLUEPRINTS
            .iter()
            .find(|b| b.id == id.as_str())
            .ok_or_else(|| LoadError::NotFound(id.clone()))?;

        let root = scene.create_node(blueprint.id);
        for (i, prop) in blueprint.props.iter().enumerate() {
            let node = scene.create_node(prop);
            scene
                .add_child(root, node)
                .and_then(|()| scene.set_position(node, Vec3::new(i as f32 * 1.5, 0.0, -3.0)))
                .map_err(|err| LoadError::Asset {
                    id: id.clone(),
                    reason: err.to_string(),
                })?;
        }
        debug!(%id, props = blueprint.props.len(), "built experiment");

        Ok(Box::new(DemoExperiment {
            id: id.clone(),
            root,
            anchor: (blueprint.anchor)(),
            elapsed_ms: 0.0,
            visits: 0,
        }))
    }
}

/// Render surface that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    opacity: f32,
    frames: u64,
    forced: u64,
}

impl HeadlessSurface {
    pub fn present(&mut self) {
        self.frames += 1;
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn forced_renders(&self) -> u64 {
        self.forced
    }
}

impl RenderSurface for HeadlessSurface {
    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity;
    }

    fn render_now(&mut self) {
        self.forced += 1;
        self.frames += 1;
    }
}

/// Headset that slowly sways the head left and right.
#[derive(Debug, Default)]
pub struct SimulatedHmd {
    phase: f32,
}

impl HmdDevice for SimulatedHmd {
    fn pose(&mut self) -> Result<DevicePose, DeviceError> {
        self.phase += 0.05;
        Ok(DevicePose {
            orientation: Quat::from_rotation_y(self.phase.sin() * 0.3),
            position: Some(Vec3::new(0.0, 1.6, 0.0)),
        })
    }
}

/// Narration clip that finishes as soon as it starts.
#[derive(Debug)]
pub struct NarrationClip {
    name: String,
}

impl NarrationClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl AudioClip for NarrationClip {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn play(&mut self, on_ended: Resume) {
        info!(clip = %self.name, "narration");
        on_ended.resume();
    }
}
