//! Experiments and the registry that owns them.

use std::collections::HashMap;
use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use vrx_core::{NodeId, Resume, SceneGraph};

/// Registry key of an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperimentId(String);

impl ExperimentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExperimentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Intended starting viewpoint of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub position: Vec3,
    pub direction: Vec3,
}

impl Anchor {
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        Self {
            position,
            direction,
        }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        }
    }
}

/// An author-supplied scene with show/hide/update lifecycle hooks.
///
/// `on_will_show` and `on_will_hide` may finish later: the transition only
/// proceeds once the given [`Resume`] fires.
pub trait Experiment {
    fn id(&self) -> &ExperimentId;

    /// Root of the experiment's subtree. Added to and removed from the scene
    /// by the transition manager.
    fn root(&self) -> NodeId;

    fn anchor(&self) -> Anchor {
        Anchor::default()
    }

    fn on_will_show(&mut self, resume: Resume) {
        resume.resume();
    }

    fn on_shown(&mut self) {}

    fn on_will_hide(&mut self, resume: Resume) {
        resume.resume();
    }

    fn on_hidden(&mut self) {}

    fn on_update(&mut self, _dt_ms: f32) {}
}

/// Errors reported by an experiment loader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("no experiment named '{0}'")]
    NotFound(ExperimentId),

    #[error("failed to load assets for '{id}': {reason}")]
    Asset { id: ExperimentId, reason: String },
}

/// Boundary to whatever builds experiments on demand.
pub trait ExperimentLoader {
    fn load(
        &mut self,
        id: &ExperimentId,
        scene: &mut dyn SceneGraph,
    ) -> Result<Box<dyn Experiment>, LoadError>;
}

/// Experiments keyed by id, loaded lazily through an optional loader.
#[derive(Default)]
pub struct ExperimentRegistry {
    experiments: HashMap<ExperimentId, Box<dyn Experiment>>,
    loader: Option<Box<dyn ExperimentLoader>>,
}

impl ExperimentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(loader: Box<dyn ExperimentLoader>) -> Self {
        Self {
            experiments: HashMap::new(),
            loader: Some(loader),
        }
    }

    /// Register an already-built experiment, replacing one with the same id.
    pub fn insert(&mut self, experiment: Box<dyn Experiment>) {
        let id = experiment.id().clone();
        if self.experiments.insert(id.clone(), experiment).is_some() {
            warn!(%id, "replaced registered experiment");
        }
    }

    pub fn contains(&self, id: &ExperimentId) -> bool {
        self.experiments.contains_key(id)
    }

    pub fn get(&self, id: &ExperimentId) -> Option<&dyn Experiment> {
        self.experiments.get(id).map(|e| &**e)
    }

    pub fn get_mut(&mut self, id: &ExperimentId) -> Option<&mut (dyn Experiment + 'static)> {
        self.experiments.get_mut(id).map(|e| &mut **e)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ExperimentId> {
        self.experiments.keys()
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Make sure `id` is registered, asking the loader if it is not.
    pub fn ensure_loaded(
        &mut self,
        id: &ExperimentId,
        scene: &mut dyn SceneGraph,
    ) -> Result<(), LoadError> {
        if self.experiments.contains_key(id) {
            return Ok(());
        }
        let Some(loader) = self.loader.as_mut() else {
            return Err(LoadError::NotFound(id.clone()));
        };
        let experiment = loader.load(id, scene)?;
        if experiment.id() != id {
            return Err(LoadError::Asset {
                id: id.clone(),
                reason: format!("loader returned experiment '{}'", experiment.id()),
            });
        }
        info!(%id, "loaded experiment");
        self.experiments.insert(id.clone(), experiment);
        Ok(())
    }
}
