//! Runtime configuration loaded from JSON.

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vrx_controls::MouseLookConfig;
use vrx_experience::TransitionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Guided tour path used by the demo script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Units per second.
    pub speed: f32,
    pub points: Vec<Vec3>,
    pub closed: bool,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            speed: 2.0,
            points: vec![
                Vec3::new(0.0, 1.6, 0.0),
                Vec3::new(2.0, 1.6, -4.0),
                Vec3::new(0.0, 2.0, -8.0),
                Vec3::new(-2.0, 1.6, -4.0),
            ],
            closed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub initial_experiment: String,
    pub mouse: MouseLookConfig,
    pub transition: TransitionConfig,
    pub path: PathConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            initial_experiment: "lobby".to_string(),
            mouse: MouseLookConfig::default(),
            transition: TransitionConfig::default(),
            path: PathConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}
