//! Head-mounted display control.

use glam::{Quat, Vec3};
use thiserror::Error;
use tracing::{info, warn};
use vrx_core::SceneGraph;

use crate::control::{CameraControl, ControlKind, ControlState};
use crate::error::ControlError;

/// Failures reported by the device layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("no head-mounted display connected")]
    Disconnected,

    #[error("device pose unavailable: {0}")]
    PoseUnavailable(String),
}

/// Connection changes reported by the device layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmdEvent {
    Connected,
    Disconnected,
}

/// A polled head pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DevicePose {
    pub orientation: Quat,
    pub position: Option<Vec3>,
}

/// Boundary to the headset driver.
pub trait HmdDevice: Send {
    fn pose(&mut self) -> Result<DevicePose, DeviceError>;
}

/// Device used when no headset layer is available.
#[derive(Debug, Default)]
pub struct NullDevice;

impl HmdDevice for NullDevice {
    fn pose(&mut self) -> Result<DevicePose, DeviceError> {
        Err(DeviceError::Disconnected)
    }
}

/// Writes the headset orientation straight to its node every frame.
pub struct HmdControl {
    state: ControlState,
    device: Box<dyn HmdDevice>,
    pose: Option<DevicePose>,
    last_error: Option<DeviceError>,
}

impl HmdControl {
    pub fn new(scene: &mut dyn SceneGraph, device: Box<dyn HmdDevice>) -> Self {
        Self {
            state: ControlState::new(scene, "hmd-gimbal"),
            device,
            pose: None,
            last_error: None,
        }
    }

    pub fn set_device(&mut self, device: Box<dyn HmdDevice>) {
        self.device = device;
        self.pose = None;
        self.last_error = None;
    }

    /// Last pose successfully read from the device.
    pub fn pose(&self) -> Option<DevicePose> {
        self.pose
    }

    /// Error from the most recent poll, cleared once the device answers again.
    pub fn last_error(&self) -> Option<&DeviceError> {
        self.last_error.as_ref()
    }
}

impl CameraControl for HmdControl {
    crate::impl_control_any!();

    fn kind(&self) -> ControlKind {
        ControlKind::Hmd
    }

    fn state(&self) -> &ControlState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ControlState {
        &mut self.state
    }

    fn reset(&mut self) {
        self.pose = None;
    }

    fn on_update(&mut self, _dt_ms: f32, _scene: &dyn SceneGraph) -> Result<(), ControlError> {
        match self.device.pose() {
            Ok(pose) => {
                if self.last_error.take().is_some() {
                    info!("head-mounted display pose available again");
                }
                self.pose = Some(pose);
            }
            Err(err) => {
                if self.last_error.as_ref() != Some(&err) {
                    warn!(%err, "head-mounted display pose unavailable");
                }
                self.last_error = Some(err);
            }
        }
        Ok(())
    }

    fn on_apply_position(
        &mut self,
        _dt_ms: f32,
        scene: &mut dyn SceneGraph,
    ) -> Result<(), ControlError> {
        if let Some(position) = self.pose.and_then(|p| p.position) {
            scene.set_position(self.state.node(), position)?;
        }
        Ok(())
    }

    fn on_apply_quaternion(
        &mut self,
        _dt_ms: f32,
        scene: &mut dyn SceneGraph,
    ) -> Result<(), ControlError> {
        if let Some(pose) = self.pose {
            scene.set_rotation(self.state.node(), pose.orientation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use vrx_core::MemoryScene;

    struct ScriptedDevice {
        poses: Arc<Mutex<Vec<Result<DevicePose, DeviceError>>>>,
    }

    impl HmdDevice for ScriptedDevice {
        fn pose(&mut self) -> Result<DevicePose, DeviceError> {
            let mut poses = self.poses.lock().unwrap();
            if poses.is_empty() {
                Err(DeviceError::Disconnected)
            } else {
                poses.remove(0)
            }
        }
    }

    #[test]
    fn test_pose_written_without_smoothing() {
        let mut scene = MemoryScene::new();
        let orientation = Quat::from_rotation_x(0.3);
        let device = ScriptedDevice {
            poses: Arc::new(Mutex::new(vec![Ok(DevicePose {
                orientation,
                position: Some(Vec3::new(0.0, 1.6, 0.0)),
            })])),
        };
        let mut control = HmdControl::new(&mut scene, Box::new(device));
        control.enable();
        control.trigger_update(16.0, &mut scene).unwrap();

        assert_eq!(scene.rotation(control.node()).unwrap(), orientation);
        assert_eq!(
            scene.position(control.node()).unwrap(),
            Vec3::new(0.0, 1.6, 0.0)
        );
    }

    #[test]
    fn test_device_error_is_reported_not_raised() {
        let mut scene = MemoryScene::new();
        let mut control = HmdControl::new(&mut scene, Box::new(NullDevice));
        control.enable();
        assert!(control.trigger_update(16.0, &mut scene).is_ok());
        assert_eq!(control.last_error(), Some(&DeviceError::Disconnected));
        assert_eq!(scene.rotation(control.node()).unwrap(), Quat::IDENTITY);
    }

    #[test]
    fn test_error_cleared_on_recovery() {
        let mut scene = MemoryScene::new();
        let poses = Arc::new(Mutex::new(vec![
            Err(DeviceError::PoseUnavailable("tracking lost".into())),
            Ok(DevicePose {
                orientation: Quat::IDENTITY,
                position: None,
            }),
        ]));
        let device = ScriptedDevice {
            poses: poses.clone(),
        };
        let mut control = HmdControl::new(&mut scene, Box::new(device));
        control.enable();

        control.trigger_update(16.0, &mut scene).unwrap();
        assert!(control.last_error().is_some());
        control.trigger_update(16.0, &mut scene).unwrap();
        assert!(control.last_error().is_none());
        assert!(control.pose().is_some());
    }
}
