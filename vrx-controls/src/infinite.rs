//! Endless forward travel driven by where the viewer is looking.

use glam::{Quat, Vec3};
use vrx_core::{NodeId, SceneGraph};

use crate::control::{CameraControl, ControlKind, ControlState};
use crate::error::ControlError;

/// Advances along the camera's ground-plane heading.
///
/// Reads the camera's world orientation, so it must update after the base
/// controls in the same frame.
pub struct InfiniteControl {
    state: ControlState,
    camera: NodeId,
    speed: f32,
    offset: Vec3,
    distance: f32,
    on_advance: Option<Box<dyn FnMut(Vec3) + Send>>,
}

impl InfiniteControl {
    /// `camera` is the node whose heading drives travel, usually the
    /// coordinator's camera gimbal.
    pub fn new(scene: &mut dyn SceneGraph, camera: NodeId, speed: f32) -> Self {
        Self {
            state: ControlState::new(scene, "infinite-gimbal"),
            camera,
            speed,
            offset: Vec3::ZERO,
            distance: 0.0,
            on_advance: None,
        }
    }

    /// Called with the accumulated offset each frame the control moves.
    pub fn on_advance<F>(&mut self, callback: F)
    where
        F: FnMut(Vec3) + Send + 'static,
    {
        self.on_advance = Some(Box::new(callback));
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn offset(&self) -> Vec3 {
        self.offset
    }
}

impl CameraControl for InfiniteControl {
    crate::impl_control_any!();

    fn kind(&self) -> ControlKind {
        ControlKind::Infinite
    }

    fn state(&self) -> &ControlState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ControlState {
        &mut self.state
    }

    fn reset(&mut self) {
        self.offset = Vec3::ZERO;
        self.distance = 0.0;
    }

    fn on_update(&mut self, dt_ms: f32, scene: &dyn SceneGraph) -> Result<(), ControlError> {
        let heading = scene.world_rotation(self.camera)? * Vec3::NEG_Z;
        let flat = Vec3::new(heading.x, 0.0, heading.z);
        if flat.length_squared() < 1e-8 {
            return Ok(());
        }

        let step = flat.normalize() * self.speed * dt_ms / 1000.0;
        // Express the world step in the frame our node is parented in.
        let frame = match scene.parent(self.state.node()) {
            Some(parent) => scene.world_rotation(parent)?,
            None => Quat::IDENTITY,
        };
        self.offset += frame.inverse() * step;
        self.distance += step.length();

        if let Some(callback) = self.on_advance.as_mut() {
            callback(self.offset);
        }
        Ok(())
    }

    fn on_apply_position(
        &mut self,
        _dt_ms: f32,
        scene: &mut dyn SceneGraph,
    ) -> Result<(), ControlError> {
        scene.set_position(self.state.node(), self.offset)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;
    use vrx_core::MemoryScene;

    #[test]
    fn test_travels_along_camera_heading() {
        let mut scene = MemoryScene::new();
        let camera = scene.create_node("camera");
        scene
            .set_rotation(camera, Quat::from_rotation_y(-FRAC_PI_2))
            .unwrap();

        let mut control = InfiniteControl::new(&mut scene, camera, 2.0);
        control.enable();
        control.trigger_update(1000.0, &mut scene).unwrap();

        assert!((control.offset() - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
        assert!((control.distance() - 2.0).abs() < 1e-5);
        assert_eq!(scene.position(control.node()).unwrap(), control.offset());
    }

    #[test]
    fn test_looking_straight_down_does_not_move() {
        let mut scene = MemoryScene::new();
        let camera = scene.create_node("camera");
        scene
            .set_rotation(camera, Quat::from_rotation_x(-FRAC_PI_2))
            .unwrap();

        let mut control = InfiniteControl::new(&mut scene, camera, 2.0);
        control.enable();
        control.trigger_update(1000.0, &mut scene).unwrap();
        assert_eq!(control.distance(), 0.0);
    }
}
