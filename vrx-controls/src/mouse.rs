//! Mouse-look control with idle auto-recentre.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{EulerRot, Quat, Vec2};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vrx_core::SceneGraph;

use crate::control::{CameraControl, ControlKind, ControlState};
use crate::error::ControlError;
use crate::input::PointerSample;

/// Deltas below this magnitude count as recentred.
pub const RESET_EPSILON: f32 = 1e-3;

const WRAP: f32 = 4.0 * PI;

/// Tunables for [`MouseLookControl`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MouseLookConfig {
    /// Radians of rotation per pixel of pointer movement.
    pub sensitivity: f32,
    /// Idle time before the view starts drifting back to centre.
    pub reset_timeout_ms: f32,
    /// Exponential decay rate (per second) of the idle recentre.
    pub reset_speed: f32,
    /// Decay rate used by an explicit animated [`MouseLookControl::reset_view`].
    pub reset_fast_speed: f32,
}

impl Default for MouseLookConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.002,
            reset_timeout_ms: 4000.0,
            reset_speed: 1.5,
            reset_fast_speed: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recentre {
    Idle,
    Requested,
}

/// Accumulates yaw (x) and pitch (y) from pointer movement.
#[derive(Debug)]
pub struct MouseLookControl {
    state: ControlState,
    config: MouseLookConfig,
    delta: Vec2,
    idle_ms: f32,
    recentre: Option<Recentre>,
}

impl MouseLookControl {
    pub fn new(scene: &mut dyn SceneGraph, config: MouseLookConfig) -> Self {
        Self {
            state: ControlState::new(scene, "mouse-gimbal"),
            config,
            delta: Vec2::ZERO,
            idle_ms: 0.0,
            recentre: None,
        }
    }

    pub fn config(&self) -> &MouseLookConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: MouseLookConfig) {
        self.config = config;
    }

    /// Current yaw/pitch offset in radians.
    pub fn delta(&self) -> Vec2 {
        self.delta
    }

    pub fn is_resetting(&self) -> bool {
        self.recentre.is_some()
    }

    /// Accumulate a pointer movement in pixels.
    pub fn on_pointer_move(&mut self, movement: Vec2) {
        let mut delta = self.delta - movement * self.config.sensitivity;
        delta.x %= WRAP;
        delta.y %= WRAP;
        delta.y = delta.y.clamp(-FRAC_PI_2, FRAC_PI_2);
        self.delta = delta;
        self.idle_ms = 0.0;
        self.recentre = None;
    }

    /// Return the view to centre, instantly or by easing at the fast rate.
    pub fn reset_view(&mut self, animate: bool) {
        if animate {
            self.recentre = Some(Recentre::Requested);
        } else {
            self.delta = Vec2::ZERO;
            self.recentre = None;
        }
        self.idle_ms = 0.0;
    }

    fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.delta.x, self.delta.y, 0.0)
    }
}

impl CameraControl for MouseLookControl {
    crate::impl_control_any!();

    fn kind(&self) -> ControlKind {
        ControlKind::MouseLook
    }

    fn state(&self) -> &ControlState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ControlState {
        &mut self.state
    }

    fn handle_pointer(&mut self, sample: &PointerSample) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.on_pointer_move(sample.movement);
        true
    }

    fn reset(&mut self) {
        self.reset_view(false);
    }

    fn on_update(&mut self, dt_ms: f32, _scene: &dyn SceneGraph) -> Result<(), ControlError> {
        if self.recentre.is_none() {
            self.idle_ms += dt_ms;
            if self.idle_ms >= self.config.reset_timeout_ms && self.delta != Vec2::ZERO {
                debug!(idle_ms = self.idle_ms, "mouse look idle, recentring");
                self.recentre = Some(Recentre::Idle);
            }
        }

        if let Some(mode) = self.recentre {
            let speed = match mode {
                Recentre::Idle => self.config.reset_speed,
                Recentre::Requested => self.config.reset_fast_speed,
            };
            self.delta *= (-speed * dt_ms / 1000.0).exp();
            if self.delta.length() < RESET_EPSILON {
                self.delta = Vec2::ZERO;
                self.recentre = None;
                self.idle_ms = 0.0;
            }
        }
        Ok(())
    }

    fn on_apply_quaternion(
        &mut self,
        _dt_ms: f32,
        scene: &mut dyn SceneGraph,
    ) -> Result<(), ControlError> {
        scene.set_rotation(self.state.node(), self.orientation())?;
        Ok(())
    }
}
