//! Scripted path following.

use std::sync::Arc;

use glam::{Mat3, Quat, Vec3};
use tracing::{debug, info};
use vrx_core::SceneGraph;

use crate::control::{CameraControl, ControlKind, ControlState};
use crate::error::ControlError;

/// Per-frame blend toward the sampled pose.
pub const PATH_BLEND: f32 = 0.1;

const ARC_DIVISIONS: usize = 200;

/// A parametric curve sampled by normalised arc length `u ∈ [0, 1]`.
pub trait Curve: Send + Sync {
    fn point_at(&self, u: f32) -> Vec3;

    /// Unit tangent at `u`.
    fn tangent_at(&self, u: f32) -> Vec3 {
        let delta = 1e-4;
        let a = self.point_at((u - delta).max(0.0));
        let b = self.point_at((u + delta).min(1.0));
        (b - a).normalize_or_zero()
    }

    fn length(&self) -> f32;
}

/// Straight segment between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineCurve {
    pub from: Vec3,
    pub to: Vec3,
}

impl LineCurve {
    pub fn new(from: Vec3, to: Vec3) -> Self {
        Self { from, to }
    }
}

impl Curve for LineCurve {
    fn point_at(&self, u: f32) -> Vec3 {
        self.from.lerp(self.to, u.clamp(0.0, 1.0))
    }

    fn tangent_at(&self, _u: f32) -> Vec3 {
        (self.to - self.from).normalize_or_zero()
    }

    fn length(&self) -> f32 {
        self.from.distance(self.to)
    }
}

/// Uniform Catmull-Rom spline through a list of points, reparameterised by
/// arc length so constant progress gives constant speed.
#[derive(Debug, Clone)]
pub struct CatmullRomCurve {
    points: Vec<Vec3>,
    closed: bool,
    lengths: Vec<f32>,
}

impl CatmullRomCurve {
    pub fn new(points: Vec<Vec3>, closed: bool) -> Result<Self, ControlError> {
        if points.len() < 2 {
            return Err(ControlError::InvalidPath(format!(
                "a spline needs at least 2 points, got {}",
                points.len()
            )));
        }
        let mut curve = Self {
            points,
            closed,
            lengths: Vec::new(),
        };
        curve.lengths = curve.arc_lengths();
        Ok(curve)
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Sample by raw spline parameter `t ∈ [0, 1]`.
    pub fn point(&self, t: f32) -> Vec3 {
        let n = self.points.len();
        let segments = if self.closed { n } else { n - 1 };
        let p = t.clamp(0.0, 1.0) * segments as f32;
        let mut index = p.floor() as usize;
        let mut weight = p - index as f32;
        if index >= segments {
            index = segments - 1;
            weight = 1.0;
        }

        let at = |i: isize| -> Vec3 { self.points[i.rem_euclid(n as isize) as usize] };
        let i = index as isize;
        let p1 = at(i);
        let p2 = at(i + 1);
        let p0 = if self.closed || index > 0 {
            at(i - 1)
        } else {
            2.0 * p1 - p2
        };
        let p3 = if self.closed || index + 2 < n {
            at(i + 2)
        } else {
            2.0 * p2 - p1
        };

        let w = weight;
        let w2 = w * w;
        let w3 = w2 * w;
        0.5 * ((2.0 * p1)
            + (p2 - p0) * w
            + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * w2
            + (3.0 * p1 - p0 - 3.0 * p2 + p3) * w3)
    }

    fn arc_lengths(&self) -> Vec<f32> {
        let mut lengths = Vec::with_capacity(ARC_DIVISIONS + 1);
        let mut previous = self.point(0.0);
        let mut total = 0.0;
        lengths.push(0.0);
        for step in 1..=ARC_DIVISIONS {
            let current = self.point(step as f32 / ARC_DIVISIONS as f32);
            total += current.distance(previous);
            lengths.push(total);
            previous = current;
        }
        lengths
    }

    /// Map normalised arc length to the raw spline parameter.
    fn u_to_t(&self, u: f32) -> f32 {
        let total = self.length();
        if total <= 0.0 {
            return 0.0;
        }
        let target = u.clamp(0.0, 1.0) * total;
        let upper = self.lengths.partition_point(|l| *l < target);
        if upper == 0 {
            return 0.0;
        }
        if upper >= self.lengths.len() {
            return 1.0;
        }
        let before = self.lengths[upper - 1];
        let after = self.lengths[upper];
        let segment = after - before;
        let fraction = if segment > 0.0 {
            (target - before) / segment
        } else {
            0.0
        };
        ((upper - 1) as f32 + fraction) / ARC_DIVISIONS as f32
    }
}

impl Curve for CatmullRomCurve {
    fn point_at(&self, u: f32) -> Vec3 {
        self.point(self.u_to_t(u))
    }

    fn tangent_at(&self, u: f32) -> Vec3 {
        let t = self.u_to_t(u);
        let delta = 1e-4;
        let a = self.point((t - delta).max(0.0));
        let b = self.point((t + delta).min(1.0));
        (b - a).normalize_or_zero()
    }

    fn length(&self) -> f32 {
        self.lengths.last().copied().unwrap_or(0.0)
    }
}

/// Options for [`PathFollowerControl::follow_path`].
pub struct PathOptions {
    /// Travel speed in world units per second.
    pub speed: f32,
    /// Called every frame with the progress in `[0, 1]`.
    pub on_progress: Option<Box<dyn FnMut(f32) + Send>>,
}

impl PathOptions {
    pub fn new(speed: f32) -> Self {
        Self {
            speed,
            on_progress: None,
        }
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }
}

/// Orientation looking along `forward`, kept upright against world up.
pub fn look_rotation(forward: Vec3) -> Quat {
    let forward = forward.normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let mut right = forward.cross(Vec3::Y);
    if right.length_squared() < 1e-8 {
        right = Vec3::X;
    }
    let right = right.normalize();
    let up = right.cross(forward).normalize();
    Quat::from_mat3(&Mat3::from_cols(right, up, -forward)).normalize()
}

/// Moves its node along a curve, easing toward the sampled pose.
pub struct PathFollowerControl {
    state: ControlState,
    curve: Option<Arc<dyn Curve>>,
    speed: f32,
    progress: f32,
    on_progress: Option<Box<dyn FnMut(f32) + Send>>,
    position: Vec3,
    rotation: Quat,
}

impl PathFollowerControl {
    pub fn new(scene: &mut dyn SceneGraph) -> Self {
        Self {
            state: ControlState::new(scene, "path-gimbal"),
            curve: None,
            speed: 0.0,
            progress: 0.0,
            on_progress: None,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    /// Start following `curve` from its beginning. The coordinator enables
    /// the control when it is activated.
    pub fn follow_path(
        &mut self,
        curve: Arc<dyn Curve>,
        options: PathOptions,
    ) -> Result<(), ControlError> {
        let length = curve.length();
        if length <= 0.0 {
            return Err(ControlError::InvalidPath(format!(
                "path length must be positive, got {length}"
            )));
        }
        debug!(length, speed = options.speed, "following path");
        self.curve = Some(curve);
        self.speed = options.speed;
        self.on_progress = options.on_progress;
        self.progress = 0.0;
        Ok(())
    }

    /// Swap the curve of an active follow, keeping progress.
    pub fn replace_path(&mut self, curve: Arc<dyn Curve>) -> Result<(), ControlError> {
        if !self.is_following() {
            return Err(ControlError::NotFollowing);
        }
        if curve.length() <= 0.0 {
            return Err(ControlError::InvalidPath("path length must be positive".into()));
        }
        self.curve = Some(curve);
        Ok(())
    }

    /// Drop the current path and disable.
    pub fn stop(&mut self) {
        self.curve = None;
        self.on_progress = None;
        self.disable();
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// A curve is set and its end has not been reached.
    pub fn is_following(&self) -> bool {
        self.curve.is_some() && self.progress < 1.0
    }
}

impl CameraControl for PathFollowerControl {
    crate::impl_control_any!();

    fn kind(&self) -> ControlKind {
        ControlKind::PathFollow
    }

    fn state(&self) -> &ControlState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ControlState {
        &mut self.state
    }

    fn on_update(&mut self, dt_ms: f32, _scene: &dyn SceneGraph) -> Result<(), ControlError> {
        let Some(curve) = self.curve.as_ref() else {
            return Ok(());
        };
        if self.progress >= 1.0 {
            return Ok(());
        }

        let length = curve.length();
        self.progress = (self.progress + self.speed / length * dt_ms / 1000.0).min(1.0);

        let point = curve.point_at(self.progress);
        let target = look_rotation(curve.tangent_at(self.progress));
        self.position = self.position.lerp(point, PATH_BLEND);
        self.rotation = self.rotation.slerp(target, PATH_BLEND);

        if let Some(callback) = self.on_progress.as_mut() {
            callback(self.progress);
        }

        if self.progress >= 1.0 {
            info!("path finished");
            self.disable();
        }
        Ok(())
    }

    fn on_apply_position(
        &mut self,
        _dt_ms: f32,
        scene: &mut dyn SceneGraph,
    ) -> Result<(), ControlError> {
        scene.set_position(self.state.node(), self.position)?;
        Ok(())
    }

    fn on_apply_quaternion(
        &mut self,
        _dt_ms: f32,
        scene: &mut dyn SceneGraph,
    ) -> Result<(), ControlError> {
        scene.set_rotation(self.state.node(), self.rotation)?;
        Ok(())
    }
}
