//! The single authority over which controls drive the camera.

use glam::{Quat, Vec3};
use slotmap::SlotMap;
use tracing::{debug, error, info};
use vrx_core::{NodeId, SceneGraph};
use winit::event::WindowEvent;

use crate::chain::{GimbalChain, plan_rechain};
use crate::control::{CameraControl, ControlId};
use crate::error::ControlError;
use crate::hmd::{HmdControl, HmdDevice, HmdEvent};
use crate::input::{InputState, PointerSample};
use crate::mouse::{MouseLookConfig, MouseLookControl};

/// Owns every registered control and the gimbal chain.
///
/// The chain always holds one base control (mouse-look or HMD) and at most
/// one secondary control layered on top of it.
pub struct ControlsCoordinator {
    controls: SlotMap<ControlId, Box<dyn CameraControl>>,
    chain: GimbalChain,
    mouse: ControlId,
    hmd: ControlId,
    secondary: Option<ControlId>,
    hmd_active: bool,
    paused: bool,
    input: InputState,
}

impl ControlsCoordinator {
    /// Create the camera gimbal and zero anchor in `scene` and chain the
    /// mouse-look control as the initial base.
    pub fn new(
        scene: &mut dyn SceneGraph,
        mouse_config: MouseLookConfig,
        device: Box<dyn HmdDevice>,
    ) -> Result<Self, ControlError> {
        let camera_gimbal = scene.create_node("camera-gimbal");
        let zero_anchor = scene.create_node("zero-gimbal");
        let root = scene.root();
        scene.add_child(root, zero_anchor)?;

        let mut controls: SlotMap<ControlId, Box<dyn CameraControl>> = SlotMap::with_key();
        let mouse = controls.insert(Box::new(MouseLookControl::new(scene, mouse_config)));
        let hmd = controls.insert(Box::new(HmdControl::new(scene, device)));

        let mut coordinator = Self {
            controls,
            chain: GimbalChain::new(camera_gimbal, zero_anchor),
            mouse,
            hmd,
            secondary: None,
            hmd_active: false,
            paused: false,
            input: InputState::new(),
        };
        coordinator.rebuild(&[mouse], scene)?;
        coordinator.controls[mouse].enable();
        Ok(coordinator)
    }

    /// Node the rendering camera should be attached to.
    pub fn camera_gimbal(&self) -> NodeId {
        self.chain.camera_gimbal()
    }

    pub fn zero_anchor(&self) -> NodeId {
        self.chain.zero_anchor()
    }

    pub fn tip(&self) -> NodeId {
        self.chain.tip()
    }

    /// Chained controls, innermost first.
    pub fn links(&self) -> &[ControlId] {
        self.chain.links()
    }

    pub fn mouse_id(&self) -> ControlId {
        self.mouse
    }

    pub fn hmd_id(&self) -> ControlId {
        self.hmd
    }

    pub fn is_hmd(&self) -> bool {
        self.hmd_active
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Currently layered secondary control.
    pub fn active_control(&self) -> Option<ControlId> {
        self.secondary
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn mouse(&self) -> Option<&MouseLookControl> {
        self.control(self.mouse)
    }

    pub fn mouse_mut(&mut self) -> Option<&mut MouseLookControl> {
        self.control_mut(self.mouse)
    }

    pub fn hmd(&self) -> Option<&HmdControl> {
        self.control(self.hmd)
    }

    pub fn hmd_mut(&mut self) -> Option<&mut HmdControl> {
        self.control_mut(self.hmd)
    }

    /// Register a control that can later be activated as secondary.
    pub fn add_control(&mut self, control: Box<dyn CameraControl>) -> ControlId {
        let kind = control.kind();
        let id = self.controls.insert(control);
        debug!(%kind, ?id, "registered control");
        id
    }

    /// Unregister a control. Base controls and chained controls stay.
    pub fn remove_control(&mut self, id: ControlId) -> Result<Box<dyn CameraControl>, ControlError> {
        if id == self.mouse || id == self.hmd {
            return Err(ControlError::BaseControl(id));
        }
        if self.chain.contains(id) {
            return Err(ControlError::ControlInUse(id));
        }
        self.controls
            .remove(id)
            .ok_or(ControlError::UnknownControl(id))
    }

    /// Typed access to a registered control.
    pub fn control<T: CameraControl>(&self, id: ControlId) -> Option<&T> {
        self.controls
            .get(id)
            .and_then(|c| c.as_any().downcast_ref::<T>())
    }

    pub fn control_mut<T: CameraControl>(&mut self, id: ControlId) -> Option<&mut T> {
        self.controls
            .get_mut(id)
            .and_then(|c| c.as_any_mut().downcast_mut::<T>())
    }

    pub fn control_dyn(&self, id: ControlId) -> Option<&dyn CameraControl> {
        self.controls.get(id).map(|c| &**c)
    }

    fn base(&self) -> ControlId {
        if self.hmd_active { self.hmd } else { self.mouse }
    }

    fn layout(&self, hmd_active: bool, secondary: Option<ControlId>) -> Vec<ControlId> {
        let base = if hmd_active { self.hmd } else { self.mouse };
        std::iter::once(base).chain(secondary).collect()
    }

    fn rebuild(&mut self, target: &[ControlId], scene: &mut dyn SceneGraph) -> Result<(), ControlError> {
        let steps = plan_rechain(self.chain.links(), target);
        if steps.is_empty() {
            return Ok(());
        }
        self.chain
            .apply(&steps, &mut self.controls, scene)
            .inspect_err(|err| error!(%err, ?steps, "gimbal chain mutation failed"))
    }

    fn set_enabled(&mut self, id: ControlId, enabled: bool) {
        if let Some(control) = self.controls.get_mut(id) {
            if enabled {
                control.enable();
            } else {
                control.disable();
            }
        }
    }

    /// Swap the base control between mouse-look and HMD, keeping any
    /// secondary control layered on top.
    pub fn set_hmd(&mut self, scene: &mut dyn SceneGraph, enabled: bool) -> Result<(), ControlError> {
        if self.hmd_active == enabled {
            return Ok(());
        }
        let previous = self.base();
        let target = self.layout(enabled, self.secondary);
        self.rebuild(&target, scene)?;
        self.hmd_active = enabled;

        if !self.paused {
            self.set_enabled(previous, false);
            self.set_enabled(self.base(), true);
        }
        info!(hmd = enabled, "switched base camera control");
        Ok(())
    }

    /// React to the device layer connecting or dropping the headset.
    pub fn handle_hmd_event(
        &mut self,
        scene: &mut dyn SceneGraph,
        event: HmdEvent,
    ) -> Result<(), ControlError> {
        self.set_hmd(scene, matches!(event, HmdEvent::Connected))
    }

    /// Layer `id` on top of the base control, replacing any current secondary.
    pub fn activate_control(
        &mut self,
        scene: &mut dyn SceneGraph,
        id: ControlId,
    ) -> Result<(), ControlError> {
        if id == self.mouse || id == self.hmd {
            return Err(ControlError::BaseControl(id));
        }
        if !self.controls.contains_key(id) {
            return Err(ControlError::UnknownControl(id));
        }
        self.deactivate_last_control(scene)?;

        let target = self.layout(self.hmd_active, Some(id));
        self.rebuild(&target, scene)?;
        self.secondary = Some(id);
        if !self.paused {
            self.set_enabled(id, true);
        }
        debug!(?id, "activated secondary control");
        Ok(())
    }

    /// Unchain and disable the secondary control, if any.
    pub fn deactivate_last_control(&mut self, scene: &mut dyn SceneGraph) -> Result<(), ControlError> {
        let Some(id) = self.secondary else {
            return Ok(());
        };
        let target = self.layout(self.hmd_active, None);
        self.rebuild(&target, scene)?;
        self.set_enabled(id, false);
        self.secondary = None;
        debug!(?id, "deactivated secondary control");
        Ok(())
    }

    /// Pausing disables every chained control; resuming re-enables the base
    /// matching the HMD flag and the secondary. The chain is untouched.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if paused {
            self.set_enabled(self.mouse, false);
            self.set_enabled(self.hmd, false);
            if let Some(id) = self.secondary {
                self.set_enabled(id, false);
            }
        } else {
            self.set_enabled(self.base(), true);
            if let Some(id) = self.secondary {
                self.set_enabled(id, true);
            }
        }
    }

    /// Re-anchor the zero gimbal at `position`, facing `direction` projected
    /// onto the ground plane. Recentres the mouse view and resets every other
    /// chained control.
    pub fn zero(
        &mut self,
        scene: &mut dyn SceneGraph,
        position: Vec3,
        direction: Vec3,
    ) -> Result<(), ControlError> {
        let yaw = (-direction.x).atan2(-direction.z);
        let zero = self.chain.zero_anchor();
        scene.set_position(zero, position)?;
        scene.set_rotation(zero, Quat::from_rotation_y(yaw))?;
        if let Some(mouse) = self.mouse_mut() {
            mouse.reset_view(false);
        }
        for id in self.chain.links() {
            if *id == self.mouse {
                continue;
            }
            if let Some(control) = self.controls.get_mut(*id) {
                control.reset();
            }
        }
        debug!(?position, yaw, "re-anchored zero gimbal");
        Ok(())
    }

    /// Per-frame update: HMD, then mouse, then the secondary control.
    pub fn on_update(&mut self, dt_ms: f32, scene: &mut dyn SceneGraph) -> Result<(), ControlError> {
        let order = [Some(self.hmd), Some(self.mouse), self.secondary];
        for id in order.into_iter().flatten() {
            if let Some(control) = self.controls.get_mut(id) {
                control.trigger_update(dt_ms, scene)?;
            }
        }
        Ok(())
    }

    /// Route a pointer sample to the mouse-look control.
    pub fn handle_pointer(&mut self, sample: &PointerSample) -> bool {
        self.controls
            .get_mut(self.mouse)
            .is_some_and(|mouse| mouse.handle_pointer(sample))
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match self.input.record_event(event) {
            Some(sample) => self.handle_pointer(&sample),
            None => false,
        }
    }

    pub fn handle_mouse_motion(&mut self, delta: (f64, f64)) -> bool {
        match self.input.record_motion(delta) {
            Some(sample) => self.handle_pointer(&sample),
            None => false,
        }
    }
}
