use std::any::Any;
use std::fmt;

use slotmap::new_key_type;
use tracing::debug;
use vrx_core::{NodeId, SceneGraph};

use crate::error::ControlError;
use crate::input::PointerSample;

new_key_type! {
    /// Handle to a control registered with the coordinator.
    pub struct ControlId;
}

/// The strategy family a control belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    MouseLook,
    Hmd,
    PathFollow,
    Infinite,
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlKind::MouseLook => write!(f, "MouseLook"),
            ControlKind::Hmd => write!(f, "HMD"),
            ControlKind::PathFollow => write!(f, "PathFollow"),
            ControlKind::Infinite => write!(f, "Infinite"),
        }
    }
}

/// State every control carries: the enabled flag, the gimbal node it owns and
/// the node it currently wraps while chained.
#[derive(Debug, Clone)]
pub struct ControlState {
    enabled: bool,
    node: NodeId,
    wrapped: Option<NodeId>,
}

impl ControlState {
    /// Create the control's gimbal node in `scene`. Controls start disabled.
    pub fn new(scene: &mut dyn SceneGraph, name: &str) -> Self {
        Self {
            enabled: false,
            node: scene.create_node(name),
            wrapped: None,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// A camera-control strategy that can be chained onto the camera rig.
///
/// Implementors provide the pose phases; enabling, chaining and the fixed
/// update order are shared.
pub trait CameraControl: Send + Any {
    fn kind(&self) -> ControlKind;

    fn state(&self) -> &ControlState;

    fn state_mut(&mut self) -> &mut ControlState;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Recompute internal pose state.
    fn on_update(&mut self, _dt_ms: f32, _scene: &dyn SceneGraph) -> Result<(), ControlError> {
        Ok(())
    }

    /// Write the pose translation to the owned node.
    fn on_apply_position(
        &mut self,
        _dt_ms: f32,
        _scene: &mut dyn SceneGraph,
    ) -> Result<(), ControlError> {
        Ok(())
    }

    /// Write the pose orientation to the owned node.
    fn on_apply_quaternion(
        &mut self,
        _dt_ms: f32,
        _scene: &mut dyn SceneGraph,
    ) -> Result<(), ControlError> {
        Ok(())
    }

    /// Feed a pointer sample. Return true if the sample was consumed.
    fn handle_pointer(&mut self, _sample: &PointerSample) -> bool {
        false
    }

    /// Clear per-strategy pose state, e.g. when the camera is re-anchored.
    fn reset(&mut self) {}

    fn enable(&mut self) {
        self.state_mut().enabled = true;
    }

    fn disable(&mut self) {
        self.state_mut().enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    fn node(&self) -> NodeId {
        self.state().node
    }

    fn is_chained(&self) -> bool {
        self.state().wrapped.is_some()
    }

    /// Run the three update phases in order. No-op while disabled.
    fn trigger_update(
        &mut self,
        dt_ms: f32,
        scene: &mut dyn SceneGraph,
    ) -> Result<(), ControlError> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.on_update(dt_ms, &*scene)?;
        self.on_apply_position(dt_ms, scene)?;
        self.on_apply_quaternion(dt_ms, scene)
    }

    /// Re-parent `node` under this control's gimbal node and return the
    /// gimbal node as the new chain tip.
    fn chain_gimbal(
        &mut self,
        scene: &mut dyn SceneGraph,
        node: NodeId,
    ) -> Result<NodeId, ControlError> {
        let kind = self.kind();
        let state = self.state_mut();
        if state.wrapped.is_some() {
            return Err(ControlError::AlreadyChained { kind });
        }
        scene.add_child(state.node, node)?;
        state.wrapped = Some(node);
        debug!(%kind, ?node, tip = ?state.node, "chained gimbal");
        Ok(state.node)
    }

    /// Exact inverse of [`chain_gimbal`](Self::chain_gimbal). `tip` must be the
    /// node this control produced; anything else means the chain was mutated
    /// out of order.
    fn unchain_gimbal(
        &mut self,
        scene: &mut dyn SceneGraph,
        tip: NodeId,
    ) -> Result<NodeId, ControlError> {
        let kind = self.kind();
        let state = self.state_mut();
        let Some(wrapped) = state.wrapped else {
            return Err(ControlError::NotChained { kind });
        };
        if tip != state.node {
            return Err(ControlError::WrongTip {
                kind,
                expected: state.node,
                found: tip,
            });
        }
        scene.detach(wrapped)?;
        scene.detach(state.node)?;
        state.wrapped = None;
        debug!(%kind, node = ?wrapped, "unchained gimbal");
        Ok(wrapped)
    }
}

/// Implements the `Any` plumbing of [`CameraControl`] for a concrete type.
#[macro_export]
macro_rules! impl_control_any {
    () => {
        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}
