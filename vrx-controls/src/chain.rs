//! Gimbal chain layout and mutation planning.
//!
//! The chain is the ordered list of controls wrapped around the camera
//! gimbal: `links[0]` wraps the camera gimbal, each later link wraps the
//! previous tip, and the outermost tip hangs off the zero anchor.

use slotmap::SlotMap;
use tracing::trace;
use vrx_core::{NodeId, SceneGraph};

use crate::control::{CameraControl, ControlId};
use crate::error::ControlError;

/// One mutation of the gimbal chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStep {
    /// Unchain the given control from the current tip.
    Unchain(ControlId),
    /// Chain the given control onto the current tip.
    Chain(ControlId),
    /// Re-parent the tip under the zero anchor.
    Anchor,
}

/// Steps that turn chain layout `current` into `target`.
///
/// Links after the longest shared prefix are unchained outermost first, then
/// the target's remaining links are chained innermost first, then the tip is
/// re-anchored. Identical layouts need no steps.
pub fn plan_rechain(current: &[ControlId], target: &[ControlId]) -> Vec<ChainStep> {
    let shared = current
        .iter()
        .zip(target)
        .take_while(|(a, b)| a == b)
        .count();
    if shared == current.len() && shared == target.len() {
        return Vec::new();
    }

    let mut steps = Vec::with_capacity(current.len() + target.len() - 2 * shared + 1);
    steps.extend(current[shared..].iter().rev().map(|id| ChainStep::Unchain(*id)));
    steps.extend(target[shared..].iter().map(|id| ChainStep::Chain(*id)));
    steps.push(ChainStep::Anchor);
    steps
}

/// The live chain: camera gimbal, zero anchor and the chained control ids.
#[derive(Debug, Clone)]
pub struct GimbalChain {
    camera_gimbal: NodeId,
    zero_anchor: NodeId,
    links: Vec<ControlId>,
    tip: NodeId,
}

impl GimbalChain {
    pub fn new(camera_gimbal: NodeId, zero_anchor: NodeId) -> Self {
        Self {
            camera_gimbal,
            zero_anchor,
            links: Vec::new(),
            tip: camera_gimbal,
        }
    }

    /// Node carrying the camera, innermost in the chain.
    pub fn camera_gimbal(&self) -> NodeId {
        self.camera_gimbal
    }

    pub fn zero_anchor(&self) -> NodeId {
        self.zero_anchor
    }

    /// Outermost chained node.
    pub fn tip(&self) -> NodeId {
        self.tip
    }

    pub fn links(&self) -> &[ControlId] {
        &self.links
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.links.contains(&id)
    }

    /// Apply `steps` in order. Stops at the first failing step.
    pub fn apply(
        &mut self,
        steps: &[ChainStep],
        controls: &mut SlotMap<ControlId, Box<dyn CameraControl>>,
        scene: &mut dyn SceneGraph,
    ) -> Result<(), ControlError> {
        for step in steps {
            trace!(?step, tip = ?self.tip, "applying chain step");
            match *step {
                ChainStep::Unchain(id) => {
                    let control = controls
                        .get_mut(id)
                        .ok_or(ControlError::UnknownControl(id))?;
                    self.tip = control.unchain_gimbal(scene, self.tip)?;
                    self.links.retain(|link| *link != id);
                }
                ChainStep::Chain(id) => {
                    let control = controls
                        .get_mut(id)
                        .ok_or(ControlError::UnknownControl(id))?;
                    self.tip = control.chain_gimbal(scene, self.tip)?;
                    self.links.push(id);
                }
                ChainStep::Anchor => {
                    scene.add_child(self.zero_anchor, self.tip)?;
                }
            }
        }
        Ok(())
    }
}
