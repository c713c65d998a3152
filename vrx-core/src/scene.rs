//! Scene graph adapter.
//!
//! The runtime never owns the rendering engine's node lifetime. Everything it
//! needs from the engine (node creation, re-parenting, local transforms) goes
//! through [`SceneGraph`], so chaining logic can be exercised against
//! [`MemoryScene`] without a renderer.

use glam::{Quat, Vec3};
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;

new_key_type! {
    /// Handle to a transform node owned by the scene graph.
    pub struct NodeId;
}

/// Errors raised by scene graph mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("unknown scene node {0:?}")]
    UnknownNode(NodeId),

    #[error("cannot parent {child:?} under {parent:?}: it would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("the scene root cannot be re-parented")]
    RootReparent,
}

/// Boundary to the scene graph provider.
pub trait SceneGraph {
    /// The top-level scene node.
    fn root(&self) -> NodeId;

    /// Create a detached node.
    fn create_node(&mut self, name: &str) -> NodeId;

    /// Whether `node` is alive in this scene.
    fn contains(&self, node: NodeId) -> bool;

    /// Re-parent `child` under `parent`, detaching it from any previous parent.
    /// The child is appended last in the parent's child list.
    fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError>;

    /// Detach `node` from its parent. Detaching an orphan is a no-op.
    fn detach(&mut self, node: NodeId) -> Result<(), SceneError>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> &[NodeId];

    fn position(&self, node: NodeId) -> Result<Vec3, SceneError>;

    fn set_position(&mut self, node: NodeId, position: Vec3) -> Result<(), SceneError>;

    fn rotation(&self, node: NodeId) -> Result<Quat, SceneError>;

    fn set_rotation(&mut self, node: NodeId, rotation: Quat) -> Result<(), SceneError>;

    /// World-space position and orientation, composed from the root down.
    fn world_transform(&self, node: NodeId) -> Result<(Vec3, Quat), SceneError> {
        let mut position = self.position(node)?;
        let mut rotation = self.rotation(node)?;
        let mut cursor = self.parent(node);
        while let Some(parent) = cursor {
            let parent_rotation = self.rotation(parent)?;
            position = parent_rotation * position + self.position(parent)?;
            rotation = parent_rotation * rotation;
            cursor = self.parent(parent);
        }
        Ok((position, rotation.normalize()))
    }

    fn world_rotation(&self, node: NodeId) -> Result<Quat, SceneError> {
        self.world_transform(node).map(|(_, rotation)| rotation)
    }

    fn world_position(&self, node: NodeId) -> Result<Vec3, SceneError> {
        self.world_transform(node).map(|(position, _)| position)
    }

    /// Whether `ancestor` appears on the parent path of `node`.
    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = self.parent(node);
        while let Some(parent) = cursor {
            if parent == ancestor {
                return true;
            }
            cursor = self.parent(parent);
        }
        false
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    position: Vec3,
    rotation: Quat,
}

impl Node {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// In-process scene graph used by the headless driver and tests.
#[derive(Debug)]
pub struct MemoryScene {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
}

impl MemoryScene {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new("scene"));
        Self { nodes, root }
    }

    /// Debug name given at creation.
    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node).map(|n| n.name.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, node: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(node).ok_or(SceneError::UnknownNode(node))
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(node).ok_or(SceneError::UnknownNode(node))
    }
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph for MemoryScene {
    fn root(&self) -> NodeId {
        self.root
    }

    fn create_node(&mut self, name: &str) -> NodeId {
        self.nodes.insert(Node::new(name))
    }

    fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.node(parent)?;
        self.node(child)?;
        if child == self.root {
            return Err(SceneError::RootReparent);
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(SceneError::Cycle { parent, child });
        }

        self.detach(child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn detach(&mut self, node: NodeId) -> Result<(), SceneError> {
        let Some(parent) = self.node(node)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|c| *c != node);
        self.node_mut(node)?.parent = None;
        Ok(())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    fn position(&self, node: NodeId) -> Result<Vec3, SceneError> {
        self.node(node).map(|n| n.position)
    }

    fn set_position(&mut self, node: NodeId, position: Vec3) -> Result<(), SceneError> {
        self.node_mut(node)?.position = position;
        Ok(())
    }

    fn rotation(&self, node: NodeId) -> Result<Quat, SceneError> {
        self.node(node).map(|n| n.rotation)
    }

    fn set_rotation(&mut self, node: NodeId, rotation: Quat) -> Result<(), SceneError> {
        self.node_mut(node)?.rotation = rotation;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_add_child_reparents() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node("a");
        let b = scene.create_node("b");
        let c = scene.create_node("c");

        scene.add_child(a, c).unwrap();
        scene.add_child(b, c).unwrap();

        assert_eq!(scene.parent(c), Some(b));
        assert!(scene.children(a).is_empty());
        assert_eq!(scene.children(b), &[c]);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node("a");
        let b = scene.create_node("b");
        scene.add_child(a, b).unwrap();

        assert_eq!(
            scene.add_child(b, a),
            Err(SceneError::Cycle { parent: b, child: a })
        );
        assert_eq!(
            scene.add_child(a, a),
            Err(SceneError::Cycle { parent: a, child: a })
        );
        let root = scene.root();
        assert_eq!(scene.add_child(a, root), Err(SceneError::RootReparent));
    }

    #[test]
    fn test_detach_orphan_is_noop() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node("a");
        assert!(scene.detach(a).is_ok());
        assert_eq!(scene.parent(a), None);
    }

    #[test]
    fn test_world_transform_composes_parents() {
        let mut scene = MemoryScene::new();
        let outer = scene.create_node("outer");
        let inner = scene.create_node("inner");
        let root = scene.root();
        scene.add_child(root, outer).unwrap();
        scene.add_child(outer, inner).unwrap();

        scene.set_position(outer, Vec3::new(0.0, 1.0, 0.0)).unwrap();
        scene
            .set_rotation(outer, Quat::from_rotation_y(FRAC_PI_2))
            .unwrap();
        scene.set_position(inner, Vec3::new(0.0, 0.0, -1.0)).unwrap();

        let (position, rotation) = scene.world_transform(inner).unwrap();
        assert!((position - Vec3::new(-1.0, 1.0, 0.0)).length() < 1e-5);
        assert!(rotation.angle_between(Quat::from_rotation_y(FRAC_PI_2)) < 1e-5);
    }
}
