//! Host transform hierarchy interface plus a small in-memory implementation.
//!
//! The simulation never owns transforms. It reads poses from a [`SceneGraph`] during capture
//! and writes results back after integration; everything else about the host (animation,
//! rendering, scheduling) stays on the other side of this trait.

use glam::{Mat4, Quat, Vec3};

use crate::core::types::Transform;
use crate::utils::allocator::{Arena, NodeId};
use crate::utils::math::lossy_scale_x;

/// Read/write access to a host transform hierarchy.
///
/// Reads on a node the host no longer knows about return identity values; writes are ignored.
pub trait SceneGraph {
    fn contains(&self, node: NodeId) -> bool;

    fn world_position(&self, node: NodeId) -> Vec3;
    fn world_rotation(&self, node: NodeId) -> Quat;
    fn local_position(&self, node: NodeId) -> Vec3;
    fn local_rotation(&self, node: NodeId) -> Quat;
    fn local_to_world(&self, node: NodeId) -> Mat4;

    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn set_world_position(&mut self, node: NodeId, position: Vec3);
    fn set_world_rotation(&mut self, node: NodeId, rotation: Quat);
    fn set_local_position(&mut self, node: NodeId, position: Vec3);
    fn set_local_rotation(&mut self, node: NodeId, rotation: Quat);

    /// Signed X component of the node's lossy world scale.
    fn lossy_scale(&self, node: NodeId) -> f32 {
        lossy_scale_x(
            &self.local_to_world(node),
            self.world_position(node),
            self.world_rotation(node),
        )
    }

    fn world_to_local(&self, node: NodeId) -> Mat4 {
        self.local_to_world(node).inverse()
    }
}

#[derive(Debug, Clone)]
struct SceneNode {
    name: String,
    local: Transform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed transform tree used by tests, benches, and hosts without a scene graph of
/// their own.
#[derive(Default)]
pub struct TransformHierarchy {
    nodes: Arena<SceneNode>,
}

impl TransformHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node under `parent` (or as a root). An unknown parent makes the node a root.
    pub fn create_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeId>,
        local: Transform,
    ) -> NodeId {
        let parent = parent.filter(|p| self.nodes.contains(p.0));
        let id = NodeId(self.nodes.insert(SceneNode {
            name: name.into(),
            local,
            parent,
            children: Vec::new(),
        }));
        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(parent.0) {
                node.children.push(id);
            }
        }
        id
    }

    /// Removes a node together with its subtree.
    pub fn remove_node(&mut self, node: NodeId) -> bool {
        let Some(removed) = self.nodes.remove(node.0) else {
            return false;
        };
        if let Some(parent) = removed.parent {
            if let Some(parent) = self.nodes.get_mut(parent.0) {
                parent.children.retain(|&c| c != node);
            }
        }
        let mut pending = removed.children;
        while let Some(child) = pending.pop() {
            if let Some(child) = self.nodes.remove(child.0) {
                pending.extend(child.children);
            }
        }
        true
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.name.as_str())
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.name == name)
            .map(|(id, _)| NodeId(id))
    }

    pub fn local_transform(&self, node: NodeId) -> Option<Transform> {
        self.nodes.get(node.0).map(|n| n.local)
    }

    pub fn set_local_transform(&mut self, node: NodeId, local: Transform) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.local = local;
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn parent_local_to_world(&self, node: NodeId) -> Mat4 {
        self.nodes
            .get(node.0)
            .and_then(|n| n.parent)
            .map(|p| self.local_to_world(p))
            .unwrap_or(Mat4::IDENTITY)
    }

    fn parent_world_rotation(&self, node: NodeId) -> Quat {
        self.nodes
            .get(node.0)
            .and_then(|n| n.parent)
            .map(|p| self.world_rotation(p))
            .unwrap_or(Quat::IDENTITY)
    }
}

impl SceneGraph for TransformHierarchy {
    fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(node.0)
    }

    fn world_position(&self, node: NodeId) -> Vec3 {
        self.local_to_world(node).w_axis.truncate()
    }

    fn world_rotation(&self, node: NodeId) -> Quat {
        let mut rotation = Quat::IDENTITY;
        let mut cursor = self.nodes.get(node.0);
        while let Some(n) = cursor {
            rotation = n.local.rotation * rotation;
            cursor = n.parent.and_then(|p| self.nodes.get(p.0));
        }
        rotation.normalize()
    }

    fn local_position(&self, node: NodeId) -> Vec3 {
        self.nodes
            .get(node.0)
            .map(|n| n.local.position)
            .unwrap_or(Vec3::ZERO)
    }

    fn local_rotation(&self, node: NodeId) -> Quat {
        self.nodes
            .get(node.0)
            .map(|n| n.local.rotation)
            .unwrap_or(Quat::IDENTITY)
    }

    fn local_to_world(&self, node: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut cursor = self.nodes.get(node.0);
        while let Some(n) = cursor {
            matrix = n.local.to_matrix() * matrix;
            cursor = n.parent.and_then(|p| self.nodes.get(p.0));
        }
        matrix
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn set_world_position(&mut self, node: NodeId, position: Vec3) {
        let local = self
            .parent_local_to_world(node)
            .inverse()
            .transform_point3(position);
        self.set_local_position(node, local);
    }

    fn set_world_rotation(&mut self, node: NodeId, rotation: Quat) {
        let local = self.parent_world_rotation(node).inverse() * rotation;
        self.set_local_rotation(node, local.normalize());
    }

    fn set_local_position(&mut self, node: NodeId, position: Vec3) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.local.position = position;
        }
    }

    fn set_local_rotation(&mut self, node: NodeId, rotation: Quat) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.local.rotation = rotation;
        }
    }
}
