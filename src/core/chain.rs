//! Particle chains: one rooted hierarchy of nodes flattened into parent-before-child order.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_DAMPING, DEFAULT_ELASTICITY, DEFAULT_STIFFNESS};
use crate::core::curve::ResponseCurve;
use crate::core::scene::SceneGraph;
use crate::utils::allocator::NodeId;
use crate::utils::math::safe_length;

/// Physical coefficients carried by every particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleCoefficients {
    pub damping: f32,
    pub elasticity: f32,
    pub stiffness: f32,
    pub inert: f32,
    pub friction: f32,
    pub radius: f32,
}

impl Default for ParticleCoefficients {
    fn default() -> Self {
        Self {
            damping: DEFAULT_DAMPING,
            elasticity: DEFAULT_ELASTICITY,
            stiffness: DEFAULT_STIFFNESS,
            inert: 0.0,
            friction: 0.0,
            radius: 0.0,
        }
    }
}

impl ParticleCoefficients {
    /// Clamps the unit-range coefficients to `[0, 1]` and the radius to `>= 0`.
    pub fn clamped(self) -> Self {
        Self {
            damping: self.damping.clamp(0.0, 1.0),
            elasticity: self.elasticity.clamp(0.0, 1.0),
            stiffness: self.stiffness.clamp(0.0, 1.0),
            inert: self.inert.clamp(0.0, 1.0),
            friction: self.friction.clamp(0.0, 1.0),
            radius: self.radius.max(0.0),
        }
    }
}

/// Optional distribution of each coefficient along the chain, sampled at
/// `bone_length / bone_total_length`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoefficientCurves {
    pub damping: Option<ResponseCurve>,
    pub elasticity: Option<ResponseCurve>,
    pub stiffness: Option<ResponseCurve>,
    pub inert: Option<ResponseCurve>,
    pub friction: Option<ResponseCurve>,
    pub radius: Option<ResponseCurve>,
}

impl CoefficientCurves {
    pub fn sample(&self, base: &ParticleCoefficients, t: f32) -> ParticleCoefficients {
        fn scale(curve: &Option<ResponseCurve>, t: f32) -> f32 {
            match curve {
                Some(curve) if !curve.is_empty() => curve.evaluate(t),
                _ => 1.0,
            }
        }

        ParticleCoefficients {
            damping: base.damping * scale(&self.damping, t),
            elasticity: base.elasticity * scale(&self.elasticity, t),
            stiffness: base.stiffness * scale(&self.stiffness, t),
            inert: base.inert * scale(&self.inert, t),
            friction: base.friction * scale(&self.friction, t),
            radius: base.radius * scale(&self.radius, t),
        }
        .clamped()
    }
}

/// Where the chain ends and how it is extended past its last real node.
#[derive(Debug, Clone, Copy)]
pub struct ChainExtent<'a> {
    /// Node whose frame `end_offset` is expressed in.
    pub owner: NodeId,
    pub exclusions: &'a [NodeId],
    pub end_length: f32,
    pub end_offset: Vec3,
}

impl ChainExtent<'_> {
    pub fn wants_end_particles(&self) -> bool {
        self.end_length > 0.0 || self.end_offset != Vec3::ZERO
    }
}

/// One simulated point: a scene node, or a synthetic end point past the last node.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub node: Option<NodeId>,
    pub parent_index: Option<usize>,
    pub child_count: usize,
    pub depth: usize,
    /// Distance from the root accumulated along this particle's path.
    pub bone_length: f32,
    /// Distance to the parent at build time; the length constraint holds it fixed.
    pub rest_length: f32,
    pub coefficients: ParticleCoefficients,
    pub collided: bool,
    pub position: Vec3,
    pub prev_position: Vec3,
    /// Offset in the parent's local frame, used by synthetic particles only.
    pub end_offset: Vec3,
    pub init_local_position: Vec3,
    pub init_local_rotation: Quat,
    /// Last local-to-world matrix read back from a slab.
    pub local_to_world: Mat4,
}

impl Particle {
    pub fn is_synthetic(&self) -> bool {
        self.node.is_none()
    }

    pub fn is_root(&self) -> bool {
        self.parent_index.is_none()
    }
}

/// Flattened chain rooted at one scene node.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleChain {
    pub root: NodeId,
    pub root_world_to_local: Mat4,
    /// Gravity expressed in the root's frame at build time.
    pub local_gravity: Vec3,
    pub bone_total_length: f32,
    pub max_depth: usize,
    pub particles: Vec<Particle>,
}

impl ParticleChain {
    /// Walks the hierarchy under `root` depth-first.
    ///
    /// Excluded nodes stop traversal; when end particles are requested, an excluded child and
    /// every leaf each get one synthetic particle instead.
    pub fn build<S: SceneGraph + ?Sized>(scene: &S, root: NodeId, extent: &ChainExtent<'_>) -> Self {
        let mut chain = Self {
            root,
            root_world_to_local: scene.world_to_local(root),
            local_gravity: Vec3::ZERO,
            bone_total_length: 0.0,
            max_depth: 0,
            particles: Vec::new(),
        };
        chain.append(scene, Some(root), None, 0.0, 0, extent);
        chain
    }

    fn append<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &S,
        node: Option<NodeId>,
        parent_index: Option<usize>,
        mut bone_length: f32,
        depth: usize,
        extent: &ChainExtent<'_>,
    ) {
        let mut particle = Particle {
            node,
            parent_index,
            child_count: 0,
            depth,
            bone_length: 0.0,
            rest_length: 0.0,
            coefficients: ParticleCoefficients::default(),
            collided: false,
            position: Vec3::ZERO,
            prev_position: Vec3::ZERO,
            end_offset: Vec3::ZERO,
            init_local_position: Vec3::ZERO,
            init_local_rotation: Quat::IDENTITY,
            local_to_world: Mat4::IDENTITY,
        };

        match (node, parent_index) {
            (Some(node), _) => {
                particle.position = scene.world_position(node);
                particle.init_local_position = scene.local_position(node);
                particle.init_local_rotation = scene.local_rotation(node);
                particle.local_to_world = scene.local_to_world(node);
            }
            (None, Some(parent)) => {
                // Synthetic particles only ever hang off real nodes.
                let Some(parent_node) = self.particles[parent].node else {
                    return;
                };
                particle.end_offset = Self::end_offset(scene, parent_node, extent);
                particle.position = scene
                    .local_to_world(parent_node)
                    .transform_point3(particle.end_offset);
            }
            (None, None) => return,
        }
        particle.prev_position = particle.position;

        if let Some(parent) = parent_index {
            let segment = self.particles[parent].position.distance(particle.position);
            bone_length += segment;
            particle.rest_length = segment;
            particle.bone_length = bone_length;
            self.bone_total_length = self.bone_total_length.max(bone_length);
            self.max_depth = self.max_depth.max(depth);
            self.particles[parent].child_count += 1;
        }

        let index = self.particles.len();
        self.particles.push(particle);

        let Some(node) = node else {
            return;
        };
        let children = scene.children(node);
        for &child in &children {
            if !extent.exclusions.contains(&child) {
                self.append(scene, Some(child), Some(index), bone_length, depth + 1, extent);
            } else if extent.wants_end_particles() {
                self.append(scene, None, Some(index), bone_length, depth + 1, extent);
            }
        }
        if children.is_empty() && extent.wants_end_particles() {
            self.append(scene, None, Some(index), bone_length, depth + 1, extent);
        }
    }

    fn end_offset<S: SceneGraph + ?Sized>(scene: &S, parent: NodeId, extent: &ChainExtent<'_>) -> Vec3 {
        let world_to_local = scene.world_to_local(parent);
        let parent_position = scene.world_position(parent);
        if extent.end_length > 0.0 {
            match scene.parent(parent) {
                Some(grandparent) => {
                    let beyond = parent_position * 2.0 - scene.world_position(grandparent);
                    world_to_local.transform_point3(beyond) * extent.end_length
                }
                None => Vec3::new(extent.end_length, 0.0, 0.0),
            }
        } else {
            let direction = scene
                .local_to_world(extent.owner)
                .transform_vector3(extent.end_offset);
            world_to_local.transform_point3(direction + parent_position)
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Re-expresses `gravity` in the root frame captured at build time.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        let local = self.root_world_to_local.transform_vector3(gravity);
        self.local_gravity = local.normalize_or_zero() * gravity.length();
    }

    /// Recomputes every particle's coefficients from the chain-wide defaults and curves.
    pub fn propagate(&mut self, base: &ParticleCoefficients, curves: &CoefficientCurves) {
        let total = self.bone_total_length;
        for particle in &mut self.particles {
            particle.coefficients = if total > 0.0 {
                curves.sample(base, particle.bone_length / total)
            } else {
                base.clamped()
            };
        }
    }

    /// Puts every real node back at its captured rest local pose.
    pub fn restore_rest_pose<S: SceneGraph + ?Sized>(&self, scene: &mut S) {
        for particle in &self.particles {
            if let Some(node) = particle.node {
                scene.set_local_position(node, particle.init_local_position);
                scene.set_local_rotation(node, particle.init_local_rotation);
            }
        }
    }

    /// Drops all Verlet velocity by moving every particle onto its node's current pose.
    pub fn reset_positions<S: SceneGraph + ?Sized>(&mut self, scene: &S) {
        for i in 0..self.particles.len() {
            let position = match (self.particles[i].node, self.particles[i].parent_index) {
                (Some(node), _) => {
                    self.particles[i].local_to_world = scene.local_to_world(node);
                    scene.world_position(node)
                }
                (None, Some(parent)) => {
                    let parent_matrix = match self.particles[parent].node {
                        Some(node) => scene.local_to_world(node),
                        None => self.particles[parent].local_to_world,
                    };
                    parent_matrix.transform_point3(self.particles[i].end_offset)
                }
                (None, None) => continue,
            };
            let particle = &mut self.particles[i];
            particle.position = position;
            particle.prev_position = position;
            particle.collided = false;
        }
    }

    /// Largest deviation of any edge from its rest length.
    pub fn max_length_error(&self) -> f32 {
        self.particles
            .iter()
            .filter_map(|p| {
                let parent = &self.particles[p.parent_index?];
                Some((safe_length(p.position - parent.position) - p.rest_length).abs())
            })
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scene::TransformHierarchy;
    use crate::core::types::Transform;
    use approx::assert_abs_diff_eq;

    fn straight_chain(scene: &mut TransformHierarchy, links: usize) -> (NodeId, Vec<NodeId>) {
        let root = scene.create_node("root", None, Transform::default());
        let mut nodes = vec![root];
        for i in 0..links {
            let parent = nodes[nodes.len() - 1];
            nodes.push(scene.create_node(
                format!("link{i}"),
                Some(parent),
                Transform::from_position(Vec3::new(0.0, -1.0, 0.0)),
            ));
        }
        (root, nodes)
    }

    fn extent(owner: NodeId, exclusions: &[NodeId], end_length: f32) -> ChainExtent<'_> {
        ChainExtent {
            owner,
            exclusions,
            end_length,
            end_offset: Vec3::ZERO,
        }
    }

    #[test]
    fn build_orders_parents_before_children() {
        let mut scene = TransformHierarchy::new();
        let (root, _) = straight_chain(&mut scene, 3);
        let branch = scene.create_node("branch", Some(root), Transform::from_position(Vec3::X));

        let chain = ParticleChain::build(&scene, root, &extent(root, &[], 0.0));
        assert_eq!(chain.len(), 5);
        assert!(chain.particles[0].is_root());
        for (i, p) in chain.particles.iter().enumerate().skip(1) {
            assert!(p.parent_index.unwrap() < i);
            assert_eq!(p.depth, chain.particles[p.parent_index.unwrap()].depth + 1);
        }
        assert_eq!(chain.particles[0].child_count, 2);
        assert_eq!(chain.particles[4].node, Some(branch));
        assert_abs_diff_eq!(chain.bone_total_length, 3.0, epsilon = 1e-5);
        assert_eq!(chain.max_depth, 3);
    }

    #[test]
    fn end_length_extends_past_leaf_along_last_segment() {
        let mut scene = TransformHierarchy::new();
        let (root, nodes) = straight_chain(&mut scene, 2);
        let chain = ParticleChain::build(&scene, root, &extent(root, &[], 0.5));

        let end = chain.particles.last().unwrap();
        assert!(end.is_synthetic());
        assert_eq!(chain.particles[end.parent_index.unwrap()].node, Some(nodes[2]));
        assert_abs_diff_eq!(end.position.y, -2.5, epsilon = 1e-5);
        assert_abs_diff_eq!(end.rest_length, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(end.init_local_position.length(), 0.0);
    }

    #[test]
    fn exclusions_stop_traversal() {
        let mut scene = TransformHierarchy::new();
        let (root, nodes) = straight_chain(&mut scene, 3);

        let bare = ParticleChain::build(&scene, root, &extent(root, &[nodes[2]], 0.0));
        assert_eq!(bare.len(), 2);

        let extended = ParticleChain::build(&scene, root, &extent(root, &[nodes[2]], 1.0));
        assert_eq!(extended.len(), 3);
        assert!(extended.particles[2].is_synthetic());
    }

    #[test]
    fn end_offset_is_expressed_in_owner_frame() {
        let mut scene = TransformHierarchy::new();
        let owner = scene.create_node(
            "owner",
            None,
            Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
        );
        let root = scene.create_node("root", Some(owner), Transform::default());
        let chain = ParticleChain::build(
            &scene,
            root,
            &ChainExtent {
                owner,
                exclusions: &[],
                end_length: 0.0,
                end_offset: Vec3::new(1.0, 0.0, 0.0),
            },
        );
        let end = &chain.particles[1];
        assert_abs_diff_eq!(end.position.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(end.position.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn propagation_scales_by_curve_and_clamps() {
        let mut scene = TransformHierarchy::new();
        let (root, _) = straight_chain(&mut scene, 2);
        let mut chain = ParticleChain::build(&scene, root, &extent(root, &[], 0.0));

        let base = ParticleCoefficients {
            damping: 0.8,
            radius: -1.0,
            ..ParticleCoefficients::default()
        };
        let curves = CoefficientCurves {
            damping: Some(ResponseCurve::linear(2.0, 0.0)),
            ..CoefficientCurves::default()
        };
        chain.propagate(&base, &curves);

        assert_eq!(chain.particles[0].coefficients.damping, 1.0);
        assert_abs_diff_eq!(chain.particles[1].coefficients.damping, 0.8, epsilon = 1e-5);
        assert_eq!(chain.particles[2].coefficients.damping, 0.0);
        assert_eq!(chain.particles[1].coefficients.radius, 0.0);
    }

    #[test]
    fn local_gravity_follows_root_frame() {
        let mut scene = TransformHierarchy::new();
        let root = scene.create_node(
            "root",
            None,
            Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_x(std::f32::consts::PI)),
        );
        let mut chain = ParticleChain::build(&scene, root, &extent(root, &[], 0.0));
        chain.set_gravity(Vec3::new(0.0, -9.8, 0.0));
        assert_abs_diff_eq!(chain.local_gravity.y, 9.8, epsilon = 1e-4);
    }
}
