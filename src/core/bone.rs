//! Jiggle bones: the authoring-side owner of one or more particle chains.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_BLEND_WEIGHT;
use crate::core::chain::{ChainExtent, CoefficientCurves, ParticleChain, ParticleCoefficients};
use crate::core::collider::Collider;
use crate::core::curve::ResponseCurve;
use crate::core::scene::SceneGraph;
use crate::core::types::FreezeAxis;
use crate::utils::allocator::NodeId;

/// Everything a host can configure on a bone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    /// Primary chain root.
    pub root: Option<NodeId>,
    /// Additional roots; duplicates of `root` or of each other are ignored.
    pub roots: Vec<NodeId>,
    pub coefficients: ParticleCoefficients,
    pub curves: CoefficientCurves,
    pub end_length: f32,
    /// Extension direction in the owner's frame, used when `end_length` is zero.
    pub end_offset: Vec3,
    pub gravity: Vec3,
    pub force: Vec3,
    pub blend_weight: f32,
    /// Collider slots; `None` marks a reference the host could not resolve.
    pub colliders: Vec<Option<Collider>>,
    pub exclusions: Vec<NodeId>,
    pub freeze_axis: FreezeAxis,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            root: None,
            roots: Vec::new(),
            coefficients: ParticleCoefficients::default(),
            curves: CoefficientCurves::default(),
            end_length: 0.0,
            end_offset: Vec3::ZERO,
            gravity: Vec3::ZERO,
            force: Vec3::ZERO,
            blend_weight: DEFAULT_BLEND_WEIGHT,
            colliders: Vec::new(),
            exclusions: Vec::new(),
            freeze_axis: FreezeAxis::None,
        }
    }
}

impl ChainSettings {
    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = Some(root);
        self
    }

    pub fn with_extra_root(mut self, root: NodeId) -> Self {
        self.roots.push(root);
        self
    }

    pub fn with_coefficients(mut self, coefficients: ParticleCoefficients) -> Self {
        self.coefficients = coefficients;
        self
    }

    pub fn with_damping(mut self, damping: f32, curve: Option<ResponseCurve>) -> Self {
        self.coefficients.damping = damping;
        self.curves.damping = curve;
        self
    }

    pub fn with_elasticity(mut self, elasticity: f32, curve: Option<ResponseCurve>) -> Self {
        self.coefficients.elasticity = elasticity;
        self.curves.elasticity = curve;
        self
    }

    pub fn with_stiffness(mut self, stiffness: f32, curve: Option<ResponseCurve>) -> Self {
        self.coefficients.stiffness = stiffness;
        self.curves.stiffness = curve;
        self
    }

    pub fn with_inert(mut self, inert: f32, curve: Option<ResponseCurve>) -> Self {
        self.coefficients.inert = inert;
        self.curves.inert = curve;
        self
    }

    pub fn with_friction(mut self, friction: f32, curve: Option<ResponseCurve>) -> Self {
        self.coefficients.friction = friction;
        self.curves.friction = curve;
        self
    }

    pub fn with_radius(mut self, radius: f32, curve: Option<ResponseCurve>) -> Self {
        self.coefficients.radius = radius;
        self.curves.radius = curve;
        self
    }

    pub fn with_end_length(mut self, end_length: f32) -> Self {
        self.end_length = end_length;
        self
    }

    pub fn with_end_offset(mut self, end_offset: Vec3) -> Self {
        self.end_offset = end_offset;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_force(mut self, force: Vec3) -> Self {
        self.force = force;
        self
    }

    pub fn with_blend_weight(mut self, weight: f32) -> Self {
        self.blend_weight = weight;
        self
    }

    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.colliders.push(Some(collider));
        self
    }

    pub fn with_exclusion(mut self, node: NodeId) -> Self {
        self.exclusions.push(node);
        self
    }

    pub fn with_freeze_axis(mut self, axis: FreezeAxis) -> Self {
        self.freeze_axis = axis;
        self
    }
}

/// A configured owner node plus the chains built from its roots.
#[derive(Debug, Clone)]
pub struct JiggleBone {
    owner: NodeId,
    settings: ChainSettings,
    chains: Vec<ParticleChain>,
    object_prev_position: Vec3,
    object_scale: f32,
    weight: f32,
    topology: u32,
}

impl JiggleBone {
    pub fn new(owner: NodeId, settings: ChainSettings) -> Self {
        let weight = settings.blend_weight;
        Self {
            owner,
            settings,
            chains: Vec::new(),
            object_prev_position: Vec3::ZERO,
            object_scale: 1.0,
            weight,
            topology: 0,
        }
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    pub fn chains(&self) -> &[ParticleChain] {
        &self.chains
    }

    pub fn chains_mut(&mut self) -> &mut [ParticleChain] {
        &mut self.chains
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn object_scale(&self) -> f32 {
        self.object_scale
    }

    pub fn object_prev_position(&self) -> Vec3 {
        self.object_prev_position
    }

    /// Generation of the chain list; bumps on every rebuild.
    pub fn topology(&self) -> u32 {
        self.topology
    }

    /// Distinct roots that still exist in the scene, primary root first.
    pub fn roots<S: SceneGraph + ?Sized>(&self, scene: &S) -> Vec<NodeId> {
        let mut roots = Vec::new();
        for &root in self.settings.root.iter().chain(self.settings.roots.iter()) {
            if scene.contains(root) && !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }

    pub fn is_root_changed<S: SceneGraph + ?Sized>(&self, scene: &S) -> bool {
        let roots = self.roots(scene);
        roots.len() != self.chains.len()
            || roots.iter().zip(&self.chains).any(|(&r, chain)| r != chain.root)
    }

    /// Rebuilds every chain from the current scene pose.
    pub fn setup_chains<S: SceneGraph + ?Sized>(&mut self, scene: &S) {
        let extent = ChainExtent {
            owner: self.owner,
            exclusions: &self.settings.exclusions,
            end_length: self.settings.end_length,
            end_offset: self.settings.end_offset,
        };
        self.chains = self
            .roots(scene)
            .into_iter()
            .map(|root| ParticleChain::build(scene, root, &extent))
            .collect();

        self.object_scale = scene.lossy_scale(self.owner).abs();
        self.object_prev_position = scene.world_position(self.owner);
        self.topology = self.topology.wrapping_add(1);
        self.update_parameters();
    }

    /// Re-derives weight, gravity and particle coefficients from the settings.
    pub fn update_parameters(&mut self) {
        self.weight = self.settings.blend_weight;
        for chain in &mut self.chains {
            chain.set_gravity(self.settings.gravity);
            chain.propagate(&self.settings.coefficients, &self.settings.curves);
        }
    }

    /// Replaces the settings and reports whether the chains must be rebuilt.
    pub fn replace_settings<S: SceneGraph + ?Sized>(&mut self, settings: ChainSettings, scene: &S) -> bool {
        let rebuild = settings.exclusions != self.settings.exclusions
            || settings.end_length != self.settings.end_length
            || settings.end_offset != self.settings.end_offset;
        self.settings = settings;
        if rebuild || self.is_root_changed(scene) {
            self.setup_chains(scene);
            true
        } else {
            self.update_parameters();
            false
        }
    }

    /// Changes the blend weight. Dropping to zero parks the chains at their rest pose;
    /// leaving zero restarts Verlet state from the current pose.
    pub fn set_weight<S: SceneGraph + ?Sized>(&mut self, weight: f32, scene: &mut S) {
        if self.weight == weight {
            return;
        }
        if weight == 0.0 {
            self.restore_rest_pose(scene);
        } else if self.weight == 0.0 {
            self.reset_particle_positions(scene);
        }
        self.weight = weight;
        self.settings.blend_weight = weight;
    }

    pub fn restore_rest_pose<S: SceneGraph + ?Sized>(&self, scene: &mut S) {
        for chain in &self.chains {
            chain.restore_rest_pose(scene);
        }
    }

    pub fn reset_particle_positions<S: SceneGraph + ?Sized>(&mut self, scene: &S) {
        for chain in &mut self.chains {
            chain.reset_positions(scene);
        }
        self.object_prev_position = scene.world_position(self.owner);
    }
}
