use glam::Vec3;

use crate::core::soa::{ChainSlab, HeadInfo};
use crate::dynamics::parallel::for_each_row_in;
use crate::utils::math::safe_length;

/// Contribution to a chain's per-step external force, before object scale and time scaling.
pub trait ForceGenerator: Send + Sync {
    fn force(&self, head: &HeadInfo) -> Vec3;
}

/// Configured gravity minus the part the rest pose already hangs under.
///
/// Rest gravity is the chain's local gravity carried through the root's current frame; its
/// projection onto the gravity direction (never negative) is removed.
pub struct GravityResidual;

impl ForceGenerator for GravityResidual {
    fn force(&self, head: &HeadInfo) -> Vec3 {
        let rest_gravity = head
            .root_local_to_world
            .transform_vector3(head.local_gravity)
            .normalize_or_zero()
            * safe_length(head.local_gravity);
        let direction = head.gravity.normalize_or_zero();
        let baked = direction * rest_gravity.dot(direction).max(0.0);
        head.gravity - baked
    }
}

/// The chain's configured constant force.
pub struct ConfiguredForce;

impl ForceGenerator for ConfiguredForce {
    fn force(&self, head: &HeadInfo) -> Vec3 {
        head.force
    }
}

/// Uniform force applied to every chain, e.g. wind.
pub struct UniformForce {
    pub force: Vec3,
}

impl UniformForce {
    pub fn new(force: Vec3) -> Self {
        Self { force }
    }
}

impl ForceGenerator for UniformForce {
    fn force(&self, _head: &HeadInfo) -> Vec3 {
        self.force
    }
}

/// Collection of forces summed into each chain's frame force.
pub struct ForceRegistry {
    forces: Vec<Box<dyn ForceGenerator>>,
}

impl Default for ForceRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.add_force(GravityResidual);
        registry.add_force(ConfiguredForce);
        registry
    }
}

impl ForceRegistry {
    /// Registry with the gravity residual and configured force.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self { forces: Vec::new() }
    }

    pub fn add_force<F: ForceGenerator + 'static>(&mut self, force: F) {
        self.forces.push(Box::new(force));
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    /// Frame force for one header: the summed contributions scaled by object scale and
    /// the frame's time variable.
    pub fn frame_force(&self, head: &HeadInfo, time_var: f32) -> Vec3 {
        let total: Vec3 = self.forces.iter().map(|f| f.force(head)).sum();
        total * (head.object_scale * time_var)
    }

    pub fn apply_all(&self, slabs: &mut [ChainSlab], time_var: f32, parallel: bool) {
        for_each_row_in(slabs, parallel, |row| {
            if row.head.needs_update {
                row.head.frame_force = self.frame_force(row.head, time_var);
            }
        });
    }
}
