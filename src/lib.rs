//! Jiggle Chain – secondary-motion physics for bone chains.
//!
//! Chains of scene nodes (hair, tails, cloth strips) are simulated as Verlet particles,
//! batched into fixed-capacity struct-of-arrays slabs by size tier, constrained to their rest
//! shape and bone lengths, and pushed out of (or held inside) analytic sphere and capsule
//! colliders.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::{Mat4, Quat, Vec3};

pub use config::{SchedulerConfig, TierConfig};
pub use crate::core::{
    bone::{ChainSettings, JiggleBone},
    chain::{CoefficientCurves, ParticleChain, ParticleCoefficients},
    collider::{Bound, Collider, ColliderBuilder, Direction},
    curve::{CurveKey, Interpolation, ResponseCurve},
    scene::{SceneGraph, TransformHierarchy},
    soa::{ChainKey, ChainSlab},
    types::{FrameClock, FreezeAxis, Transform, UpdateMode},
};
pub use dynamics::forces::{ForceGenerator, ForceRegistry, UniformForce};
pub use error::{JiggleError, Result};
pub use utils::allocator::{Arena, BoneId, EntityId, GenerationalId, NodeId};
pub use world::{commands::CommandSender, timer::StepPlan, JiggleWorld};

/// Convenience wrapper owning a [`JiggleWorld`] together with an in-memory
/// [`TransformHierarchy`].
pub struct JiggleEngine {
    world: JiggleWorld,
    scene: TransformHierarchy,
}

impl JiggleEngine {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Ok(Self {
            world: JiggleWorld::new(config)?,
            scene: TransformHierarchy::new(),
        })
    }

    /// Adds a node to the owned hierarchy.
    pub fn create_node(&mut self, name: impl Into<String>, parent: Option<NodeId>, local: Transform) -> NodeId {
        self.scene.create_node(name, parent, local)
    }

    /// Registers a jiggle bone on `owner`; it starts simulating on the next step.
    pub fn add_bone(&mut self, owner: NodeId, settings: ChainSettings) -> BoneId {
        self.world.add_bone(owner, settings, &self.scene)
    }

    /// Advances one display frame of `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.world.step(&mut self.scene, &FrameClock::from_delta(dt));
    }

    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.world.set_parallel_enabled(enabled);
    }

    pub fn world(&self) -> &JiggleWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut JiggleWorld {
        &mut self.world
    }

    pub fn scene(&self) -> &TransformHierarchy {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut TransformHierarchy {
        &mut self.scene
    }
}
