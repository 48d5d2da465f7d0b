//! Core types: scene access, chain topology, colliders, and the chain slab.

pub mod bone;
pub mod chain;
pub mod collider;
pub mod curve;
pub mod scene;
pub mod soa;
pub mod types;

pub use bone::{ChainSettings, JiggleBone};
pub use chain::{CoefficientCurves, Particle, ParticleChain, ParticleCoefficients};
pub use collider::{Bound, CollideType, Collider, ColliderBuilder, Direction, PreparedCollider};
pub use curve::{CurveKey, Interpolation, ResponseCurve};
pub use scene::{SceneGraph, TransformHierarchy};
pub use soa::{ChainKey, ChainRowMut, ChainSlab, ColliderSlot, HeadInfo, ParticleInfo, ParticleSlot};
pub use types::{FrameClock, FreezeAxis, Transform, UpdateMode};
