//! Utility helpers: math extensions, generational allocators, logging, and profiling.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod profiling;

pub use allocator::{Arena, BoneId, EntityId, GenerationalId, NodeId};
pub use math::*;
