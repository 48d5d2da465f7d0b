//! Particle-versus-collider resolution.

pub mod narrowphase;

pub use narrowphase::{resolve, resolve_all};
