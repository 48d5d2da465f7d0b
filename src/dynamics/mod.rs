//! Per-frame chain dynamics: pose capture, forces, integration, and write-back.

pub mod capture;
pub mod forces;
pub mod integrator;
pub mod parallel;
pub mod pose;

pub use capture::capture_row;
pub use forces::{ConfiguredForce, ForceGenerator, ForceRegistry, GravityResidual, UniformForce};
pub use integrator::Integrator;
pub use parallel::{for_each_row, for_each_row_in};
pub use pose::{apply_rotations, restore_rest_pose, write_back};
