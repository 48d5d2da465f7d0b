use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, orientation, and non-uniform scale of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Builds a homogeneous matrix representation of the transform.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Plane constraint applied to every simulated particle of a chain.
///
/// The axis is taken from the parent particle's captured basis, so the plane turns with
/// the animated chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FreezeAxis {
    #[default]
    None,
    X,
    Y,
    Z,
}

impl FreezeAxis {
    /// Column of the parent's local-to-world matrix that acts as the plane normal.
    pub fn basis_column(self) -> Option<usize> {
        match self {
            FreezeAxis::None => None,
            FreezeAxis::X => Some(0),
            FreezeAxis::Y => Some(1),
            FreezeAxis::Z => Some(2),
        }
    }
}

/// How elapsed time is turned into integration sub-steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateMode {
    /// One step per frame scaled by `dt * update_rate`.
    #[default]
    Default,
    /// Fixed-rate sub-steps on scaled frame time.
    Normal,
    /// Fixed-rate sub-steps on the fixed tick, multiplied by the ticks seen since the last frame.
    FixedStep,
    /// Fixed-rate sub-steps on unscaled frame time.
    UnscaledTime,
}

/// Time inputs for one display frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameClock {
    pub delta_time: f32,
    pub unscaled_delta_time: f32,
    pub fixed_delta_time: f32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            delta_time: 0.0,
            unscaled_delta_time: 0.0,
            fixed_delta_time: 1.0 / 50.0,
        }
    }
}

impl FrameClock {
    /// Clock where scaled and unscaled time advance together.
    pub fn from_delta(delta_time: f32) -> Self {
        Self {
            delta_time,
            unscaled_delta_time: delta_time,
            ..Self::default()
        }
    }

    pub fn with_unscaled(mut self, unscaled_delta_time: f32) -> Self {
        self.unscaled_delta_time = unscaled_delta_time;
        self
    }

    pub fn with_fixed(mut self, fixed_delta_time: f32) -> Self {
        self.fixed_delta_time = fixed_delta_time;
        self
    }
}
