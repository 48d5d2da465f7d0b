//! Additional math helpers layered on top of `glam`.

use glam::{Mat4, Quat, Vec3, Vec4};

/// Squared lengths below this are treated as zero.
pub const LENGTH_EPSILON: f32 = f32::EPSILON;

/// Length that snaps near-zero vectors to exactly zero.
pub fn safe_length(v: Vec3) -> f32 {
    let length_sq = v.length_squared();
    if length_sq < LENGTH_EPSILON {
        0.0
    } else {
        length_sq.sqrt()
    }
}

/// Normalizes a homogeneous column, returning zero for degenerate input.
pub fn safe_normalize4(v: Vec4) -> Vec4 {
    let mag_sq = v.dot(v) as f64;
    if mag_sq > 1e-5 {
        v / (mag_sq.sqrt() as f32)
    } else {
        Vec4::ZERO
    }
}

/// Shortest-arc rotation taking `from` onto `to`.
///
/// Either input may be unnormalized or zero; a zero input yields identity. Opposite
/// directions rotate half a turn about an axis perpendicular to `from`.
pub fn from_to_rotation(from: Vec3, to: Vec3) -> Quat {
    let unit_from = from.normalize_or_zero();
    let unit_to = to.normalize_or_zero();
    let d = unit_from.dot(unit_to);
    if d >= 1.0 {
        Quat::IDENTITY
    } else if d <= -1.0 {
        let mut axis = unit_from.cross(Vec3::X);
        if axis.length_squared() < 1e-12 {
            axis = unit_from.cross(Vec3::Y);
        }
        Quat::from_axis_angle(axis.normalize(), std::f32::consts::PI)
    } else {
        let v = unit_from.cross(unit_to);
        let q = Quat::from_xyzw(v.x, v.y, v.z, 1.0 + d);
        let len_sq = q.length_squared();
        if len_sq > 0.0 {
            q / len_sq.sqrt()
        } else {
            Quat::IDENTITY
        }
    }
}

/// Signed X component of the lossy scale of a transform, recovered by stripping the
/// rotation and translation out of its local-to-world matrix.
pub fn lossy_scale_x(local_to_world: &Mat4, position: Vec3, rotation: Quat) -> f32 {
    let rotation_translation = Mat4::from_rotation_translation(rotation, position);
    let scale = local_to_world.inverse() * rotation_translation;
    let inv = scale.x_axis.x;
    if inv.abs() < 1e-12 {
        0.0
    } else {
        1.0 / inv
    }
}

/// Replaces the translation column of a local-to-world matrix.
pub fn with_translation(mut matrix: Mat4, translation: Vec3) -> Mat4 {
    matrix.w_axis = translation.extend(1.0);
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn from_to_rotation_maps_direction() {
        let from = Vec3::new(0.0, -2.0, 0.0);
        let to = Vec3::new(1.0, -1.0, 0.0);
        let q = from_to_rotation(from, to);
        let mapped = q * from.normalize();
        let expected = to.normalize();
        assert_abs_diff_eq!(mapped.x, expected.x, epsilon = 1e-5);
        assert_abs_diff_eq!(mapped.y, expected.y, epsilon = 1e-5);
        assert_abs_diff_eq!(mapped.z, expected.z, epsilon = 1e-5);
    }

    #[test]
    fn from_to_rotation_handles_parallel_and_opposite() {
        assert_eq!(from_to_rotation(Vec3::Y, Vec3::Y * 3.0), Quat::IDENTITY);
        assert_eq!(from_to_rotation(Vec3::ZERO, Vec3::Y), Quat::IDENTITY);

        let flipped = from_to_rotation(Vec3::X, -Vec3::X) * Vec3::X;
        assert_abs_diff_eq!(flipped.x, -1.0, epsilon = 1e-5);
        assert!(flipped.is_finite());
    }

    #[test]
    fn safe_length_snaps_tiny_vectors() {
        assert_eq!(safe_length(Vec3::splat(1e-5)), 0.0);
        assert_abs_diff_eq!(safe_length(Vec3::new(3.0, 4.0, 0.0)), 5.0);
    }

    #[test]
    fn lossy_scale_recovers_uniform_scale() {
        let rotation = Quat::from_rotation_z(0.7);
        let position = Vec3::new(1.0, 2.0, 3.0);
        let matrix = Mat4::from_scale_rotation_translation(Vec3::splat(2.5), rotation, position);
        assert_abs_diff_eq!(lossy_scale_x(&matrix, position, rotation), 2.5, epsilon = 1e-4);
    }
}
