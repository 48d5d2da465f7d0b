//! Point-versus-primitive resolution for chain particles.
//!
//! Every routine takes a collider's prepared world cache, a particle position and a particle
//! radius, and returns the corrected position plus whether a correction happened. A particle
//! sitting exactly on a sphere center (or on a capsule axis) has no separating direction and
//! is left alone.

use glam::Vec3;

use crate::core::collider::{CollideType, PreparedCollider};

/// Squared axis lengths below this collapse a capsule onto its first cap.
const AXIS_EPSILON: f32 = 1e-12;

/// Resolves one particle against one collider.
pub fn resolve(collider: &PreparedCollider, position: Vec3, radius: f32) -> (Vec3, bool) {
    let c = collider;
    match c.collide_type {
        CollideType::OutsideSphere => outside_sphere(position, radius, c.c0, c.radius0),
        CollideType::InsideSphere => inside_sphere(position, radius, c.c0, c.radius0),
        CollideType::OutsideCapsule => {
            outside_capsule(position, radius, c.c0, c.c1, c.radius0, c.axis_length)
        }
        CollideType::InsideCapsule => {
            inside_capsule(position, radius, c.c0, c.c1, c.radius0, c.axis_length)
        }
        CollideType::OutsideTaperedCapsule => outside_tapered_capsule(
            position,
            radius,
            c.c0,
            c.c1,
            c.radius0,
            c.radius1,
            c.axis_length,
        ),
        CollideType::InsideTaperedCapsule => inside_tapered_capsule(
            position,
            radius,
            c.c0,
            c.c1,
            c.radius0,
            c.radius1,
            c.axis_length,
        ),
    }
}

/// Runs `position` through `colliders` in slot order and reports whether any of them moved it.
pub fn resolve_all<'a>(
    colliders: impl IntoIterator<Item = &'a PreparedCollider>,
    mut position: Vec3,
    radius: f32,
) -> (Vec3, bool) {
    let mut collided = false;
    for collider in colliders {
        let (resolved, hit) = resolve(collider, position, radius);
        position = resolved;
        collided |= hit;
    }
    (position, collided)
}

fn push_out(center: Vec3, position: Vec3, r: f32) -> (Vec3, bool) {
    let d = position - center;
    let dlen2 = d.length_squared();
    if dlen2 > 0.0 && dlen2 < r * r {
        (center + d * (r / dlen2.sqrt()), true)
    } else {
        (position, false)
    }
}

fn pull_in(center: Vec3, position: Vec3, r: f32) -> (Vec3, bool) {
    let d = position - center;
    let dlen2 = d.length_squared();
    if dlen2 > r * r {
        (center + d * (r / dlen2.sqrt()), true)
    } else {
        (position, false)
    }
}

pub fn outside_sphere(position: Vec3, radius: f32, center: Vec3, sphere_radius: f32) -> (Vec3, bool) {
    push_out(center, position, sphere_radius + radius)
}

pub fn inside_sphere(position: Vec3, radius: f32, center: Vec3, sphere_radius: f32) -> (Vec3, bool) {
    pull_in(center, position, sphere_radius - radius)
}

/// Which part of a capsule a point projects onto.
enum CapsuleRegion {
    Cap0,
    Cap1,
    /// Perpendicular offset from the axis plus the normalized axial position.
    Lateral { offset: Vec3, along: f32 },
}

fn classify(position: Vec3, c0: Vec3, c1: Vec3, axis_length: f32) -> CapsuleRegion {
    let dir = c1 - c0;
    let d = position - c0;
    let t = d.dot(dir);
    let dirlen2 = axis_length * axis_length;
    if t <= 0.0 || dirlen2 < AXIS_EPSILON {
        CapsuleRegion::Cap0
    } else if t >= dirlen2 {
        CapsuleRegion::Cap1
    } else {
        CapsuleRegion::Lateral {
            offset: d - dir * (t / dirlen2),
            along: t / dirlen2,
        }
    }
}

fn push_out_lateral(position: Vec3, offset: Vec3, r: f32) -> (Vec3, bool) {
    let qlen2 = offset.length_squared();
    if qlen2 > 0.0 && qlen2 < r * r {
        let qlen = qlen2.sqrt();
        (position + offset * ((r - qlen) / qlen), true)
    } else {
        (position, false)
    }
}

fn pull_in_lateral(position: Vec3, offset: Vec3, r: f32) -> (Vec3, bool) {
    let qlen2 = offset.length_squared();
    if qlen2 > r * r {
        let qlen = qlen2.sqrt();
        (position + offset * ((r - qlen) / qlen), true)
    } else {
        (position, false)
    }
}

pub fn outside_capsule(
    position: Vec3,
    radius: f32,
    c0: Vec3,
    c1: Vec3,
    capsule_radius: f32,
    axis_length: f32,
) -> (Vec3, bool) {
    let r = capsule_radius + radius;
    match classify(position, c0, c1, axis_length) {
        CapsuleRegion::Cap0 => push_out(c0, position, r),
        CapsuleRegion::Cap1 => push_out(c1, position, r),
        CapsuleRegion::Lateral { offset, .. } => push_out_lateral(position, offset, r),
    }
}

pub fn inside_capsule(
    position: Vec3,
    radius: f32,
    c0: Vec3,
    c1: Vec3,
    capsule_radius: f32,
    axis_length: f32,
) -> (Vec3, bool) {
    let r = capsule_radius - radius;
    match classify(position, c0, c1, axis_length) {
        CapsuleRegion::Cap0 => pull_in(c0, position, r),
        CapsuleRegion::Cap1 => pull_in(c1, position, r),
        CapsuleRegion::Lateral { offset, .. } => pull_in_lateral(position, offset, r),
    }
}

pub fn outside_tapered_capsule(
    position: Vec3,
    radius: f32,
    c0: Vec3,
    c1: Vec3,
    radius0: f32,
    radius1: f32,
    axis_length: f32,
) -> (Vec3, bool) {
    match classify(position, c0, c1, axis_length) {
        CapsuleRegion::Cap0 => push_out(c0, position, radius0 + radius),
        CapsuleRegion::Cap1 => push_out(c1, position, radius1 + radius),
        CapsuleRegion::Lateral { offset, along } => {
            let r = radius0 + (radius1 - radius0) * along + radius;
            push_out_lateral(position, offset, r)
        }
    }
}

pub fn inside_tapered_capsule(
    position: Vec3,
    radius: f32,
    c0: Vec3,
    c1: Vec3,
    radius0: f32,
    radius1: f32,
    axis_length: f32,
) -> (Vec3, bool) {
    match classify(position, c0, c1, axis_length) {
        CapsuleRegion::Cap0 => pull_in(c0, position, radius0 - radius),
        CapsuleRegion::Cap1 => pull_in(c1, position, radius1 - radius),
        CapsuleRegion::Lateral { offset, along } => {
            let r = radius0 + (radius1 - radius0) * along - radius;
            pull_in_lateral(position, offset, r)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collider::{Bound, Collider};
    use crate::utils::allocator::NodeId;
    use approx::assert_abs_diff_eq;
    use glam::Quat;

    fn prepared(collider: Collider) -> PreparedCollider {
        collider.prepare(Vec3::ZERO, Quat::IDENTITY, 1.0)
    }

    #[test]
    fn sphere_center_is_left_unresolved() {
        let sphere = prepared(Collider::builder(NodeId::default()).sphere(1.0).build());
        let (p, hit) = resolve(&sphere, Vec3::ZERO, 0.0);
        assert!(!hit);
        assert!(p.is_finite());
        assert_eq!(p, Vec3::ZERO);
    }

    #[test]
    fn outside_sphere_pushes_to_combined_radius() {
        let sphere = prepared(Collider::builder(NodeId::default()).sphere(1.0).build());
        let dir = Vec3::new(1.0, 2.0, -0.5).normalize();
        let (p, hit) = resolve(&sphere, dir * 0.5 * (1.0 + 0.2), 0.2);
        assert!(hit);
        assert_abs_diff_eq!(p.length(), 1.2, epsilon = 1e-5);
        assert_abs_diff_eq!(p.normalize().dot(dir), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn inside_sphere_pulls_back_to_boundary() {
        let sphere = prepared(
            Collider::builder(NodeId::default())
                .sphere(2.0)
                .bound(Bound::Inside)
                .build(),
        );
        let (p, hit) = resolve(&sphere, Vec3::new(0.0, 5.0, 0.0), 0.5);
        assert!(hit);
        assert_abs_diff_eq!(p.y, 1.5, epsilon = 1e-5);

        let (p, hit) = resolve(&sphere, Vec3::new(0.0, 1.0, 0.0), 0.5);
        assert!(!hit);
        assert_eq!(p, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn capsule_regions_resolve_against_caps_and_side() {
        // Axis runs from (0, 1.5, 0) down to (0, -1.5, 0).
        let capsule = prepared(Collider::builder(NodeId::default()).capsule(0.5, 4.0).build());

        let (side, hit) = resolve(&capsule, Vec3::new(0.2, 0.3, 0.0), 0.0);
        assert!(hit);
        assert_abs_diff_eq!(side.x, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(side.y, 0.3, epsilon = 1e-5);

        let (top, hit) = resolve(&capsule, Vec3::new(0.0, 1.7, 0.0), 0.0);
        assert!(hit);
        assert_abs_diff_eq!(top.y, 2.0, epsilon = 1e-5);

        let (bottom, hit) = resolve(&capsule, Vec3::new(0.0, -1.6, 0.1), 0.0);
        assert!(hit);
        assert_abs_diff_eq!((bottom - Vec3::new(0.0, -1.5, 0.0)).length(), 0.5, epsilon = 1e-5);

        let (far, hit) = resolve(&capsule, Vec3::new(3.0, 0.0, 0.0), 0.0);
        assert!(!hit);
        assert_eq!(far, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn inside_capsule_keeps_particle_within_side() {
        let capsule = prepared(
            Collider::builder(NodeId::default())
                .capsule(1.0, 4.0)
                .bound(Bound::Inside)
                .build(),
        );
        let (p, hit) = resolve(&capsule, Vec3::new(0.0, 0.0, 3.0), 0.25);
        assert!(hit);
        assert_abs_diff_eq!(p.z, 0.75, epsilon = 1e-5);
    }

    #[test]
    fn tapered_capsule_midpoint_uses_interpolated_radius() {
        // Radius 1.0 at the top cap, 0.5 at the bottom cap.
        let capsule = prepared(
            Collider::builder(NodeId::default())
                .tapered_capsule(1.0, 0.5, 6.0)
                .build(),
        );
        let mid = (capsule.c0 + capsule.c1) * 0.5;
        let expected = 0.75;

        let (p, hit) = resolve(&capsule, mid + Vec3::new(0.3, 0.0, 0.0), 0.0);
        assert!(hit);
        assert_abs_diff_eq!((p - mid).length(), expected, epsilon = 1e-5);
        assert_abs_diff_eq!(p.y, mid.y, epsilon = 1e-5);
    }

    #[test]
    fn resolve_all_reports_any_hit() {
        let a = prepared(Collider::builder(NodeId::default()).sphere(1.0).build());
        let b = Collider::builder(NodeId::default())
            .sphere(1.0)
            .build()
            .prepare(Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY, 1.0);
        let (p, hit) = resolve_all([&a, &b], Vec3::new(0.5, 0.0, 0.0), 0.0);
        assert!(hit);
        assert_abs_diff_eq!(p.x, 1.0, epsilon = 1e-5);
    }
}
