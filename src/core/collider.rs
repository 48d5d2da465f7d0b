use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::utils::allocator::NodeId;

/// Local axis a capsule is aligned with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    X,
    #[default]
    Y,
    Z,
}

impl Direction {
    pub fn axis(self) -> Vec3 {
        match self {
            Direction::X => Vec3::X,
            Direction::Y => Vec3::Y,
            Direction::Z => Vec3::Z,
        }
    }
}

/// Which side of the surface particles are kept on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bound {
    /// Particles are pushed out of the volume.
    #[default]
    Outside,
    /// Particles are held inside the volume.
    Inside,
}

/// Resolution routine selected for a collider after its world pose is known.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollideType {
    #[default]
    OutsideSphere = 0,
    InsideSphere = 1,
    OutsideCapsule = 2,
    InsideCapsule = 3,
    OutsideTaperedCapsule = 4,
    InsideTaperedCapsule = 5,
}

impl CollideType {
    pub fn code(self) -> u8 {
        self as u8
    }

    fn select(bound: Bound, outside: CollideType, inside: CollideType) -> Self {
        match bound {
            Bound::Outside => outside,
            Bound::Inside => inside,
        }
    }
}

/// World-space cache of a collider, refreshed once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PreparedCollider {
    pub collide_type: CollideType,
    /// Sphere center, or the capsule cap on the positive side of the axis.
    pub c0: Vec3,
    pub c1: Vec3,
    pub radius0: f32,
    pub radius1: f32,
    pub axis_length: f32,
}

/// Analytic collider attached to a scene node.
///
/// A collider is a sphere when its height does not exceed its diameter, a capsule along
/// `direction` otherwise. A non-zero `radius2` that differs from `radius` tapers the
/// capsule: `radius` applies at the positive cap, `radius2` at the negative one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub node: NodeId,
    pub center: Vec3,
    pub direction: Direction,
    pub bound: Bound,
    pub radius: f32,
    pub height: f32,
    pub radius2: f32,
}

impl Collider {
    /// Radii closer than this are treated as a uniform capsule.
    pub const TAPER_EPSILON: f32 = 0.01;

    pub fn builder(node: NodeId) -> ColliderBuilder {
        ColliderBuilder::new(node)
    }

    pub fn is_tapered(&self) -> bool {
        self.radius2 > 0.0 && (self.radius - self.radius2).abs() >= Self::TAPER_EPSILON
    }

    /// Resolves the collider against the owning node's world pose and uniform scale.
    pub fn prepare(&self, position: Vec3, rotation: Quat, scale: f32) -> PreparedCollider {
        let half_height = self.height * 0.5;
        let axis = self.direction.axis();
        let to_world = |local: Vec3| position + rotation * (local * scale);

        if !self.is_tapered() {
            let h = half_height - self.radius;
            let radius = self.radius * scale;
            if h <= 0.0 {
                return sphere(self.bound, to_world(self.center), radius);
            }
            let c0 = to_world(self.center + axis * h);
            let c1 = to_world(self.center - axis * h);
            return PreparedCollider {
                collide_type: CollideType::select(
                    self.bound,
                    CollideType::OutsideCapsule,
                    CollideType::InsideCapsule,
                ),
                c0,
                c1,
                radius0: radius,
                radius1: radius,
                axis_length: c0.distance(c1),
            };
        }

        let widest = self.radius.max(self.radius2);
        if half_height - widest <= 0.0 {
            return sphere(self.bound, to_world(self.center), widest * scale);
        }
        let c0 = to_world(self.center + axis * (half_height - self.radius));
        let c1 = to_world(self.center - axis * (half_height - self.radius2));
        PreparedCollider {
            collide_type: CollideType::select(
                self.bound,
                CollideType::OutsideTaperedCapsule,
                CollideType::InsideTaperedCapsule,
            ),
            c0,
            c1,
            radius0: self.radius * scale,
            radius1: self.radius2 * scale,
            axis_length: c0.distance(c1),
        }
    }
}

fn sphere(bound: Bound, center: Vec3, radius: f32) -> PreparedCollider {
    PreparedCollider {
        collide_type: CollideType::select(bound, CollideType::OutsideSphere, CollideType::InsideSphere),
        c0: center,
        c1: center,
        radius0: radius,
        radius1: radius,
        axis_length: 0.0,
    }
}

pub struct ColliderBuilder {
    node: NodeId,
    center: Vec3,
    direction: Direction,
    bound: Bound,
    radius: f32,
    height: f32,
    radius2: f32,
}

impl ColliderBuilder {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            center: Vec3::ZERO,
            direction: Direction::default(),
            bound: Bound::default(),
            radius: 0.5,
            height: 0.0,
            radius2: 0.0,
        }
    }

    pub fn sphere(mut self, radius: f32) -> Self {
        self.radius = radius;
        self.height = 0.0;
        self.radius2 = 0.0;
        self
    }

    pub fn capsule(mut self, radius: f32, height: f32) -> Self {
        self.radius = radius;
        self.height = height;
        self.radius2 = 0.0;
        self
    }

    pub fn tapered_capsule(mut self, radius: f32, radius2: f32, height: f32) -> Self {
        self.radius = radius;
        self.radius2 = radius2;
        self.height = height;
        self
    }

    pub fn center(mut self, center: Vec3) -> Self {
        self.center = center;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn bound(mut self, bound: Bound) -> Self {
        self.bound = bound;
        self
    }

    pub fn build(self) -> Collider {
        Collider {
            node: self.node,
            center: self.center,
            direction: self.direction,
            bound: self.bound,
            radius: self.radius.max(0.0),
            height: self.height.max(0.0),
            radius2: self.radius2.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn node() -> NodeId {
        NodeId::default()
    }

    #[test]
    fn short_colliders_become_spheres() {
        let prepared = Collider::builder(node())
            .capsule(0.5, 0.8)
            .center(Vec3::new(0.0, 1.0, 0.0))
            .build()
            .prepare(Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY, 2.0);
        assert_eq!(prepared.collide_type.code(), 0);
        assert_abs_diff_eq!(prepared.radius0, 1.0);
        assert_abs_diff_eq!(prepared.c0.y, 2.0);

        let inside = Collider::builder(node())
            .sphere(0.5)
            .bound(Bound::Inside)
            .build()
            .prepare(Vec3::ZERO, Quat::IDENTITY, 1.0);
        assert_eq!(inside.collide_type, CollideType::InsideSphere);
    }

    #[test]
    fn capsule_endpoints_follow_direction() {
        let prepared = Collider::builder(node())
            .capsule(0.25, 2.0)
            .direction(Direction::X)
            .build()
            .prepare(Vec3::ZERO, Quat::IDENTITY, 1.0);
        assert_eq!(prepared.collide_type, CollideType::OutsideCapsule);
        assert_abs_diff_eq!(prepared.c0.x, 0.75);
        assert_abs_diff_eq!(prepared.c1.x, -0.75);
        assert_abs_diff_eq!(prepared.axis_length, 1.5);
    }

    #[test]
    fn nearly_equal_radii_are_not_tapered() {
        let collider = Collider::builder(node())
            .tapered_capsule(0.5, 0.505, 3.0)
            .build();
        assert!(!collider.is_tapered());
        assert_eq!(
            collider.prepare(Vec3::ZERO, Quat::IDENTITY, 1.0).collide_type,
            CollideType::OutsideCapsule
        );
    }

    #[test]
    fn tapered_capsule_uses_per_cap_offsets() {
        let prepared = Collider::builder(node())
            .tapered_capsule(0.5, 0.25, 3.0)
            .bound(Bound::Inside)
            .build()
            .prepare(Vec3::ZERO, Quat::IDENTITY, 1.0);
        assert_eq!(prepared.collide_type.code(), 5);
        assert_abs_diff_eq!(prepared.c0.y, 1.0);
        assert_abs_diff_eq!(prepared.c1.y, -1.25);
        assert_abs_diff_eq!(prepared.radius1, 0.25);
    }

    #[test]
    fn short_tapered_collider_uses_widest_radius() {
        let prepared = Collider::builder(node())
            .tapered_capsule(0.2, 0.6, 1.0)
            .build()
            .prepare(Vec3::ZERO, Quat::IDENTITY, 1.0);
        assert_eq!(prepared.collide_type, CollideType::OutsideSphere);
        assert_abs_diff_eq!(prepared.radius0, 0.6);
    }
}
