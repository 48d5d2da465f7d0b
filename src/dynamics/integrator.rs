use glam::Vec3;

use crate::collision::narrowphase::resolve_all;
use crate::core::soa::{ChainRowMut, ChainSlab, ColliderSlot, HeadInfo, ParticleInfo};
use crate::dynamics::parallel::for_each_row_in;
use crate::utils::math::{safe_length, safe_normalize4, with_translation};

/// Verlet integrator stepping every chain of a frame.
///
/// Chains run independently; inside a chain particles are visited parent-first once per
/// sub-step, so every child constrains against its parent's already-solved position.
#[derive(Debug, Clone)]
pub struct Integrator {
    pub time_var: f32,
    pub substeps: u32,
    parallel: bool,
}

impl Integrator {
    pub fn new(time_var: f32, substeps: u32) -> Self {
        Self {
            time_var,
            substeps,
            parallel: false,
        }
    }

    pub fn set_parallel(&mut self, enabled: bool) {
        self.parallel = enabled;
    }

    pub fn step(&self, slabs: &mut [ChainSlab]) {
        for_each_row_in(slabs, self.parallel, |row| self.step_row(row));
    }

    pub fn step_row(&self, row: ChainRowMut<'_>) {
        let ChainRowMut {
            head,
            particles,
            colliders,
            ..
        } = row;
        if !head.needs_update {
            return;
        }
        let count = head.particle_count.min(particles.len());
        let particles = &mut particles[..count];

        if self.substeps == 0 {
            self.carry_row(head, particles);
            return;
        }

        for substep in 0..self.substeps {
            // Only the first sub-step sees the anchor's motion.
            let object_move = if substep == 0 { head.object_move } else { Vec3::ZERO };
            for i in 0..particles.len() {
                let (solved, rest) = particles.split_at_mut(i);
                let p = &mut rest[0];
                let Some(parent) = p.parent_index.map(|pi| &solved[pi]) else {
                    p.prev_position = p.position;
                    p.position = p.pose.position;
                    continue;
                };

                verlet(p, object_move, head.frame_force);
                keep_shape(p, parent, head.weight, self.time_var);
                if head.collider_count > 0 {
                    let radius = p.coefficients.radius * head.object_scale;
                    collide(p, colliders, radius);
                }
                freeze(p, parent, head);
                keep_length(p, parent);
            }
        }
    }

    /// Frame without a whole sub-step: particles ride along with the anchor and only the
    /// shape and length constraints run.
    fn carry_row(&self, head: &HeadInfo, particles: &mut [ParticleInfo]) {
        for i in 0..particles.len() {
            let (solved, rest) = particles.split_at_mut(i);
            let p = &mut rest[0];
            let Some(parent) = p.parent_index.map(|pi| &solved[pi]) else {
                p.prev_position = p.position;
                p.position = p.pose.position;
                continue;
            };

            p.prev_position += head.object_move;
            p.position += head.object_move;
            keep_shape(p, parent, head.weight, self.time_var);
            keep_length(p, parent);
        }
    }
}

fn verlet(p: &mut ParticleInfo, object_move: Vec3, force: Vec3) {
    let velocity = p.position - p.prev_position;
    let inertial = object_move * p.coefficients.inert;
    p.prev_position = p.position + inertial;

    let mut damping = p.coefficients.damping;
    if p.collided {
        damping = (damping + p.coefficients.friction).min(1.0);
        p.collided = false;
    }
    p.position += velocity * (1.0 - damping) + force + inertial;
}

/// Pulls the particle toward the pose it would have if rigidly attached to its parent.
fn keep_shape(p: &mut ParticleInfo, parent: &ParticleInfo, weight: f32, time_var: f32) {
    let stiffness = 1.0 + (p.coefficients.stiffness - 1.0) * weight;
    let elasticity = p.coefficients.elasticity;
    if stiffness <= 0.0 && elasticity <= 0.0 {
        return;
    }

    let frame = with_translation(parent.pose.local_to_world, parent.position);
    let rest_position = frame.transform_point3(p.rest_local());
    p.position += (rest_position - p.position) * (elasticity * time_var);

    if stiffness > 0.0 {
        let d = rest_position - p.position;
        let len = safe_length(d);
        let max_len = p.rest_length * (1.0 - stiffness) * 2.0;
        if len > max_len {
            p.position += d * ((len - max_len) / len);
        }
    }
}

fn collide(p: &mut ParticleInfo, colliders: &[ColliderSlot], radius: f32) {
    let active = colliders.iter().filter_map(|slot| slot.prepared.as_ref());
    let (position, hit) = resolve_all(active, p.position, radius);
    p.position = position;
    p.collided |= hit;
}

/// Projects onto the plane through the parent whose normal is one of the parent's axes.
fn freeze(p: &mut ParticleInfo, parent: &ParticleInfo, head: &HeadInfo) {
    let Some(column) = head.freeze_axis.basis_column() else {
        return;
    };
    let normal = safe_normalize4(parent.pose.local_to_world.col(column)).truncate();
    let plane = normal.dot(parent.position);
    p.position -= normal * (normal.dot(p.position) - plane);
}

fn keep_length(p: &mut ParticleInfo, parent: &ParticleInfo) {
    let d = parent.position - p.position;
    let len = safe_length(d);
    if len > 0.0 {
        p.position += d * ((len - p.rest_length) / len);
    }
}
