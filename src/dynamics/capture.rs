//! Pose capture: snapshots scene transforms into slab rows and refreshes collider caches.

use crate::core::scene::SceneGraph;
use crate::core::soa::{ChainRowMut, ParticleSlot};

/// Reads the current scene pose of every node a row references.
pub fn capture_row<S: SceneGraph + ?Sized>(row: ChainRowMut<'_>, scene: &S) {
    let ChainRowMut {
        head,
        particles,
        colliders,
        ..
    } = row;
    let count = head.particle_count.min(particles.len());

    for p in &mut particles[..count] {
        if let ParticleSlot::Node(node) = p.slot {
            p.pose.position = scene.world_position(node);
            p.pose.rotation = scene.world_rotation(node);
            p.pose.local_position = scene.local_position(node);
            p.pose.local_to_world = scene.local_to_world(node);
        }
        p.output_rotation = p.pose.rotation;
    }
    if count > 0 {
        head.root_local_to_world = particles[0].pose.local_to_world;
    }

    if head.needs_update {
        head.object_scale = scene.lossy_scale(head.anchor).abs();
        let position = scene.world_position(head.anchor);
        head.object_move = position - head.object_prev_position;
        head.object_prev_position = position;
    }

    for slot in colliders.iter_mut() {
        slot.prepared = match slot.descriptor {
            Some(collider) if scene.contains(collider.node) => Some(collider.prepare(
                scene.world_position(collider.node),
                scene.world_rotation(collider.node),
                scene.lossy_scale(collider.node).abs(),
            )),
            _ => None,
        };
    }
}
