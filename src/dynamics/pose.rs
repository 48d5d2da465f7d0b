//! Output pose: rotations derived from simulated positions, and write-back into the scene.

use crate::core::scene::SceneGraph;
use crate::core::soa::{ChainRowMut, ChainSlab};
use crate::dynamics::parallel::for_each_row_in;
use crate::utils::math::from_to_rotation;

/// Turns every single-child parent so its rest bone direction points at its simulated child.
pub fn apply_rotations(slabs: &mut [ChainSlab], parallel: bool) {
    for_each_row_in(slabs, parallel, rotate_row);
}

pub fn rotate_row(mut row: ChainRowMut<'_>) {
    if !row.head.needs_update {
        return;
    }
    let particles = row.live_particles();
    for i in 1..particles.len() {
        let (parents, rest) = particles.split_at_mut(i);
        let child = &rest[0];
        let Some(pi) = child.parent_index else {
            continue;
        };
        let parent = &mut parents[pi];
        if parent.child_count != 1 {
            continue;
        }
        let rest_direction = parent.pose.local_to_world.transform_vector3(child.rest_local());
        let simulated = child.position - parent.position;
        parent.output_rotation = from_to_rotation(rest_direction, simulated) * parent.pose.rotation;
    }
}

/// Writes every slab into the scene one depth level at a time, across all tiers, so a parent
/// is always placed before any of its descendants.
pub fn write_back<S: SceneGraph + ?Sized>(slabs: &[ChainSlab], scene: &mut S) {
    let Some(max_depth) = slabs.iter().filter_map(ChainSlab::max_depth).max() else {
        return;
    };
    for depth in 0..=max_depth {
        for slab in slabs {
            slab.write_back_level(depth, scene);
        }
    }
}

pub fn restore_rest_pose<S: SceneGraph + ?Sized>(slabs: &[ChainSlab], scene: &mut S) {
    for slab in slabs {
        slab.restore_rest_pose(scene);
    }
}
