use std::fmt;

use glam::{Mat4, Quat, Vec3};
use log::warn;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::TierConfig;
use crate::core::bone::JiggleBone;
use crate::core::chain::{Particle, ParticleChain, ParticleCoefficients};
use crate::core::collider::{Collider, PreparedCollider};
use crate::core::scene::SceneGraph;
use crate::core::types::FreezeAxis;
use crate::error::{JiggleError, Result};
use crate::utils::allocator::{BoneId, NodeId};
use crate::utils::logging::{chain_admitted, chain_evicted};

/// Identity of one chain inside the scheduler: the owning bone, the chain's index within
/// that bone, and the bone's topology generation when the chain was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainKey {
    pub bone: BoneId,
    pub tree: usize,
    pub topology: u32,
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.bone, self.tree, self.topology)
    }
}

/// Per-row header.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadInfo {
    /// Owner node; object move and scale are measured here.
    pub anchor: NodeId,
    pub root: NodeId,
    pub root_local_to_world: Mat4,
    pub gravity: Vec3,
    pub local_gravity: Vec3,
    /// Configured constant force.
    pub force: Vec3,
    /// Force applied on each integration step this frame.
    pub frame_force: Vec3,
    pub object_move: Vec3,
    pub object_prev_position: Vec3,
    pub object_scale: f32,
    pub weight: f32,
    pub particle_count: usize,
    pub collider_count: usize,
    pub freeze_axis: FreezeAxis,
    pub needs_update: bool,
}

/// What a particle slot stands for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParticleSlot {
    /// Padding past the chain's particle count. Every phase skips it.
    #[default]
    Placeholder,
    Node(NodeId),
    Synthetic,
}

impl ParticleSlot {
    pub fn node(self) -> Option<NodeId> {
        match self {
            ParticleSlot::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn is_placeholder(self) -> bool {
        matches!(self, ParticleSlot::Placeholder)
    }
}

/// Scene pose snapshot taken during capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturedPose {
    pub position: Vec3,
    pub rotation: Quat,
    pub local_position: Vec3,
    pub local_to_world: Mat4,
}

impl Default for CapturedPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            local_position: Vec3::ZERO,
            local_to_world: Mat4::IDENTITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleInfo {
    pub slot: ParticleSlot,
    /// Parent index within the same row.
    pub parent_index: Option<usize>,
    pub child_count: usize,
    pub depth: usize,
    pub coefficients: ParticleCoefficients,
    pub rest_length: f32,
    pub collided: bool,
    pub position: Vec3,
    pub prev_position: Vec3,
    pub end_offset: Vec3,
    pub init_local_position: Vec3,
    pub init_local_rotation: Quat,
    pub pose: CapturedPose,
    /// World rotation written back for this particle's node.
    pub output_rotation: Quat,
}

impl ParticleInfo {
    pub fn placeholder() -> Self {
        Self::default()
    }

    fn from_particle(p: &Particle) -> Self {
        Self {
            slot: match p.node {
                Some(node) => ParticleSlot::Node(node),
                None => ParticleSlot::Synthetic,
            },
            parent_index: p.parent_index,
            child_count: 0,
            depth: p.depth,
            coefficients: p.coefficients,
            rest_length: p.rest_length,
            collided: p.collided,
            position: p.position,
            prev_position: p.prev_position,
            end_offset: p.end_offset,
            init_local_position: p.init_local_position,
            init_local_rotation: p.init_local_rotation,
            pose: CapturedPose {
                position: p.position,
                local_position: p.init_local_position,
                local_to_world: p.local_to_world,
                ..CapturedPose::default()
            },
            output_rotation: Quat::IDENTITY,
        }
    }

    /// Local point the keep-shape target is derived from.
    pub fn rest_local(&self) -> Vec3 {
        match self.slot {
            ParticleSlot::Node(_) => self.pose.local_position,
            _ => self.end_offset,
        }
    }
}

/// Collider slot. Inactive slots carry no descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColliderSlot {
    pub descriptor: Option<Collider>,
    pub prepared: Option<PreparedCollider>,
}

impl ColliderSlot {
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.descriptor.is_some()
    }
}

/// Mutable view over one row of a slab.
pub struct ChainRowMut<'a> {
    pub key: &'a ChainKey,
    pub head: &'a mut HeadInfo,
    pub particles: &'a mut [ParticleInfo],
    pub colliders: &'a mut [ColliderSlot],
}

impl ChainRowMut<'_> {
    /// Non-placeholder particles.
    pub fn live_particles(&mut self) -> &mut [ParticleInfo] {
        let count = self.head.particle_count.min(self.particles.len());
        &mut self.particles[..count]
    }
}

/// Fixed-capacity struct-of-arrays batch of chains.
///
/// Every row owns exactly `max_particles` particle slots and `max_colliders` collider slots,
/// so chains never share a block. Removal swaps the last row into the hole; row indices are
/// only meaningful between structural changes, keys are stable.
#[derive(Debug, Clone)]
pub struct ChainSlab {
    tier: usize,
    config: TierConfig,
    keys: Vec<ChainKey>,
    heads: Vec<HeadInfo>,
    particles: Vec<ParticleInfo>,
    colliders: Vec<ColliderSlot>,
    /// Flat particle indices grouped by depth.
    levels: Vec<Vec<usize>>,
}

impl ChainSlab {
    /// Empty slab for one tier. Every ceiling in `config` must be non-zero, as
    /// [`SchedulerConfig::validate`](crate::config::SchedulerConfig::validate) requires.
    pub fn new(tier: usize, config: TierConfig) -> Self {
        assert!(
            config.max_particles > 0 && config.max_colliders > 0 && config.max_chains > 0,
            "tier {tier} has a zero capacity: {config:?}"
        );
        Self {
            tier,
            config,
            keys: Vec::with_capacity(config.max_chains),
            heads: Vec::with_capacity(config.max_chains),
            particles: Vec::new(),
            colliders: Vec::new(),
            levels: Vec::new(),
        }
    }

    pub fn tier(&self) -> usize {
        self.tier
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.config.max_chains
    }

    pub fn contains(&self, key: &ChainKey) -> bool {
        self.row_of(key).is_some()
    }

    pub fn row_of(&self, key: &ChainKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn keys(&self) -> &[ChainKey] {
        &self.keys
    }

    pub fn heads(&self) -> &[HeadInfo] {
        &self.heads
    }

    pub fn head(&self, key: &ChainKey) -> Option<&HeadInfo> {
        self.row_of(key).map(|row| &self.heads[row])
    }

    /// Live particles of the chain stored under `key`.
    pub fn particles(&self, key: &ChainKey) -> Option<&[ParticleInfo]> {
        let row = self.row_of(key)?;
        let start = row * self.config.max_particles;
        Some(&self.particles[start..start + self.heads[row].particle_count])
    }

    pub fn colliders(&self, key: &ChainKey) -> Option<&[ColliderSlot]> {
        let row = self.row_of(key)?;
        let start = row * self.config.max_colliders;
        Some(&self.colliders[start..start + self.config.max_colliders])
    }

    pub fn particle_slots(&self) -> usize {
        self.particles.len()
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.levels.len().checked_sub(1)
    }

    /// Appends a row for `chain`.
    pub fn admit(&mut self, key: ChainKey, chain: &ParticleChain, bone: &JiggleBone) -> Result<usize> {
        if self.is_full() {
            warn!(
                "tier {} is full ({} chains), cannot admit {}",
                self.tier, self.config.max_chains, key
            );
            return Err(JiggleError::CapacityExceeded {
                tier: self.tier,
                limit: self.config.max_chains,
            });
        }
        if self.contains(&key) {
            return Err(JiggleError::AlreadyAdmitted(key));
        }

        let max_particles = self.config.max_particles;
        let count = chain.len().min(max_particles);
        if chain.len() > max_particles {
            warn!(
                "chain {} has {} particles, tier {} keeps the first {}",
                key,
                chain.len(),
                self.tier,
                max_particles
            );
        }

        let row = self.keys.len();
        let base = self.particles.len();
        self.particles.extend(
            chain.particles[..count]
                .iter()
                .map(ParticleInfo::from_particle),
        );
        self.particles
            .resize(base + max_particles, ParticleInfo::placeholder());
        // Recount children inside the kept prefix.
        for i in 1..count {
            if let Some(parent) = self.particles[base + i].parent_index {
                self.particles[base + parent].child_count += 1;
            }
        }

        let (slots, collider_count) = self.collider_row(&key, bone);
        self.colliders.extend(slots);
        self.keys.push(key);
        self.heads.push(HeadInfo {
            anchor: bone.owner(),
            root: chain.root,
            root_local_to_world: chain.root_world_to_local.inverse(),
            gravity: bone.settings().gravity,
            local_gravity: chain.local_gravity,
            force: bone.settings().force,
            frame_force: Vec3::ZERO,
            object_move: Vec3::ZERO,
            object_prev_position: bone.object_prev_position(),
            object_scale: bone.object_scale(),
            weight: bone.weight(),
            particle_count: count,
            collider_count,
            freeze_axis: bone.settings().freeze_axis,
            needs_update: count > 0 && bone.weight() > 0.0,
        });
        self.rebuild_levels();
        chain_admitted(&key, self.tier, row, count);
        Ok(row)
    }

    fn collider_row(&self, key: &ChainKey, bone: &JiggleBone) -> (Vec<ColliderSlot>, usize) {
        let requested = &bone.settings().colliders;
        if requested.len() > self.config.max_colliders {
            warn!(
                "chain {} references {} colliders, only {} fit",
                key,
                requested.len(),
                self.config.max_colliders
            );
        }
        let mut slots = Vec::with_capacity(self.config.max_colliders);
        let mut active = 0;
        for i in 0..self.config.max_colliders {
            let slot = match requested.get(i) {
                Some(Some(collider)) => {
                    active += 1;
                    ColliderSlot {
                        descriptor: Some(*collider),
                        prepared: None,
                    }
                }
                Some(None) => {
                    warn!("chain {} has a missing collider in slot {}", key, i);
                    ColliderSlot::inactive()
                }
                None => ColliderSlot::inactive(),
            };
            slots.push(slot);
        }
        (slots, active)
    }

    /// Removes the row for `key`, parking its nodes at their rest pose first.
    pub fn evict<S: SceneGraph + ?Sized>(&mut self, key: &ChainKey, scene: &mut S) -> Result<()> {
        let row = self.row_of(key).ok_or(JiggleError::NotAdmitted(*key))?;
        let mp = self.config.max_particles;
        let mc = self.config.max_colliders;

        for p in &self.particles[row * mp..(row + 1) * mp] {
            if let ParticleSlot::Node(node) = p.slot {
                scene.set_local_position(node, p.init_local_position);
                scene.set_local_rotation(node, p.init_local_rotation);
            }
        }

        let last = self.keys.len() - 1;
        if row != last {
            for i in 0..mp {
                self.particles.swap(row * mp + i, last * mp + i);
            }
            for i in 0..mc {
                self.colliders.swap(row * mc + i, last * mc + i);
            }
        }
        self.particles.truncate(last * mp);
        self.colliders.truncate(last * mc);
        self.keys.swap_remove(row);
        self.heads.swap_remove(row);
        self.rebuild_levels();
        chain_evicted(key, self.tier);
        Ok(())
    }

    /// Copies simulated state back into `chain`.
    pub fn resync(&self, key: &ChainKey, chain: &mut ParticleChain) -> Result<()> {
        let row = self.row_of(key).ok_or(JiggleError::NotAdmitted(*key))?;
        let start = row * self.config.max_particles;
        let count = self.heads[row].particle_count.min(chain.len());
        for (info, particle) in self.particles[start..start + count]
            .iter()
            .zip(chain.particles.iter_mut())
        {
            particle.position = info.position;
            particle.prev_position = info.prev_position;
            particle.collided = info.collided;
            particle.local_to_world = info.pose.local_to_world;
        }
        Ok(())
    }

    /// Pushes coefficients, colliders, gravity, force, weight and freeze axis into an existing
    /// row. Simulated positions are kept unless the weight leaves zero.
    pub fn update_parameters(&mut self, key: &ChainKey, chain: &ParticleChain, bone: &JiggleBone) -> Result<()> {
        let row = self.row_of(key).ok_or(JiggleError::NotAdmitted(*key))?;
        let mp = self.config.max_particles;
        let mc = self.config.max_colliders;

        let restart = self.heads[row].weight == 0.0 && bone.weight() > 0.0;
        let count = self.heads[row].particle_count.min(chain.len());
        for (info, particle) in self.particles[row * mp..row * mp + count]
            .iter_mut()
            .zip(&chain.particles)
        {
            info.coefficients = particle.coefficients;
            if restart {
                info.position = particle.position;
                info.prev_position = particle.prev_position;
                info.collided = false;
            }
        }

        let (slots, collider_count) = self.collider_row(key, bone);
        self.colliders[row * mc..(row + 1) * mc].copy_from_slice(&slots);

        let settings = bone.settings();
        let head = &mut self.heads[row];
        head.gravity = settings.gravity;
        head.local_gravity = chain.local_gravity;
        head.force = settings.force;
        head.weight = bone.weight();
        head.freeze_axis = settings.freeze_axis;
        head.collider_count = collider_count;
        head.needs_update = head.particle_count > 0 && head.weight > 0.0;
        if restart {
            head.object_prev_position = bone.object_prev_position();
            head.object_move = Vec3::ZERO;
        }
        Ok(())
    }

    /// Writes the rest local pose of every node in the slab.
    pub fn restore_rest_pose<S: SceneGraph + ?Sized>(&self, scene: &mut S) {
        for p in &self.particles {
            if let ParticleSlot::Node(node) = p.slot {
                scene.set_local_position(node, p.init_local_position);
                scene.set_local_rotation(node, p.init_local_rotation);
            }
        }
    }

    /// Writes simulated positions and rotations for every particle at `depth`.
    pub fn write_back_level<S: SceneGraph + ?Sized>(&self, depth: usize, scene: &mut S) {
        let Some(level) = self.levels.get(depth) else {
            return;
        };
        let mp = self.config.max_particles;
        for &index in level {
            if !self.heads[index / mp].needs_update {
                continue;
            }
            let p = &self.particles[index];
            let ParticleSlot::Node(node) = p.slot else {
                continue;
            };
            if p.child_count == 1 {
                scene.set_world_rotation(node, p.output_rotation);
            }
            if p.parent_index.is_some() {
                scene.set_world_position(node, p.position);
            }
        }
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = ChainRowMut<'_>> {
        let mp = self.config.max_particles;
        let mc = self.config.max_colliders;
        self.keys
            .iter()
            .zip(self.heads.iter_mut())
            .zip(self.particles.chunks_mut(mp))
            .zip(self.colliders.chunks_mut(mc))
            .map(|(((key, head), particles), colliders)| ChainRowMut {
                key,
                head,
                particles,
                colliders,
            })
    }

    #[cfg(feature = "parallel")]
    pub fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = ChainRowMut<'_>> {
        let mp = self.config.max_particles;
        let mc = self.config.max_colliders;
        self.keys
            .par_iter()
            .zip(self.heads.par_iter_mut())
            .zip(self.particles.par_chunks_mut(mp))
            .zip(self.colliders.par_chunks_mut(mc))
            .map(|(((key, head), particles), colliders)| ChainRowMut {
                key,
                head,
                particles,
                colliders,
            })
    }

    /// Evicts every row, restoring rest poses.
    pub fn clear<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) {
        self.restore_rest_pose(scene);
        self.keys.clear();
        self.heads.clear();
        self.particles.clear();
        self.colliders.clear();
        self.levels.clear();
    }

    fn rebuild_levels(&mut self) {
        self.levels.clear();
        let mp = self.config.max_particles;
        for (row, head) in self.heads.iter().enumerate() {
            for local in 0..head.particle_count {
                let index = row * mp + local;
                let depth = self.particles[index].depth;
                if self.levels.len() <= depth {
                    self.levels.resize_with(depth + 1, Vec::new);
                }
                self.levels[depth].push(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bone::ChainSettings;
    use crate::core::scene::TransformHierarchy;
    use crate::core::types::Transform;

    fn bone_with_links(scene: &mut TransformHierarchy, links: usize) -> JiggleBone {
        let owner = scene.create_node("owner", None, Transform::default());
        let mut parent = owner;
        for i in 0..links {
            parent = scene.create_node(
                format!("link{i}"),
                Some(parent),
                Transform::from_position(Vec3::new(0.0, -1.0, 0.0)),
            );
        }
        let mut bone = JiggleBone::new(owner, ChainSettings::default().with_root(owner));
        bone.setup_chains(scene);
        bone
    }

    fn key(bone: u32) -> ChainKey {
        ChainKey {
            bone: BoneId(crate::utils::allocator::EntityId::new(bone as usize, 0)),
            tree: 0,
            topology: 1,
        }
    }

    #[test]
    fn admit_pads_rows_to_fixed_size() {
        let mut scene = TransformHierarchy::new();
        let bone = bone_with_links(&mut scene, 3);
        let mut slab = ChainSlab::new(0, TierConfig::new(8, 2, 4));

        let row = slab.admit(key(0), &bone.chains()[0], &bone).unwrap();
        assert_eq!(row, 0);
        assert_eq!(slab.particle_slots(), 8);
        assert_eq!(slab.particles(&key(0)).unwrap().len(), 4);
        assert_eq!(slab.colliders(&key(0)).unwrap().len(), 2);
        assert!(slab.head(&key(0)).unwrap().needs_update);
        assert_eq!(slab.max_depth(), Some(3));

        assert_eq!(
            slab.admit(key(0), &bone.chains()[0], &bone),
            Err(JiggleError::AlreadyAdmitted(key(0)))
        );
    }

    #[test]
    fn admit_fails_when_full() {
        let mut scene = TransformHierarchy::new();
        let bone = bone_with_links(&mut scene, 1);
        let mut slab = ChainSlab::new(3, TierConfig::new(4, 1, 1));
        slab.admit(key(0), &bone.chains()[0], &bone).unwrap();
        assert_eq!(
            slab.admit(key(1), &bone.chains()[0], &bone),
            Err(JiggleError::CapacityExceeded { tier: 3, limit: 1 })
        );
    }

    #[test]
    fn oversized_chains_keep_a_parent_closed_prefix() {
        let mut scene = TransformHierarchy::new();
        let bone = bone_with_links(&mut scene, 5);
        let mut slab = ChainSlab::new(0, TierConfig::new(3, 1, 2));
        slab.admit(key(0), &bone.chains()[0], &bone).unwrap();

        let particles = slab.particles(&key(0)).unwrap();
        assert_eq!(particles.len(), 3);
        assert_eq!(particles[2].child_count, 0);
        assert_eq!(particles[1].child_count, 1);
    }

    #[test]
    fn evict_swaps_last_row_into_place() {
        let mut scene = TransformHierarchy::new();
        let a = bone_with_links(&mut scene, 2);
        let b = bone_with_links(&mut scene, 1);
        let mut slab = ChainSlab::new(0, TierConfig::new(4, 1, 4));
        slab.admit(key(0), &a.chains()[0], &a).unwrap();
        slab.admit(key(1), &b.chains()[0], &b).unwrap();

        slab.evict(&key(0), &mut scene).unwrap();
        assert_eq!(slab.len(), 1);
        assert_eq!(slab.row_of(&key(1)), Some(0));
        assert_eq!(slab.particles(&key(1)).unwrap().len(), 2);
        assert_eq!(slab.particle_slots(), 4);
        assert_eq!(slab.evict(&key(0), &mut scene), Err(JiggleError::NotAdmitted(key(0))));
    }

    #[test]
    fn missing_colliders_become_inactive_slots() {
        let mut scene = TransformHierarchy::new();
        let mut bone = bone_with_links(&mut scene, 1);
        let collider = Collider::builder(bone.owner()).sphere(0.5).build();
        let mut settings = bone.settings().clone();
        settings.colliders = vec![None, Some(collider)];
        bone.replace_settings(settings, &scene);

        let mut slab = ChainSlab::new(0, TierConfig::new(4, 3, 1));
        slab.admit(key(0), &bone.chains()[0], &bone).unwrap();
        let slots = slab.colliders(&key(0)).unwrap();
        assert!(!slots[0].is_active());
        assert!(slots[1].is_active());
        assert!(!slots[2].is_active());
        assert_eq!(slab.head(&key(0)).unwrap().collider_count, 1);
    }

    #[test]
    fn unknown_keys_are_reported() {
        let mut scene = TransformHierarchy::new();
        let mut bone = bone_with_links(&mut scene, 1);
        let slab = ChainSlab::new(0, TierConfig::new(4, 1, 1));
        let missing = key(9);
        let chain = &mut bone.chains_mut()[0];
        assert_eq!(slab.resync(&missing, chain), Err(JiggleError::NotAdmitted(missing)));
    }

    #[test]
    #[should_panic(expected = "zero capacity")]
    fn zero_capacity_tier_is_rejected() {
        ChainSlab::new(0, TierConfig::new(4, 0, 1));
    }
}
