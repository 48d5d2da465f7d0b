pub mod commands;
pub mod timer;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::{
    config::SchedulerConfig,
    core::{
        bone::{ChainSettings, JiggleBone},
        scene::SceneGraph,
        soa::{ChainKey, ChainSlab},
        types::{FrameClock, UpdateMode},
    },
    dynamics::{
        capture::capture_row,
        forces::{ForceGenerator, ForceRegistry},
        integrator::Integrator,
        parallel::for_each_row_in,
        pose::{apply_rotations, restore_rest_pose, write_back},
    },
    error::{JiggleError, Result},
    utils::{
        allocator::{Arena, BoneId, NodeId},
        logging::{frame_over_budget, ScopedTimer},
        profiling::{FrameProfiler, PhaseTimer},
    },
};

use self::commands::{CommandQueue, CommandSender, PendingOp};
use self::timer::{StepPlan, StepTimer};

/// Tiered scheduler owning every registered bone and the slabs their chains run in.
///
/// A frame is three calls: [`pre_update`](Self::pre_update) before host animation,
/// [`late_update`](Self::late_update) after it, and
/// [`after_late_update`](Self::after_late_update) once hierarchy propagation is done.
pub struct JiggleWorld {
    bones: Arena<JiggleBone>,
    tiers: Vec<ChainSlab>,
    /// Rows currently owned by each bone, as `(tier, key)`.
    admitted: HashMap<BoneId, Vec<(usize, ChainKey)>>,
    queue: Arc<Mutex<CommandQueue>>,
    timer: StepTimer,
    forces: ForceRegistry,
    config: SchedulerConfig,
    pre_update_count: u32,
    frame_pending: bool,
    parallel: bool,
    last_plan: StepPlan,
    profiler: FrameProfiler,
}

impl Default for JiggleWorld {
    fn default() -> Self {
        Self::from_validated(SchedulerConfig::default())
    }
}

impl JiggleWorld {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: SchedulerConfig) -> Self {
        let tiers = config
            .tiers
            .iter()
            .enumerate()
            .map(|(i, &tier)| ChainSlab::new(i, tier))
            .collect();
        Self {
            bones: Arena::new(),
            tiers,
            admitted: HashMap::new(),
            queue: Arc::new(Mutex::new(CommandQueue::new())),
            timer: StepTimer::new(config.update_rate, config.update_mode),
            forces: ForceRegistry::new(),
            parallel: config.parallel,
            config,
            pre_update_count: 0,
            frame_pending: false,
            last_plan: StepPlan {
                loops: 0,
                time_var: 1.0,
            },
            profiler: FrameProfiler::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.parallel = enabled;
        self.config.parallel = enabled;
    }

    pub fn parallel_enabled(&self) -> bool {
        self.parallel
    }

    pub fn set_update_mode(&mut self, mode: UpdateMode) {
        self.timer.set_mode(mode);
        self.config.update_mode = mode;
    }

    pub fn set_update_rate(&mut self, rate: f32) {
        self.timer.set_update_rate(rate);
        self.config.update_rate = rate;
    }

    pub fn add_force<F: ForceGenerator + 'static>(&mut self, force: F) {
        self.forces.add_force(force);
    }

    /// Handle for queueing add/remove/update requests from other threads.
    pub fn command_sender(&self) -> CommandSender {
        CommandSender::new(Arc::clone(&self.queue))
    }

    /// Registers a bone and builds its chains from the current scene pose. Admission happens
    /// at the next [`pre_update`](Self::pre_update).
    pub fn add_bone<S: SceneGraph + ?Sized>(
        &mut self,
        owner: NodeId,
        settings: ChainSettings,
        scene: &S,
    ) -> BoneId {
        let mut bone = JiggleBone::new(owner, settings);
        bone.setup_chains(scene);
        let id = BoneId(self.bones.insert(bone));
        self.queue.lock().push(id, PendingOp::Add);
        id
    }

    /// Unregisters a bone. Its rows are evicted, and its nodes parked at rest, at the next
    /// batch point.
    pub fn remove_bone(&mut self, id: BoneId) -> Option<JiggleBone> {
        let bone = self.bones.remove(id.0)?;
        self.queue.lock().push(id, PendingOp::Remove);
        Some(bone)
    }

    /// Queues admission of a registered bone that was disabled.
    pub fn enable_bone(&mut self, id: BoneId) -> Result<()> {
        self.ensure_bone(id)?;
        self.queue.lock().push(id, PendingOp::Add);
        Ok(())
    }

    /// Queues eviction while keeping the bone registered.
    pub fn disable_bone(&mut self, id: BoneId) -> Result<()> {
        self.ensure_bone(id)?;
        self.queue.lock().push(id, PendingOp::Remove);
        Ok(())
    }

    /// Queues a parameter push for a bone whose settings were changed in place.
    pub fn update_bone(&mut self, id: BoneId) -> Result<()> {
        self.ensure_bone(id)?;
        self.queue.lock().push(id, PendingOp::Update);
        Ok(())
    }

    /// Replaces a bone's settings. Root, exclusion or end changes rebuild its chains; the
    /// stale rows are swapped out at the next batch point.
    pub fn apply_settings<S: SceneGraph + ?Sized>(
        &mut self,
        id: BoneId,
        settings: ChainSettings,
        scene: &S,
    ) -> Result<()> {
        let bone = self.bones.get_mut(id.0).ok_or(JiggleError::UnknownBone(id))?;
        if bone.replace_settings(settings, scene) {
            debug!("{id} rebuilt to topology {}", bone.topology());
        }
        self.queue.lock().push(id, PendingOp::Update);
        Ok(())
    }

    pub fn set_weight<S: SceneGraph + ?Sized>(&mut self, id: BoneId, weight: f32, scene: &mut S) -> Result<()> {
        let bone = self.bones.get_mut(id.0).ok_or(JiggleError::UnknownBone(id))?;
        bone.set_weight(weight, scene);
        self.queue.lock().push(id, PendingOp::Update);
        Ok(())
    }

    /// Copies simulated state of every admitted chain back into the bone's own chains.
    pub fn read_bone(&mut self, id: BoneId) -> Result<()> {
        let bone = self.bones.get_mut(id.0).ok_or(JiggleError::UnknownBone(id))?;
        let Some(rows) = self.admitted.get(&id) else {
            return Ok(());
        };
        for &(tier, key) in rows {
            if let Some(chain) = bone.chains_mut().get_mut(key.tree) {
                self.tiers[tier].resync(&key, chain)?;
            }
        }
        Ok(())
    }

    pub fn bone(&self, id: BoneId) -> Option<&JiggleBone> {
        self.bones.get(id.0)
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn is_admitted(&self, id: BoneId) -> bool {
        self.admitted.contains_key(&id)
    }

    pub fn chain_count(&self) -> usize {
        self.tiers.iter().map(ChainSlab::len).sum()
    }

    pub fn tiers(&self) -> &[ChainSlab] {
        &self.tiers
    }

    pub fn profiler(&self) -> &FrameProfiler {
        &self.profiler
    }

    /// Sub-step decision of the most recent frame.
    pub fn last_plan(&self) -> StepPlan {
        self.last_plan
    }

    pub fn last_substeps(&self) -> u32 {
        self.last_plan.loops
    }

    /// Runs a whole frame: batch point, simulation, and write-back.
    pub fn step<S: SceneGraph + Sync + ?Sized>(&mut self, scene: &mut S, clock: &FrameClock) {
        self.pre_update(scene);
        self.late_update(&*scene, clock);
        self.after_late_update(scene);
    }

    /// Applies queued requests, then parks every simulated node at its rest local pose so
    /// the host animation starts from a clean hierarchy.
    pub fn pre_update<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) {
        let _timer = ScopedTimer::new("jiggle::pre_update");
        if self.pre_update_count == 0 {
            self.profiler.reset();
        }
        self.flush_commands(scene);
        {
            let _phase = PhaseTimer::new(&mut self.profiler.restore_time);
            restore_rest_pose(&self.tiers, scene);
        }
        self.pre_update_count += 1;
    }

    /// Captures the animated pose and simulates every row. Does nothing until a
    /// [`pre_update`](Self::pre_update) has run since the previous frame.
    pub fn late_update<S: SceneGraph + Sync + ?Sized>(&mut self, scene: &S, clock: &FrameClock) {
        if self.pre_update_count == 0 {
            return;
        }
        let _timer = ScopedTimer::new("jiggle::late_update");
        let plan = self.timer.plan(clock, self.pre_update_count);
        self.pre_update_count = 0;
        self.last_plan = plan;
        self.profiler.substeps = plan.loops;
        let parallel = self.parallel;

        {
            let _phase = PhaseTimer::new(&mut self.profiler.capture_time);
            for_each_row_in(&mut self.tiers, parallel, |row| capture_row(row, scene));
        }
        {
            let _phase = PhaseTimer::new(&mut self.profiler.force_time);
            self.forces.apply_all(&mut self.tiers, plan.time_var, parallel);
        }
        {
            let _phase = PhaseTimer::new(&mut self.profiler.integrate_time);
            let mut integrator = Integrator::new(plan.time_var, plan.loops);
            integrator.set_parallel(parallel);
            integrator.step(&mut self.tiers);
            apply_rotations(&mut self.tiers, parallel);
        }
        self.frame_pending = true;
    }

    /// Writes simulated poses into the scene, parents before children across every tier.
    pub fn after_late_update<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) {
        if !self.frame_pending {
            return;
        }
        self.frame_pending = false;
        {
            let _timer = ScopedTimer::new("jiggle::write_back");
            let _phase = PhaseTimer::new(&mut self.profiler.write_back_time);
            write_back(&self.tiers, scene);
        }
        self.finish_frame();
    }

    /// Evicts every row, restoring rest poses, and drops pending requests. Registered bones
    /// are kept.
    pub fn shutdown<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) {
        for slab in &mut self.tiers {
            slab.clear(scene);
        }
        self.admitted.clear();
        self.queue.lock().clear();
        self.pre_update_count = 0;
        self.frame_pending = false;
        debug!("jiggle world shut down with {} bones registered", self.bones.len());
    }

    fn finish_frame(&mut self) {
        let profiler = &mut self.profiler;
        profiler.total_frame_time = profiler.restore_time
            + profiler.capture_time
            + profiler.force_time
            + profiler.integrate_time
            + profiler.write_back_time;
        profiler.chain_count = 0;
        profiler.particle_count = 0;
        profiler.collider_count = 0;
        for slab in &self.tiers {
            profiler.chain_count += slab.len();
            for head in slab.heads() {
                profiler.particle_count += head.particle_count;
                profiler.collider_count += head.collider_count;
            }
        }
        profiler.report();
        if let Some(budget) = self.config.frame_budget_ms {
            frame_over_budget(profiler.total_frame_time, budget);
        }
    }

    fn ensure_bone(&self, id: BoneId) -> Result<()> {
        if self.bones.contains(id.0) {
            Ok(())
        } else {
            Err(JiggleError::UnknownBone(id))
        }
    }

    fn flush_commands<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) {
        let ops = self.queue.lock().drain();
        for (id, op) in ops {
            let admitted = self.admitted.contains_key(&id);
            match (op, admitted) {
                (PendingOp::Add, false) | (PendingOp::Refresh, false) => self.admit_bone(id, &*scene),
                (PendingOp::Remove, true) => self.evict_bone(id, scene),
                (PendingOp::Update, true) | (PendingOp::Refresh, true) => self.refresh_bone(id, scene),
                (PendingOp::Add, true) => debug!("{id} is already admitted"),
                (PendingOp::Remove, false) => debug!("{id} is not admitted, nothing to remove"),
                (PendingOp::Update, false) => debug!("{id} is not admitted, update ignored"),
            }
        }
    }

    /// Admits every chain of a bone that currently owns no rows. Verlet state restarts from
    /// the scene's current pose, so time spent disabled never shows up as velocity.
    fn admit_bone<S: SceneGraph + ?Sized>(&mut self, id: BoneId, scene: &S) {
        let Some(bone) = self.bones.get_mut(id.0) else {
            warn!("{}", JiggleError::UnknownBone(id));
            return;
        };
        bone.reset_particle_positions(scene);
        let bone = &*bone;

        let mut rows = Vec::with_capacity(bone.chains().len());
        for (tree, chain) in bone.chains().iter().enumerate() {
            let key = ChainKey {
                bone: id,
                tree,
                topology: bone.topology(),
            };
            let Some(tier) = route(&self.tiers, chain.len()) else {
                let largest = self.tiers.len() - 1;
                warn!(
                    "{}; chain {} is not simulated",
                    JiggleError::CapacityExceeded {
                        tier: largest,
                        limit: self.tiers[largest].config().max_chains,
                    },
                    key
                );
                continue;
            };
            match self.tiers[tier].admit(key, chain, bone) {
                Ok(_) => rows.push((tier, key)),
                Err(err) => warn!("cannot admit chain {key}: {err}"),
            }
        }
        if !rows.is_empty() {
            self.admitted.insert(id, rows);
        }
    }

    fn evict_bone<S: SceneGraph + ?Sized>(&mut self, id: BoneId, scene: &mut S) {
        let Some(rows) = self.admitted.remove(&id) else {
            return;
        };
        for (tier, key) in rows {
            if let Err(err) = self.tiers[tier].evict(&key, scene) {
                warn!("cannot evict chain {key}: {err}");
            }
        }
    }

    fn refresh_bone<S: SceneGraph + ?Sized>(&mut self, id: BoneId, scene: &mut S) {
        let Some(bone) = self.bones.get(id.0) else {
            warn!("{}; evicting its rows", JiggleError::UnknownBone(id));
            self.evict_bone(id, scene);
            return;
        };
        // Rows skipped for capacity at admission stay skipped; only a rebuild readmits.
        let stale = self
            .admitted
            .get(&id)
            .is_some_and(|rows| rows.iter().any(|(_, key)| key.topology != bone.topology()));
        if stale {
            debug!("{id} changed topology, readmitting");
            self.evict_bone(id, scene);
            self.admit_bone(id, &*scene);
            return;
        }

        let Some(rows) = self.admitted.get(&id) else {
            return;
        };
        for &(tier, key) in rows {
            let result = match bone.chains().get(key.tree) {
                Some(chain) => self.tiers[tier].update_parameters(&key, chain, bone),
                None => Err(JiggleError::NotAdmitted(key)),
            };
            if let Err(err) = result {
                warn!("cannot update chain {key}: {err}");
            }
        }
    }
}

/// Smallest tier whose particle ceiling fits `particles`, moving up past full tiers.
/// Chains above every ceiling go to the largest tier.
fn route(tiers: &[ChainSlab], particles: usize) -> Option<usize> {
    let largest = tiers.len().checked_sub(1)?;
    let first = match tiers.iter().position(|t| t.config().max_particles >= particles) {
        Some(tier) => tier,
        None => {
            warn!(
                "{}; placing it in tier {largest}",
                JiggleError::ChainTooLarge {
                    particles,
                    limit: tiers[largest].config().max_particles,
                }
            );
            largest
        }
    };
    (first..tiers.len()).find(|&tier| !tiers[tier].is_full())
}
