//! Global configuration constants and scheduler configuration for the Jiggle Chain engine.

use serde::{Deserialize, Serialize};

use crate::core::types::UpdateMode;
use crate::error::{JiggleError, Result};

/// Target simulation rate (steps per second) used when none is configured.
pub const DEFAULT_UPDATE_RATE: f32 = 60.0;

/// Hard cap on integration sub-steps per frame; excess time is discarded.
pub const MAX_SUBSTEPS_PER_FRAME: u32 = 3;

/// Default number of collider slots reserved per chain row.
pub const DEFAULT_MAX_COLLIDERS: usize = 20;

/// Default tiers as `(max_particles_per_chain, max_colliders, max_chains)`.
pub const DEFAULT_TIERS: [(usize, usize, usize); 4] = [
    (20, DEFAULT_MAX_COLLIDERS, 300),
    (50, DEFAULT_MAX_COLLIDERS, 100),
    (100, DEFAULT_MAX_COLLIDERS, 100),
    (200, DEFAULT_MAX_COLLIDERS, 150),
];

/// Default per-chain damping.
pub const DEFAULT_DAMPING: f32 = 0.1;

/// Default per-chain elasticity.
pub const DEFAULT_ELASTICITY: f32 = 0.1;

/// Default per-chain stiffness.
pub const DEFAULT_STIFFNESS: f32 = 0.1;

/// Default blend weight between animation and simulation.
pub const DEFAULT_BLEND_WEIGHT: f32 = 1.0;

/// Capacity of a single slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub max_particles: usize,
    pub max_colliders: usize,
    pub max_chains: usize,
}

impl TierConfig {
    pub fn new(max_particles: usize, max_colliders: usize, max_chains: usize) -> Self {
        Self {
            max_particles,
            max_colliders,
            max_chains,
        }
    }
}

/// Configuration consumed by [`JiggleWorld`](crate::world::JiggleWorld).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tiers in ascending `max_particles` order.
    pub tiers: Vec<TierConfig>,
    pub update_rate: f32,
    pub update_mode: UpdateMode,
    pub parallel: bool,
    /// Warn when one frame of simulation takes longer than this many milliseconds.
    pub frame_budget_ms: Option<f32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tiers: DEFAULT_TIERS
                .iter()
                .map(|&(p, c, h)| TierConfig::new(p, c, h))
                .collect(),
            update_rate: DEFAULT_UPDATE_RATE,
            update_mode: UpdateMode::default(),
            parallel: cfg!(feature = "parallel"),
            frame_budget_ms: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_tiers(mut self, tiers: Vec<TierConfig>) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_update_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = mode;
        self
    }

    pub fn with_update_rate(mut self, rate: f32) -> Self {
        self.update_rate = rate;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_frame_budget(mut self, budget_ms: f32) -> Self {
        self.frame_budget_ms = Some(budget_ms);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            return Err(JiggleError::InvalidConfig("at least one tier is required".into()));
        }
        for (i, tier) in self.tiers.iter().enumerate() {
            if tier.max_particles == 0 || tier.max_colliders == 0 || tier.max_chains == 0 {
                return Err(JiggleError::InvalidConfig(format!(
                    "tier {i} has a zero limit"
                )));
            }
        }
        if self
            .tiers
            .windows(2)
            .any(|w| w[0].max_particles >= w[1].max_particles)
        {
            return Err(JiggleError::InvalidConfig(
                "tiers must be strictly ascending by max_particles".into(),
            ));
        }
        if !self.update_rate.is_finite() {
            return Err(JiggleError::InvalidConfig("update rate must be finite".into()));
        }
        Ok(())
    }
}
