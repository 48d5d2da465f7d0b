use log::trace;

use crate::config::MAX_SUBSTEPS_PER_FRAME;
use crate::core::types::{FrameClock, UpdateMode};
use crate::utils::logging::substep_cap_hit;

/// Slack when comparing accumulated time against one step, so a frame of exactly one step
/// is not lost to rounding.
const TIME_EPSILON: f32 = 1e-6;

/// Sub-step decision for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPlan {
    /// Integration passes to run; zero means carry-only.
    pub loops: u32,
    /// Scale applied to forces and elasticity.
    pub time_var: f32,
}

/// Turns frame time into sub-steps at a target rate, carrying leftover time across frames.
#[derive(Debug, Clone)]
pub struct StepTimer {
    accumulator: f32,
    update_rate: f32,
    mode: UpdateMode,
}

impl StepTimer {
    pub fn new(update_rate: f32, mode: UpdateMode) -> Self {
        Self {
            accumulator: 0.0,
            update_rate,
            mode,
        }
    }

    pub fn update_rate(&self) -> f32 {
        self.update_rate
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    pub fn set_update_rate(&mut self, rate: f32) {
        self.update_rate = rate;
    }

    pub fn set_mode(&mut self, mode: UpdateMode) {
        if self.mode != mode {
            self.accumulator = 0.0;
        }
        self.mode = mode;
    }

    /// Elapsed time for this frame under the current mode. `ticks` is the number of
    /// pre-update passes seen since the last frame.
    pub fn frame_delta(&self, clock: &FrameClock, ticks: u32) -> f32 {
        match self.mode {
            UpdateMode::Default | UpdateMode::Normal => clock.delta_time,
            UpdateMode::UnscaledTime => clock.unscaled_delta_time,
            UpdateMode::FixedStep => clock.fixed_delta_time * ticks as f32,
        }
    }

    pub fn plan(&mut self, clock: &FrameClock, ticks: u32) -> StepPlan {
        let dt = self.frame_delta(clock, ticks);
        let plan = match self.mode {
            UpdateMode::Default => StepPlan {
                loops: 1,
                time_var: if self.update_rate > 0.0 {
                    dt * self.update_rate
                } else {
                    1.0
                },
            },
            _ if self.update_rate <= 0.0 => StepPlan {
                loops: 1,
                time_var: 1.0,
            },
            _ => {
                let frame_time = 1.0 / self.update_rate;
                self.accumulator += dt;
                let mut loops = 0;
                while self.accumulator + TIME_EPSILON >= frame_time {
                    self.accumulator -= frame_time;
                    loops += 1;
                    if loops >= MAX_SUBSTEPS_PER_FRAME {
                        substep_cap_hit(MAX_SUBSTEPS_PER_FRAME, self.accumulator);
                        self.accumulator = 0.0;
                        break;
                    }
                }
                StepPlan {
                    loops,
                    time_var: 1.0,
                }
            }
        };
        trace!(
            "step plan: dt {dt:.5}, loops {}, time_var {:.4}, carry {:.5}",
            plan.loops,
            plan.time_var,
            self.accumulator
        );
        plan
    }
}
