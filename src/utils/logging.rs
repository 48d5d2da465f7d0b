//! Log lines for scheduler events and per-phase trace spans.

use log::{debug, log_enabled, trace, warn, Level};
use std::time::{Duration, Instant};

use crate::core::soa::ChainKey;

/// Trace span around one frame phase. Measures nothing unless trace logging is on.
pub struct ScopedTimer {
    phase: &'static str,
    start: Option<Instant>,
}

impl ScopedTimer {
    pub fn new(phase: &'static str) -> Self {
        let start = log_enabled!(Level::Trace).then(Instant::now);
        if start.is_some() {
            trace!("{phase} begin");
        }
        Self { phase, start }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            trace!("{} done in {} µs", self.phase, start.elapsed().as_micros());
        }
    }
}

pub fn chain_admitted(key: &ChainKey, tier: usize, row: usize, particles: usize) {
    debug!("chain {key} admitted to tier {tier} row {row} ({particles} particles)");
}

pub fn chain_evicted(key: &ChainKey, tier: usize) {
    debug!("chain {key} evicted from tier {tier}");
}

/// A hitch produced more whole steps than one frame may run; the remainder was dropped.
pub fn substep_cap_hit(cap: u32, dropped_seconds: f32) {
    debug!("sub-step cap of {cap} reached, dropping {:.2} ms", dropped_seconds * 1000.0);
}

/// Warns and returns `true` when the simulated share of a frame went over `budget_ms`.
pub fn frame_over_budget(simulated: Duration, budget_ms: f32) -> bool {
    let spent_ms = simulated.as_secs_f32() * 1000.0;
    let over = spent_ms > budget_ms;
    if over {
        warn!("jiggle frame took {spent_ms:.2} ms of a {budget_ms:.2} ms budget");
    }
    over
}
