use log::debug;
use std::time::{Duration, Instant};

/// Per-frame timing and occupancy data collected by the world.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameProfiler {
    pub restore_time: Duration,
    pub capture_time: Duration,
    pub force_time: Duration,
    pub integrate_time: Duration,
    pub write_back_time: Duration,
    pub total_frame_time: Duration,

    pub chain_count: usize,
    pub particle_count: usize,
    pub collider_count: usize,
    pub substeps: u32,
}

impl FrameProfiler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn report(&self) {
        let total_us = self.total_frame_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        let share = |d: Duration| (d.as_micros() as f32 / total_us) * 100.0;
        debug!(
            "jiggle frame: {:.2} ms, chains {}, particles {}, colliders {}, substeps {}",
            self.total_frame_time.as_secs_f32() * 1000.0,
            self.chain_count,
            self.particle_count,
            self.collider_count,
            self.substeps
        );
        debug!(
            "  restore {:.1}% capture {:.1}% forces {:.1}% integrate {:.1}% write-back {:.1}%",
            share(self.restore_time),
            share(self.capture_time),
            share(self.force_time),
            share(self.integrate_time),
            share(self.write_back_time)
        );
    }
}

/// Adds the elapsed time of a scope onto a profiler field.
pub struct PhaseTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for PhaseTimer<'a> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
