//! Fixed-step timing for the host simulation loop.

use std::time::Duration;

/// Accumulates frame time and hands out fixed simulation ticks.
///
/// The tether components never read a clock themselves; the host loop owns one of
/// these and calls every component's `step(dt)` once per tick it yields.
#[derive(Debug, Clone)]
pub struct FixedClock {
    /// Fixed timestep for physics (default 60 Hz).
    fixed_timestep: Duration,
    /// Accumulated time not yet consumed by ticks.
    accumulator: Duration,
    /// Upper bound on the accumulator so a long stall doesn't trigger a burst of ticks.
    max_backlog: Duration,
    /// Ticks consumed since start.
    tick_count: u64,
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(60.0)
    }
}

impl FixedClock {
    /// Create a clock ticking at `hz` ticks per second.
    pub fn new(hz: f64) -> Self {
        let fixed_timestep = timestep_for(hz);
        Self {
            fixed_timestep,
            accumulator: Duration::ZERO,
            max_backlog: fixed_timestep * 8,
            tick_count: 0,
        }
    }

    /// Add elapsed frame time to the accumulator.
    pub fn advance(&mut self, frame: Duration) {
        self.accumulator = (self.accumulator + frame).min(self.max_backlog);
    }

    /// Check if a fixed tick should run and consume its time.
    pub fn should_step(&mut self) -> bool {
        if self.accumulator >= self.fixed_timestep {
            self.accumulator -= self.fixed_timestep;
            self.tick_count += 1;
            true
        } else {
            false
        }
    }

    /// Get the fixed timestep in seconds.
    pub fn fixed_timestep_seconds(&self) -> f32 {
        self.fixed_timestep.as_secs_f32()
    }

    /// Number of ticks consumed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Simulated time covered by the consumed ticks.
    pub fn simulated_seconds(&self) -> f64 {
        self.fixed_timestep.as_secs_f64() * self.tick_count as f64
    }
}

/// Timestep for a tick rate, at least 1 Hz.
fn timestep_for(hz: f64) -> Duration {
    if !(hz >= 1.0) {
        log::warn!("Tick rate {hz} Hz is below 1 Hz, clamping");
        return Duration::from_secs(1);
    }
    Duration::from_secs_f64(1.0 / hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_one_tick_per_timestep() {
        let mut clock = FixedClock::new(50.0);
        clock.advance(Duration::from_millis(45));
        let mut ticks = 0;
        while clock.should_step() {
            ticks += 1;
        }
        assert_eq!(ticks, 2);
        assert_eq!(clock.tick_count(), 2);
        assert!((clock.simulated_seconds() - 0.04).abs() < 1e-9);
    }

    #[test]
    fn backlog_is_bounded() {
        let mut clock = FixedClock::new(60.0);
        clock.advance(Duration::from_secs(10));
        let mut ticks = 0;
        while clock.should_step() {
            ticks += 1;
        }
        assert_eq!(ticks, 8);
    }

    #[test]
    fn invalid_rate_falls_back_to_one_hz() {
        let clock = FixedClock::new(f64::NAN);
        assert_eq!(clock.fixed_timestep_seconds(), 1.0);
    }
}
