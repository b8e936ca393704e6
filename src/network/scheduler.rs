//! Fixed-Step Scheduling
//!
//! Decouples simulation ticks from the frame callback. A frame reports how
//! much time passed; the scheduler says how many whole ticks to run and how
//! far into the next tick the frame sits. Catch-up is bounded, and excess
//! time is dropped rather than replayed, like `MissedTickBehavior::Skip`.

use tracing::debug;

use crate::core::clock::Clock;

/// Outcome of one `advance` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    /// Ticks to run now
    pub steps: u32,
    /// Fraction of the next tick already elapsed, in `[0, 1)`
    pub alpha: f32,
}

/// Accumulator-based fixed-step scheduler.
#[derive(Debug, Clone)]
pub struct FixedStepScheduler {
    step_ms: u64,
    max_steps: u32,
    accumulator_ms: u64,
    dropped_ms: u64,
}

impl FixedStepScheduler {
    /// Scheduler with `step_ms` ticks and at most `max_steps` per advance.
    pub fn new(step_ms: u32, max_steps: u32) -> Self {
        Self {
            step_ms: u64::from(step_ms.max(1)),
            max_steps: max_steps.max(1),
            accumulator_ms: 0,
            dropped_ms: 0,
        }
    }

    /// Add elapsed time and return the ticks due.
    pub fn advance(&mut self, dt_ms: u64) -> Advance {
        self.accumulator_ms += dt_ms;

        let mut steps = 0;
        while self.accumulator_ms >= self.step_ms && steps < self.max_steps {
            self.accumulator_ms -= self.step_ms;
            steps += 1;
        }

        if self.accumulator_ms >= self.step_ms {
            let excess = self.accumulator_ms - self.accumulator_ms % self.step_ms;
            self.dropped_ms += excess;
            self.accumulator_ms -= excess;
            debug!(dropped_ms = excess, "Scheduler fell behind, skipping ticks");
        }

        Advance {
            steps,
            alpha: self.accumulator_ms as f32 / self.step_ms as f32,
        }
    }

    /// Tick length.
    pub fn step_ms(&self) -> u64 {
        self.step_ms
    }

    /// Total time skipped after stalls.
    pub fn dropped_ms(&self) -> u64 {
        self.dropped_ms
    }

    /// Forget accumulated time.
    pub fn reset(&mut self) {
        self.accumulator_ms = 0;
    }
}

/// Frame delta source over an injectable [`Clock`].
#[derive(Debug)]
pub struct FrameClock<C: Clock> {
    clock: C,
    last_ms: Option<u64>,
}

impl<C: Clock> FrameClock<C> {
    /// Wrap a clock.
    pub fn new(clock: C) -> Self {
        Self { clock, last_ms: None }
    }

    /// Milliseconds since the previous call (0 on the first call).
    pub fn delta_ms(&mut self) -> u64 {
        let now = self.clock.now_ms();
        let dt = self.last_ms.map_or(0, |last| now.saturating_sub(last));
        self.last_ms = Some(now);
        dt
    }

    /// Current clock reading.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

/// Rate limiter for outgoing broadcasts.
#[derive(Debug, Clone)]
pub struct SendThrottle {
    interval_ms: u64,
    last_sent_ms: Option<u64>,
}

impl SendThrottle {
    /// At most one send per `interval_ms`.
    pub fn new(interval_ms: u32) -> Self {
        Self { interval_ms: u64::from(interval_ms), last_sent_ms: None }
    }

    /// Returns true and records the send if the interval elapsed.
    pub fn ready(&mut self, now_ms: u64) -> bool {
        match self.last_sent_ms {
            Some(last) if now_ms.saturating_sub(last) < self.interval_ms => false,
            _ => {
                self.last_sent_ms = Some(now_ms);
                true
            }
        }
    }

    /// Record a send made outside the throttle.
    pub fn mark(&mut self, now_ms: u64) {
        self.last_sent_ms = Some(now_ms);
    }

    /// Next call to `ready` succeeds.
    pub fn reset(&mut self) {
        self.last_sent_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    #[test]
    fn test_accumulates_fractional_frames() {
        let mut sched = FixedStepScheduler::new(100, 5);
        assert_eq!(sched.advance(60).steps, 0);
        let adv = sched.advance(60);
        assert_eq!(adv.steps, 1);
        assert!((adv.alpha - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_frame_rate_independent() {
        let mut fast = FixedStepScheduler::new(100, 5);
        let mut slow = FixedStepScheduler::new(100, 5);
        let fast_steps: u32 = (0..60).map(|_| fast.advance(16).steps).sum();
        let slow_steps: u32 = (0..32).map(|_| slow.advance(30).steps).sum();
        assert_eq!(fast_steps, 9);
        assert_eq!(slow_steps, 9);
    }

    #[test]
    fn test_bounded_catch_up() {
        let mut sched = FixedStepScheduler::new(100, 5);
        let adv = sched.advance(10_050);
        assert_eq!(adv.steps, 5);
        assert!((adv.alpha - 0.5).abs() < 1e-6);
        assert_eq!(sched.dropped_ms(), 9_500);
        assert_eq!(sched.advance(0).steps, 0);
    }

    #[test]
    fn test_frame_clock_deltas() {
        let clock = ManualClock::new(1_000);
        let mut frames = FrameClock::new(&clock);
        assert_eq!(frames.delta_ms(), 0);
        clock.advance(16);
        assert_eq!(frames.delta_ms(), 16);
        clock.advance(34);
        assert_eq!(frames.delta_ms(), 34);
    }

    #[test]
    fn test_send_throttle() {
        let mut throttle = SendThrottle::new(100);
        assert!(throttle.ready(0));
        assert!(!throttle.ready(50));
        assert!(throttle.ready(100));
        assert!(!throttle.ready(199));
        throttle.reset();
        assert!(throttle.ready(199));
    }
}
