//! Clock-free timing primitives. Every method takes the current time in
//! milliseconds, so callers decide where time comes from.

/// Fires once after signals have stopped arriving for a quiet period.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet_ms: f64,
    deadline: Option<f64>,
}

impl Debouncer {
    pub fn new(quiet_ms: f64) -> Self {
        Self {
            quiet_ms,
            deadline: None,
        }
    }

    /// Record a signal, pushing the deadline out by a full quiet period.
    pub fn signal(&mut self, now_ms: f64) {
        self.deadline = Some(now_ms + self.quiet_ms);
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    /// True exactly once per burst, on the first call at or after the deadline.
    pub fn fire_if_due(&mut self, now_ms: f64) -> bool {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Another attempt is scheduled; `remaining` retries are left after it.
    Retry { remaining: u32 },
    Exhausted,
}

/// Fixed-interval attempts with a bounded number of retries after the first.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    interval_ms: f64,
    remaining: u32,
    next_at: Option<f64>,
}

impl RetrySchedule {
    /// A schedule whose first attempt is due at `now_ms`.
    pub fn start(interval_ms: f64, retries: u32, now_ms: f64) -> Self {
        Self {
            interval_ms,
            remaining: retries,
            next_at: Some(now_ms),
        }
    }

    pub fn next_at(&self) -> Option<f64> {
        self.next_at
    }

    pub fn is_due(&self, now_ms: f64) -> bool {
        self.next_at.is_some_and(|at| now_ms >= at)
    }

    /// Record a failed attempt. Either books the next one or reports exhaustion.
    pub fn failed(&mut self, now_ms: f64) -> RetryOutcome {
        if self.remaining == 0 {
            self.next_at = None;
            return RetryOutcome::Exhausted;
        }
        self.remaining -= 1;
        self.next_at = Some(now_ms + self.interval_ms);
        RetryOutcome::Retry {
            remaining: self.remaining,
        }
    }

    /// Stop scheduling; used once the awaited condition holds.
    pub fn stop(&mut self) {
        self.next_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_pause_fires_once() {
        let mut d = Debouncer::new(200.0);
        for t in [0.0, 50.0, 120.0, 180.0] {
            d.signal(t);
            assert!(!d.fire_if_due(t));
        }
        assert!(!d.fire_if_due(379.0));
        assert!(d.fire_if_due(380.0));
        assert!(!d.fire_if_due(381.0));
        assert!(!d.fire_if_due(10_000.0));
        assert_eq!(d.deadline(), None);
    }

    #[test]
    fn each_signal_restarts_the_window() {
        let mut d = Debouncer::new(100.0);
        d.signal(0.0);
        d.signal(90.0);
        assert_eq!(d.deadline(), Some(190.0));
        assert!(!d.fire_if_due(100.0));
        assert!(d.fire_if_due(190.0));
    }

    #[test]
    fn cancel_drops_pending_fire() {
        let mut d = Debouncer::new(10.0);
        d.signal(0.0);
        d.cancel();
        assert!(!d.fire_if_due(100.0));
    }

    #[test]
    fn retries_count_down_then_exhaust() {
        let mut r = RetrySchedule::start(500.0, 2, 0.0);
        assert!(r.is_due(0.0));
        assert_eq!(r.failed(0.0), RetryOutcome::Retry { remaining: 1 });
        assert!(!r.is_due(499.0));
        assert!(r.is_due(500.0));
        assert_eq!(r.failed(500.0), RetryOutcome::Retry { remaining: 0 });
        assert_eq!(r.next_at(), Some(1000.0));
        assert_eq!(r.failed(1000.0), RetryOutcome::Exhausted);
        assert_eq!(r.next_at(), None);
        assert!(!r.is_due(1_000_000.0));
    }

    #[test]
    fn stop_cancels_future_attempts() {
        let mut r = RetrySchedule::start(100.0, 5, 0.0);
        r.stop();
        assert!(!r.is_due(0.0));
    }
}
