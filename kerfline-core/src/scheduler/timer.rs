//! Millisecond timers driven by the controller tick
//!
//! Nothing here reads a clock; callers pass the tick timestamp so the
//! same code runs on hardware and in host tests.

/// Milliseconds elapsed since `since`, saturating on clock reversal
pub fn elapsed(now_ms: u64, since_ms: u64) -> u64 {
    now_ms.saturating_sub(since_ms)
}

/// One-shot timer: armed with a duration, fires once when it elapses
///
/// Checking an unarmed timer is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeferredTimer {
    started_ms: u64,
    duration_ms: u32,
    armed: bool,
}

impl DeferredTimer {
    pub const fn new() -> Self {
        Self {
            started_ms: 0,
            duration_ms: 0,
            armed: false,
        }
    }

    /// Arm (or re-arm) the timer from `now_ms`
    pub fn arm(&mut self, now_ms: u64, duration_ms: u32) {
        self.started_ms = now_ms;
        self.duration_ms = duration_ms;
        self.armed = true;
    }

    pub fn cancel(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Check whether the armed duration has passed without consuming it
    pub fn is_elapsed(&self, now_ms: u64) -> bool {
        self.armed && elapsed(now_ms, self.started_ms) >= self.duration_ms as u64
    }

    /// Returns true exactly once, on the first check after the duration
    pub fn fire(&mut self, now_ms: u64) -> bool {
        if self.is_elapsed(now_ms) {
            self.armed = false;
            true
        } else {
            false
        }
    }
}

/// Fixed-period toggle for indicator patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Blinker {
    period_ms: u32,
    last_toggle_ms: u64,
}

impl Blinker {
    pub fn new(period_ms: u32, now_ms: u64) -> Self {
        Self {
            period_ms,
            last_toggle_ms: now_ms,
        }
    }

    /// Returns true when a full period has passed since the last toggle
    pub fn due(&mut self, now_ms: u64) -> bool {
        if elapsed(now_ms, self.last_toggle_ms) >= self.period_ms as u64 {
            self.last_toggle_ms = now_ms;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unarmed_timer_never_fires() {
        let mut timer = DeferredTimer::new();
        assert!(!timer.fire(0));
        assert!(!timer.fire(u64::MAX));
    }

    #[test]
    fn test_timer_fires_once() {
        let mut timer = DeferredTimer::new();
        timer.arm(1000, 150);
        assert!(!timer.fire(1149));
        assert!(timer.fire(1150));
        assert!(!timer.fire(1200));
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_rearm_restarts_duration() {
        let mut timer = DeferredTimer::new();
        timer.arm(0, 100);
        timer.arm(80, 100);
        assert!(!timer.fire(150));
        assert!(timer.fire(180));
    }

    #[test]
    fn test_cancel() {
        let mut timer = DeferredTimer::new();
        timer.arm(0, 10);
        timer.cancel();
        assert!(!timer.fire(100));
    }

    #[test]
    fn test_elapsed_saturates() {
        assert_eq!(elapsed(5, 10), 0);
        assert_eq!(elapsed(10, 5), 5);
    }

    #[test]
    fn test_blinker_period() {
        let mut blink = Blinker::new(250, 0);
        assert!(!blink.due(249));
        assert!(blink.due(250));
        assert!(!blink.due(499));
        assert!(blink.due(500));
    }
}
