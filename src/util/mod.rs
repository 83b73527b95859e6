//! Utility functions and helpers.

use std::sync::atomic::{compiler_fence, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Remaining durations below this threshold are spun rather than slept, to
/// keep slot boundaries accurate on sub-millisecond schedules where the OS
/// scheduler's wakeup jitter would dominate.
pub const SPIN_SLEEP_THRESHOLD: Duration = Duration::from_millis(5);

/// Block the current thread until `deadline`, using the default spin
/// threshold.
pub fn sleep_until(deadline: Instant) {
    sleep_until_with_threshold(deadline, SPIN_SLEEP_THRESHOLD);
}

/// Block the current thread until `deadline`; waits shorter than
/// `spin_threshold` busy-spin with a compiler fence instead of suspending.
pub fn sleep_until_with_threshold(deadline: Instant, spin_threshold: Duration) {
    let now = Instant::now();
    if deadline <= now {
        return;
    }
    let remaining = deadline - now;
    if remaining >= spin_threshold {
        thread::sleep(remaining);
    } else {
        while Instant::now() < deadline {
            compiler_fence(Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleeps_to_deadline() {
        let deadline = Instant::now() + Duration::from_millis(20);
        sleep_until(deadline);
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn spins_for_short_waits() {
        let deadline = Instant::now() + Duration::from_micros(300);
        sleep_until(deadline);
        let now = Instant::now();
        assert!(now >= deadline);
        // A spin wait should not overshoot by a whole scheduler quantum.
        assert!(now - deadline < Duration::from_millis(5));
    }

    #[test]
    fn past_deadline_returns_immediately() {
        let deadline = Instant::now() - Duration::from_millis(1);
        let before = Instant::now();
        sleep_until(deadline);
        assert!(Instant::now() - before < Duration::from_millis(5));
    }
}
