//! The shared slot clock that keeps both peers of a session aligned.
//!
//! A session's transmission period is divided into four phases from the
//! initiator's perspective: transmit, gap, receive, gap. Both peers own an
//! identical clock (agreed at handshake time); the follower maps phases onto
//! its own behaviour by swapping transmit and receive.

use std::time::{Duration, Instant};

/// What kind of activity a phase of the period calls for, from the session
/// initiator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// The initiator is transmitting.
    Transmitting,
    /// The initiator is receiving.
    Receiving,
    /// Neither peer is on the air.
    Inactive,
}

/// Maps instants onto the session's slot schedule.
///
/// Immutable after construction. All queries are relative to `start_time`;
/// asking for the action kind of an instant before the start time is a
/// programming error.
#[derive(Debug, Clone, Copy)]
pub struct SlotClock {
    start_time: Instant,
    transmit_duration: Duration,
    gap_duration: Duration,
}

impl SlotClock {
    /// Create a clock starting at `start_time`.
    ///
    /// A zero `gap_duration` is legal (the inactive phases collapse); a zero
    /// `transmit_duration` is not.
    pub fn new(start_time: Instant, transmit_duration: Duration, gap_duration: Duration) -> Self {
        assert!(
            !transmit_duration.is_zero(),
            "slot clock requires a nonzero transmit duration"
        );
        Self {
            start_time,
            transmit_duration,
            gap_duration,
        }
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// The transmission period `Tp`: the interval between the start of the
    /// initiator's Nth transmission and the start of its N+1th.
    pub fn period(&self) -> Duration {
        2 * (self.transmit_duration + self.gap_duration)
    }

    /// Time elapsed since the start of the period containing `t`.
    fn elapsed_in_period(&self, t: Instant) -> Duration {
        let since_start = t - self.start_time;
        let nanos = since_start.as_nanos() % self.period().as_nanos();
        Duration::from_nanos(nanos as u64)
    }

    /// What the initiator should be doing at `t`.
    ///
    /// # Panics
    ///
    /// Panics if `t` precedes the clock's start time.
    pub fn action_kind(&self, t: Instant) -> SlotKind {
        assert!(
            t >= self.start_time,
            "cannot take action before a clock's start time"
        );
        let elapsed = self.elapsed_in_period(t);
        if elapsed < self.transmit_duration {
            SlotKind::Transmitting
        } else if elapsed < self.transmit_duration + self.gap_duration {
            SlotKind::Inactive
        } else if elapsed < 2 * self.transmit_duration + self.gap_duration {
            SlotKind::Receiving
        } else {
            SlotKind::Inactive
        }
    }

    /// The earliest instant after `t` at which the action kind changes,
    /// aligned to the phase boundary. Instants before the start time map to
    /// the start time itself.
    pub fn time_of_next_action(&self, t: Instant) -> Instant {
        if t < self.start_time {
            return self.start_time;
        }
        let elapsed = self.elapsed_in_period(t);
        let period_start = t - elapsed;
        if elapsed < self.transmit_duration {
            period_start + self.transmit_duration
        } else if elapsed < self.transmit_duration + self.gap_duration {
            period_start + self.transmit_duration + self.gap_duration
        } else if elapsed < 2 * self.transmit_duration + self.gap_duration {
            period_start + 2 * self.transmit_duration + self.gap_duration
        } else {
            period_start + self.period()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(transmit_ms: u64, gap_ms: u64) -> (SlotClock, Instant) {
        let start = Instant::now();
        (
            SlotClock::new(
                start,
                Duration::from_millis(transmit_ms),
                Duration::from_millis(gap_ms),
            ),
            start,
        )
    }

    #[test]
    fn phase_classification_over_one_period() {
        let (clock, start) = clock(10, 5);
        assert_eq!(clock.action_kind(start), SlotKind::Transmitting);
        assert_eq!(
            clock.action_kind(start + Duration::from_millis(9)),
            SlotKind::Transmitting
        );
        assert_eq!(
            clock.action_kind(start + Duration::from_millis(10)),
            SlotKind::Inactive
        );
        assert_eq!(
            clock.action_kind(start + Duration::from_millis(15)),
            SlotKind::Receiving
        );
        assert_eq!(
            clock.action_kind(start + Duration::from_millis(24)),
            SlotKind::Receiving
        );
        assert_eq!(
            clock.action_kind(start + Duration::from_millis(25)),
            SlotKind::Inactive
        );
        assert_eq!(
            clock.action_kind(start + Duration::from_millis(30)),
            SlotKind::Transmitting
        );
    }

    #[test]
    fn classification_is_periodic() {
        let (clock, start) = clock(10, 5);
        let period = clock.period();
        for offset_ms in 0..30 {
            let t = start + Duration::from_millis(offset_ms);
            assert_eq!(
                clock.action_kind(t),
                clock.action_kind(t + period),
                "offset {offset_ms}ms"
            );
            assert_eq!(clock.action_kind(t), clock.action_kind(t + 7 * period));
        }
    }

    #[test]
    fn next_action_lands_on_phase_boundaries() {
        let (clock, start) = clock(10, 5);
        assert_eq!(
            clock.time_of_next_action(start),
            start + Duration::from_millis(10)
        );
        assert_eq!(
            clock.time_of_next_action(start + Duration::from_millis(12)),
            start + Duration::from_millis(15)
        );
        assert_eq!(
            clock.time_of_next_action(start + Duration::from_millis(20)),
            start + Duration::from_millis(25)
        );
        assert_eq!(
            clock.time_of_next_action(start + Duration::from_millis(27)),
            start + Duration::from_millis(30)
        );
    }

    #[test]
    fn next_action_boundary_changes_kind() {
        let (clock, start) = clock(10, 5);
        for offset_ms in 0..60 {
            let t = start + Duration::from_millis(offset_ms);
            let boundary = clock.time_of_next_action(t);
            assert!(boundary > t);
            assert_ne!(clock.action_kind(t), clock.action_kind(boundary));
        }
    }

    #[test]
    fn zero_gap_collapses_inactive_phases() {
        let (clock, start) = clock(10, 0);
        assert_eq!(clock.period(), Duration::from_millis(20));
        assert_eq!(clock.action_kind(start), SlotKind::Transmitting);
        assert_eq!(
            clock.action_kind(start + Duration::from_millis(10)),
            SlotKind::Receiving
        );
        assert_eq!(
            clock.action_kind(start + Duration::from_millis(20)),
            SlotKind::Transmitting
        );
        assert_eq!(
            clock.time_of_next_action(start),
            start + Duration::from_millis(10)
        );
        assert_eq!(
            clock.time_of_next_action(start + Duration::from_millis(10)),
            start + Duration::from_millis(20)
        );
    }

    #[test]
    fn before_start_maps_to_start() {
        let start = Instant::now() + Duration::from_millis(100);
        let clock = SlotClock::new(start, Duration::from_millis(10), Duration::from_millis(5));
        assert_eq!(clock.time_of_next_action(Instant::now()), start);
    }

    #[test]
    #[should_panic(expected = "before a clock's start time")]
    fn action_kind_before_start_panics() {
        let start = Instant::now() + Duration::from_secs(1);
        let clock = SlotClock::new(start, Duration::from_millis(10), Duration::from_millis(5));
        let _ = clock.action_kind(Instant::now());
    }

    #[test]
    #[should_panic(expected = "nonzero transmit duration")]
    fn zero_transmit_duration_is_rejected() {
        let _ = SlotClock::new(Instant::now(), Duration::ZERO, Duration::from_millis(5));
    }
}
