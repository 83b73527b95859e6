//! Wall-clock wire time.
//!
//! Session start times cross the air as nanosecond counts since the Unix
//! epoch: the protocol clocks itself on each host's monotonic clock, but two
//! hosts can only agree on a shared instant through the wall clock. The
//! translation error is bounded by the handshake round-trip time; no later
//! resynchronisation is performed.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock nanoseconds since the Unix epoch, `lead` from now.
pub fn wire_time_after(lead: Duration) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    (now + lead).as_nanos() as u64
}

/// Translate a wire time into the local monotonic domain.
///
/// Wire times already in the past clamp to "now"; the session then starts
/// immediately instead of chasing an unreachable instant.
pub fn local_instant_for(wire_time: u64) -> Instant {
    let wall_now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    let target = Duration::from_nanos(wire_time);
    let now = Instant::now();
    if target >= wall_now {
        now + (target - wall_now)
    } else {
        now.checked_sub(wall_now - target).unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_wire_time_round_trips() {
        let lead = Duration::from_millis(150);
        let before = Instant::now();
        let local = local_instant_for(wire_time_after(lead));
        // Both conversions read the clocks independently, so allow slack.
        let offset = local - before;
        assert!(offset > Duration::from_millis(100), "offset {offset:?}");
        assert!(offset < Duration::from_millis(200), "offset {offset:?}");
    }

    #[test]
    fn past_wire_time_clamps_to_now() {
        let stale = wire_time_after(Duration::ZERO).saturating_sub(5_000_000_000);
        let local = local_instant_for(stale);
        assert!(local <= Instant::now());
    }
}
