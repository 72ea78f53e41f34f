//! Log discovery windows
//!
//! Each dispatcher run harvests `[end - length, end)` where
//! `end = now - stabilization_delay`. The provider only guarantees that logs
//! are finalized some hours after the fact, so anything younger than the delay
//! is left for a later run.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Default window length (1 hour)
pub const DEFAULT_WINDOW_LENGTH_SECS: u64 = 60 * 60;

/// Default stabilization delay (13 hours)
pub const DEFAULT_STABILIZATION_DELAY_SECS: u64 = 13 * 60 * 60;

/// Closed-open interval `[start, end)` in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LogWindow {
    pub fn length(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl std::fmt::Display for LogWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

/// Parameters of the window calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    length: TimeDelta,
    stabilization_delay: TimeDelta,
    align: bool,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self::from_secs(
            DEFAULT_WINDOW_LENGTH_SECS,
            DEFAULT_STABILIZATION_DELAY_SECS,
            false,
        )
    }
}

impl WindowSpec {
    /// Build a spec from second counts.
    ///
    /// A zero length is bumped to one second so that `start < end` always holds;
    /// configuration validation rejects zero before it gets here.
    pub fn from_secs(length_secs: u64, stabilization_delay_secs: u64, align: bool) -> Self {
        Self {
            length: secs_to_delta(length_secs.max(1)),
            stabilization_delay: secs_to_delta(stabilization_delay_secs),
            align,
        }
    }

    pub fn length(&self) -> TimeDelta {
        self.length
    }

    pub fn stabilization_delay(&self) -> TimeDelta {
        self.stabilization_delay
    }

    pub fn is_aligned(&self) -> bool {
        self.align
    }

    /// Compute the window harvested by a run at `now`.
    ///
    /// With `align` set, `end` is floored to a multiple of the window length
    /// since the epoch, so hourly ticks with scheduling jitter still produce
    /// adjacent windows. The result is monotone in `now` either way.
    pub fn window_at(&self, now: DateTime<Utc>) -> LogWindow {
        let mut end = now
            .checked_sub_signed(self.stabilization_delay)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        if self.align {
            let len = self.length.num_seconds().max(1);
            let floored = end.timestamp().div_euclid(len) * len;
            if let Some(aligned) = DateTime::from_timestamp(floored, 0) {
                end = aligned;
            }
        }

        let start = end
            .checked_sub_signed(self.length)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        LogWindow { start, end }
    }

    pub fn current(&self) -> LogWindow {
        self.window_at(Utc::now())
    }
}

fn secs_to_delta(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn default_window_trails_now_by_thirteen_hours() {
        let now = at(2024, 3, 15, 15, 0, 0);
        let window = WindowSpec::default().window_at(now);

        assert_eq!(window.end, at(2024, 3, 15, 2, 0, 0));
        assert_eq!(window.start, at(2024, 3, 15, 1, 0, 0));
        assert_eq!(window.length(), TimeDelta::hours(1));
        assert!(window.end <= now - TimeDelta::hours(13));
    }

    #[test]
    fn unaligned_window_keeps_minutes() {
        let window = WindowSpec::default().window_at(at(2024, 3, 15, 15, 17, 42));
        assert_eq!(window.end, at(2024, 3, 15, 2, 17, 42));
        assert_eq!(window.start, at(2024, 3, 15, 1, 17, 42));
    }

    #[test]
    fn aligned_window_floors_to_length() {
        let spec = WindowSpec::from_secs(3600, 13 * 3600, true);
        let window = spec.window_at(at(2024, 3, 15, 15, 17, 42));
        assert_eq!(window.end, at(2024, 3, 15, 2, 0, 0));
        assert_eq!(window.start, at(2024, 3, 15, 1, 0, 0));
    }

    #[test]
    fn consecutive_hourly_runs_are_adjacent() {
        let spec = WindowSpec::default();
        let first = spec.window_at(at(2024, 3, 15, 15, 0, 0));
        let second = spec.window_at(at(2024, 3, 15, 16, 0, 0));
        assert_eq!(first.end, second.start);
    }

    #[test]
    fn window_end_is_monotone() {
        for align in [false, true] {
            let spec = WindowSpec::from_secs(3600, 24 * 3600, align);
            let mut previous = spec.window_at(at(2024, 1, 1, 0, 0, 0)).end;
            let mut now = at(2024, 1, 1, 0, 0, 0);
            for _ in 0..500 {
                now += TimeDelta::seconds(617);
                let end = spec.window_at(now).end;
                assert!(previous <= end);
                assert!(end <= now - TimeDelta::hours(24));
                previous = end;
            }
        }
    }

    #[test]
    fn zero_length_still_produces_nonempty_window() {
        let window = WindowSpec::from_secs(0, 0, false).window_at(at(2024, 3, 15, 0, 0, 0));
        assert!(window.start < window.end);
    }

    #[test]
    fn contains_is_closed_open() {
        let window = WindowSpec::default().window_at(at(2024, 3, 15, 15, 0, 0));
        assert!(window.contains(window.start));
        assert!(!window.contains(window.end));
        assert_eq!(
            window.to_string(),
            "[2024-03-15T01:00:00Z, 2024-03-15T02:00:00Z)"
        );
    }
}
