use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VoteError;

/// Countdown text shown once voting has closed.
pub const ELECTION_ENDED_MESSAGE: &str = "Election has ended";

/// Where an election is in its lifecycle, relative to some instant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElectionStatus {
    NotStarted,
    Active,
    Ended,
}

/// The `[start, end)` interval during which voting is permitted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ElectionWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl ElectionWindow {
    /// Create a window, rejecting one that closes before it opens.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, VoteError> {
        if start >= end {
            return Err(VoteError::Configuration {
                reason: format!("election start time {start} is not before end time {end}"),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// The status of the election at the given instant.
    pub fn status_at(&self, now: DateTime<Utc>) -> ElectionStatus {
        if now < self.start {
            ElectionStatus::NotStarted
        } else if now < self.end {
            ElectionStatus::Active
        } else {
            ElectionStatus::Ended
        }
    }

    /// The status together with a human readable countdown to the next transition.
    pub fn clock_at(&self, now: DateTime<Utc>) -> ElectionClock {
        let status = self.status_at(now);
        let remaining = match status {
            ElectionStatus::NotStarted => format_countdown(self.start - now),
            ElectionStatus::Active => format_countdown(self.end - now),
            ElectionStatus::Ended => ELECTION_ENDED_MESSAGE.to_string(),
        };
        ElectionClock { status, remaining }
    }
}

/// A snapshot of the election clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionClock {
    pub status: ElectionStatus,
    /// `HH:MM:SS` until the next transition, or [`ELECTION_ENDED_MESSAGE`].
    pub remaining: String,
}

/// Format a non-negative duration as `HH:MM:SS`, truncating sub-second precision.
/// Hours are not wrapped, so a countdown of several days reads e.g. `72:00:00`.
fn format_countdown(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 15, hour, minute, second)
            .unwrap()
    }

    fn school_day() -> ElectionWindow {
        ElectionWindow::new(at(8, 0, 0), at(17, 0, 0)).unwrap()
    }

    #[test]
    fn before_start_counts_down_to_opening() {
        let window = school_day();

        let clock = window.clock_at(at(7, 59, 59));
        assert_eq!(clock.status, ElectionStatus::NotStarted);
        assert_eq!(clock.remaining, "00:00:01");

        let clock = window.clock_at(at(7, 59, 0));
        assert_eq!(clock.status, ElectionStatus::NotStarted);
        assert_eq!(clock.remaining, "00:01:00");
    }

    #[test]
    fn window_is_half_open() {
        let window = school_day();
        assert_eq!(window.status_at(at(8, 0, 0)), ElectionStatus::Active);
        assert_eq!(window.status_at(at(16, 59, 59)), ElectionStatus::Active);
        assert_eq!(window.status_at(at(17, 0, 0)), ElectionStatus::Ended);
    }

    #[test]
    fn active_counts_down_to_close() {
        let clock = school_day().clock_at(at(12, 30, 15));
        assert_eq!(clock.status, ElectionStatus::Active);
        assert_eq!(clock.remaining, "04:29:45");
    }

    #[test]
    fn ended_shows_fixed_message() {
        let clock = school_day().clock_at(at(18, 0, 0));
        assert_eq!(clock.status, ElectionStatus::Ended);
        assert_eq!(clock.remaining, ELECTION_ENDED_MESSAGE);
    }

    #[test]
    fn long_countdowns_do_not_wrap_hours() {
        let window = ElectionWindow::new(at(8, 0, 0), at(8, 0, 0) + Duration::days(3)).unwrap();
        assert_eq!(window.clock_at(at(8, 0, 0)).remaining, "72:00:00");
    }

    #[test]
    fn sub_second_remainder_is_truncated() {
        let now = at(16, 59, 58) + Duration::milliseconds(600);
        assert_eq!(school_day().clock_at(now).remaining, "00:00:01");
    }

    #[test]
    fn status_is_monotonic() {
        let window = school_day();
        let mut previous = ElectionStatus::NotStarted;
        let mut now = at(6, 0, 0);
        while now < at(19, 0, 0) {
            let status = window.status_at(now);
            assert!(status >= previous, "status regressed at {now}");
            previous = status;
            now = now + Duration::minutes(7);
        }
        assert_eq!(previous, ElectionStatus::Ended);
    }

    #[test]
    fn malformed_window_is_a_configuration_error() {
        let err = ElectionWindow::new(at(17, 0, 0), at(8, 0, 0)).unwrap_err();
        assert!(matches!(err, VoteError::Configuration { .. }));

        let err = ElectionWindow::new(at(8, 0, 0), at(8, 0, 0)).unwrap_err();
        assert!(matches!(err, VoteError::Configuration { .. }));
    }

    #[test]
    fn status_serialises_in_kebab_case() {
        let json = rocket::serde::json::serde_json::to_string(&ElectionStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not-started\"");
    }
}
