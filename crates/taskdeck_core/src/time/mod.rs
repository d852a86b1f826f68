//! Timestamp text format, countdown math and clock port.
//!
//! # Responsibility
//! - Parse/format the fixed `dd/mm/yyyy HH:MM` timestamp text form.
//! - Derive remaining/overdue durations and due-window classification.
//! - Abstract "now" behind [`Clock`] so callers can inject fixed time.
//!
//! # Invariants
//! - `parse_timestamp(&format_timestamp(t)) == t` for minute-granularity `t`.
//! - Only zero-padded, 24-hour input is accepted.
//! - All functions here are pure; none reads the wall clock implicitly.

mod clock;

pub use clock::{Clock, FixedClock, SystemClock};

use chrono::{Duration, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Timezone-naive wall-clock date-time, as shown on the device.
///
/// Only years `0000..=9999` have a `dd/mm/yyyy` text form; task schedules
/// are validated against that range.
pub type Timestamp = NaiveDateTime;

/// Earliest year the text form can express.
pub const TIMESTAMP_MIN_YEAR: i32 = 0;
/// Latest year the text form can express.
pub const TIMESTAMP_MAX_YEAR: i32 = 9999;

/// chrono pattern for the fixed display/input form.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Length of the "due soon" notification window, in minutes.
pub const DUE_SOON_WINDOW_MINUTES: i64 = 60;

static TIMESTAMP_SHAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}/\d{2}/\d{4} \d{2}:\d{2}$").expect("valid timestamp shape regex")
});

/// Timestamp text did not match `dd/mm/yyyy HH:MM` or named an impossible
/// calendar date/time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampParseError {
    pub input: String,
    pub reason: String,
}

impl TimestampParseError {
    pub fn code(&self) -> &'static str {
        "malformed_timestamp"
    }
}

impl Display for TimestampParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "malformed timestamp `{}` (expected dd/mm/yyyy HH:MM): {}",
            self.input, self.reason
        )
    }
}

impl Error for TimestampParseError {}

/// Parses `dd/mm/yyyy HH:MM` (zero-padded, 24-hour clock).
///
/// # Errors
/// - Returns an error for any other shape, including surrounding whitespace.
/// - Returns an error for impossible values (month 13, hour 25, 30/02).
pub fn parse_timestamp(text: &str) -> Result<Timestamp, TimestampParseError> {
    if !TIMESTAMP_SHAPE_RE.is_match(text) {
        return Err(TimestampParseError {
            input: text.to_string(),
            reason: "unexpected shape".to_string(),
        });
    }

    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).map_err(|err| TimestampParseError {
        input: text.to_string(),
        reason: err.to_string(),
    })
}

/// Formats a timestamp as `dd/mm/yyyy HH:MM`. Seconds are dropped.
pub fn format_timestamp(timestamp: Timestamp) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Remaining (or overdue) time between a schedule and "now".
///
/// Components are the absolute difference decomposed for display; sub-second
/// precision is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    /// `true` when the schedule lies strictly before "now".
    pub overdue: bool,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    /// Absolute difference as a duration.
    pub fn magnitude(&self) -> Duration {
        Duration::days(self.days)
            + Duration::hours(self.hours)
            + Duration::minutes(self.minutes)
            + Duration::seconds(self.seconds)
    }

    /// Compact `1d 2h 3m 10s` form.
    ///
    /// Zero day/hour/minute parts are omitted; seconds are always shown.
    pub fn compact(&self) -> String {
        let mut parts = Vec::with_capacity(4);
        if self.days > 0 {
            parts.push(format!("{}d", self.days));
        }
        if self.hours > 0 {
            parts.push(format!("{}h", self.hours));
        }
        if self.minutes > 0 {
            parts.push(format!("{}m", self.minutes));
        }
        parts.push(format!("{}s", self.seconds));
        parts.join(" ")
    }

    /// `Time left: ...` or `Overdue by ...` status line.
    pub fn label(&self) -> String {
        if self.overdue {
            format!("Overdue by {}", self.compact())
        } else {
            format!("Time left: {}", self.compact())
        }
    }
}

/// Window used for the "due soon" notification set.
pub fn due_soon_window() -> Duration {
    Duration::minutes(DUE_SOON_WINDOW_MINUTES)
}

/// Computes the countdown from `now` to `scheduled_at`.
pub fn remaining_or_overdue(scheduled_at: Timestamp, now: Timestamp) -> Countdown {
    let delta = scheduled_at - now;
    let overdue = delta < Duration::zero();
    let total_seconds = delta.num_seconds().abs();

    Countdown {
        overdue,
        days: total_seconds / 86_400,
        hours: (total_seconds % 86_400) / 3_600,
        minutes: (total_seconds % 3_600) / 60,
        seconds: total_seconds % 60,
    }
}

/// Position of a schedule relative to "now" and a look-ahead window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeStatus {
    /// Strictly before "now".
    Overdue,
    /// Exactly "now".
    DueNow,
    /// Strictly inside `(now, now + window)`.
    DueSoon,
    /// At or beyond `now + window`.
    Upcoming,
}

/// Returns whether `now < scheduled_at < now + window`.
///
/// A window reaching past the representable range has no upper bound.
pub fn is_due_within(scheduled_at: Timestamp, now: Timestamp, window: Duration) -> bool {
    scheduled_at > now
        && now
            .checked_add_signed(window)
            .map_or(true, |end| scheduled_at < end)
}

/// Classifies a schedule against `now` and a look-ahead `window`.
pub fn classify(scheduled_at: Timestamp, now: Timestamp, window: Duration) -> TimeStatus {
    if scheduled_at < now {
        TimeStatus::Overdue
    } else if scheduled_at == now {
        TimeStatus::DueNow
    } else if is_due_within(scheduled_at, now, window) {
        TimeStatus::DueSoon
    } else {
        TimeStatus::Upcoming
    }
}
