//! Timestamp handling for `created` / `modified` bookkeeping.
//!
//! Timestamps are UTC instants truncated to millisecond precision, which is
//! the precision they are rendered with. The service reads time through the
//! [`Clock`] trait so tests can pin or step it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, DurationRound, Utc};

use crate::error::ValidationError;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use riskgraph::time::{Clock, ManualClock};
///
/// let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
/// let before = clock.now();
/// clock.advance(Duration::seconds(5));
/// assert_eq!(clock.now() - before, Duration::seconds(5));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock pinned at `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.current() += by;
    }

    /// Pins the clock to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.current() = at;
    }

    // Poisoning is ignored: the guarded instant is always whole.
    fn current(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current()
    }
}

/// Truncates an instant to millisecond precision.
#[must_use]
pub fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(Duration::milliseconds(1)).unwrap_or(at)
}

/// Current time from `clock`, truncated to milliseconds.
#[must_use]
pub fn stamp(clock: &dyn Clock) -> DateTime<Utc> {
    truncate_millis(clock.now())
}

/// A timestamp strictly later than `previous`.
///
/// Normally this is just the current time; when the clock has not moved past
/// `previous` (coarse clocks, back-to-back edits, clock skew) the result is
/// `previous` plus one millisecond.
#[must_use]
pub fn stamp_after(clock: &dyn Clock, previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = stamp(clock);
    match previous {
        Some(prev) if now <= prev => truncate_millis(prev) + Duration::milliseconds(1),
        _ => now,
    }
}

/// Parses an RFC 3339 timestamp into UTC.
///
/// # Errors
///
/// Returns `ValidationError::InvalidFieldValue` naming `field` on failure.
pub fn parse_timestamp(field: &str, text: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            ValidationError::invalid_value(field, format!("not an RFC 3339 timestamp: {e}"))
        })
}
