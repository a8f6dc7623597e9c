//! Timing utilities for cooldowns and caller-owned timers
//!
//! Pure functions and small state holders that take `now` explicitly, so
//! they can be tested without a real clock.

use chrono::{DateTime, Duration, Utc};

/// Check if enough time has elapsed since `last` to allow another action.
///
/// # Arguments
/// * `last` - When the action last happened (None if never)
/// * `cooldown` - Minimum time that must elapse between actions
/// * `now` - Current time
///
/// # Returns
/// `true` if enough time has passed (or never happened), `false` if still in cooldown
pub fn cooldown_elapsed(last: Option<DateTime<Utc>>, cooldown: Duration, now: DateTime<Utc>) -> bool {
    match last {
        Some(last) => now - last >= cooldown,
        None => true, // Never happened, so cooldown has "elapsed"
    }
}

/// Inverse of [`cooldown_elapsed`]: `last` happened less than `window` ago
pub fn within_window(last: Option<DateTime<Utc>>, window: Duration, now: DateTime<Utc>) -> bool {
    !cooldown_elapsed(last, window, now)
}

/// A one-shot timer that fires once its deadline has passed
///
/// Re-arming replaces the deadline, which gives trailing-edge debounce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<DateTime<Utc>>,
}

impl Deadline {
    pub fn arm(&mut self, now: DateTime<Utc>, delay: Duration) {
        self.at = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    pub fn at(&self) -> Option<DateTime<Utc>> {
        self.at
    }

    /// Disarm and return `true` if the deadline has passed
    pub fn take_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.at {
            Some(at) if now >= at => {
                self.at = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of several optional deadlines
pub fn earliest(deadlines: impl IntoIterator<Item = Option<DateTime<Utc>>>) -> Option<DateTime<Utc>> {
    deadlines.into_iter().flatten().min()
}
