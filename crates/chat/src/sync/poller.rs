//! Cancellable background poll schedule
//!
//! The handle does not spawn anything: the host asks [`PollHandle::is_due`]
//! on its own timer and reports the result of each tick back.

use chrono::{DateTime, Duration, Utc};
use log::debug;

#[derive(Debug, Clone)]
pub struct PollHandle {
    base: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
    next_due: Option<DateTime<Utc>>,
    failures: u32,
}

impl PollHandle {
    pub fn new(base: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            base,
            max: max.max(base),
            multiplier: multiplier.max(1.0),
            current: base,
            next_due: None,
            failures: 0,
        }
    }

    /// Begin polling; the first tick is due one interval from `now`
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.next_due.is_none() {
            self.next_due = Some(now + self.current);
            debug!("Polling started every {}s", self.current.num_seconds());
        }
    }

    pub fn stop(&mut self) {
        if self.next_due.take().is_some() {
            debug!("Polling stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_due.is_some_and(|due| now >= due)
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.next_due
    }

    pub fn interval(&self) -> Duration {
        self.current
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Change the base interval; takes effect from the next schedule
    pub fn set_base_interval(&mut self, base: Duration) {
        self.base = base;
        self.max = self.max.max(base);
        if self.failures == 0 {
            self.current = base;
        }
    }

    /// A tick succeeded: back to the base interval
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.failures = 0;
        self.current = self.base;
        self.reschedule(now);
    }

    /// A tick failed: stretch the interval, capped at the maximum
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.failures += 1;
        let stretched_ms = (self.current.num_milliseconds() as f64 * self.multiplier) as i64;
        self.current = Duration::milliseconds(stretched_ms).min(self.max);
        debug!(
            "Poll failed ({} in a row), next in {}s",
            self.failures,
            self.current.num_seconds()
        );
        self.reschedule(now);
    }

    fn reschedule(&mut self, now: DateTime<Utc>) {
        if self.next_due.is_some() {
            self.next_due = Some(now + self.current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> PollHandle {
        PollHandle::new(Duration::seconds(30), Duration::seconds(300), 1.5)
    }

    #[test]
    fn test_start_and_due() {
        let now = Utc::now();
        let mut poll = handle();
        assert!(!poll.is_due(now));

        poll.start(now);
        assert!(!poll.is_due(now + Duration::seconds(29)));
        assert!(poll.is_due(now + Duration::seconds(30)));

        poll.stop();
        assert!(!poll.is_due(now + Duration::seconds(60)));
        assert!(!poll.is_active());
    }

    #[test]
    fn test_backoff_on_failure_is_capped() {
        let now = Utc::now();
        let mut poll = handle();
        poll.start(now);

        poll.record_failure(now);
        assert_eq!(poll.interval(), Duration::seconds(45));
        assert_eq!(poll.next_due(), Some(now + Duration::seconds(45)));

        for _ in 0..10 {
            poll.record_failure(now);
        }
        assert_eq!(poll.interval(), Duration::seconds(300));

        poll.record_success(now);
        assert_eq!(poll.interval(), Duration::seconds(30));
        assert_eq!(poll.failures(), 0);
    }

    #[test]
    fn test_results_do_not_restart_stopped_handle() {
        let now = Utc::now();
        let mut poll = handle();
        poll.record_success(now);
        assert!(!poll.is_active());
    }
}
