//! Client-side gate for outbound mutation requests
//!
//! Two independent limits apply:
//! - a minimum delay between consecutive sends, reported with the wait time
//! - a rolling-window request budget; exhausting it starts a lockout that
//!   doubles on every consecutive breach up to a ceiling
//!
//! Time is read from the injected [`Clock`].

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::RateLimitError;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Minimum spacing between two sends
    pub min_interval: Duration,
    /// Length of the rolling budget window
    pub window: Duration,
    /// Requests allowed per window
    pub max_requests: usize,
    /// Lockout after the first breach
    pub lockout_base: Duration,
    /// Upper bound for the grown lockout
    pub lockout_max: Duration,
    pub backoff_multiplier: i32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::milliseconds(1000),
            window: Duration::seconds(60),
            max_requests: 60,
            lockout_base: Duration::seconds(60),
            lockout_max: Duration::minutes(15),
            backoff_multiplier: 2,
        }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    /// Timestamps of admitted requests inside the current window
    requests: VecDeque<DateTime<Utc>>,
    last_send: Option<DateTime<Utc>>,
    locked_until: Option<DateTime<Utc>>,
    breaches: u32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            requests: VecDeque::new(),
            last_send: None,
            locked_until: None,
            breaches: 0,
        }
    }

    /// Admit a message send: minimum spacing plus the shared budget
    pub fn try_send(&mut self) -> Result<(), RateLimitError> {
        let now = self.clock.now();
        self.check_budget(now)?;

        if let Some(last) = self.last_send {
            let elapsed = now - last;
            if elapsed < self.config.min_interval {
                let wait_ms = (self.config.min_interval - elapsed).num_milliseconds();
                debug!("Send refused, {}ms until the next slot", wait_ms);
                return Err(RateLimitError::TooSoon { wait_ms });
            }
        }

        self.requests.push_back(now);
        self.last_send = Some(now);
        Ok(())
    }

    /// Admit any other mutation (state toggle, contact creation)
    pub fn try_request(&mut self) -> Result<(), RateLimitError> {
        let now = self.clock.now();
        self.check_budget(now)?;
        self.requests.push_back(now);
        Ok(())
    }

    /// Requests left in the current window (0 while locked out)
    pub fn remaining(&mut self) -> usize {
        let now = self.clock.now();
        if self.lockout_remaining(now).is_some() {
            return 0;
        }
        self.prune(now);
        self.config.max_requests.saturating_sub(self.requests.len())
    }

    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        self.locked_until
            .filter(|until| *until > self.clock.now())
    }

    fn check_budget(&mut self, now: DateTime<Utc>) -> Result<(), RateLimitError> {
        if let Some(left) = self.lockout_remaining(now) {
            return Err(RateLimitError::LockedOut {
                retry_after_secs: ceil_secs(left),
            });
        }

        self.prune(now);

        if self.requests.len() >= self.config.max_requests {
            let lockout = self.next_lockout();
            self.breaches += 1;
            self.locked_until = Some(now + lockout);
            self.requests.clear();
            warn!(
                "Request budget of {} per window exhausted, locked out for {}s (breach {})",
                self.config.max_requests,
                lockout.num_seconds(),
                self.breaches
            );
            return Err(RateLimitError::LockedOut {
                retry_after_secs: ceil_secs(lockout),
            });
        }

        Ok(())
    }

    fn lockout_remaining(&mut self, now: DateTime<Utc>) -> Option<Duration> {
        let until = self.locked_until?;
        if now < until {
            return Some(until - now);
        }
        // A full quiet window after the lockout forgives earlier breaches
        if now >= until + self.config.window {
            self.breaches = 0;
            self.locked_until = None;
        }
        None
    }

    fn next_lockout(&self) -> Duration {
        let mut lockout = self.config.lockout_base;
        for _ in 0..self.breaches {
            lockout = lockout * self.config.backoff_multiplier;
            if lockout >= self.config.lockout_max {
                return self.config.lockout_max;
            }
        }
        lockout.min(self.config.lockout_max)
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(oldest) = self.requests.front() {
            if now - *oldest >= self.config.window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }
}

fn ceil_secs(d: Duration) -> i64 {
    let ms = d.num_milliseconds();
    (ms + 999) / 1000
}
