//! # Reconnection Policy
//!
//! Bounded retry for sessions that failed to connect or lost their link.
//! With `max_attempts == 0` a failed session stays failed until restart.

use std::time::Duration;
use tokio::time::Instant;

/// Decides when the next reconnection attempt may run.
///
/// # Examples
///
/// ```
/// use ramocar_remote::ble::ReconnectPolicy;
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// let mut policy = ReconnectPolicy::new(1, Duration::from_secs(2));
/// let now = Instant::now();
/// assert!(policy.ready(now));
/// policy.record_attempt(now);
/// assert!(!policy.ready(now + Duration::from_secs(5))); // budget spent
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    interval: Duration,
    attempts: u32,
    last_attempt: Option<Instant>,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            attempts: 0,
            last_attempt: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Whether an attempt may run at `now`
    pub fn ready(&self, now: Instant) -> bool {
        if self.exhausted() {
            return false;
        }
        self.last_attempt
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }

    pub fn record_attempt(&mut self, now: Instant) {
        self.attempts += 1;
        self.last_attempt = Some(now);
    }

    /// Restore the full budget after a successful connection
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_attempt = None;
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
