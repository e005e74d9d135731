//! # Rate Limiting Policies
//!
//! Decide which encoded commands actually go out.
//!
//! - [`ChangeFilter`]: send whenever the command differs from the last one sent.
//! - [`Throttle`]: send at most once per interval. The first command after an
//!   idle interval goes out immediately; later ones are coalesced and the
//!   latest is released when the interval elapses.

use std::time::Duration;
use tokio::time::Instant;

use crate::command::Command;

/// Suppresses consecutive duplicates.
///
/// # Examples
///
/// ```
/// use ramocar_remote::command::encode_integer;
/// use ramocar_remote::dispatch::policy::ChangeFilter;
///
/// let mut filter = ChangeFilter::new();
/// assert!(filter.offer(encode_integer(1, 0, 0)).is_some());
/// assert!(filter.offer(encode_integer(1, 0, 0)).is_none());
/// assert!(filter.offer(encode_integer(0, 0, 0)).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    last: Option<Command>,
}

impl ChangeFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `command` as already sent
    #[must_use]
    pub fn seeded(command: Command) -> Self {
        Self {
            last: Some(command),
        }
    }

    /// Returns the command if it must be sent
    pub fn offer(&mut self, command: Command) -> Option<Command> {
        if self.last.as_ref() == Some(&command) {
            return None;
        }
        self.last = Some(command.clone());
        Some(command)
    }

    /// Forget the last command so the next offer is sent
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Sends at most one command per interval, keeping the latest pending.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_sent: Option<Command>,
    last_sent_at: Option<Instant>,
    pending: Option<Command>,
}

impl Throttle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
            last_sent_at: None,
            pending: None,
        }
    }

    fn ready(&self, now: Instant) -> bool {
        self.last_sent_at
            .map_or(true, |at| now.saturating_duration_since(at) >= self.interval)
    }

    fn commit(&mut self, command: Command, now: Instant) -> Command {
        self.last_sent = Some(command.clone());
        self.last_sent_at = Some(now);
        self.pending = None;
        command
    }

    /// Request `command` at `now`; returns it if it goes out immediately
    pub fn offer(&mut self, command: Command, now: Instant) -> Option<Command> {
        let already_sent = self.last_sent.as_ref() == Some(&command);
        if already_sent && self.pending.is_none() {
            return None;
        }

        if self.ready(now) {
            return Some(self.commit(command, now));
        }

        // Returning to the state already on the device cancels the pending one
        self.pending = if already_sent { None } else { Some(command) };
        None
    }

    /// Release the pending command once its interval has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<Command> {
        if self.pending.is_some() && self.ready(now) {
            let command = self.pending.take()?;
            return Some(self.commit(command, now));
        }
        None
    }

    /// When the pending command becomes eligible, if there is one
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        Some(match self.last_sent_at {
            Some(at) => at + self.interval,
            None => Instant::now(),
        })
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
        self.last_sent_at = None;
        self.pending = None;
    }
}

/// Motion-channel policy chosen by configuration
#[derive(Debug, Clone)]
pub enum MotionLimiter {
    Change(ChangeFilter),
    Throttle(Throttle),
}

impl MotionLimiter {
    pub fn offer(&mut self, command: Command, now: Instant) -> Option<Command> {
        match self {
            MotionLimiter::Change(filter) => filter.offer(command),
            MotionLimiter::Throttle(throttle) => throttle.offer(command, now),
        }
    }

    pub fn poll(&mut self, now: Instant) -> Option<Command> {
        match self {
            MotionLimiter::Change(_) => None,
            MotionLimiter::Throttle(throttle) => throttle.poll(now),
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self {
            MotionLimiter::Change(_) => None,
            MotionLimiter::Throttle(throttle) => throttle.next_deadline(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            MotionLimiter::Change(filter) => filter.reset(),
            MotionLimiter::Throttle(throttle) => throttle.reset(),
        }
    }
}
