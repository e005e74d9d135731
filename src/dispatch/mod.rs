//! # Dispatch Module
//!
//! Turns sampled intents into characteristic writes.
//!
//! This module handles:
//! - Encoding intents and applying the motion rate-limiting policy
//! - Independent change detection for the buzzer channel
//! - Owning the session lifecycle: connect, keep-alive, reconnection, stop
//! - The two execution models ([`cooperative`] and [`worker`])

pub mod cooperative;
pub mod policy;
pub mod worker;

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::ble::{keep_alive, BleSession, BleTransport, ReconnectPolicy, SharedSession};
use crate::command::protocol::Channel;
use crate::command::{encode, encode_buzzer, Command, CommandFormat};
use crate::config::{BleConfig, PolicyKind};
use crate::error::RamoCarError;
use crate::input::ControlIntent;

use policy::{ChangeFilter, MotionLimiter, Throttle};

/// Commands selected for sending in one dispatch step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outgoing {
    pub motion: Option<Command>,
    pub buzzer: Option<Command>,
}

impl Outgoing {
    pub fn is_empty(&self) -> bool {
        self.motion.is_none() && self.buzzer.is_none()
    }
}

/// Encoder plus per-channel rate limiting
///
/// # Examples
///
/// ```
/// use ramocar_remote::command::CommandFormat;
/// use ramocar_remote::config::PolicyKind;
/// use ramocar_remote::dispatch::Dispatcher;
/// use ramocar_remote::input::ControlIntent;
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// let mut dispatcher = Dispatcher::new(CommandFormat::Integer, PolicyKind::Change, Duration::from_millis(500));
/// let out = dispatcher.plan(&ControlIntent::new(1.0, 0.0, 0.0), Instant::now());
/// assert_eq!(out.motion.unwrap().as_str(), "x1y0r0");
/// assert!(out.buzzer.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Dispatcher {
    format: CommandFormat,
    motion: MotionLimiter,
    buzzer: ChangeFilter,
}

impl Dispatcher {
    /// The neutral command and silent buzzer count as already sent for the
    /// change policy, so a resting input produces no traffic.
    pub fn new(format: CommandFormat, policy: PolicyKind, throttle_interval: Duration) -> Self {
        let neutral = encode(&ControlIntent::neutral(), format);
        let motion = match policy {
            PolicyKind::Change => MotionLimiter::Change(ChangeFilter::seeded(neutral)),
            PolicyKind::Throttle => MotionLimiter::Throttle(Throttle::new(throttle_interval)),
        };
        Self {
            format,
            motion,
            buzzer: ChangeFilter::seeded(encode_buzzer(false)),
        }
    }

    /// Select what to send for `intent` sampled at `now`
    pub fn plan(&mut self, intent: &ControlIntent, now: Instant) -> Outgoing {
        Outgoing {
            motion: self.motion.offer(encode(intent, self.format), now),
            buzzer: self.buzzer.offer(encode_buzzer(intent.buzzer)),
        }
    }

    /// Release a coalesced motion command whose interval has elapsed
    pub fn flush(&mut self, now: Instant) -> Option<Command> {
        self.motion.poll(now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.motion.next_deadline()
    }

    /// Forget what was sent so the next plan resends the current state
    pub fn reset(&mut self) {
        self.motion.reset();
        self.buzzer.reset();
    }

    /// Motion command that stops the vehicle
    pub fn neutral(&self) -> Command {
        encode(&ControlIntent::neutral(), self.format)
    }
}

/// Owns a session's lifecycle on behalf of a dispatch loop.
///
/// All BLE failures are logged here and never returned to the loop.
pub struct SessionDriver<T: BleTransport + 'static> {
    session: SharedSession<T>,
    keep_alive_interval: Duration,
    keep_alive: Option<JoinHandle<()>>,
    reconnect: ReconnectPolicy,
}

impl<T: BleTransport + 'static> SessionDriver<T> {
    pub fn new(session: BleSession<T>, ble: &BleConfig) -> Self {
        Self {
            session: session.into_shared(),
            keep_alive_interval: ble.keep_alive_interval(),
            keep_alive: None,
            reconnect: ReconnectPolicy::new(ble.reconnect_attempts, ble.reconnect_interval()),
        }
    }

    pub fn session(&self) -> &SharedSession<T> {
        &self.session
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_connected()
    }

    /// Initial connection. Returns whether the session is connected.
    pub async fn start(&mut self) -> bool {
        let result = self.session.lock().await.connect().await;
        match result {
            Ok(()) => {
                self.on_connected();
                true
            }
            Err(e) => {
                error!("Could not connect to device: {}", e);
                if self.reconnect.is_enabled() {
                    info!(
                        "Will retry up to {} times every {} ms",
                        self.reconnect.max_attempts(),
                        self.reconnect.interval().as_millis()
                    );
                }
                false
            }
        }
    }

    /// Run one reconnection attempt if the session is down and the policy
    /// allows it. Returns `true` when the link came back.
    pub async fn maintain(&mut self, now: Instant) -> bool {
        if !self.reconnect.ready(now) {
            return false;
        }

        let mut session = self.session.lock().await;
        if session.is_connected() {
            return false;
        }

        self.reconnect.record_attempt(now);
        info!(
            "Reconnection attempt {}/{}",
            self.reconnect.attempts(),
            self.reconnect.max_attempts()
        );

        match session.connect().await {
            Ok(()) => {
                drop(session);
                self.on_connected();
                true
            }
            Err(e) => {
                warn!("Reconnection failed: {}", e);
                if self.reconnect.exhausted() {
                    error!("Giving up after {} reconnection attempts", self.reconnect.attempts());
                }
                false
            }
        }
    }

    fn on_connected(&mut self) {
        self.reconnect.reset();
        if let Some(task) = self.keep_alive.take() {
            task.abort();
        }
        self.keep_alive = Some(tokio::spawn(keep_alive(
            self.session.clone(),
            self.keep_alive_interval,
        )));
    }

    /// Write the selected commands, motion first
    pub async fn send(&mut self, outgoing: &Outgoing) {
        if outgoing.is_empty() {
            return;
        }

        let mut session = self.session.lock().await;
        if let Some(command) = &outgoing.motion {
            match session.write(Channel::Motion, command).await {
                Ok(()) => info!("Sent command: {}", command),
                Err(e) => log_write_error(Channel::Motion, &e),
            }
        }
        if let Some(command) = &outgoing.buzzer {
            match session.write(Channel::Buzzer, command).await {
                Ok(()) => info!("Sent buzzer: {}", command),
                Err(e) => log_write_error(Channel::Buzzer, &e),
            }
        }
    }

    /// Stop the vehicle, silence the buzzer and close the link
    pub async fn stop(&mut self, neutral: &Command) {
        if let Some(task) = self.keep_alive.take() {
            task.abort();
        }

        let mut session = self.session.lock().await;
        if !session.is_connected() {
            return;
        }
        if let Err(e) = session.write(Channel::Motion, neutral).await {
            log_write_error(Channel::Motion, &e);
        }
        if let Err(e) = session.write(Channel::Buzzer, &encode_buzzer(false)).await {
            log_write_error(Channel::Buzzer, &e);
        }
        session.disconnect().await;
    }
}

fn log_write_error(channel: Channel, error: &RamoCarError) {
    match error {
        RamoCarError::NotConnected => debug!("{:?} write skipped: not connected", channel),
        other => warn!("{:?} write failed: {}", channel, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::transport::mocks::RecordingTransport;
    use crate::command::protocol::{BUZZER_CHARACTERISTIC_UUID, MOTION_CHARACTERISTIC_UUID};
    use crate::command::encode_integer;

    fn ble_config(reconnect_attempts: u32) -> BleConfig {
        BleConfig {
            reconnect_attempts,
            reconnect_interval_ms: 100,
            ..BleConfig::default()
        }
    }

    fn driver(transport: &RecordingTransport, reconnect_attempts: u32) -> SessionDriver<RecordingTransport> {
        let session = BleSession::new(transport.clone(), "RamoCar", Duration::from_millis(10));
        SessionDriver::new(session, &ble_config(reconnect_attempts))
    }

    #[test]
    fn test_change_policy_ignores_resting_input() {
        let mut dispatcher =
            Dispatcher::new(CommandFormat::Integer, PolicyKind::Change, Duration::from_millis(500));
        let out = dispatcher.plan(&ControlIntent::neutral(), Instant::now());
        assert!(out.is_empty());
    }

    #[test]
    fn test_buzzer_dispatched_independently() {
        let mut dispatcher =
            Dispatcher::new(CommandFormat::Integer, PolicyKind::Change, Duration::from_millis(500));
        let now = Instant::now();

        let pressed = dispatcher.plan(&ControlIntent::neutral().with_buzzer(true), now);
        assert_eq!(pressed.motion, None);
        assert_eq!(pressed.buzzer, Some(encode_buzzer(true)));

        let held = dispatcher.plan(&ControlIntent::new(1.0, 0.0, 0.0).with_buzzer(true), now);
        assert_eq!(held.motion, Some(encode_integer(1, 0, 0)));
        assert_eq!(held.buzzer, None);

        let released = dispatcher.plan(&ControlIntent::new(1.0, 0.0, 0.0), now);
        assert_eq!(released.motion, None);
        assert_eq!(released.buzzer, Some(encode_buzzer(false)));
    }

    #[test]
    fn test_throttle_policy_sends_first_state() {
        let mut dispatcher =
            Dispatcher::new(CommandFormat::Fixed2, PolicyKind::Throttle, Duration::from_millis(500));
        let out = dispatcher.plan(&ControlIntent::neutral(), Instant::now());
        assert_eq!(out.motion.unwrap().as_str(), "x0.00y0.00r0.00");
    }

    #[test]
    fn test_reset_resends_current_state() {
        let mut dispatcher =
            Dispatcher::new(CommandFormat::Integer, PolicyKind::Change, Duration::from_millis(500));
        let now = Instant::now();
        dispatcher.plan(&ControlIntent::new(0.0, 1.0, 0.0), now);
        dispatcher.reset();

        let out = dispatcher.plan(&ControlIntent::new(0.0, 1.0, 0.0), now);
        assert_eq!(out.motion, Some(encode_integer(0, 1, 0)));
        assert_eq!(out.buzzer, Some(encode_buzzer(false)));
    }

    #[test]
    fn test_neutral_follows_format() {
        let integer = Dispatcher::new(CommandFormat::Integer, PolicyKind::Change, Duration::from_millis(1));
        let fixed = Dispatcher::new(CommandFormat::Fixed2, PolicyKind::Change, Duration::from_millis(1));
        assert_eq!(integer.neutral().as_str(), "x0y0r0");
        assert_eq!(fixed.neutral().as_str(), "x0.00y0.00r0.00");
    }

    #[tokio::test]
    async fn test_driver_send_routes_channels() {
        let transport = RecordingTransport::with_car();
        let mut driver = driver(&transport, 0);
        assert!(driver.start().await);

        driver
            .send(&Outgoing {
                motion: Some(encode_integer(1, 0, 0)),
                buzzer: Some(encode_buzzer(true)),
            })
            .await;

        assert_eq!(transport.written_to(MOTION_CHARACTERISTIC_UUID), vec!["x1y0r0"]);
        assert_eq!(transport.written_to(BUZZER_CHARACTERISTIC_UUID), vec!["A4"]);
    }

    #[tokio::test]
    async fn test_driver_swallows_errors_when_device_missing() {
        let transport = RecordingTransport::new();
        let mut driver = driver(&transport, 0);

        assert!(!driver.start().await);
        driver
            .send(&Outgoing {
                motion: Some(encode_integer(1, 0, 0)),
                buzzer: None,
            })
            .await;

        assert!(transport.get_written().is_empty());
        assert!(transport.get_connect_calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_reconnect_by_default() {
        let transport = RecordingTransport::with_car();
        let mut driver = driver(&transport, 0);
        assert!(driver.start().await);
        driver.session().lock().await.mark_lost();

        assert!(!driver.maintain(Instant::now() + Duration::from_secs(10)).await);
        assert!(!driver.is_connected().await);
        assert_eq!(transport.get_connect_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_bounded_reconnect() {
        let transport = RecordingTransport::with_car();
        let mut driver = driver(&transport, 2);
        assert!(driver.start().await);
        driver.session().lock().await.mark_lost();
        transport.set_fail_connect(true);

        let t0 = Instant::now();
        assert!(!driver.maintain(t0).await);
        // Too soon for the next attempt
        assert!(!driver.maintain(t0 + Duration::from_millis(50)).await);
        assert!(!driver.maintain(t0 + Duration::from_millis(100)).await);
        // Budget spent
        transport.set_fail_connect(false);
        assert!(!driver.maintain(t0 + Duration::from_secs(10)).await);

        assert_eq!(transport.get_connect_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_reconnect_restores_link() {
        let transport = RecordingTransport::with_car();
        let mut driver = driver(&transport, 1);
        assert!(driver.start().await);
        driver.session().lock().await.mark_lost();

        assert!(driver.maintain(Instant::now()).await);
        assert!(driver.is_connected().await);
    }

    #[tokio::test]
    async fn test_stop_sends_neutral_and_disconnects() {
        let transport = RecordingTransport::with_car();
        let mut driver = driver(&transport, 0);
        assert!(driver.start().await);

        driver.stop(&encode_integer(0, 0, 0)).await;

        assert_eq!(transport.written_text(), vec!["x0y0r0", "00"]);
        assert_eq!(transport.get_disconnect_calls(), 1);
        assert!(!driver.is_connected().await);
    }

    #[tokio::test]
    async fn test_stop_without_connection_writes_nothing() {
        let transport = RecordingTransport::new();
        let mut driver = driver(&transport, 0);
        driver.start().await;
        driver.stop(&encode_integer(0, 0, 0)).await;
        assert!(transport.get_written().is_empty());
        assert_eq!(transport.get_disconnect_calls(), 0);
    }
}
