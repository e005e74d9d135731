//! # BLE Session
//!
//! One connection to the target vehicle and the writes made over it.
//!
//! ## Link States
//!
//! | State | Meaning | Writes |
//! |-------|---------|--------|
//! | `Idle` | Never connected (or connect failed) | Skipped |
//! | `Connected` | Live link to a known address | Sent |
//! | `Lost` | Was connected, a write or disconnect ended it | Skipped |
//!
//! Connection loss is detected lazily: the first failed write moves the
//! session to `Lost`. A lost session only comes back through [`BleSession::connect`].
//!
//! ## Serialization
//!
//! The session is shared as [`SharedSession`], a single async mutex. The
//! dispatch path and [`keep_alive`] both write through it, so at most one write
//! is ever in flight per session.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::transport::BleTransport;
use crate::command::protocol::Channel;
use crate::command::Command;
use crate::error::{RamoCarError, Result};

/// Connection state of a [`BleSession`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// No device bound yet
    Idle,
    /// Connected to the device at `address`
    Connected { address: String },
    /// Previously connected to `address`, link dropped
    Lost { address: String },
}

/// Session shared between the dispatch loop and the keep-alive task
pub type SharedSession<T> = Arc<Mutex<BleSession<T>>>;

/// BLE session with the target vehicle
pub struct BleSession<T> {
    transport: T,
    device_name: String,
    scan_window: Duration,
    link: LinkState,
    last_send: Option<Instant>,
    last_motion: Option<Command>,
}

impl<T> std::fmt::Debug for BleSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleSession")
            .field("device_name", &self.device_name)
            .field("link", &self.link)
            .field("last_motion", &self.last_motion)
            .finish_non_exhaustive()
    }
}

impl<T: BleTransport> BleSession<T> {
    /// Creates an idle session targeting `device_name`
    pub fn new(transport: T, device_name: impl Into<String>, scan_window: Duration) -> Self {
        Self {
            transport,
            device_name: device_name.into(),
            scan_window,
            link: LinkState::Idle,
            last_send: None,
            last_motion: None,
        }
    }

    /// Scan for `device_name` and connect to the first match
    ///
    /// # Errors
    ///
    /// - `NotFound`: no advertised name matched; no connection was attempted
    /// - `Connection`: the connect call failed
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ramocar_remote::ble::{BleSession, BtleplugCentral};
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let central = BtleplugCentral::new().await?;
    ///     let session = BleSession::discover_and_connect(central, "RamoCar", Duration::from_secs(5)).await?;
    ///     println!("Connected to {:?}", session.address());
    ///     Ok(())
    /// }
    /// ```
    pub async fn discover_and_connect(
        transport: T,
        device_name: &str,
        scan_window: Duration,
    ) -> Result<Self> {
        let mut session = Self::new(transport, device_name, scan_window);
        session.connect().await?;
        Ok(session)
    }

    /// Bring the link up
    ///
    /// An idle session scans for the target name; a lost session reconnects
    /// to the address it was bound to. Connected sessions are left alone.
    pub async fn connect(&mut self) -> Result<()> {
        let address = match &self.link {
            LinkState::Connected { .. } => return Ok(()),
            LinkState::Lost { address } => address.clone(),
            LinkState::Idle => self.discover().await?,
        };

        debug!("Connecting to {} at {}", self.device_name, address);
        self.transport.connect(&address).await.map_err(|e| match e {
            RamoCarError::Connection(_) => e,
            other => RamoCarError::Connection(other.to_string()),
        })?;

        info!("Connected to {} at {}", self.device_name, address);
        self.link = LinkState::Connected { address };
        Ok(())
    }

    async fn discover(&mut self) -> Result<String> {
        info!(
            "Scanning for '{}' ({} ms)",
            self.device_name,
            self.scan_window.as_millis()
        );
        let devices = self.transport.scan(self.scan_window).await?;

        devices
            .into_iter()
            .find(|d| d.name.as_deref() == Some(self.device_name.as_str()))
            .map(|d| d.address)
            .ok_or_else(|| RamoCarError::NotFound(self.device_name.clone()))
    }

    /// Write a command to a characteristic
    ///
    /// Skipped with `NotConnected` (and no transport call) unless connected.
    /// A transport failure marks the session `Lost` and returns `Write`.
    pub async fn write(&mut self, channel: Channel, command: &Command) -> Result<()> {
        if !self.is_connected() {
            debug!("Skipping {:?} write '{}': not connected", channel, command);
            return Err(RamoCarError::NotConnected);
        }

        match self.transport.write(channel.uuid(), command.as_bytes()).await {
            Ok(()) => {
                debug!("Sent {:?} command: {}", channel, command);
                self.last_send = Some(Instant::now());
                if channel == Channel::Motion {
                    self.last_motion = Some(command.clone());
                }
                Ok(())
            }
            Err(e) => {
                self.mark_lost();
                Err(match e {
                    RamoCarError::Write(_) => e,
                    other => RamoCarError::Write(other.to_string()),
                })
            }
        }
    }

    /// Close the link; the session remembers the address for reconnection
    pub async fn disconnect(&mut self) {
        if !self.is_connected() {
            return;
        }
        if let Err(e) = self.transport.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
        self.mark_lost();
        info!("Disconnected from {}", self.device_name);
    }

    /// Record that the link is gone without touching the transport
    pub fn mark_lost(&mut self) {
        if let LinkState::Connected { address } = &self.link {
            warn!("Lost connection to {} at {}", self.device_name, address);
            self.link = LinkState::Lost {
                address: address.clone(),
            };
        }
    }

    /// Wrap the session for sharing with the keep-alive task
    pub fn into_shared(self) -> SharedSession<T> {
        Arc::new(Mutex::new(self))
    }
}

impl<T> BleSession<T> {
    pub fn is_connected(&self) -> bool {
        matches!(self.link, LinkState::Connected { .. })
    }

    pub fn link(&self) -> &LinkState {
        &self.link
    }

    /// Address of the bound device, if any
    pub fn address(&self) -> Option<&str> {
        match &self.link {
            LinkState::Idle => None,
            LinkState::Connected { address } | LinkState::Lost { address } => Some(address),
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Time of the last successful write
    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }

    /// Last motion command successfully written
    pub fn last_motion(&self) -> Option<&Command> {
        self.last_motion.as_ref()
    }
}

/// Re-issue the last motion command every `interval` while connected
///
/// Returns at the first tick that finds the session disconnected. Nothing is
/// written before the first motion command has gone out.
pub async fn keep_alive<T: BleTransport>(session: SharedSession<T>, interval: Duration) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let mut session = session.lock().await;
        if !session.is_connected() {
            debug!("Keep-alive stopped: session not connected");
            return;
        }

        let Some(command) = session.last_motion().cloned() else {
            continue;
        };

        match session.write(Channel::Motion, &command).await {
            Ok(()) => debug!("Keep-alive sent: {}", command),
            Err(e) => warn!("Keep-alive write failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::transport::mocks::RecordingTransport;
    use crate::ble::transport::{DiscoveredDevice, MockBleTransport};
    use crate::command::protocol::{BUZZER_CHARACTERISTIC_UUID, MOTION_CHARACTERISTIC_UUID};
    use crate::command::{encode_buzzer, encode_integer};
    use tokio_test::{assert_err, assert_ok};

    const WINDOW: Duration = Duration::from_millis(10);

    async fn connected_session(transport: &RecordingTransport) -> BleSession<RecordingTransport> {
        BleSession::discover_and_connect(transport.clone(), "RamoCar", WINDOW)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_discovery_binds_matching_address() {
        let transport = RecordingTransport::new();
        transport.add_device(Some("Headphones"), "11:11:11:11:11:11");
        transport.add_device(None, "22:22:22:22:22:22");
        transport.add_device(Some("RamoCar"), "AA:BB:CC:DD:EE:FF");

        let session = connected_session(&transport).await;

        assert!(session.is_connected());
        assert_eq!(session.address(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(transport.get_connect_calls(), vec!["AA:BB:CC:DD:EE:FF"]);
    }

    #[tokio::test]
    async fn test_discovery_first_match_wins() {
        let transport = RecordingTransport::new();
        transport.add_device(Some("RamoCar"), "AA:AA:AA:AA:AA:AA");
        transport.add_device(Some("RamoCar"), "BB:BB:BB:BB:BB:BB");

        let session = connected_session(&transport).await;
        assert_eq!(session.address(), Some("AA:AA:AA:AA:AA:AA"));
    }

    #[tokio::test]
    async fn test_discovery_name_must_match_exactly() {
        let mut mock = MockBleTransport::new();
        mock.expect_scan().times(1).returning(|_| {
            Ok(vec![
                DiscoveredDevice {
                    name: Some("RamoCar2".to_string()),
                    address: "AA:BB:CC:DD:EE:FF".to_string(),
                },
                DiscoveredDevice {
                    name: Some("ramocar".to_string()),
                    address: "AA:BB:CC:DD:EE:00".to_string(),
                },
            ])
        });
        mock.expect_connect().times(0);

        let result = BleSession::discover_and_connect(mock, "RamoCar", WINDOW).await;
        match result {
            Err(RamoCarError::NotFound(name)) => assert_eq!(name, "RamoCar"),
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_discovery_without_match_never_connects() {
        let mut mock = MockBleTransport::new();
        mock.expect_scan().times(1).returning(|_| Ok(Vec::new()));
        mock.expect_connect().times(0);
        mock.expect_write().times(0);

        let mut session = BleSession::new(mock, "RamoCar", WINDOW);
        assert!(matches!(session.connect().await, Err(RamoCarError::NotFound(_))));
        assert_eq!(session.link(), &LinkState::Idle);
    }

    #[tokio::test]
    async fn test_connect_failure_is_connection_error() {
        let transport = RecordingTransport::with_car();
        transport.set_fail_connect(true);

        let mut session = BleSession::new(transport.clone(), "RamoCar", WINDOW);
        let result = session.connect().await;

        assert!(matches!(result, Err(RamoCarError::Connection(_))));
        assert_eq!(session.link(), &LinkState::Idle);
        assert_eq!(transport.get_connect_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_error_propagates() {
        let mut mock = MockBleTransport::new();
        mock.expect_scan()
            .returning(|_| Err(RamoCarError::Adapter("powered off".to_string())));
        mock.expect_connect().times(0);

        let result = BleSession::discover_and_connect(mock, "RamoCar", WINDOW).await;
        assert!(matches!(result, Err(RamoCarError::Adapter(_))));
    }

    #[tokio::test]
    async fn test_write_while_idle_is_skipped() {
        let mut mock = MockBleTransport::new();
        mock.expect_write().times(0);

        let mut session = BleSession::new(mock, "RamoCar", WINDOW);
        let result = session.write(Channel::Motion, &encode_integer(1, 0, 0)).await;

        assert!(matches!(result, Err(RamoCarError::NotConnected)));
        assert!(session.last_send().is_none());
    }

    #[tokio::test]
    async fn test_write_targets_channel_characteristic() {
        let transport = RecordingTransport::with_car();
        let mut session = connected_session(&transport).await;

        assert_ok!(session.write(Channel::Motion, &encode_integer(1, -1, 0)).await);
        assert_ok!(session.write(Channel::Buzzer, &encode_buzzer(true)).await);

        assert_eq!(
            transport.get_written(),
            vec![
                (MOTION_CHARACTERISTIC_UUID, b"x1y-1r0".to_vec()),
                (BUZZER_CHARACTERISTIC_UUID, b"A4".to_vec()),
            ]
        );
        assert_eq!(session.last_motion(), Some(&encode_integer(1, -1, 0)));
        assert!(session.last_send().is_some());
    }

    #[tokio::test]
    async fn test_failed_write_marks_session_lost() {
        let transport = RecordingTransport::with_car();
        let mut session = connected_session(&transport).await;
        transport.set_fail_writes(true);

        let result = session.write(Channel::Motion, &encode_integer(0, 1, 0)).await;
        assert!(matches!(result, Err(RamoCarError::Write(_))));
        assert_eq!(
            session.link(),
            &LinkState::Lost {
                address: "AA:BB:CC:DD:EE:FF".to_string()
            }
        );

        // Further writes are skipped without touching the transport
        transport.set_fail_writes(false);
        assert_err!(session.write(Channel::Motion, &encode_integer(0, 1, 0)).await);
        assert!(transport.get_written().is_empty());
    }

    #[tokio::test]
    async fn test_lost_session_reconnects_to_known_address() {
        let transport = RecordingTransport::with_car();
        let mut session = connected_session(&transport).await;
        session.mark_lost();

        // The car is no longer advertising, reconnection must not rescan
        transport.devices.lock().unwrap().clear();
        assert_ok!(session.connect().await);

        assert!(session.is_connected());
        assert_eq!(
            transport.get_connect_calls(),
            vec!["AA:BB:CC:DD:EE:FF", "AA:BB:CC:DD:EE:FF"]
        );
    }

    #[tokio::test]
    async fn test_connect_when_connected_is_noop() {
        let transport = RecordingTransport::with_car();
        let mut session = connected_session(&transport).await;
        assert_ok!(session.connect().await);
        assert_eq!(transport.get_connect_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect() {
        let transport = RecordingTransport::with_car();
        let mut session = connected_session(&transport).await;

        session.disconnect().await;
        assert!(!session.is_connected());
        assert_eq!(transport.get_disconnect_calls(), 1);

        // Second disconnect is a no-op
        session.disconnect().await;
        assert_eq!(transport.get_disconnect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_repeats_last_motion() {
        let transport = RecordingTransport::with_car();
        let mut session = connected_session(&transport).await;
        session
            .write(Channel::Motion, &encode_integer(1, 0, 0))
            .await
            .unwrap();
        let shared = session.into_shared();

        let task = tokio::spawn(keep_alive(shared.clone(), Duration::from_secs(5)));

        time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(transport.written_text(), vec!["x1y0r0", "x1y0r0", "x1y0r0"]);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_waits_for_first_command() {
        let transport = RecordingTransport::with_car();
        let shared = connected_session(&transport).await.into_shared();

        let task = tokio::spawn(keep_alive(shared.clone(), Duration::from_secs(5)));
        time::sleep(Duration::from_secs(12)).await;

        assert!(transport.get_written().is_empty());
        assert!(!task.is_finished());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_stops_after_disconnect() {
        let transport = RecordingTransport::with_car();
        let mut session = connected_session(&transport).await;
        session
            .write(Channel::Motion, &encode_integer(0, 0, 1))
            .await
            .unwrap();
        let shared = session.into_shared();

        let task = tokio::spawn(keep_alive(shared.clone(), Duration::from_secs(5)));
        time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(transport.get_written().len(), 2);

        shared.lock().await.mark_lost();

        // Must finish within one interval
        let finished = time::timeout(Duration::from_secs(5), task).await;
        assert!(finished.is_ok(), "keep-alive still running after disconnect");
        assert_eq!(transport.get_written().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_stops_after_failed_write() {
        let transport = RecordingTransport::with_car();
        let mut session = connected_session(&transport).await;
        session
            .write(Channel::Motion, &encode_integer(1, 1, 0))
            .await
            .unwrap();
        let shared = session.into_shared();
        transport.set_fail_writes(true);

        let task = tokio::spawn(keep_alive(shared.clone(), Duration::from_secs(1)));
        let finished = time::timeout(Duration::from_millis(2_500), task).await;

        assert!(finished.is_ok());
        assert!(!shared.lock().await.is_connected());
        assert_eq!(transport.get_written().len(), 1);
    }
}
