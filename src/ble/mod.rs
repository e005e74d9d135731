//! # BLE Module
//!
//! Bluetooth Low Energy link to the RamoCar.
//!
//! This module handles:
//! - Scanning for the vehicle by advertised name
//! - Connecting and resolving the motion / buzzer characteristics
//! - Serialized characteristic writes
//! - Keep-alive re-writes of the last motion command
//! - Bounded reconnection after link loss

pub mod central;
pub mod reconnect;
pub mod session;
pub mod transport;

pub use central::BtleplugCentral;
pub use reconnect::ReconnectPolicy;
pub use session::{keep_alive, BleSession, LinkState, SharedSession};
pub use transport::{transport_or_offline, BleTransport, DiscoveredDevice};
