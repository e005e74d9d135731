//! Trait abstraction for BLE central operations to enable testing

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::error;
use uuid::Uuid;

use crate::error::{RamoCarError, Result};

/// A peripheral seen during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Advertised local name, if any
    pub name: Option<String>,
    /// Transport address (MAC on Linux)
    pub address: String,
}

/// Trait for BLE central operations against a single peripheral
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BleTransport: Send {
    /// Scan for `window` and return every peripheral seen
    async fn scan(&mut self, window: Duration) -> Result<Vec<DiscoveredDevice>>;

    /// Connect to the peripheral at `address` and resolve its characteristics
    async fn connect(&mut self, address: &str) -> Result<()>;

    /// Write `payload` to the characteristic `characteristic`
    async fn write(&mut self, characteristic: Uuid, payload: &[u8]) -> Result<()>;

    /// Drop the current connection, if any
    async fn disconnect(&mut self) -> Result<()>;
}

/// A missing transport behaves as an adapter that finds nothing and accepts
/// no writes, so sessions built on it stay idle.
#[async_trait]
impl<T: BleTransport> BleTransport for Option<T> {
    async fn scan(&mut self, window: Duration) -> Result<Vec<DiscoveredDevice>> {
        match self {
            Some(transport) => transport.scan(window).await,
            None => Err(offline()),
        }
    }

    async fn connect(&mut self, address: &str) -> Result<()> {
        match self {
            Some(transport) => transport.connect(address).await,
            None => Err(offline()),
        }
    }

    async fn write(&mut self, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        match self {
            Some(transport) => transport.write(characteristic, payload).await,
            None => Err(offline()),
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        match self {
            Some(transport) => transport.disconnect().await,
            None => Ok(()),
        }
    }
}

fn offline() -> RamoCarError {
    RamoCarError::Adapter("no Bluetooth adapter available".to_string())
}

/// Await a transport constructor, logging a failure instead of returning it.
///
/// Input handling keeps running without Bluetooth; every write is skipped.
pub async fn transport_or_offline<T, F>(opening: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match opening.await {
        Ok(transport) => Some(transport),
        Err(e) => {
            error!("Bluetooth unavailable, continuing without it: {}", e);
            None
        }
    }
}
