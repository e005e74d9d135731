//! # btleplug Central
//!
//! [`BleTransport`] backed by the host Bluetooth adapter through `btleplug`.

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::transport::{BleTransport, DiscoveredDevice};
use crate::command::protocol::{BUZZER_CHARACTERISTIC_UUID, MOTION_CHARACTERISTIC_UUID, SERVICE_UUID};
use crate::error::{RamoCarError, Result};

/// Peripheral we are connected to, with its resolved characteristics
struct Link {
    peripheral: Peripheral,
    characteristics: Vec<Characteristic>,
}

/// Host Bluetooth adapter acting as a BLE central
pub struct BtleplugCentral {
    adapter: Adapter,
    link: Option<Link>,
}

impl std::fmt::Debug for BtleplugCentral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugCentral")
            .field("connected", &self.link.is_some())
            .finish_non_exhaustive()
    }
}

impl BtleplugCentral {
    /// Acquire the first Bluetooth adapter of the host
    ///
    /// # Errors
    ///
    /// Returns `Adapter` if the Bluetooth stack is unavailable or no adapter exists
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|e| RamoCarError::Adapter(format!("Failed to start BLE manager: {}", e)))?;

        let adapter = manager
            .adapters()
            .await
            .map_err(|e| RamoCarError::Adapter(format!("Failed to list adapters: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| RamoCarError::Adapter("no Bluetooth adapter found".to_string()))?;

        match adapter.adapter_info().await {
            Ok(adapter_info) => info!("Using Bluetooth adapter {}", adapter_info),
            Err(e) => debug!("Adapter info unavailable: {}", e),
        }

        Ok(Self { adapter, link: None })
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| RamoCarError::Connection(format!("Failed to list peripherals: {}", e)))?;

        peripherals
            .into_iter()
            .find(|p| p.address().to_string() == address)
            .ok_or_else(|| RamoCarError::Connection(format!("{} is no longer known to the adapter", address)))
    }
}

#[async_trait]
impl BleTransport for BtleplugCentral {
    async fn scan(&mut self, window: Duration) -> Result<Vec<DiscoveredDevice>> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| RamoCarError::Adapter(format!("Failed to start scan: {}", e)))?;

        tokio::time::sleep(window).await;

        let peripherals = self.adapter.peripherals().await;
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
        let peripherals =
            peripherals.map_err(|e| RamoCarError::Adapter(format!("Failed to list peripherals: {}", e)))?;

        let mut devices = Vec::with_capacity(peripherals.len());
        for peripheral in peripherals {
            let name = match peripheral.properties().await {
                Ok(properties) => properties.and_then(|p| p.local_name),
                Err(e) => {
                    debug!("No properties for {}: {}", peripheral.address(), e);
                    None
                }
            };
            devices.push(DiscoveredDevice {
                name,
                address: peripheral.address().to_string(),
            });
        }

        debug!("Scan found {} peripherals", devices.len());
        Ok(devices)
    }

    async fn connect(&mut self, address: &str) -> Result<()> {
        let peripheral = self.find_peripheral(address).await?;

        peripheral
            .connect()
            .await
            .map_err(|e| RamoCarError::Connection(format!("Failed to connect to {}: {}", address, e)))?;

        peripheral
            .discover_services()
            .await
            .map_err(|e| RamoCarError::Connection(format!("Service discovery failed: {}", e)))?;

        if peripheral.services().iter().any(|s| s.uuid == SERVICE_UUID) {
            info!("RamoCar service {} present", SERVICE_UUID);
        }

        let characteristics: Vec<Characteristic> = peripheral.characteristics().into_iter().collect();

        if !characteristics.iter().any(|c| c.uuid == MOTION_CHARACTERISTIC_UUID) {
            // Leave the radio link in a clean state before reporting
            if let Err(e) = peripheral.disconnect().await {
                debug!("Disconnect after failed verification: {}", e);
            }
            return Err(RamoCarError::Connection(format!(
                "{} has no motion characteristic {}",
                address, MOTION_CHARACTERISTIC_UUID
            )));
        }
        if !characteristics.iter().any(|c| c.uuid == BUZZER_CHARACTERISTIC_UUID) {
            warn!("{} has no buzzer characteristic, horn commands will fail", address);
        }

        self.link = Some(Link {
            peripheral,
            characteristics,
        });
        Ok(())
    }

    async fn write(&mut self, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        let link = self.link.as_ref().ok_or(RamoCarError::NotConnected)?;

        let target = link
            .characteristics
            .iter()
            .find(|c| c.uuid == characteristic)
            .ok_or_else(|| RamoCarError::Write(format!("characteristic {} not found", characteristic)))?;

        link.peripheral
            .write(target, payload, WriteType::WithResponse)
            .await
            .map_err(|e| RamoCarError::Write(format!("Failed to write {}: {}", characteristic, e)))
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(link) = self.link.take() {
            link.peripheral
                .disconnect()
                .await
                .map_err(|e| RamoCarError::Connection(format!("Failed to disconnect: {}", e)))?;
        }
        Ok(())
    }
}
