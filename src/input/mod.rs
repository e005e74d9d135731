//! # Input Module
//!
//! Keyboard and gamepad input handling.
//!
//! This module handles:
//! - Detecting input devices via evdev
//! - Polling key and axis state at the dispatch sampling rate
//! - Mapping arrow keys / sticks to [`ControlIntent`] snapshots
//! - Stick normalization and deadzones

pub mod calibration;
pub mod gamepad;
pub mod intent;
pub mod keyboard;

use std::path::{Path, PathBuf};

use evdev::Device;
use tracing::{debug, info};

use crate::config::{InputConfig, InputSourceKind};
use crate::error::{RamoCarError, Result};

pub use intent::{ControlIntent, StickPosition, SticksState};

/// A source of control intents that can be sampled on demand.
pub trait InputSource: Send {
    /// Reads the current intent without blocking.
    fn sample(&mut self) -> Result<ControlIntent>;

    /// Human-readable device description for logs.
    fn describe(&self) -> String;
}

/// Opens the input source selected in the configuration.
///
/// # Errors
///
/// - `InputNotFound`: no matching device, or the configured path cannot be opened
pub fn open_source(config: &InputConfig) -> Result<Box<dyn InputSource>> {
    match config.source {
        InputSourceKind::Keyboard => {
            let source = keyboard::KeyboardSource::open(&config.device_path)?;
            Ok(Box::new(source))
        }
        InputSourceKind::Gamepad => {
            let source = gamepad::GamepadSource::open(config)?;
            Ok(Box::new(source))
        }
    }
}

/// Opens `path` if given, otherwise the first `/dev/input/event*` device
/// accepted by `accept`.
///
/// Entries are sorted so the selection is deterministic when several
/// devices match.
pub(crate) fn find_device<F>(path: &str, kind: &str, accept: F) -> Result<(Device, PathBuf)>
where
    F: Fn(&Device) -> bool,
{
    if !path.is_empty() {
        let device = Device::open(path)
            .map_err(|e| RamoCarError::InputNotFound(format!("{}: {}", path, e)))?;
        info!("Using configured {} at {}", kind, path);
        return Ok((device, PathBuf::from(path)));
    }

    let input_dir = Path::new("/dev/input");
    let mut entries: Vec<PathBuf> = std::fs::read_dir(input_dir)
        .map_err(|e| RamoCarError::InputNotFound(format!("Failed to read /dev/input: {}", e)))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .map(|name| name.to_string_lossy().starts_with("event"))
                .unwrap_or(false)
        })
        .collect();
    entries.sort();

    for candidate in entries {
        match Device::open(&candidate) {
            Ok(device) => {
                if accept(&device) {
                    info!(
                        "Found {} '{}' at {}",
                        kind,
                        device.name().unwrap_or("unnamed"),
                        candidate.display()
                    );
                    return Ok((device, candidate));
                }
            }
            Err(e) => debug!("Could not open {}: {}", candidate.display(), e),
        }
    }

    Err(RamoCarError::InputNotFound(format!("no {} under /dev/input", kind)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_device_with_missing_path_fails() {
        let result = find_device("/dev/input/nonexistent_event_99", "keyboard", |_| true);
        match result {
            Err(RamoCarError::InputNotFound(msg)) => {
                assert!(msg.contains("/dev/input/nonexistent_event_99"));
            }
            Err(other) => panic!("Expected InputNotFound, got: {:?}", other),
            Ok(_) => panic!("Expected InputNotFound, got a device"),
        }
    }

    #[test]
    fn test_find_device_rejecting_everything_fails() {
        // Either /dev/input is unreadable or nothing is accepted
        assert!(find_device("", "gamepad", |_| false).is_err());
    }
}
