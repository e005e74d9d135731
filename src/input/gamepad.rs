//! # Gamepad Input
//!
//! Reads two analog sticks from a gamepad through evdev.
//!
//! ## Axes
//!
//! | Stick | Layout `z` (DualSense) | Layout `rx` (XInput style) | Drives |
//! |-------|------------------------|----------------------------|--------|
//! | Direction | ABS_X / ABS_Y | ABS_X / ABS_Y | x / y |
//! | Rotation | ABS_Z / ABS_RZ | ABS_RX / ABS_RY | r (horizontal) |
//!
//! The South face button (Cross / A) sounds the buzzer.

use std::path::PathBuf;

use evdev::{AbsoluteAxisType, Device, Key};
use tracing::debug;

use super::calibration::{normalize_axis, StickCalibration};
use super::intent::{StickPosition, SticksState};
use super::{find_device, ControlIntent, InputSource};
use crate::config::{InputConfig, RotationAxes};
use crate::error::{RamoCarError, Result};

/// Raw reading of one absolute axis: `(value, minimum, maximum)`.
pub type AxisReading = (i32, i32, i32);

/// evdev axes of the rotation stick for a layout.
#[must_use]
pub fn rotation_axes(layout: RotationAxes) -> (AbsoluteAxisType, AbsoluteAxisType) {
    match layout {
        RotationAxes::Z => (AbsoluteAxisType::ABS_Z, AbsoluteAxisType::ABS_RZ),
        RotationAxes::Rx => (AbsoluteAxisType::ABS_RX, AbsoluteAxisType::ABS_RY),
    }
}

/// Builds both stick positions from raw axis readings.
///
/// Vertical axes are inverted so that pushing a stick up reads positive.
pub fn read_sticks<F>(read: F, layout: RotationAxes, calibration: &StickCalibration) -> SticksState
where
    F: Fn(AbsoluteAxisType) -> AxisReading,
{
    let stick = |horizontal: AbsoluteAxisType, vertical: AbsoluteAxisType| {
        let (hv, hmin, hmax) = read(horizontal);
        let (vv, vmin, vmax) = read(vertical);
        calibration.apply_stick(StickPosition {
            x: normalize_axis(hv, hmin, hmax),
            y: -normalize_axis(vv, vmin, vmax),
        })
    };

    let (rot_x, rot_y) = rotation_axes(layout);
    SticksState {
        direction: stick(AbsoluteAxisType::ABS_X, AbsoluteAxisType::ABS_Y),
        rotation: stick(rot_x, rot_y),
    }
}

/// Gamepad opened through evdev.
pub struct GamepadSource {
    device: Device,
    path: PathBuf,
    layout: RotationAxes,
    calibration: StickCalibration,
    last_sticks: SticksState,
}

impl GamepadSource {
    /// Opens the configured gamepad, or the first device exposing both sticks.
    ///
    /// # Errors
    ///
    /// Returns `InputNotFound` if no gamepad can be opened
    pub fn open(config: &InputConfig) -> Result<Self> {
        let layout = config.rotation_axes;
        let (rot_x, _) = rotation_axes(layout);
        let (device, path) = find_device(&config.device_path, "gamepad", |device| {
            device.supported_absolute_axes().map_or(false, |axes| {
                axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(rot_x)
            })
        })?;

        Ok(Self {
            device,
            path,
            layout,
            calibration: StickCalibration::new(config.deadzone),
            last_sticks: SticksState::default(),
        })
    }
}

impl InputSource for GamepadSource {
    fn sample(&mut self) -> Result<ControlIntent> {
        let abs = self
            .device
            .get_abs_state()
            .map_err(|e| RamoCarError::Input(format!("Failed to read axis state: {}", e)))?;
        let keys = self
            .device
            .get_key_state()
            .map_err(|e| RamoCarError::Input(format!("Failed to read button state: {}", e)))?;

        let sticks = read_sticks(
            |axis| {
                let info = &abs[axis.0 as usize];
                (info.value, info.minimum, info.maximum)
            },
            self.layout,
            &self.calibration,
        );

        if sticks != self.last_sticks {
            debug!("{}", sticks);
            self.last_sticks = sticks;
        }

        Ok(sticks.to_intent(keys.contains(Key::BTN_SOUTH)))
    }

    fn describe(&self) -> String {
        format!(
            "gamepad '{}' ({})",
            self.device.name().unwrap_or("unnamed"),
            self.path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(values: &[(AbsoluteAxisType, i32)]) -> impl Fn(AbsoluteAxisType) -> AxisReading + '_ {
        move |axis| {
            let value = values
                .iter()
                .find(|(a, _)| *a == axis)
                .map(|(_, v)| *v)
                .unwrap_or(128);
            (value, 0, 256)
        }
    }

    #[test]
    fn test_centered_sticks() {
        let sticks = read_sticks(reader(&[]), RotationAxes::Z, &StickCalibration::default());
        assert_eq!(sticks, SticksState::default());
    }

    #[test]
    fn test_stick_up_reads_positive() {
        let values = [(AbsoluteAxisType::ABS_Y, 0)];
        let sticks = read_sticks(reader(&values), RotationAxes::Z, &StickCalibration::new(0.0));
        assert_eq!(sticks.direction.y, 1.0);
        assert_eq!(sticks.direction.x, 0.0);
    }

    #[test]
    fn test_rotation_layout_z() {
        let values = [(AbsoluteAxisType::ABS_Z, 256), (AbsoluteAxisType::ABS_RX, 0)];
        let sticks = read_sticks(reader(&values), RotationAxes::Z, &StickCalibration::new(0.0));
        assert_eq!(sticks.rotation.x, 1.0);
    }

    #[test]
    fn test_rotation_layout_rx() {
        let values = [(AbsoluteAxisType::ABS_Z, 256), (AbsoluteAxisType::ABS_RX, 0)];
        let sticks = read_sticks(reader(&values), RotationAxes::Rx, &StickCalibration::new(0.0));
        assert_eq!(sticks.rotation.x, -1.0);
    }

    #[test]
    fn test_deadzone_applied_to_sticks() {
        let values = [(AbsoluteAxisType::ABS_X, 132)];
        let sticks = read_sticks(reader(&values), RotationAxes::Z, &StickCalibration::new(0.05));
        assert_eq!(sticks.direction.x, 0.0);
    }

    #[test]
    fn test_rotation_axes_mapping() {
        assert_eq!(
            rotation_axes(RotationAxes::Z),
            (AbsoluteAxisType::ABS_Z, AbsoluteAxisType::ABS_RZ)
        );
        assert_eq!(
            rotation_axes(RotationAxes::Rx),
            (AbsoluteAxisType::ABS_RX, AbsoluteAxisType::ABS_RY)
        );
    }
}
