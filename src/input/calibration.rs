//! # Stick Calibration
//!
//! Converts raw evdev axis readings into normalized stick positions.
//!
//! ## Normalization
//!
//! Raw readings span `minimum..=maximum` as reported by the device. They are
//! mapped linearly onto `-1.0..=1.0` around the midpoint. Vertical axes report
//! "down" as larger values, so they are inverted to make "up" positive.
//!
//! ## Deadzone
//!
//! Readings within the deadzone snap to center and the remaining travel is
//! rescaled to the full range. A resting stick therefore encodes to
//! `x0.00y0.00r0.00` instead of jittering around it.
//!
//! ## Usage
//!
//! ```
//! use ramocar_remote::input::calibration::{normalize_axis, StickCalibration};
//!
//! let cal = StickCalibration::new(0.05);
//! assert_eq!(cal.apply(normalize_axis(128, 0, 255)), 0.0);
//! assert!((cal.apply(normalize_axis(255, 0, 255)) - 1.0).abs() < 0.001);
//! ```

use super::intent::StickPosition;

/// Maps a raw axis reading onto `-1.0..=1.0`.
///
/// Degenerate ranges (`maximum <= minimum`) read as centered.
#[must_use]
pub fn normalize_axis(value: i32, minimum: i32, maximum: i32) -> f32 {
    if maximum <= minimum {
        return 0.0;
    }
    let span = (i64::from(maximum) - i64::from(minimum)) as f32;
    let offset = (i64::from(value) - i64::from(minimum)) as f32;
    (offset / span * 2.0 - 1.0).clamp(-1.0, 1.0)
}

/// Deadzone applied to each stick axis.
#[derive(Debug, Clone, Copy)]
pub struct StickCalibration {
    /// Deadzone as a fraction (0.0 to 0.25).
    deadzone: f32,
}

impl Default for StickCalibration {
    fn default() -> Self {
        Self { deadzone: 0.05 }
    }
}

impl StickCalibration {
    /// Creates a calibration with the given deadzone, clamped to `0.0..=0.25`.
    #[must_use]
    pub fn new(deadzone: f32) -> Self {
        Self {
            deadzone: deadzone.clamp(0.0, 0.25),
        }
    }

    /// Returns the configured deadzone value.
    #[must_use]
    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    /// Applies the deadzone to a normalized axis value.
    ///
    /// # Examples
    ///
    /// ```
    /// use ramocar_remote::input::calibration::StickCalibration;
    ///
    /// let cal = StickCalibration::new(0.1);
    /// assert_eq!(cal.apply(0.05), 0.0);
    /// assert_eq!(cal.apply(-0.05), 0.0);
    /// assert!((cal.apply(-1.0) + 1.0).abs() < 0.001);
    /// ```
    #[must_use]
    pub fn apply(&self, input: f32) -> f32 {
        let magnitude = input.abs();
        if magnitude <= self.deadzone {
            0.0
        } else {
            input.signum() * (magnitude - self.deadzone) / (1.0 - self.deadzone)
        }
    }

    /// Applies the deadzone to both axes of a stick.
    #[must_use]
    pub fn apply_stick(&self, stick: StickPosition) -> StickPosition {
        StickPosition {
            x: self.apply(stick.x),
            y: self.apply(stick.y),
        }
    }
}
