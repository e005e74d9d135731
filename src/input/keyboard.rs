//! # Keyboard Input
//!
//! Polls the pressed-key set of a keyboard through evdev.
//!
//! ## Key Map
//!
//! | Key | Effect |
//! |-----|--------|
//! | Up / Down | x = +1 / -1 |
//! | Left / Right | y = -1 / +1 |
//! | R / T | r = -1 / +1 |
//! | B | Buzzer on |
//!
//! When both keys of a pair are held, the first one listed wins.

use std::path::PathBuf;

use evdev::{Device, Key};

use super::{find_device, ControlIntent, InputSource};
use crate::error::{RamoCarError, Result};

/// Which of the mapped keys are currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub rotate_left: bool,
    pub rotate_right: bool,
    pub horn: bool,
}

impl KeyState {
    /// Builds the key state from a "is this key held" predicate.
    pub fn from_pressed<F>(pressed: F) -> Self
    where
        F: Fn(Key) -> bool,
    {
        Self {
            up: pressed(Key::KEY_UP),
            down: pressed(Key::KEY_DOWN),
            left: pressed(Key::KEY_LEFT),
            right: pressed(Key::KEY_RIGHT),
            rotate_left: pressed(Key::KEY_R),
            rotate_right: pressed(Key::KEY_T),
            horn: pressed(Key::KEY_B),
        }
    }

    /// Maps held keys to a discrete intent.
    ///
    /// # Examples
    ///
    /// ```
    /// use ramocar_remote::input::keyboard::KeyState;
    ///
    /// let keys = KeyState { up: true, right: true, ..Default::default() };
    /// let intent = keys.to_intent();
    /// assert_eq!((intent.x, intent.y, intent.r), (1.0, 1.0, 0.0));
    /// ```
    #[must_use]
    pub fn to_intent(&self) -> ControlIntent {
        let x = pick(self.up, self.down, 1.0, -1.0);
        let y = pick(self.left, self.right, -1.0, 1.0);
        let r = pick(self.rotate_left, self.rotate_right, -1.0, 1.0);
        ControlIntent::new(x, y, r).with_buzzer(self.horn)
    }
}

fn pick(first: bool, second: bool, first_value: f32, second_value: f32) -> f32 {
    if first {
        first_value
    } else if second {
        second_value
    } else {
        0.0
    }
}

/// Keyboard opened through evdev.
pub struct KeyboardSource {
    device: Device,
    path: PathBuf,
}

impl KeyboardSource {
    /// Opens the keyboard at `path`, or the first device exposing arrow keys
    /// and `B` when `path` is empty.
    ///
    /// # Errors
    ///
    /// Returns `InputNotFound` if no keyboard can be opened
    pub fn open(path: &str) -> Result<Self> {
        let (device, path) = find_device(path, "keyboard", |device| {
            device.supported_keys().map_or(false, |keys| {
                keys.contains(Key::KEY_UP) && keys.contains(Key::KEY_B)
            })
        })?;
        Ok(Self { device, path })
    }
}

impl InputSource for KeyboardSource {
    fn sample(&mut self) -> Result<ControlIntent> {
        let keys = self
            .device
            .get_key_state()
            .map_err(|e| RamoCarError::Input(format!("Failed to read key state: {}", e)))?;
        Ok(KeyState::from_pressed(|key| keys.contains(key)).to_intent())
    }

    fn describe(&self) -> String {
        format!(
            "keyboard '{}' ({})",
            self.device.name().unwrap_or("unnamed"),
            self.path.display()
        )
    }
}
