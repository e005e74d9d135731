//! # Command Encoder
//!
//! Encodes control intents into the ASCII commands written to the vehicle.
//!
//! ## Formats
//!
//! | Format | Source | Example |
//! |--------|--------|---------|
//! | Integer | Keyboard | `x1y-1r0` |
//! | Fixed2 | Analog sticks | `x0.35y-1.00r0.00` |
//!
//! Buzzer commands are `"00"` (off) and `"A4"` (on).

use std::fmt;

use super::protocol::{AXIS_MAX, AXIS_MIN, BUZZER_OFF, BUZZER_ON};
use crate::input::ControlIntent;

/// An encoded ASCII command, ready to be written to a characteristic.
///
/// # Examples
///
/// ```
/// use ramocar_remote::command::encode_integer;
///
/// let command = encode_integer(1, -1, 0);
/// assert_eq!(command.as_str(), "x1y-1r0");
/// assert_eq!(command.as_bytes(), b"x1y-1r0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    /// Command text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Payload bytes as sent over the air
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number formatting used for the motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFormat {
    /// Whole numbers (`-1`, `0`, `1`), used by the keyboard front-end.
    Integer,
    /// Two decimal places (`-0.35`, `0.00`), used by the analog front-end.
    Fixed2,
}

/// Encode the motion part of an intent using the given format.
///
/// # Examples
///
/// ```
/// use ramocar_remote::command::{encode, CommandFormat};
/// use ramocar_remote::input::ControlIntent;
///
/// let intent = ControlIntent::new(0.5, -0.25, 0.0);
/// assert_eq!(encode(&intent, CommandFormat::Fixed2).as_str(), "x0.50y-0.25r0.00");
/// assert_eq!(encode(&ControlIntent::neutral(), CommandFormat::Integer).as_str(), "x0y0r0");
/// ```
#[must_use]
pub fn encode(intent: &ControlIntent, format: CommandFormat) -> Command {
    match format {
        CommandFormat::Integer => encode_integer(
            to_step(intent.x),
            to_step(intent.y),
            to_step(intent.r),
        ),
        CommandFormat::Fixed2 => encode_fixed2(intent.x, intent.y, intent.r),
    }
}

/// Encode discrete axis steps as `x<x>y<y>r<r>`.
///
/// Steps outside `-1..=1` are clamped.
#[must_use]
pub fn encode_integer(x: i8, y: i8, r: i8) -> Command {
    Command(format!(
        "x{}y{}r{}",
        x.clamp(-1, 1),
        y.clamp(-1, 1),
        r.clamp(-1, 1)
    ))
}

/// Encode analog axis values with two decimal places.
///
/// Values are clamped to the unit range. Negative zero is written as `0.00`
/// so a centered stick always produces the same command.
///
/// # Examples
///
/// ```
/// use ramocar_remote::command::encode_fixed2;
///
/// assert_eq!(encode_fixed2(0.0, 0.0, 0.0).as_str(), "x0.00y0.00r0.00");
/// assert_eq!(encode_fixed2(-0.001, 1.5, -1.0).as_str(), "x0.00y1.00r-1.00");
/// ```
#[must_use]
pub fn encode_fixed2(x: f32, y: f32, r: f32) -> Command {
    Command(format!("x{}y{}r{}", fixed2(x), fixed2(y), fixed2(r)))
}

/// Encode the buzzer state.
#[must_use]
pub fn encode_buzzer(on: bool) -> Command {
    let code = if on { BUZZER_ON } else { BUZZER_OFF };
    Command(code.to_string())
}

/// Clamp to the unit range, treating NaN as centered.
fn sanitize(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(AXIS_MIN, AXIS_MAX)
    }
}

fn fixed2(value: f32) -> String {
    let text = format!("{:.2}", sanitize(value));
    if text == "-0.00" {
        "0.00".to_string()
    } else {
        text
    }
}

fn to_step(value: f32) -> i8 {
    sanitize(value).round() as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_format_matches_keyboard_convention() {
        assert_eq!(encode_integer(1, -1, 0).as_str(), "x1y-1r0");
        assert_eq!(encode_integer(0, 0, 0).as_str(), "x0y0r0");
        assert_eq!(encode_integer(-1, 1, -1).as_str(), "x-1y1r-1");
    }

    #[test]
    fn test_integer_format_clamps_steps() {
        assert_eq!(encode_integer(5, -7, 2).as_str(), "x1y-1r1");
    }

    #[test]
    fn test_fixed2_centered() {
        assert_eq!(encode_fixed2(0.0, 0.0, 0.0).as_str(), "x0.00y0.00r0.00");
    }

    #[test]
    fn test_fixed2_keeps_sign_and_trailing_zeros() {
        assert_eq!(encode_fixed2(0.5, -0.5, 1.0).as_str(), "x0.50y-0.50r1.00");
        assert_eq!(encode_fixed2(-1.0, 0.1, -0.75).as_str(), "x-1.00y0.10r-0.75");
    }

    #[test]
    fn test_fixed2_negative_zero_is_unsigned() {
        assert_eq!(encode_fixed2(-0.0, -0.004, 0.0).as_str(), "x0.00y0.00r0.00");
    }

    #[test]
    fn test_fixed2_clamps_and_handles_nan() {
        assert_eq!(encode_fixed2(2.0, -3.0, f32::NAN).as_str(), "x1.00y-1.00r0.00");
    }

    #[test]
    fn test_encode_dispatches_on_format() {
        let intent = ControlIntent::new(1.0, -1.0, 0.0);
        assert_eq!(encode(&intent, CommandFormat::Integer).as_str(), "x1y-1r0");
        assert_eq!(
            encode(&intent, CommandFormat::Fixed2).as_str(),
            "x1.00y-1.00r0.00"
        );
    }

    #[test]
    fn test_integer_encoding_rounds_analog_values() {
        let intent = ControlIntent::new(0.8, -0.3, -0.6);
        assert_eq!(encode(&intent, CommandFormat::Integer).as_str(), "x1y0r-1");
    }

    #[test]
    fn test_buzzer_codes() {
        assert_eq!(encode_buzzer(false).as_str(), "00");
        assert_eq!(encode_buzzer(true).as_str(), "A4");
    }

    #[test]
    fn test_buzzer_ignores_motion_format() {
        let mut intent = ControlIntent::neutral();
        intent.buzzer = true;
        // Motion encoding never carries the buzzer flag
        assert_eq!(encode(&intent, CommandFormat::Integer).as_str(), "x0y0r0");
    }

    #[test]
    fn test_display_matches_payload() {
        let command = encode_fixed2(0.25, 0.0, -0.25);
        assert_eq!(command.to_string(), "x0.25y0.00r-0.25");
        assert_eq!(command.as_bytes(), command.as_str().as_bytes());
    }
}
