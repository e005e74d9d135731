//! # Control Intent
//!
//! The user's desired control state, sampled once per dispatch tick.

use std::fmt;

use crate::command::protocol::{AXIS_MAX, AXIS_MIN};

/// Snapshot of the user's desired motion and horn state.
///
/// Axes are signed unit values in `-1.0..=1.0`:
/// - `x`: forward (+) / backward (-)
/// - `y`: right (+) / left (-)
/// - `r`: clockwise (+) / counter-clockwise (-) rotation
///
/// # Examples
///
/// ```
/// use ramocar_remote::input::ControlIntent;
///
/// let intent = ControlIntent::neutral();
/// assert_eq!(intent.x, 0.0);
/// assert!(!intent.buzzer);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlIntent {
    pub x: f32,
    pub y: f32,
    pub r: f32,
    pub buzzer: bool,
}

impl ControlIntent {
    /// Creates an intent with the given axes (clamped) and the buzzer off.
    #[must_use]
    pub fn new(x: f32, y: f32, r: f32) -> Self {
        Self {
            x: clamp_axis(x),
            y: clamp_axis(y),
            r: clamp_axis(r),
            buzzer: false,
        }
    }

    /// All axes centered, buzzer off.
    #[must_use]
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Same axes with the buzzer set.
    #[must_use]
    pub fn with_buzzer(mut self, on: bool) -> Self {
        self.buzzer = on;
        self
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(AXIS_MIN, AXIS_MAX)
    }
}

/// Normalized position of one analog stick, "up" is positive `y`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StickPosition {
    pub x: f32,
    pub y: f32,
}

/// Both sticks of the analog front-end.
///
/// The direction stick drives `x`/`y`, the horizontal deflection of the
/// rotation stick drives `r`.
///
/// # Examples
///
/// ```
/// use ramocar_remote::input::{SticksState, StickPosition};
///
/// let sticks = SticksState {
///     direction: StickPosition { x: 0.5, y: -0.25 },
///     rotation: StickPosition { x: 1.0, y: 0.0 },
/// };
/// assert_eq!(
///     sticks.to_string(),
///     "Direction: (0.50, -0.25)\nRotation: (1.00, 0.00)"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SticksState {
    pub direction: StickPosition,
    pub rotation: StickPosition,
}

impl SticksState {
    /// Converts stick positions into a control intent.
    #[must_use]
    pub fn to_intent(&self, buzzer: bool) -> ControlIntent {
        ControlIntent::new(self.direction.x, self.direction.y, self.rotation.x).with_buzzer(buzzer)
    }
}

impl fmt::Display for SticksState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Direction: ({:.2}, {:.2})\nRotation: ({:.2}, {:.2})",
            self.direction.x, self.direction.y, self.rotation.x, self.rotation.y
        )
    }
}
