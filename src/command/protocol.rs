//! # RamoCar Protocol Constants
//!
//! GATT identifiers and fixed payloads exposed by the vehicle.

use uuid::Uuid;

/// Advertised name of the vehicle
pub const DEVICE_NAME: &str = "RamoCar";

/// Vehicle GATT service
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x014dd1c0_9dde_4907_8c31_e7d6b7a77ddb);

/// Motion characteristic, receives `x<v>y<v>r<v>`
pub const MOTION_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xc7be25a0_d82d_44e0_8155_3cbac410e2ed);

/// Buzzer characteristic, receives `"00"` or `"A4"`
pub const BUZZER_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x1e29d664_837a_42cd_8051_451e8985c08b);

/// Buzzer payload: silent
pub const BUZZER_OFF: &str = "00";

/// Buzzer payload: sound the horn
pub const BUZZER_ON: &str = "A4";

/// Axis value range accepted by the firmware
pub const AXIS_MIN: f32 = -1.0;
pub const AXIS_MAX: f32 = 1.0;

/// Which GATT characteristic a command is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Movement and rotation (`x<v>y<v>r<v>`)
    Motion,
    /// Horn (`"00"` / `"A4"`)
    Buzzer,
}

impl Channel {
    /// UUID of the characteristic backing this channel
    #[must_use]
    pub fn uuid(self) -> Uuid {
        match self {
            Channel::Motion => MOTION_CHARACTERISTIC_UUID,
            Channel::Buzzer => BUZZER_CHARACTERISTIC_UUID,
        }
    }
}
