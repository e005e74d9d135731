//! # Command Protocol Module
//!
//! ASCII control codes understood by the RamoCar firmware.
//!
//! This module handles:
//! - GATT identifiers of the vehicle (service, motion and buzzer characteristics)
//! - Encoding control intents into motion commands (`x<v>y<v>r<v>`)
//! - Encoding the buzzer state (`"00"` / `"A4"`)

pub mod protocol;
pub mod encoder;

pub use encoder::{encode, encode_buzzer, encode_fixed2, encode_integer, Command, CommandFormat};
