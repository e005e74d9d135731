//! # RamoCar Remote Library
//!
//! Drive a RamoCar over Bluetooth Low Energy from a keyboard or gamepad.
//!
//! Input is sampled into control intents, encoded into the car's ASCII
//! command strings and written to its GATT characteristics by a BLE session
//! that also keeps the link alive.

pub mod ble;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod input;
