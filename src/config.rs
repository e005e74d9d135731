//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional. A missing file yields the built-in
//! defaults, which drive a `RamoCar` from the keyboard.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::command::CommandFormat;
use crate::error::{RamoCarError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub ble: BleConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// BLE session configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BleConfig {
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,

    #[serde(default = "default_keep_alive_interval_ms")]
    pub keep_alive_interval_ms: u64,

    /// 0 keeps a lost session disconnected until restart
    #[serde(default)]
    pub reconnect_attempts: u32,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Execution model of the dispatch loop
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeModel {
    /// One thread polls, encodes, writes and sleeps
    Cooperative,
    /// BLE on a worker thread, input on the main thread
    Background,
}

/// Motion rate-limiting policy
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Send whenever the encoded command changes
    Change,
    /// Send at most once per `throttle_interval_ms`
    Throttle,
}

/// Dispatch loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    /// Defaults from the input source when omitted
    #[serde(default)]
    pub runtime: Option<RuntimeModel>,

    /// Defaults from the input source when omitted
    #[serde(default)]
    pub policy: Option<PolicyKind>,

    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_throttle_interval_ms")]
    pub throttle_interval_ms: u64,
}

/// Kind of input front-end
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputSourceKind {
    #[default]
    Keyboard,
    Gamepad,
}

/// Axis pair used by the rotation stick
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationAxes {
    /// ABS_Z / ABS_RZ (DualSense)
    #[default]
    Z,
    /// ABS_RX / ABS_RY (XInput style pads)
    Rx,
}

/// Input configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default)]
    pub source: InputSourceKind,

    /// Empty string auto-detects
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    #[serde(default)]
    pub rotation_axes: RotationAxes,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Empty string logs to stdout only
    #[serde(default)]
    pub file_dir: String,
}

// Default value functions
fn default_device_name() -> String { crate::command::protocol::DEVICE_NAME.to_string() }
fn default_scan_timeout_ms() -> u64 { 5000 }
fn default_keep_alive_interval_ms() -> u64 { 5000 }
fn default_reconnect_interval_ms() -> u64 { 2000 }

fn default_sample_interval_ms() -> u64 { 100 }
fn default_throttle_interval_ms() -> u64 { 500 }

fn default_deadzone() -> f32 { 0.05 }

fn default_log_level() -> String { "info".to_string() }

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            scan_timeout_ms: default_scan_timeout_ms(),
            keep_alive_interval_ms: default_keep_alive_interval_ms(),
            reconnect_attempts: 0,
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            runtime: None,
            policy: None,
            sample_interval_ms: default_sample_interval_ms(),
            throttle_interval_ms: default_throttle_interval_ms(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: InputSourceKind::default(),
            device_path: String::new(),
            deadzone: default_deadzone(),
            rotation_axes: RotationAxes::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: String::new(),
        }
    }
}

impl BleConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl DispatchConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ramocar_remote::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load the file at `path` if it exists, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Runtime model, following the input source when not set explicitly
    pub fn runtime(&self) -> RuntimeModel {
        self.dispatch.runtime.unwrap_or(match self.input.source {
            InputSourceKind::Keyboard => RuntimeModel::Cooperative,
            InputSourceKind::Gamepad => RuntimeModel::Background,
        })
    }

    /// Motion policy, following the input source when not set explicitly
    pub fn policy(&self) -> PolicyKind {
        self.dispatch.policy.unwrap_or(match self.input.source {
            InputSourceKind::Keyboard => PolicyKind::Change,
            InputSourceKind::Gamepad => PolicyKind::Throttle,
        })
    }

    /// Wire format of motion commands for the configured input source
    pub fn command_format(&self) -> CommandFormat {
        match self.input.source {
            InputSourceKind::Keyboard => CommandFormat::Integer,
            InputSourceKind::Gamepad => CommandFormat::Fixed2,
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.ble.device_name.is_empty() {
            return Err(invalid("device_name cannot be empty"));
        }

        for (name, value) in [
            ("scan_timeout_ms", self.ble.scan_timeout_ms),
            ("keep_alive_interval_ms", self.ble.keep_alive_interval_ms),
            ("reconnect_interval_ms", self.ble.reconnect_interval_ms),
            ("sample_interval_ms", self.dispatch.sample_interval_ms),
            ("throttle_interval_ms", self.dispatch.throttle_interval_ms),
        ] {
            if value == 0 || value > 60000 {
                return Err(invalid(format!("{} must be between 1 and 60000", name)));
            }
        }

        if self.ble.reconnect_attempts > 100 {
            return Err(invalid("reconnect_attempts must be at most 100"));
        }

        if !(0.0..=0.25).contains(&self.input.deadzone) {
            return Err(invalid("deadzone must be between 0.0 and 0.25"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> RamoCarError {
    RamoCarError::Config(toml::de::Error::custom(msg))
}
