//! # Error Types
//!
//! Custom error types for RamoCar Remote using `thiserror`.

use thiserror::Error;

/// Main error type for RamoCar Remote
#[derive(Debug, Error)]
pub enum RamoCarError {
    /// No advertised device matched the target name during the scan window
    #[error("No BLE device named '{0}' found")]
    NotFound(String),

    /// Connecting to the discovered device failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// A characteristic write failed on the transport
    #[error("Write error: {0}")]
    Write(String),

    /// A write was attempted while the session is not connected
    #[error("Session is not connected")]
    NotConnected,

    /// Bluetooth adapter could not be acquired or scanned
    #[error("Bluetooth adapter error: {0}")]
    Adapter(String),

    /// No usable input device was found
    #[error("Input device not found: {0}")]
    InputNotFound(String),

    /// Reading from an input device failed
    #[error("Input error: {0}")]
    Input(String),

    /// The background dispatch worker is no longer running
    #[error("Dispatch worker stopped")]
    WorkerStopped,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RamoCar Remote
pub type Result<T> = std::result::Result<T, RamoCarError>;
