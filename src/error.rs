//! # Error Types
//!
//! Custom error types for Rover Teleop using `thiserror`.

use thiserror::Error;

/// Main error type for Rover Teleop
#[derive(Debug, Error)]
pub enum TeleopError {
    /// Configuration file could not be parsed or failed validation
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration values that cannot be turned into a working pipeline
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input device errors (open, read)
    #[error("Input device error: {0}")]
    InputDevice(String),

    /// No usable joystick was found
    #[error("No joystick found under /dev/input")]
    InputDeviceNotFound,

    /// Datagram socket errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// A received frame did not match the expected shape
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// A motor controller could not be reached at startup
    #[error("Failed to connect motor {channel}: {reason}")]
    ActuatorConnect { channel: String, reason: String },

    /// A velocity command was rejected by a motor controller
    #[error("Failed to command motor {channel}: {reason}")]
    ActuatorCommand { channel: String, reason: String },

    /// A velocity command did not complete in time
    #[error("Timed out commanding motor {channel}")]
    ActuatorTimeout { channel: String },
}

/// Result type alias for Rover Teleop
pub type Result<T> = std::result::Result<T, TeleopError>;
