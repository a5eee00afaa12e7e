//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! The operating mode is a required top-level key. Ports, send intervals and
//! the motor channel table default per mode and may be overridden.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::controller::sample::{buttons, AXIS_COUNT, BUTTON_COUNT};
use crate::error::{Result, TeleopError};
use crate::motor::MotorChannel;
use crate::protocol::frame::{ControlMode, MOTOR_SLOTS};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub mode: ControlMode,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub buttons: ButtonConfig,

    #[serde(default)]
    pub drive: DriveConfig,

    #[serde(default)]
    pub motors: MotorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Datagram link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Rover address the operator sends to
    #[serde(default = "default_peer")]
    pub peer: IpAddr,

    /// Address the rover binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// UDP port; defaults per mode
    #[serde(default)]
    pub port: Option<u16>,

    /// Operator send period; defaults per mode
    #[serde(default)]
    pub send_interval_ms: Option<u64>,

    #[serde(default = "default_socket_buffer_size")]
    pub socket_buffer_size: usize,

    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,

    /// Prefix frames with the mode tag and reject mismatches
    #[serde(default = "default_tagged")]
    pub tagged: bool,

    /// Drive a zero command when a tagged frame is rejected
    #[serde(default = "default_neutral_on_malformed")]
    pub neutral_on_malformed: bool,
}

/// Stick input configuration (two-axis mode)
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// evdev device path; empty means auto-detect
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_axis_min")]
    pub axis_min: i32,

    #[serde(default = "default_axis_max")]
    pub axis_max: i32,

    #[serde(default = "default_output_min")]
    pub output_min: f32,

    #[serde(default = "default_output_max")]
    pub output_max: f32,

    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    #[serde(default = "default_linear_axis")]
    pub linear_axis: usize,

    #[serde(default = "default_angular_axis")]
    pub angular_axis: usize,

    #[serde(default)]
    pub invert_linear: bool,

    #[serde(default)]
    pub invert_angular: bool,
}

/// A pair of buttons driving one motor in opposite directions
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ButtonBinding {
    /// Button index commanding negative velocity
    pub negative: usize,
    /// Button index commanding positive velocity; wins when both are held
    pub positive: usize,
}

/// Button input configuration (four-motor mode)
#[derive(Debug, Deserialize, Clone)]
pub struct ButtonConfig {
    /// Velocity magnitude commanded while a button is held
    #[serde(default = "default_motor_velocity")]
    pub motor_velocity: f32,

    /// One binding per motor slot, in slot order
    #[serde(default = "default_bindings")]
    pub bindings: Vec<ButtonBinding>,
}

/// Differential drive configuration (two-axis mode)
#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    /// Scale from normalized command to wheel velocity
    #[serde(default = "default_gain")]
    pub gain: f32,
}

/// Motor controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MotorConfig {
    /// Talk to real motor controllers; false logs commands instead
    #[serde(default = "default_motors_enabled")]
    pub enabled: bool,

    /// CAN interface name
    #[serde(default = "default_bus")]
    pub bus: String,

    /// Channel table; defaults per mode
    #[serde(default)]
    pub channels: Option<Vec<MotorChannel>>,

    /// Velocity magnitude no motor is ever commanded beyond
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f32,

    /// Per-command timeout; 0 waits indefinitely
    #[serde(default)]
    pub command_timeout_ms: u64,

    /// Command every motor to zero on graceful shutdown
    #[serde(default = "default_stop_on_exit")]
    pub stop_on_exit: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Also write logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

// Default value functions
fn default_peer() -> IpAddr { IpAddr::V4(Ipv4Addr::new(192, 168, 1, 3)) }
fn default_bind_address() -> IpAddr { IpAddr::V4(Ipv4Addr::UNSPECIFIED) }
fn default_socket_buffer_size() -> usize { 65536 }
fn default_max_datagram_size() -> usize { 1024 }
fn default_tagged() -> bool { true }
fn default_neutral_on_malformed() -> bool { true }

fn default_axis_min() -> i32 { -32768 }
fn default_axis_max() -> i32 { 32767 }
fn default_output_min() -> f32 { -1.0 }
fn default_output_max() -> f32 { 1.0 }
fn default_deadzone() -> f32 { 0.2 }
fn default_linear_axis() -> usize { 0 }
fn default_angular_axis() -> usize { 1 }

fn default_motor_velocity() -> f32 { 100.0 }
fn default_bindings() -> Vec<ButtonBinding> {
    vec![
        ButtonBinding { negative: buttons::DPAD_LEFT, positive: buttons::DPAD_RIGHT },
        ButtonBinding { negative: buttons::L1, positive: buttons::L2 },
        ButtonBinding { negative: buttons::R1, positive: buttons::R2 },
        ButtonBinding { negative: buttons::DPAD_DOWN, positive: buttons::DPAD_UP },
    ]
}

fn default_gain() -> f32 { 300.0 }

fn default_motors_enabled() -> bool { true }
fn default_bus() -> String { "can0".to_string() }
fn default_max_velocity() -> f32 { 600.0 }
fn default_stop_on_exit() -> bool { true }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            peer: default_peer(),
            bind_address: default_bind_address(),
            port: None,
            send_interval_ms: None,
            socket_buffer_size: default_socket_buffer_size(),
            max_datagram_size: default_max_datagram_size(),
            tagged: default_tagged(),
            neutral_on_malformed: default_neutral_on_malformed(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            axis_min: default_axis_min(),
            axis_max: default_axis_max(),
            output_min: default_output_min(),
            output_max: default_output_max(),
            deadzone: default_deadzone(),
            linear_axis: default_linear_axis(),
            angular_axis: default_angular_axis(),
            invert_linear: false,
            invert_angular: false,
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            motor_velocity: default_motor_velocity(),
            bindings: default_bindings(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self { gain: default_gain() }
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            enabled: default_motors_enabled(),
            bus: default_bus(),
            channels: None,
            max_velocity: default_max_velocity(),
            command_timeout_ms: 0,
            stop_on_exit: default_stop_on_exit(),
        }
    }
}

/// Motor channel table used when the config does not list one.
///
/// Two-axis rovers wire motors 1-4 to the wheels and are commanded rear-left,
/// rear-right, front-right, front-left. Four-motor rigs use motors F, C, D, E.
#[must_use]
pub fn default_channels(mode: ControlMode) -> Vec<MotorChannel> {
    use crate::drive::mixer::wheels;

    match mode {
        ControlMode::TwoAxis => vec![
            MotorChannel::new("rear_left", 0x01, wheels::REAR_LEFT),
            MotorChannel::new("rear_right", 0x02, wheels::REAR_RIGHT),
            MotorChannel::new("front_right", 0x03, wheels::FRONT_RIGHT),
            MotorChannel::new("front_left", 0x04, wheels::FRONT_LEFT),
        ],
        ControlMode::FourMotor => vec![
            MotorChannel::new("F", 0x0F, 0),
            MotorChannel::new("C", 0x0C, 1),
            MotorChannel::new("D", 0x0D, 2),
            MotorChannel::new("E", 0x0E, 3),
        ],
    }
}

fn invalid(msg: impl std::fmt::Display) -> TeleopError {
    TeleopError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails (including a missing `mode`)
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_teleop::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with every default for the given mode
    #[must_use]
    pub fn for_mode(mode: ControlMode) -> Self {
        Self {
            mode,
            link: LinkConfig::default(),
            input: InputConfig::default(),
            buttons: ButtonConfig::default(),
            drive: DriveConfig::default(),
            motors: MotorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// UDP port in effect
    #[must_use]
    pub fn port(&self) -> u16 {
        self.link.port.unwrap_or_else(|| self.mode.default_port())
    }

    /// Address the operator sends frames to
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.link.peer, self.port())
    }

    /// Address the rover receives frames on
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.link.bind_address, self.port())
    }

    /// Operator send period in effect
    #[must_use]
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(
            self.link
                .send_interval_ms
                .unwrap_or_else(|| self.mode.default_send_interval_ms()),
        )
    }

    /// Motor channel table in effect
    #[must_use]
    pub fn motor_channels(&self) -> Vec<MotorChannel> {
        self.motors
            .channels
            .clone()
            .unwrap_or_else(|| default_channels(self.mode))
    }

    /// Per-command actuator timeout, if any
    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        match self.motors.command_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Link
        if let Some(ms) = self.link.send_interval_ms {
            if ms == 0 || ms > 1000 {
                return Err(invalid("send_interval_ms must be between 1 and 1000"));
            }
        }

        if self.link.port == Some(0) {
            return Err(invalid("port must be greater than 0"));
        }

        if self.link.socket_buffer_size == 0 {
            return Err(invalid("socket_buffer_size must be greater than 0"));
        }

        if self.link.max_datagram_size < 64 || self.link.max_datagram_size > 65507 {
            return Err(invalid("max_datagram_size must be between 64 and 65507"));
        }

        // Stick input
        if self.input.axis_min == self.input.axis_max {
            return Err(invalid("axis_min must differ from axis_max"));
        }

        if !self.input.output_min.is_finite()
            || !self.input.output_max.is_finite()
            || self.input.output_min == self.input.output_max
        {
            return Err(invalid("output_min and output_max must be finite and differ"));
        }

        // Deadzone is in output units, so it is bounded by the output range
        let output_limit = self.input.output_min.abs().max(self.input.output_max.abs());
        if !(0.0..output_limit).contains(&self.input.deadzone) {
            return Err(invalid(format!(
                "deadzone must be at least 0.0 and below {} (the output range limit)",
                output_limit
            )));
        }

        for (name, index) in [
            ("linear_axis", self.input.linear_axis),
            ("angular_axis", self.input.angular_axis),
        ] {
            if index >= AXIS_COUNT {
                return Err(invalid(format!(
                    "{} index {} is out of bounds (must be 0-{})",
                    name,
                    index,
                    AXIS_COUNT - 1
                )));
            }
        }

        if self.input.linear_axis == self.input.angular_axis {
            return Err(invalid("linear_axis and angular_axis must differ"));
        }

        // Buttons
        if !self.buttons.motor_velocity.is_finite() || self.buttons.motor_velocity <= 0.0 {
            return Err(invalid("motor_velocity must be greater than 0"));
        }

        if self.buttons.bindings.len() != MOTOR_SLOTS {
            return Err(invalid(format!(
                "exactly {} button bindings are required, got {}",
                MOTOR_SLOTS,
                self.buttons.bindings.len()
            )));
        }

        for binding in &self.buttons.bindings {
            if binding.negative >= BUTTON_COUNT || binding.positive >= BUTTON_COUNT {
                return Err(invalid(format!(
                    "button index out of bounds in {:?} (must be 0-{})",
                    binding,
                    BUTTON_COUNT - 1
                )));
            }
            if binding.negative == binding.positive {
                return Err(invalid(format!(
                    "binding {:?} uses the same button for both directions",
                    binding
                )));
            }
        }

        // Drive
        if !self.drive.gain.is_finite() || self.drive.gain <= 0.0 {
            return Err(invalid("gain must be greater than 0"));
        }

        // Motors
        if self.motors.bus.is_empty() {
            return Err(invalid("motor bus cannot be empty"));
        }

        if !self.motors.max_velocity.is_finite() || self.motors.max_velocity <= 0.0 {
            return Err(invalid("max_velocity must be greater than 0"));
        }

        if self.motors.command_timeout_ms > 10000 {
            return Err(invalid("command_timeout_ms must be between 0 and 10000"));
        }

        if let Some(channels) = &self.motors.channels {
            validate_channels(channels)?;
        }

        Ok(())
    }
}

fn validate_channels(channels: &[MotorChannel]) -> Result<()> {
    if channels.len() != MOTOR_SLOTS {
        return Err(invalid(format!(
            "exactly {} motor channels are required, got {}",
            MOTOR_SLOTS,
            channels.len()
        )));
    }

    for (i, channel) in channels.iter().enumerate() {
        if channel.name.is_empty() {
            return Err(invalid("motor channel name cannot be empty"));
        }
        if channel.slot >= MOTOR_SLOTS {
            return Err(invalid(format!(
                "motor {} slot {} is out of bounds (must be 0-{})",
                channel.name,
                channel.slot,
                MOTOR_SLOTS - 1
            )));
        }
        for other in &channels[i + 1..] {
            if other.id == channel.id {
                return Err(invalid(format!("motor id 0x{:X} is used twice", channel.id)));
            }
            if other.slot == channel.slot {
                return Err(invalid(format!("motor slot {} is used twice", channel.slot)));
            }
        }
    }

    Ok(())
}
