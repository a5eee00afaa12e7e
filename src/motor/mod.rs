//! # Motor Module
//!
//! Rover-side motor control.
//!
//! This module handles:
//! - Connecting to each motor controller at startup
//! - Sending velocity commands over SocketCAN
//! - Saturating and fanning out setpoints per channel
//! - A dry-run driver for bench testing without hardware

pub mod actuator;
pub mod can;
pub mod dispatcher;

pub use actuator::{DryRunConnector, MotorActuator, MotorChannel, MotorConnector};
pub use can::CanConnector;
pub use dispatcher::{DispatchReport, MotorDispatcher};
