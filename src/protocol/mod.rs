//! # Command Protocol Module
//!
//! Text wire format shared by the operator and the rover.
//!
//! This module handles:
//! - Command frame types for the two operating modes
//! - Encoding setpoints as space-separated decimal text
//! - Tagged (strict) and untagged (lenient) decoding

pub mod frame;
pub mod encoder;
pub mod decoder;

pub use frame::{CommandFrame, ControlMode, MotorSetpoints};
