//! # Controller Module
//!
//! Operator-side joystick input handling.
//!
//! This module handles:
//! - Joystick detection and event streaming via evdev
//! - Folding events into per-cycle input samples
//! - Range mapping and deadzones for stick axes
//! - Mapping samples to command frames

pub mod command_mapper;
pub mod joystick;
pub mod mapping;
pub mod sample;

pub use command_mapper::CommandMapper;
pub use joystick::{InputSource, Joystick};
pub use sample::RawInputSample;
