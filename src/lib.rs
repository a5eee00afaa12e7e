//! # Rover Teleop Library
//!
//! Drive a CAN-bus rover from a joystick over a UDP link.
//!
//! The operator side samples a joystick, maps it to a command frame and
//! sends it as a short text datagram. The rover side decodes the frame,
//! mixes two-axis commands into wheel velocities and commands each motor.
//!
//! ```text
//! joystick -> mapper -> encoder -> UDP -> decoder -> [mixer] -> dispatcher -> CAN
//! ```

pub mod config;
pub mod controller;
pub mod drive;
pub mod error;
pub mod link;
pub mod motor;
pub mod operator;
pub mod protocol;
pub mod rover;
pub mod shutdown;
