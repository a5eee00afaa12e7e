//! # Drive Module
//!
//! Rover-side motion math: turns a two-axis command into wheel velocities.

pub mod mixer;

pub use mixer::{DriveMixer, WheelVelocities};
