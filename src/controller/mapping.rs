//! # Axis Mapping Module
//!
//! Converts raw joystick axis readings into normalized setpoints.
//!
//! ## Range Mapping
//!
//! Raw readings are mapped with a straight affine transform from the declared
//! input range to the declared output range:
//!
//! `output = (value - min_in) / (max_in - min_in) * (max_out - min_out) + min_out`
//!
//! ## Deadzone
//!
//! Any mapped value whose magnitude is below the deadzone threshold becomes
//! exactly 0.0. Values at or above the threshold pass through unchanged: the
//! remaining range is not rescaled, so the output jumps from 0.0 straight to
//! the threshold value when the stick leaves the deadzone.
//!
//! ## Usage
//!
//! ```
//! use rover_teleop::controller::mapping::{AxisMapping, RangeMap};
//!
//! let range = RangeMap::new(-32768, 32767, -1.0, 1.0)?;
//! let axis = AxisMapping::new(range, 0.2, false);
//!
//! assert_eq!(axis.apply(1000), 0.0);       // inside the deadzone
//! assert_eq!(axis.apply(32767), 1.0);      // full deflection
//! assert_eq!(axis.apply(-32768), -1.0);
//! # Ok::<(), rover_teleop::error::TeleopError>(())
//! ```

use crate::error::{Result, TeleopError};

/// Affine map from an integer input range to a floating output range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMap {
    min_in: i32,
    max_in: i32,
    min_out: f32,
    max_out: f32,
}

impl RangeMap {
    /// Creates a range map.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `min_in == max_in`, since such a range
    /// cannot be mapped.
    pub fn new(min_in: i32, max_in: i32, min_out: f32, max_out: f32) -> Result<Self> {
        if min_in == max_in {
            return Err(TeleopError::InvalidConfig(format!(
                "input range is empty (min_in == max_in == {})",
                min_in
            )));
        }
        Ok(Self {
            min_in,
            max_in,
            min_out,
            max_out,
        })
    }

    /// Maps a raw reading into the output range.
    ///
    /// Readings outside the input range are extrapolated, not clamped.
    #[inline]
    #[must_use]
    pub fn apply(&self, value: i32) -> f32 {
        let offset = (i64::from(value) - i64::from(self.min_in)) as f32;
        let span = (i64::from(self.max_in) - i64::from(self.min_in)) as f32;
        offset / span * (self.max_out - self.min_out) + self.min_out
    }

    /// Raw reading at the middle of the input range.
    #[must_use]
    pub fn rest(&self) -> i32 {
        ((i64::from(self.min_in) + i64::from(self.max_in)) / 2) as i32
    }
}

/// Forces values with magnitude below `threshold` to 0.0.
///
/// # Examples
///
/// ```
/// use rover_teleop::controller::mapping::apply_deadzone;
///
/// assert_eq!(apply_deadzone(0.19, 0.2), 0.0);
/// assert_eq!(apply_deadzone(-0.19, 0.2), 0.0);
/// assert_eq!(apply_deadzone(0.2, 0.2), 0.2);
/// assert_eq!(apply_deadzone(-0.7, 0.2), -0.7);
/// ```
#[inline]
#[must_use]
pub fn apply_deadzone(value: f32, threshold: f32) -> f32 {
    if value.abs() < threshold {
        0.0
    } else {
        value
    }
}

/// Full treatment of one stick axis: range map, optional inversion, deadzone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMapping {
    range: RangeMap,
    deadzone: f32,
    invert: bool,
}

impl AxisMapping {
    /// Creates an axis mapping.
    #[must_use]
    pub fn new(range: RangeMap, deadzone: f32, invert: bool) -> Self {
        Self {
            range,
            deadzone,
            invert,
        }
    }

    /// Maps a raw axis reading to a setpoint.
    #[must_use]
    pub fn apply(&self, raw: i32) -> f32 {
        let mapped = self.range.apply(raw);
        let signed = if self.invert { -mapped } else { mapped };
        apply_deadzone(signed, self.deadzone)
    }
}
