//! Differential (skid-steer) mixing for a four-wheel rover.
//!
//! Converts a normalized linear/angular command into per-wheel velocities.

use crate::protocol::frame::MotorSetpoints;

/// Gain historically used by the rover: full stick is 300 ERPM per unit.
pub const DEFAULT_GAIN: f32 = 300.0;

/// Slot of each wheel in the setpoint vector handed to the dispatcher.
pub mod wheels {
    pub const FRONT_LEFT: usize = 0;
    pub const FRONT_RIGHT: usize = 1;
    pub const REAR_LEFT: usize = 2;
    pub const REAR_RIGHT: usize = 3;
}

/// Velocity for each of the four wheels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelVelocities {
    pub front_left: f32,
    pub front_right: f32,
    pub rear_left: f32,
    pub rear_right: f32,
}

impl WheelVelocities {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns velocities in slot order, see [`wheels`]
    pub fn as_array(&self) -> MotorSetpoints {
        let mut out = [0.0; 4];
        out[wheels::FRONT_LEFT] = self.front_left;
        out[wheels::FRONT_RIGHT] = self.front_right;
        out[wheels::REAR_LEFT] = self.rear_left;
        out[wheels::REAR_RIGHT] = self.rear_right;
        out
    }
}

/// Skid-steer mixer
///
/// Both wheels on a side get the same velocity:
///
/// ```text
/// left  = gain * (linear + angular)
/// right = gain * (linear - angular)
/// ```
///
/// The result is not limited here; the dispatcher saturates every value
/// before it reaches a motor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveMixer {
    gain: f32,
}

impl Default for DriveMixer {
    fn default() -> Self {
        Self::new(DEFAULT_GAIN)
    }
}

impl DriveMixer {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Mix a linear/angular command into wheel velocities
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_teleop::drive::mixer::DriveMixer;
    ///
    /// let wheels = DriveMixer::new(300.0).mix(-1.0, 1.0);
    /// assert_eq!(wheels.as_array(), [0.0, -600.0, 0.0, -600.0]);
    /// ```
    pub fn mix(&self, linear: f32, angular: f32) -> WheelVelocities {
        let left = self.gain * (linear + angular);
        let right = self.gain * (linear - angular);
        WheelVelocities {
            front_left: left,
            front_right: right,
            rear_left: left,
            rear_right: right,
        }
    }
}

/// Limit a velocity to `[-|limit|, |limit|]`
///
/// A `NaN` velocity or limit yields 0.0, a stop command.
pub fn saturate(velocity: f32, limit: f32) -> f32 {
    if velocity.is_nan() || limit.is_nan() {
        return 0.0;
    }
    let limit = limit.abs();
    velocity.clamp(-limit, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const K: f32 = DEFAULT_GAIN;

    #[test]
    fn test_forward() {
        let w = DriveMixer::default().mix(1.0, 0.0);
        assert_eq!(w.as_array(), [K, K, K, K]);
    }

    #[test]
    fn test_turn_in_place() {
        let w = DriveMixer::default().mix(0.0, 1.0);
        assert_eq!(
            w,
            WheelVelocities {
                front_left: K,
                front_right: -K,
                rear_left: K,
                rear_right: -K,
            }
        );
    }

    #[test]
    fn test_stop() {
        assert_eq!(DriveMixer::default().mix(0.0, 0.0), WheelVelocities::zero());
    }

    #[test]
    fn test_full_reverse_with_full_turn() {
        let w = DriveMixer::default().mix(-1.0, 1.0);
        assert_eq!(w.as_array(), [0.0, -600.0, 0.0, -600.0]);
    }

    #[test]
    fn test_custom_gain() {
        let w = DriveMixer::new(50.0).mix(0.5, 0.0);
        assert_eq!(w.as_array(), [25.0, 25.0, 25.0, 25.0]);
    }

    #[test]
    fn test_slot_order() {
        let w = WheelVelocities {
            front_left: 1.0,
            front_right: 2.0,
            rear_left: 3.0,
            rear_right: 4.0,
        };
        let slots = w.as_array();
        assert_eq!(slots[wheels::FRONT_LEFT], 1.0);
        assert_eq!(slots[wheels::FRONT_RIGHT], 2.0);
        assert_eq!(slots[wheels::REAR_LEFT], 3.0);
        assert_eq!(slots[wheels::REAR_RIGHT], 4.0);
    }

    #[test]
    fn test_saturate() {
        assert_eq!(saturate(700.0, 600.0), 600.0);
        assert_eq!(saturate(-700.0, 600.0), -600.0);
        assert_eq!(saturate(123.0, 600.0), 123.0);
        assert_eq!(saturate(f32::INFINITY, 600.0), 600.0);
        assert_eq!(saturate(f32::NAN, 600.0), 0.0);
    }

    #[test]
    fn test_saturate_with_bad_limit_never_panics() {
        assert_eq!(saturate(700.0, -600.0), 600.0);
        assert_eq!(saturate(-700.0, -600.0), -600.0);
        assert_eq!(saturate(10.0, f32::NAN), 0.0);
        assert_eq!(saturate(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_gain_accessor() {
        assert_eq!(DriveMixer::default().gain(), DEFAULT_GAIN);
        assert_eq!(DriveMixer::new(42.0).gain(), 42.0);
    }

    proptest! {
        #[test]
        fn prop_sides_are_paired(linear in -1.0f32..=1.0, angular in -1.0f32..=1.0) {
            let w = DriveMixer::default().mix(linear, angular);
            prop_assert_eq!(w.front_left, w.rear_left);
            prop_assert_eq!(w.front_right, w.rear_right);
        }

        #[test]
        fn prop_unit_inputs_stay_within_twice_gain(linear in -1.0f32..=1.0, angular in -1.0f32..=1.0) {
            let w = DriveMixer::default().mix(linear, angular);
            for v in w.as_array() {
                prop_assert!(v.abs() <= 2.0 * K + 1e-3);
            }
        }

        #[test]
        fn prop_saturate_bounded(v in any::<f32>(), limit in -1000.0f32..1000.0) {
            let s = saturate(v, limit);
            prop_assert!(s.abs() <= limit.abs());
        }
    }
}
