//! # Command Mapper Module
//!
//! Turns one [`RawInputSample`] into one [`CommandFrame`].
//!
//! ## Two-Axis Mode
//!
//! | Setpoint | Input (default) | Treatment |
//! |----------|-----------------|-----------|
//! | linear | Axis 0 | range map, deadzone |
//! | angular | Axis 1 | range map, deadzone |
//!
//! Axis 0 is the stick's horizontal axis, so by default "linear" follows
//! left/right deflection. Swap `linear_axis` and `angular_axis` to change it.
//!
//! ## Four-Motor Mode
//!
//! | Motor slot | Negative button | Positive button |
//! |------------|-----------------|-----------------|
//! | 0 (F) | D-Pad left | D-Pad right |
//! | 1 (C) | L1 | L2 |
//! | 2 (D) | R1 | R2 |
//! | 3 (E) | D-Pad down | D-Pad up |
//!
//! A held button commands `±motor_velocity`; a motor with neither button
//! held is commanded 0. When both buttons of a pair are held the positive
//! one wins.

use super::mapping::{AxisMapping, RangeMap};
use super::sample::RawInputSample;
use crate::config::{ButtonBinding, Config};
use crate::error::{Result, TeleopError};
use crate::protocol::frame::{CommandFrame, ControlMode, MotorSetpoints, MOTOR_SLOTS};

/// Maps stick deflection to a normalized linear/angular pair.
#[derive(Debug, Clone)]
pub struct AxisMapper {
    linear_axis: usize,
    angular_axis: usize,
    linear: AxisMapping,
    angular: AxisMapping,
}

impl AxisMapper {
    /// Creates an axis mapper.
    #[must_use]
    pub fn new(
        linear_axis: usize,
        linear: AxisMapping,
        angular_axis: usize,
        angular: AxisMapping,
    ) -> Self {
        Self {
            linear_axis,
            angular_axis,
            linear,
            angular,
        }
    }

    /// Maps a sample to a two-axis frame.
    #[must_use]
    pub fn map(&self, sample: &RawInputSample) -> CommandFrame {
        CommandFrame::TwoAxis {
            linear: self.linear.apply(sample.axis(self.linear_axis)),
            angular: self.angular.apply(sample.axis(self.angular_axis)),
        }
    }
}

/// Maps button pairs to per-motor velocities.
///
/// # Examples
///
/// ```
/// use rover_teleop::config::ButtonBinding;
/// use rover_teleop::controller::command_mapper::ButtonMapper;
/// use rover_teleop::controller::sample::RawInputSample;
/// use rover_teleop::protocol::frame::CommandFrame;
///
/// let bindings = [
///     ButtonBinding { negative: 0, positive: 1 },
///     ButtonBinding { negative: 2, positive: 3 },
///     ButtonBinding { negative: 4, positive: 5 },
///     ButtonBinding { negative: 7, positive: 6 },
/// ];
/// let mapper = ButtonMapper::new(bindings, 100.0);
///
/// // Only D-Pad left held
/// let sample = RawInputSample::new(vec![], vec![true]);
/// assert_eq!(mapper.map(&sample), CommandFrame::FourMotor([-100.0, 0.0, 0.0, 0.0]));
/// ```
#[derive(Debug, Clone)]
pub struct ButtonMapper {
    bindings: [ButtonBinding; MOTOR_SLOTS],
    velocity: f32,
}

impl ButtonMapper {
    /// Creates a button mapper commanding `velocity` while a button is held.
    #[must_use]
    pub fn new(bindings: [ButtonBinding; MOTOR_SLOTS], velocity: f32) -> Self {
        Self { bindings, velocity }
    }

    /// Maps a sample to a four-motor frame.
    #[must_use]
    pub fn map(&self, sample: &RawInputSample) -> CommandFrame {
        let mut setpoints: MotorSetpoints = [0.0; MOTOR_SLOTS];
        for (setpoint, binding) in setpoints.iter_mut().zip(&self.bindings) {
            if sample.button(binding.negative) {
                *setpoint = -self.velocity;
            }
            // Evaluated last so it wins a tie
            if sample.button(binding.positive) {
                *setpoint = self.velocity;
            }
        }
        CommandFrame::FourMotor(setpoints)
    }
}

/// Mapper for whichever mode the link runs.
#[derive(Debug, Clone)]
pub enum CommandMapper {
    TwoAxis(AxisMapper),
    FourMotor(ButtonMapper),
}

impl CommandMapper {
    /// Builds the mapper for `config.mode`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the axis range is empty or the number of
    /// button bindings does not match the number of motor slots.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.mode {
            ControlMode::TwoAxis => {
                let input = &config.input;
                let range =
                    RangeMap::new(input.axis_min, input.axis_max, input.output_min, input.output_max)?;
                Ok(CommandMapper::TwoAxis(AxisMapper::new(
                    input.linear_axis,
                    AxisMapping::new(range, input.deadzone, input.invert_linear),
                    input.angular_axis,
                    AxisMapping::new(range, input.deadzone, input.invert_angular),
                )))
            }
            ControlMode::FourMotor => {
                let bindings: [ButtonBinding; MOTOR_SLOTS] =
                    config.buttons.bindings.as_slice().try_into().map_err(|_| {
                        TeleopError::InvalidConfig(format!(
                            "expected {} button bindings, got {}",
                            MOTOR_SLOTS,
                            config.buttons.bindings.len()
                        ))
                    })?;
                Ok(CommandMapper::FourMotor(ButtonMapper::new(
                    bindings,
                    config.buttons.motor_velocity,
                )))
            }
        }
    }

    /// Mode of the frames this mapper produces.
    #[must_use]
    pub fn mode(&self) -> ControlMode {
        match self {
            CommandMapper::TwoAxis(_) => ControlMode::TwoAxis,
            CommandMapper::FourMotor(_) => ControlMode::FourMotor,
        }
    }

    /// Maps one sample to one frame.
    #[must_use]
    pub fn map(&self, sample: &RawInputSample) -> CommandFrame {
        match self {
            CommandMapper::TwoAxis(mapper) => mapper.map(sample),
            CommandMapper::FourMotor(mapper) => mapper.map(sample),
        }
    }
}
