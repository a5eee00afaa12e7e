//! # Command Frame Types
//!
//! Core definitions for the text frames exchanged between operator and rover.

use serde::Deserialize;

/// Number of setpoints carried by a two-axis drive frame
pub const TWO_AXIS_ARITY: usize = 2;

/// Number of setpoints carried by a four-motor frame
pub const FOUR_MOTOR_ARITY: usize = 4;

/// Number of motor slots every frame is expanded into before dispatch
pub const MOTOR_SLOTS: usize = 4;

/// Wire tag for two-axis drive frames
pub const TAG_TWO_AXIS: &str = "D";

/// Wire tag for four-motor frames
pub const TAG_FOUR_MOTOR: &str = "M";

/// Separator between tokens on the wire
pub const TOKEN_SEPARATOR: char = ' ';

/// Per-motor velocities in slot order
pub type MotorSetpoints = [f32; MOTOR_SLOTS];

/// Operating mode shared by both ends of the link.
///
/// Both processes must be started with the same mode; the mode decides how
/// many setpoints a frame carries and whether the rover mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Stick-driven linear/angular pair, mixed into wheel speeds on the rover.
    TwoAxis,
    /// Button-driven velocity for each of four motors, dispatched unmixed.
    FourMotor,
}

impl ControlMode {
    /// Number of setpoints in a frame of this mode.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            ControlMode::TwoAxis => TWO_AXIS_ARITY,
            ControlMode::FourMotor => FOUR_MOTOR_ARITY,
        }
    }

    /// Wire tag announcing this mode.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            ControlMode::TwoAxis => TAG_TWO_AXIS,
            ControlMode::FourMotor => TAG_FOUR_MOTOR,
        }
    }

    /// Looks up the mode announced by a wire tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            TAG_TWO_AXIS => Some(ControlMode::TwoAxis),
            TAG_FOUR_MOTOR => Some(ControlMode::FourMotor),
            _ => None,
        }
    }

    /// UDP port used by this mode unless the config overrides it.
    ///
    /// The two modes historically ran side by side on separate ports.
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            ControlMode::TwoAxis => 12344,
            ControlMode::FourMotor => 12345,
        }
    }

    /// Operator send period for this mode unless the config overrides it.
    #[must_use]
    pub fn default_send_interval_ms(self) -> u64 {
        match self {
            ControlMode::TwoAxis => 50,
            ControlMode::FourMotor => 5,
        }
    }
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMode::TwoAxis => f.write_str("two_axis"),
            ControlMode::FourMotor => f.write_str("four_motor"),
        }
    }
}

/// One cycle's worth of setpoints, tagged by mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandFrame {
    /// Normalized forward and turning command, each in -1.0..=1.0.
    TwoAxis { linear: f32, angular: f32 },
    /// Velocity for each motor, in slot order.
    FourMotor(MotorSetpoints),
}

impl CommandFrame {
    /// All-zero frame of the given mode.
    #[must_use]
    pub fn neutral(mode: ControlMode) -> Self {
        match mode {
            ControlMode::TwoAxis => CommandFrame::TwoAxis {
                linear: 0.0,
                angular: 0.0,
            },
            ControlMode::FourMotor => CommandFrame::FourMotor([0.0; MOTOR_SLOTS]),
        }
    }

    /// Builds a frame from decoded values; missing values read as 0.0.
    #[must_use]
    pub fn from_values(mode: ControlMode, values: &[f32]) -> Self {
        let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
        match mode {
            ControlMode::TwoAxis => CommandFrame::TwoAxis {
                linear: at(0),
                angular: at(1),
            },
            ControlMode::FourMotor => CommandFrame::FourMotor([at(0), at(1), at(2), at(3)]),
        }
    }

    /// Mode this frame belongs to.
    #[must_use]
    pub fn mode(&self) -> ControlMode {
        match self {
            CommandFrame::TwoAxis { .. } => ControlMode::TwoAxis,
            CommandFrame::FourMotor(_) => ControlMode::FourMotor,
        }
    }

    /// Setpoints in wire order.
    #[must_use]
    pub fn values(&self) -> Vec<f32> {
        match *self {
            CommandFrame::TwoAxis { linear, angular } => vec![linear, angular],
            CommandFrame::FourMotor(values) => values.to_vec(),
        }
    }
}
