//! # Command Frame Encoder
//!
//! Serializes setpoints into space-separated decimal text.

use super::frame::*;

/// Encode a command frame for the wire
///
/// # Arguments
///
/// * `frame` - Setpoints to send
/// * `tagged` - Prefix the mode tag so the rover can reject mismatched frames
///
/// # Returns
///
/// * `String` - UTF-8 payload, no trailing separator or newline
///
/// # Examples
///
/// ```
/// use rover_teleop::protocol::encoder::encode_frame;
/// use rover_teleop::protocol::frame::CommandFrame;
///
/// let frame = CommandFrame::TwoAxis { linear: -1.0, angular: 1.0 };
/// assert_eq!(encode_frame(&frame, true), "D -1 1");
/// assert_eq!(encode_frame(&frame, false), "-1 1");
/// ```
pub fn encode_frame(frame: &CommandFrame, tagged: bool) -> String {
    let payload = encode_payload(&frame.values());
    if tagged {
        format!("{}{}{}", frame.mode().tag(), TOKEN_SEPARATOR, payload)
    } else {
        payload
    }
}

/// Encode bare setpoint values
///
/// Values are written with the shortest decimal representation that parses
/// back to the same `f32`, joined by a single space.
///
/// # Examples
///
/// ```
/// use rover_teleop::protocol::encoder::encode_payload;
///
/// assert_eq!(encode_payload(&[100.0, 0.0, -100.0, 0.0]), "100 0 -100 0");
/// ```
pub fn encode_payload(values: &[f32]) -> String {
    let mut payload = String::with_capacity(values.len() * 8);
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            payload.push(TOKEN_SEPARATOR);
        }
        payload.push_str(&value.to_string());
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_two_axis_untagged() {
        let frame = CommandFrame::TwoAxis {
            linear: -1.0,
            angular: 1.0,
        };
        assert_eq!(encode_frame(&frame, false), "-1 1");
    }

    #[test]
    fn test_encode_two_axis_tagged() {
        let frame = CommandFrame::TwoAxis {
            linear: 0.25,
            angular: 0.0,
        };
        assert_eq!(encode_frame(&frame, true), "D 0.25 0");
    }

    #[test]
    fn test_encode_four_motor_tagged() {
        let frame = CommandFrame::FourMotor([-100.0, 100.0, 0.0, 100.0]);
        assert_eq!(encode_frame(&frame, true), "M -100 100 0 100");
    }

    #[test]
    fn test_encode_payload_has_no_trailing_separator() {
        let payload = encode_payload(&[1.5, 2.5]);
        assert!(!payload.ends_with(' '));
        assert!(!payload.ends_with('\n'));
        assert_eq!(payload.split(' ').count(), 2);
    }

    #[test]
    fn test_encode_empty_payload() {
        assert_eq!(encode_payload(&[]), "");
    }

    #[test]
    fn test_encode_neutral_frames() {
        assert_eq!(
            encode_frame(&CommandFrame::neutral(ControlMode::TwoAxis), true),
            "D 0 0"
        );
        assert_eq!(
            encode_frame(&CommandFrame::neutral(ControlMode::FourMotor), false),
            "0 0 0 0"
        );
    }
}
