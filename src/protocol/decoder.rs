//! # Command Frame Decoder
//!
//! Parses received text frames back into setpoints.
//!
//! Two decoders exist:
//!
//! - [`decode_tagged`] expects a mode tag followed by exactly the mode's number
//!   of values and rejects anything else.
//! - [`decode_lenient`] reads an untagged payload the way untagged peers
//!   always have: values are taken in order until the first token that is not
//!   a number, and every value not read stays at 0.0.

use super::frame::*;
use crate::error::{Result, TeleopError};

/// Result of a lenient decode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LenientDecode {
    /// Decoded frame, zero-filled past the last value read
    pub frame: CommandFrame,
    /// Number of values actually read from the payload
    pub parsed: usize,
}

impl LenientDecode {
    /// True when every setpoint of the frame came from the payload.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.parsed == self.frame.mode().arity()
    }
}

/// Parse one setpoint token
///
/// `inf`, `NaN` and values too large for an `f32` are refused along with
/// anything that is not a number.
fn parse_value(token: &str) -> Option<f32> {
    token.parse::<f32>().ok().filter(|v| v.is_finite())
}

/// Interpret a datagram as UTF-8 text
///
/// # Errors
///
/// Returns `MalformedFrame` if the bytes are not valid UTF-8
pub fn datagram_text(datagram: &[u8]) -> Result<&str> {
    std::str::from_utf8(datagram)
        .map_err(|e| TeleopError::MalformedFrame(format!("Payload is not UTF-8: {}", e)))
}

/// Decode a tagged frame
///
/// # Arguments
///
/// * `payload` - Received text, e.g. `"D -1 1"`
/// * `expected` - Mode this rover was started in
///
/// # Returns
///
/// * `Result<CommandFrame>` - Decoded frame, or error if the frame does not match
///
/// # Errors
///
/// Returns `MalformedFrame` if:
/// - The payload is empty
/// - The tag is unknown or names the other mode
/// - The number of values differs from the mode's arity
/// - A value is not a finite decimal number
///
/// # Examples
///
/// ```
/// use rover_teleop::protocol::decoder::decode_tagged;
/// use rover_teleop::protocol::frame::{CommandFrame, ControlMode};
///
/// let frame = decode_tagged("D -1 1", ControlMode::TwoAxis)?;
/// assert_eq!(frame, CommandFrame::TwoAxis { linear: -1.0, angular: 1.0 });
///
/// assert!(decode_tagged("M 1 2 3 4", ControlMode::TwoAxis).is_err());
/// # Ok::<(), rover_teleop::error::TeleopError>(())
/// ```
pub fn decode_tagged(payload: &str, expected: ControlMode) -> Result<CommandFrame> {
    let mut tokens = payload.split_whitespace();

    let tag = tokens
        .next()
        .ok_or_else(|| TeleopError::MalformedFrame("Empty frame".to_string()))?;

    let mode = ControlMode::from_tag(tag)
        .ok_or_else(|| TeleopError::MalformedFrame(format!("Unknown frame tag: {:?}", tag)))?;

    if mode != expected {
        return Err(TeleopError::MalformedFrame(format!(
            "Frame tagged {} but link runs {}",
            mode, expected
        )));
    }

    let values = tokens
        .map(|token| {
            parse_value(token).ok_or_else(|| {
                TeleopError::MalformedFrame(format!("Invalid value: {:?}", token))
            })
        })
        .collect::<Result<Vec<f32>>>()?;

    if values.len() != mode.arity() {
        return Err(TeleopError::MalformedFrame(format!(
            "Expected {} values, got {}",
            mode.arity(),
            values.len()
        )));
    }

    Ok(CommandFrame::from_values(mode, &values))
}

/// Decode an untagged frame without ever failing
///
/// Values are read in encounter order. Reading stops at the first token that
/// is not a finite number, and tokens past the mode's arity are ignored. Every
/// setpoint that was not read is 0.0; `parsed` tells how many were read.
///
/// # Examples
///
/// ```
/// use rover_teleop::protocol::decoder::decode_lenient;
/// use rover_teleop::protocol::frame::{CommandFrame, ControlMode};
///
/// let decoded = decode_lenient("100 -100", ControlMode::FourMotor);
/// assert_eq!(decoded.frame, CommandFrame::FourMotor([100.0, -100.0, 0.0, 0.0]));
/// assert_eq!(decoded.parsed, 2);
/// assert!(!decoded.is_complete());
/// ```
pub fn decode_lenient(payload: &str, mode: ControlMode) -> LenientDecode {
    let values: Vec<f32> = payload
        .split_whitespace()
        .take(mode.arity())
        .map_while(parse_value)
        .collect();

    LenientDecode {
        frame: CommandFrame::from_values(mode, &values),
        parsed: values.len(),
    }
}
