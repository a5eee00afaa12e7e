//! # Raw Input Sample Module
//!
//! This module folds raw evdev events from a joystick into a [`RawInputSample`],
//! the per-cycle snapshot consumed by the command mapper.
//!
//! ## Axis Indices
//!
//! | Index | evdev Code | Typical use |
//! |-------|------------|-------------|
//! | 0 | ABS_X | Left stick X |
//! | 1 | ABS_Y | Left stick Y |
//! | 2 | ABS_Z | Right stick X (or left trigger) |
//! | 3 | ABS_RX | Right stick X / left trigger |
//! | 4 | ABS_RY | Right stick Y / right trigger |
//! | 5 | ABS_RZ | Right stick Y (or right trigger) |
//!
//! ## Button Indices
//!
//! | Index | evdev Code | Button |
//! |-------|------------|--------|
//! | 0 | BTN_DPAD_LEFT / ABS_HAT0X = -1 | D-Pad left |
//! | 1 | BTN_DPAD_RIGHT / ABS_HAT0X = 1 | D-Pad right |
//! | 2 | BTN_TL | L1 |
//! | 3 | BTN_TL2 | L2 |
//! | 4 | BTN_TR | R1 |
//! | 5 | BTN_TR2 | R2 |
//! | 6 | BTN_DPAD_UP / ABS_HAT0Y = -1 | D-Pad up |
//! | 7 | BTN_DPAD_DOWN / ABS_HAT0Y = 1 | D-Pad down |
//! | 8 | BTN_SOUTH | Cross / A |
//! | 9 | BTN_EAST | Circle / B |
//! | 10 | BTN_WEST | Square / X |
//! | 11 | BTN_NORTH | Triangle / Y |
//! | 12 | BTN_SELECT | Share / Back |
//! | 13 | BTN_START | Options / Start |
//! | 14 | BTN_MODE | PS / Guide |
//! | 15 | BTN_THUMBL | L3 |
//! | 16 | BTN_THUMBR | R3 |
//!
//! Controllers that report the D-Pad as a hat axis have it converted into the
//! four D-Pad buttons, so button bindings work the same on both kinds.

use evdev::{AbsoluteAxisType, InputEvent, InputEventKind, Key};

/// Number of tracked analog axes.
pub const AXIS_COUNT: usize = 6;

/// Number of tracked buttons.
pub const BUTTON_COUNT: usize = 17;

/// Button indices for semantic access.
pub mod buttons {
    pub const DPAD_LEFT: usize = 0;
    pub const DPAD_RIGHT: usize = 1;
    pub const L1: usize = 2;
    pub const L2: usize = 3;
    pub const R1: usize = 4;
    pub const R2: usize = 5;
    pub const DPAD_UP: usize = 6;
    pub const DPAD_DOWN: usize = 7;
    pub const SOUTH: usize = 8;
    pub const EAST: usize = 9;
    pub const WEST: usize = 10;
    pub const NORTH: usize = 11;
    pub const SELECT: usize = 12;
    pub const START: usize = 13;
    pub const MODE: usize = 14;
    pub const THUMB_L: usize = 15;
    pub const THUMB_R: usize = 16;
}

/// One poll cycle's snapshot of joystick state.
///
/// Axis values are raw signed device readings; buttons are pressed/released.
/// Indices past the end of either sequence read as 0 / released.
///
/// # Examples
///
/// ```
/// use rover_teleop::controller::sample::RawInputSample;
///
/// let sample = RawInputSample::new(vec![32767, -32768], vec![true]);
/// assert_eq!(sample.axis(1), -32768);
/// assert!(sample.button(0));
/// assert!(!sample.button(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawInputSample {
    /// Axis readings in index order.
    pub axes: Vec<i32>,
    /// Button states in index order.
    pub buttons: Vec<bool>,
}

impl RawInputSample {
    /// Creates a sample from axis and button readings.
    #[must_use]
    pub fn new(axes: Vec<i32>, buttons: Vec<bool>) -> Self {
        Self { axes, buttons }
    }

    /// Reads an axis, 0 if the device has no such axis.
    #[must_use]
    pub fn axis(&self, index: usize) -> i32 {
        self.axes.get(index).copied().unwrap_or(0)
    }

    /// Reads a button, released if the device has no such button.
    #[must_use]
    pub fn button(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    /// Checks if any button is currently pressed.
    #[must_use]
    pub fn any_button_pressed(&self) -> bool {
        self.buttons.iter().any(|&pressed| pressed)
    }
}

/// Inclusive range of readings on one axis.
///
/// # Examples
///
/// ```
/// use rover_teleop::controller::sample::AxisRange;
///
/// let byte = AxisRange::new(0, 255);
/// let int16 = AxisRange::new(-32768, 32767);
/// assert_eq!(byte.rescale(0, int16), -32768);
/// assert_eq!(byte.rescale(255, int16), 32767);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    #[must_use]
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// True if the range spans more than one value.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min < self.max
    }

    /// Maps `value` from this range onto `target`, rounding to nearest.
    ///
    /// Readings outside this range are clamped first. An invalid range
    /// passes the value through unchanged.
    #[must_use]
    pub fn rescale(&self, value: i32, target: AxisRange) -> i32 {
        if !self.is_valid() {
            return value;
        }
        let span = i64::from(self.max) - i64::from(self.min);
        let target_span = i64::from(target.max) - i64::from(target.min);
        let offset = i64::from(value.clamp(self.min, self.max)) - i64::from(self.min);

        let scaled = (offset * target_span + span / 2).div_euclid(span);
        (i64::from(target.min) + scaled) as i32
    }
}

/// evdev axes tracked by [`SampleTracker`], in sample index order.
pub const TRACKED_AXES: [AbsoluteAxisType; AXIS_COUNT] = [
    AbsoluteAxisType::ABS_X,
    AbsoluteAxisType::ABS_Y,
    AbsoluteAxisType::ABS_Z,
    AbsoluteAxisType::ABS_RX,
    AbsoluteAxisType::ABS_RY,
    AbsoluteAxisType::ABS_RZ,
];

/// Accumulates evdev events into a [`RawInputSample`].
///
/// Devices report axes in their own ranges (0..255 on most gamepads,
/// -32768..32767 on others). When an axis has a device range set, its
/// readings are rescaled into the configured range before being stored.
///
/// # Thread Safety
///
/// `SampleTracker` is not thread-safe. Use from a single task/thread only.
///
/// # Examples
///
/// ```
/// use rover_teleop::controller::sample::SampleTracker;
///
/// let tracker = SampleTracker::new(0);
/// let sample = tracker.sample();
/// assert_eq!(sample.axis(0), 0);
/// assert!(!sample.any_button_pressed());
/// ```
#[derive(Debug)]
pub struct SampleTracker {
    sample: RawInputSample,
    scales: [Option<(AxisRange, AxisRange)>; AXIS_COUNT],
}

impl SampleTracker {
    /// Creates a tracker with every axis at `rest` and every button released.
    ///
    /// `rest` should be the center reading so that nothing moves before the
    /// first axis event arrives.
    #[must_use]
    pub fn new(rest: i32) -> Self {
        Self {
            sample: RawInputSample::new(vec![rest; AXIS_COUNT], vec![false; BUTTON_COUNT]),
            scales: [None; AXIS_COUNT],
        }
    }

    /// Rescale readings of axis `index` from `device` into `target`.
    ///
    /// Ignored for indices past [`AXIS_COUNT`] and for invalid device ranges.
    pub fn set_axis_range(&mut self, index: usize, device: AxisRange, target: AxisRange) {
        if let Some(scale) = self.scales.get_mut(index) {
            *scale = device.is_valid().then_some((device, target));
        }
    }

    /// Stores a device reading for axis `index`, rescaled if a range is set.
    pub fn set_axis(&mut self, index: usize, value: i32) {
        let Some(slot) = self.sample.axes.get_mut(index) else {
            return;
        };
        *slot = match self.scales[index] {
            Some((device, target)) => device.rescale(value, target),
            None => value,
        };
    }

    /// Returns a reference to the current sample.
    #[must_use]
    pub fn sample(&self) -> &RawInputSample {
        &self.sample
    }

    /// Returns an owned copy of the current sample.
    #[must_use]
    pub fn snapshot(&self) -> RawInputSample {
        self.sample.clone()
    }

    /// Processes a single evdev input event and updates the sample.
    ///
    /// Sync events and codes outside the index tables are ignored.
    pub fn process_event(&mut self, event: &InputEvent) {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => self.process_axis_event(axis, event.value()),
            InputEventKind::Key(key) => self.process_key_event(key, event.value() != 0),
            _ => {}
        }
    }

    fn process_axis_event(&mut self, axis: AbsoluteAxisType, value: i32) {
        match axis {
            AbsoluteAxisType::ABS_HAT0X => {
                self.set_hat(buttons::DPAD_LEFT, buttons::DPAD_RIGHT, value)
            }
            AbsoluteAxisType::ABS_HAT0Y => {
                self.set_hat(buttons::DPAD_UP, buttons::DPAD_DOWN, value)
            }
            // Gyro, accelerometer and touchpad axes are not in the table
            _ => {
                if let Some(index) = TRACKED_AXES.iter().position(|&a| a == axis) {
                    self.set_axis(index, value);
                }
            }
        }
    }

    fn set_hat(&mut self, negative: usize, positive: usize, value: i32) {
        self.sample.buttons[negative] = value < 0;
        self.sample.buttons[positive] = value > 0;
    }

    fn process_key_event(&mut self, key: Key, pressed: bool) {
        let index = match key {
            Key::BTN_DPAD_LEFT => buttons::DPAD_LEFT,
            Key::BTN_DPAD_RIGHT => buttons::DPAD_RIGHT,
            Key::BTN_TL => buttons::L1,
            Key::BTN_TL2 => buttons::L2,
            Key::BTN_TR => buttons::R1,
            Key::BTN_TR2 => buttons::R2,
            Key::BTN_DPAD_UP => buttons::DPAD_UP,
            Key::BTN_DPAD_DOWN => buttons::DPAD_DOWN,
            Key::BTN_SOUTH => buttons::SOUTH,
            Key::BTN_EAST => buttons::EAST,
            Key::BTN_WEST => buttons::WEST,
            Key::BTN_NORTH => buttons::NORTH,
            Key::BTN_SELECT => buttons::SELECT,
            Key::BTN_START => buttons::START,
            Key::BTN_MODE => buttons::MODE,
            Key::BTN_THUMBL => buttons::THUMB_L,
            Key::BTN_THUMBR => buttons::THUMB_R,
            _ => return,
        };
        self.sample.buttons[index] = pressed;
    }
}
