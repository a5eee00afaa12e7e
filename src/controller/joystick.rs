//! # Joystick Module
//!
//! Opens a joystick through the Linux evdev interface and samples its state
//! once per operator cycle.
//!
//! ## Device Detection
//!
//! When no device path is configured, every `/dev/input/event*` node is tried
//! in sorted order and the first one that reports both `ABS_X` and `ABS_Y`
//! together with a gamepad or joystick button is used.
//!
//! ## Axis Ranges
//!
//! Each stick axis is read in the range the kernel reports for it and
//! rescaled into the configured `[axis_min, axis_max]`, so a 0..255 gamepad
//! and a -32768..32767 joystick map the same way.

use async_trait::async_trait;
use evdev::{AbsoluteAxisType, Device, EventStream, Key};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::sample::{AxisRange, RawInputSample, SampleTracker, TRACKED_AXES};
use crate::error::{Result, TeleopError};

/// Directory scanned for input devices
const INPUT_DIR: &str = "/dev/input";

/// Source of per-cycle input samples
#[async_trait]
pub trait InputSource: Send {
    /// Return the current input state without waiting for new events.
    async fn poll(&mut self) -> Result<RawInputSample>;
}

/// Joystick handle
///
/// Owns the evdev event stream and the accumulated state built from it.
pub struct Joystick {
    stream: EventStream,
    tracker: SampleTracker,
    device_path: PathBuf,
    name: Option<String>,
}

impl Joystick {
    /// Open a joystick
    ///
    /// # Arguments
    ///
    /// * `device_path` - evdev node to open, or `None` to auto-detect
    /// * `target` - Configured axis range readings are rescaled into
    /// * `rest` - Value reported for axes whose range the kernel does not give
    ///
    /// # Errors
    ///
    /// - `InputDeviceNotFound`: no joystick found while auto-detecting
    /// - `InputDevice`: the device could not be opened or streamed
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_teleop::controller::joystick::Joystick;
    /// use rover_teleop::controller::sample::AxisRange;
    ///
    /// let joystick = Joystick::open(None, AxisRange::new(-32768, 32767), 0)?;
    /// println!("Connected to joystick at: {}", joystick.device_path().display());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(device_path: Option<&Path>, target: AxisRange, rest: i32) -> Result<Self> {
        let (device, path) = match device_path {
            Some(path) => {
                let device = Device::open(path).map_err(|e| {
                    TeleopError::InputDevice(format!("Failed to open {}: {}", path.display(), e))
                })?;
                (device, path.to_path_buf())
            }
            None => find_joystick(Path::new(INPUT_DIR))?,
        };

        let name = device.name().map(str::to_string);
        info!(
            "Using joystick {} at {}",
            name.as_deref().unwrap_or("<unnamed>"),
            path.display()
        );

        let tracker = calibrated_tracker(&device, target, rest);

        let stream = device.into_event_stream().map_err(|e| {
            TeleopError::InputDevice(format!("Failed to stream {}: {}", path.display(), e))
        })?;

        Ok(Self {
            stream,
            tracker,
            device_path: path,
            name,
        })
    }

    /// Get the device path of this joystick
    pub fn device_path(&self) -> &Path {
        &self.device_path
    }
}

#[async_trait]
impl InputSource for Joystick {
    async fn poll(&mut self) -> Result<RawInputSample> {
        loop {
            // Zero timeout: take only what is already queued
            match tokio::time::timeout(Duration::ZERO, self.stream.next_event()).await {
                Ok(Ok(event)) => self.tracker.process_event(&event),
                Ok(Err(e)) => {
                    return Err(TeleopError::InputDevice(format!(
                        "Failed to read {}: {}",
                        self.device_path.display(),
                        e
                    )))
                }
                Err(_) => break,
            }
        }
        Ok(self.tracker.snapshot())
    }
}

impl std::fmt::Debug for Joystick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Joystick")
            .field("device_path", &self.device_path)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Tracker seeded with the device's axis ranges and current positions
fn calibrated_tracker(device: &Device, target: AxisRange, rest: i32) -> SampleTracker {
    let mut tracker = SampleTracker::new(rest);

    let state = match device.get_abs_state() {
        Ok(state) => state,
        Err(e) => {
            warn!("Could not read axis ranges, using raw readings: {}", e);
            return tracker;
        }
    };
    let supported = device.supported_absolute_axes();

    for (index, axis) in TRACKED_AXES.iter().enumerate() {
        if !supported.map_or(false, |axes| axes.contains(*axis)) {
            continue;
        }
        let Some(info) = state.get(usize::from(axis.0)) else {
            continue;
        };
        let range = AxisRange::new(info.minimum, info.maximum);
        if !range.is_valid() {
            continue;
        }
        debug!("Axis {} ({:?}) range {}..{}", index, axis, range.min, range.max);

        tracker.set_axis_range(index, range, target);
        tracker.set_axis(index, info.value);
    }

    tracker
}

/// True if the device looks like a gamepad or joystick
fn is_joystick(device: &Device) -> bool {
    let has_sticks = device.supported_absolute_axes().map_or(false, |axes| {
        axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(AbsoluteAxisType::ABS_Y)
    });
    let has_buttons = device.supported_keys().map_or(false, |keys| {
        keys.contains(Key::BTN_SOUTH) || keys.contains(Key::BTN_TRIGGER)
    });
    has_sticks && has_buttons
}

/// Returns true for `event*` device nodes
fn is_event_node(path: &Path) -> bool {
    path.file_name()
        .map_or(false, |name| name.to_string_lossy().starts_with("event"))
}

fn find_joystick(input_dir: &Path) -> Result<(Device, PathBuf)> {
    if !input_dir.exists() {
        return Err(TeleopError::InputDevice(format!(
            "{} directory not found",
            input_dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(input_dir)
        .map_err(|e| {
            TeleopError::InputDevice(format!("Failed to read {}: {}", input_dir.display(), e))
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_event_node(path))
        .collect();

    // Deterministic choice when several joysticks are plugged in
    paths.sort();

    for path in paths {
        match Device::open(&path) {
            Ok(device) => {
                debug!(
                    "Found input device: {} ({})",
                    path.display(),
                    device.name().unwrap_or("<unnamed>")
                );
                if is_joystick(&device) {
                    return Ok((device, path));
                }
            }
            Err(e) => {
                // Permission denied or other errors - skip device
                debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    Err(TeleopError::InputDeviceNotFound)
}

/// Test doubles for [`InputSource`]
#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Input source replaying a fixed list of samples.
    ///
    /// Once the script runs out the last sample is repeated, like a stick
    /// that stays where it was left.
    #[derive(Clone, Default)]
    pub struct ScriptedInput {
        samples: Arc<Mutex<VecDeque<RawInputSample>>>,
        last: Arc<Mutex<RawInputSample>>,
        polls: Arc<Mutex<usize>>,
        fail: Arc<Mutex<bool>>,
    }

    impl ScriptedInput {
        pub fn new(samples: Vec<RawInputSample>) -> Self {
            Self {
                samples: Arc::new(Mutex::new(samples.into())),
                ..Self::default()
            }
        }

        pub fn poll_count(&self) -> usize {
            *self.polls.lock().unwrap()
        }

        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }
    }

    #[async_trait]
    impl InputSource for ScriptedInput {
        async fn poll(&mut self) -> Result<RawInputSample> {
            *self.polls.lock().unwrap() += 1;
            if *self.fail.lock().unwrap() {
                return Err(TeleopError::InputDevice("unplugged".to_string()));
            }
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.samples.lock().unwrap().pop_front() {
                *last = next;
            }
            Ok(last.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::ScriptedInput;
    use super::*;

    #[test]
    fn test_is_event_node() {
        assert!(is_event_node(Path::new("/dev/input/event0")));
        assert!(is_event_node(Path::new("/dev/input/event17")));
        assert!(!is_event_node(Path::new("/dev/input/js0")));
        assert!(!is_event_node(Path::new("/dev/input/mice")));
        assert!(!is_event_node(Path::new("/")));
    }

    #[test]
    fn test_find_joystick_missing_directory() {
        let result = find_joystick(Path::new("/nonexistent/input"));
        assert!(matches!(result, Err(TeleopError::InputDevice(_))));
    }

    #[test]
    fn test_find_joystick_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mouse0"), b"").unwrap();

        let result = find_joystick(dir.path());
        assert!(matches!(result, Err(TeleopError::InputDeviceNotFound)));
    }

    #[test]
    fn test_open_missing_device_path() {
        let result = Joystick::open(
            Some(Path::new("/nonexistent/event99")),
            AxisRange::new(-32768, 32767),
            0,
        );
        assert!(matches!(result, Err(TeleopError::InputDevice(_))));
    }

    #[tokio::test]
    async fn test_scripted_input_repeats_last_sample() {
        let first = RawInputSample::new(vec![1, 2], vec![]);
        let second = RawInputSample::new(vec![3, 4], vec![true]);
        let mut input = ScriptedInput::new(vec![first.clone(), second.clone()]);

        assert_eq!(input.poll().await.unwrap(), first);
        assert_eq!(input.poll().await.unwrap(), second);
        assert_eq!(input.poll().await.unwrap(), second);
        assert_eq!(input.poll_count(), 3);
    }

    // Integration test - only runs with real hardware
    #[tokio::test]
    #[ignore]
    async fn test_open_with_real_hardware() {
        let mut joystick =
            Joystick::open(None, AxisRange::new(-32768, 32767), 0).expect("No joystick found");
        assert!(joystick.device_path().starts_with(INPUT_DIR));

        println!("Move a stick within 5 seconds...");
        for _ in 0..100 {
            let sample = joystick.poll().await.unwrap();
            if sample.axes.iter().any(|&v| v.abs() > 8000) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        panic!("No stick movement received from joystick");
    }
}
