//! # Rover Loop
//!
//! Receives command frames, mixes two-axis frames into wheel velocities and
//! dispatches the result to the motors.
//!
//! Each datagram is handled to completion before the next one is read, so
//! only the socket's receive buffer ever queues frames. Shutdown interrupts
//! the wait for a datagram, never the handling of one.

use tracing::{debug, info, warn};

use crate::drive::DriveMixer;
use crate::link::DatagramChannel;
use crate::motor::MotorDispatcher;
use crate::protocol::decoder::{datagram_text, decode_lenient, decode_tagged};
use crate::protocol::frame::{CommandFrame, ControlMode, MotorSetpoints};
use crate::shutdown::Shutdown;

/// Number of received frames between status log messages
pub const LOG_INTERVAL_CYCLES: u64 = 1000;

/// How received frames are parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFormat {
    /// Frames carry a mode tag and must match the mode exactly
    pub tagged: bool,
    /// Drive a zero command when a tagged frame is rejected
    pub neutral_on_malformed: bool,
}

/// Counters reported while running and on exit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoverStats {
    pub frames_received: u64,
    pub malformed_frames: u64,
    pub frames_dispatched: u64,
    pub actuator_failures: u64,
    pub recv_failures: u64,
}

/// Receiver side of the link
pub struct Rover<L> {
    link: L,
    dispatcher: MotorDispatcher,
    mode: ControlMode,
    mixer: DriveMixer,
    format: WireFormat,
    max_datagram_size: usize,
    stop_on_exit: bool,
    stats: RoverStats,
}

impl<L: DatagramChannel> Rover<L> {
    pub fn new(
        link: L,
        dispatcher: MotorDispatcher,
        mode: ControlMode,
        mixer: DriveMixer,
        format: WireFormat,
        max_datagram_size: usize,
    ) -> Self {
        Self {
            link,
            dispatcher,
            mode,
            mixer,
            format,
            max_datagram_size,
            stop_on_exit: true,
            stats: RoverStats::default(),
        }
    }

    /// Whether every motor is commanded to zero when the loop exits
    pub fn with_stop_on_exit(mut self, stop_on_exit: bool) -> Self {
        self.stop_on_exit = stop_on_exit;
        self
    }

    pub fn stats(&self) -> RoverStats {
        self.stats
    }

    /// Run until `shutdown` is triggered
    ///
    /// Receive errors are logged and counted; they never end the loop.
    pub async fn run(&mut self, shutdown: &Shutdown) -> RoverStats {
        let mut buf = vec![0u8; self.max_datagram_size];

        match self.mode {
            ControlMode::TwoAxis => info!(
                "Starting {} rover loop, mixer gain {}",
                self.mode,
                self.mixer.gain()
            ),
            ControlMode::FourMotor => info!("Starting {} rover loop", self.mode),
        }

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.triggered() => None,
                result = self.link.recv(&mut buf) => Some(result),
            };

            let Some(result) = received else {
                break;
            };

            match result {
                Ok((len, from)) => {
                    debug!("Received {} bytes from {}", len, from);
                    self.handle_datagram(&buf[..len]).await;
                }
                Err(e) => {
                    warn!("Failed to receive frame: {}", e);
                    self.stats.recv_failures += 1;
                }
            }
        }

        info!("Shutdown requested");
        if self.stop_on_exit {
            let report = self.dispatcher.stop_all().await;
            self.stats.actuator_failures += report.failures.len() as u64;
        }

        info!(
            "Rover stopped: {} frames received, {} malformed, {} actuator failures",
            self.stats.frames_received, self.stats.malformed_frames, self.stats.actuator_failures
        );
        self.stats
    }

    /// Decode, mix and dispatch one datagram
    pub async fn handle_datagram(&mut self, datagram: &[u8]) {
        self.stats.frames_received += 1;

        if let Some(frame) = self.decode(datagram) {
            let setpoints = self.setpoints(&frame);
            let report = self.dispatcher.dispatch(&setpoints).await;
            self.stats.frames_dispatched += 1;
            self.stats.actuator_failures += report.failures.len() as u64;
        }

        if self.stats.frames_received % LOG_INTERVAL_CYCLES == 0 {
            info!(
                "Received {} frames ({} malformed, {} actuator failures, {} receive failures)",
                self.stats.frames_received,
                self.stats.malformed_frames,
                self.stats.actuator_failures,
                self.stats.recv_failures
            );
        }
    }

    fn decode(&mut self, datagram: &[u8]) -> Option<CommandFrame> {
        if !self.format.tagged {
            let text = String::from_utf8_lossy(datagram);
            let decoded = decode_lenient(&text, self.mode);
            if !decoded.is_complete() {
                warn!(
                    "Short frame {:?}: read {} of {} values, rest set to 0",
                    text,
                    decoded.parsed,
                    self.mode.arity()
                );
                self.stats.malformed_frames += 1;
            }
            debug!("Parsed values: {:?}", decoded.frame.values());
            return Some(decoded.frame);
        }

        match datagram_text(datagram).and_then(|text| decode_tagged(text, self.mode)) {
            Ok(frame) => {
                debug!("Parsed values: {:?}", frame.values());
                Some(frame)
            }
            Err(e) => {
                warn!("{}", e);
                self.stats.malformed_frames += 1;
                self.format
                    .neutral_on_malformed
                    .then(|| CommandFrame::neutral(self.mode))
            }
        }
    }

    fn setpoints(&self, frame: &CommandFrame) -> MotorSetpoints {
        match *frame {
            CommandFrame::TwoAxis { linear, angular } => self.mixer.mix(linear, angular).as_array(),
            CommandFrame::FourMotor(values) => values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_channels;
    use crate::link::datagram::mocks::MockDatagram;
    use crate::motor::actuator::mocks::RecordingConnector;
    use std::time::Duration;

    const TAGGED: WireFormat = WireFormat {
        tagged: true,
        neutral_on_malformed: true,
    };

    const LEGACY: WireFormat = WireFormat {
        tagged: false,
        neutral_on_malformed: true,
    };

    async fn rover(
        mode: ControlMode,
        format: WireFormat,
        connector: &mut RecordingConnector,
    ) -> (Rover<MockDatagram>, MockDatagram) {
        let dispatcher =
            MotorDispatcher::connect(connector, &default_channels(mode), "can0", 600.0, None)
                .await
                .unwrap();
        let link = MockDatagram::new();
        let rover = Rover::new(link.clone(), dispatcher, mode, DriveMixer::default(), format, 1024);
        (rover, link)
    }

    fn velocities_by_name(connector: &RecordingConnector) -> Vec<(String, f32)> {
        connector.commands()
    }

    #[tokio::test]
    async fn test_legacy_two_axis_frame_is_mixed() {
        let mut connector = RecordingConnector::new();
        let (mut rover, _) = rover(ControlMode::TwoAxis, LEGACY, &mut connector).await;

        rover.handle_datagram(b"-1 1").await;

        assert_eq!(
            velocities_by_name(&connector),
            vec![
                ("rear_left".to_string(), 0.0),
                ("rear_right".to_string(), -600.0),
                ("front_right".to_string(), -600.0),
                ("front_left".to_string(), 0.0),
            ]
        );
        assert_eq!(rover.stats().malformed_frames, 0);
    }

    #[tokio::test]
    async fn test_tagged_four_motor_frame_is_not_mixed() {
        let mut connector = RecordingConnector::new();
        let (mut rover, _) = rover(ControlMode::FourMotor, TAGGED, &mut connector).await;

        rover.handle_datagram(b"M -100 100 0 100").await;

        assert_eq!(
            velocities_by_name(&connector),
            vec![
                ("F".to_string(), -100.0),
                ("C".to_string(), 100.0),
                ("D".to_string(), 0.0),
                ("E".to_string(), 100.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_wrong_tag_drives_neutral() {
        let mut connector = RecordingConnector::new();
        let (mut rover, _) = rover(ControlMode::TwoAxis, TAGGED, &mut connector).await;

        rover.handle_datagram(b"M 100 100 100 100").await;

        assert_eq!(rover.stats().malformed_frames, 1);
        assert_eq!(rover.stats().frames_dispatched, 1);
        assert!(velocities_by_name(&connector).iter().all(|(_, v)| *v == 0.0));
    }

    #[tokio::test]
    async fn test_non_finite_frame_drives_neutral() {
        let mut connector = RecordingConnector::new();
        let (mut rover, _) = rover(ControlMode::FourMotor, TAGGED, &mut connector).await;

        rover.handle_datagram(b"M inf 0 0 0").await;
        rover.handle_datagram(b"M NaN 100 100 100").await;

        assert_eq!(rover.stats().malformed_frames, 2);
        assert_eq!(rover.stats().frames_dispatched, 2);
        assert_eq!(connector.commands().len(), 8);
        assert!(connector.commands().iter().all(|(_, v)| *v == 0.0));
    }

    #[tokio::test]
    async fn test_legacy_non_finite_value_is_zeroed() {
        let mut connector = RecordingConnector::new();
        let (mut rover, _) = rover(ControlMode::TwoAxis, LEGACY, &mut connector).await;

        rover.handle_datagram(b"inf 1").await;

        assert_eq!(rover.stats().malformed_frames, 1);
        assert!(connector.commands().iter().all(|(_, v)| *v == 0.0));
    }

    #[tokio::test]
    async fn test_status_counts_malformed_only_runs() {
        let mut connector = RecordingConnector::new();
        let format = WireFormat {
            tagged: true,
            neutral_on_malformed: false,
        };
        let (mut rover, _) = rover(ControlMode::TwoAxis, format, &mut connector).await;

        for _ in 0..LOG_INTERVAL_CYCLES {
            rover.handle_datagram(b"garbage").await;
        }

        assert_eq!(rover.stats().frames_received, LOG_INTERVAL_CYCLES);
        assert_eq!(rover.stats().malformed_frames, LOG_INTERVAL_CYCLES);
        assert_eq!(rover.stats().frames_dispatched, 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_skipped_without_neutral() {
        let mut connector = RecordingConnector::new();
        let format = WireFormat {
            tagged: true,
            neutral_on_malformed: false,
        };
        let (mut rover, _) = rover(ControlMode::TwoAxis, format, &mut connector).await;

        rover.handle_datagram(b"D 1").await;
        rover.handle_datagram(&[0xFF, 0xFE]).await;

        assert_eq!(rover.stats().frames_received, 2);
        assert_eq!(rover.stats().malformed_frames, 2);
        assert_eq!(rover.stats().frames_dispatched, 0);
        assert!(connector.commands().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_short_frame_is_counted_and_dispatched() {
        let mut connector = RecordingConnector::new();
        let (mut rover, _) = rover(ControlMode::FourMotor, LEGACY, &mut connector).await;

        rover.handle_datagram(b"100").await;

        assert_eq!(rover.stats().malformed_frames, 1);
        assert_eq!(rover.stats().frames_dispatched, 1);
        assert_eq!(connector.commands()[0], ("F".to_string(), 100.0));
        assert_eq!(connector.commands()[1], ("C".to_string(), 0.0));
    }

    #[tokio::test]
    async fn test_actuator_failures_are_counted() {
        let mut connector = RecordingConnector::with_broken("C");
        let (mut rover, _) = rover(ControlMode::FourMotor, TAGGED, &mut connector).await;

        rover.handle_datagram(b"M 1 2 3 4").await;
        rover.handle_datagram(b"M 1 2 3 4").await;

        assert_eq!(rover.stats().actuator_failures, 2);
        assert_eq!(connector.commands().len(), 6);
    }

    #[tokio::test]
    async fn test_run_processes_queue_then_stops_motors() {
        let mut connector = RecordingConnector::new();
        let (rover, link) = rover(ControlMode::TwoAxis, TAGGED, &mut connector).await;
        let mut rover = rover.with_stop_on_exit(true);

        link.push_inbound(b"D 1 0");
        link.push_inbound(b"D 0 1");

        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        let watcher = link.clone();
        let stopper = tokio::spawn(async move {
            while watcher.pending() > 0 {
                tokio::task::yield_now().await;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        let stats = rover.run(&shutdown).await;
        stopper.await.unwrap();

        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.frames_dispatched, 2);

        let commands = connector.commands();
        // Two frames plus the stop command, four motors each
        assert_eq!(commands.len(), 12);
        assert!(commands[8..].iter().all(|(_, v)| *v == 0.0));
    }

    #[tokio::test]
    async fn test_run_without_stop_on_exit() {
        let mut connector = RecordingConnector::new();
        let (rover, _) = rover(ControlMode::FourMotor, TAGGED, &mut connector).await;
        let mut rover = rover.with_stop_on_exit(false);

        let shutdown = Shutdown::new();
        shutdown.trigger();
        let stats = rover.run(&shutdown).await;

        assert_eq!(stats, RoverStats::default());
        assert!(connector.commands().is_empty());
    }
}
