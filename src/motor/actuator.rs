//! Trait abstraction for motor controllers to enable testing

use async_trait::async_trait;
use serde::Deserialize;
use std::io;
use tracing::debug;

/// One addressable motor
///
/// `slot` selects which entry of the setpoint vector this motor follows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MotorChannel {
    /// Name used in logs (e.g., "front_left", "F")
    pub name: String,
    /// Controller id on the bus
    pub id: u32,
    /// Index into the setpoint vector
    pub slot: usize,
}

impl MotorChannel {
    pub fn new(name: &str, id: u32, slot: usize) -> Self {
        Self {
            name: name.to_string(),
            id,
            slot,
        }
    }
}

impl std::fmt::Display for MotorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (id 0x{:02X})", self.name, self.id)
    }
}

/// Trait for issuing velocity commands to one motor controller
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MotorActuator: Send {
    /// Command a velocity; the unit is whatever the controller expects
    async fn send_velocity(&mut self, velocity: f32) -> io::Result<()>;
}

/// Trait for establishing actuator connections at startup
#[async_trait]
pub trait MotorConnector: Send {
    /// Connect to the controller behind `channel` on `bus`
    async fn open(&mut self, channel: &MotorChannel, bus: &str)
        -> io::Result<Box<dyn MotorActuator>>;
}

/// Connector that never touches hardware
///
/// Used with `[motors] enabled = false` to run the rover loop on a bench.
#[derive(Debug, Default)]
pub struct DryRunConnector;

#[async_trait]
impl MotorConnector for DryRunConnector {
    async fn open(
        &mut self,
        channel: &MotorChannel,
        bus: &str,
    ) -> io::Result<Box<dyn MotorActuator>> {
        debug!("Dry run: pretending to open {} on {}", channel, bus);
        Ok(Box::new(DryRunActuator {
            name: channel.name.clone(),
        }))
    }
}

/// Actuator that logs commands instead of sending them
#[derive(Debug)]
pub struct DryRunActuator {
    name: String,
}

#[async_trait]
impl MotorActuator for DryRunActuator {
    async fn send_velocity(&mut self, velocity: f32) -> io::Result<()> {
        debug!("Dry run: {} velocity {}", self.name, velocity);
        Ok(())
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Shared record of every command sent, in order
    pub type CommandLog = Arc<Mutex<Vec<(String, f32)>>>;

    /// Actuator appending its commands to a shared log
    pub struct RecordingActuator {
        name: String,
        log: CommandLog,
        fail: bool,
    }

    #[async_trait]
    impl MotorActuator for RecordingActuator {
        async fn send_velocity(&mut self, velocity: f32) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "Mock command error"));
            }
            self.log.lock().unwrap().push((self.name.clone(), velocity));
            Ok(())
        }
    }

    /// Connector handing out recording actuators
    #[derive(Clone, Default)]
    pub struct RecordingConnector {
        pub log: CommandLog,
        pub opened: Arc<Mutex<Vec<(String, u32, String)>>>,
        pub refuse: Option<String>,
        pub broken: Option<String>,
    }

    impl RecordingConnector {
        pub fn new() -> Self {
            Self::default()
        }

        /// Refuse to connect the named channel
        pub fn refusing(name: &str) -> Self {
            Self {
                refuse: Some(name.to_string()),
                ..Self::default()
            }
        }

        /// Connect the named channel but fail every command sent to it
        pub fn with_broken(name: &str) -> Self {
            Self {
                broken: Some(name.to_string()),
                ..Self::default()
            }
        }

        pub fn commands(&self) -> Vec<(String, f32)> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MotorConnector for RecordingConnector {
        async fn open(
            &mut self,
            channel: &MotorChannel,
            bus: &str,
        ) -> io::Result<Box<dyn MotorActuator>> {
            if self.refuse.as_deref() == Some(channel.name.as_str()) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "Mock connect error"));
            }
            self.opened
                .lock()
                .unwrap()
                .push((channel.name.clone(), channel.id, bus.to_string()));
            Ok(Box::new(RecordingActuator {
                name: channel.name.clone(),
                log: self.log.clone(),
                fail: self.broken.as_deref() == Some(channel.name.as_str()),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_display() {
        let channel = MotorChannel::new("front_left", 4, 0);
        assert_eq!(channel.to_string(), "front_left (id 0x04)");
    }

    #[tokio::test]
    async fn test_dry_run_never_fails() {
        let mut connector = DryRunConnector;
        let channel = MotorChannel::new("F", 0x0F, 0);
        let mut actuator = connector.open(&channel, "can0").await.unwrap();
        assert!(actuator.send_velocity(100.0).await.is_ok());
        assert!(actuator.send_velocity(f32::NAN).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_actuator_expectations() {
        let mut mock = MockMotorActuator::new();
        mock.expect_send_velocity()
            .withf(|v| *v == 42.0)
            .times(1)
            .returning(|_| Ok(()));

        mock.send_velocity(42.0).await.unwrap();
    }
}
