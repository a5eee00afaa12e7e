//! # Motor Dispatcher
//!
//! Owns one actuator per configured channel and fans each setpoint vector
//! out to them.
//!
//! Connecting is all-or-nothing: if any channel cannot be opened the rover
//! does not start. After that, a failed command on one channel is logged and
//! reported but never stops the other channels from being commanded.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::actuator::{MotorActuator, MotorChannel, MotorConnector};
use crate::drive::mixer::saturate;
use crate::error::{Result, TeleopError};
use crate::protocol::frame::MotorSetpoints;

/// Outcome of one dispatch cycle
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Channels commanded successfully
    pub sent: usize,
    /// Per-channel failures, in dispatch order
    pub failures: Vec<TeleopError>,
}

impl DispatchReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Slot {
    channel: MotorChannel,
    actuator: Box<dyn MotorActuator>,
}

/// Fans setpoints out to motor actuators in a fixed order
pub struct MotorDispatcher {
    slots: Vec<Slot>,
    max_velocity: f32,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for MotorDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorDispatcher")
            .field(
                "channels",
                &self.slots.iter().map(|s| &s.channel).collect::<Vec<_>>(),
            )
            .field("max_velocity", &self.max_velocity)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MotorDispatcher {
    /// Connect every channel, in order
    ///
    /// # Arguments
    ///
    /// * `connector` - Driver used to open each actuator
    /// * `channels` - Channel table; also fixes the dispatch order
    /// * `bus` - Bus the actuators live on
    /// * `max_velocity` - Magnitude no command may exceed
    /// * `timeout` - Optional bound on each command
    ///
    /// # Errors
    ///
    /// - `InvalidConfig`: `max_velocity` is not a positive finite number
    /// - `ActuatorConnect`: the first channel that cannot be opened
    pub async fn connect(
        connector: &mut dyn MotorConnector,
        channels: &[MotorChannel],
        bus: &str,
        max_velocity: f32,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if !max_velocity.is_finite() || max_velocity <= 0.0 {
            return Err(TeleopError::InvalidConfig(format!(
                "max_velocity must be a positive number, got {}",
                max_velocity
            )));
        }

        let mut slots = Vec::with_capacity(channels.len());
        for channel in channels {
            let actuator = connector.open(channel, bus).await.map_err(|e| {
                TeleopError::ActuatorConnect {
                    channel: channel.name.clone(),
                    reason: e.to_string(),
                }
            })?;
            info!("Motor {} connected on {}", channel, bus);
            slots.push(Slot {
                channel: channel.clone(),
                actuator,
            });
        }

        Ok(Self {
            slots,
            max_velocity,
            timeout,
        })
    }

    /// Channels in dispatch order
    pub fn channels(&self) -> impl Iterator<Item = &MotorChannel> {
        self.slots.iter().map(|s| &s.channel)
    }

    /// Send one setpoint to every channel
    ///
    /// Each channel receives `setpoints[channel.slot]`, saturated to
    /// `max_velocity`. Failures are logged and collected; remaining channels
    /// are still commanded.
    pub async fn dispatch(&mut self, setpoints: &MotorSetpoints) -> DispatchReport {
        let mut report = DispatchReport::default();

        for slot in &mut self.slots {
            let requested = setpoints.get(slot.channel.slot).copied().unwrap_or(0.0);
            let velocity = saturate(requested, self.max_velocity);
            if velocity != requested {
                debug!(
                    "Motor {} velocity {} limited to {}",
                    slot.channel.name, requested, velocity
                );
            }

            match send(slot, velocity, self.timeout).await {
                Ok(()) => {
                    debug!("Sent {} velocity: {}", slot.channel.name, velocity);
                    report.sent += 1;
                }
                Err(e) => {
                    warn!("{}", e);
                    report.failures.push(e);
                }
            }
        }

        report
    }

    /// Command every motor to zero
    pub async fn stop_all(&mut self) -> DispatchReport {
        info!("Stopping all motors");
        self.dispatch(&[0.0; 4]).await
    }
}

async fn send(slot: &mut Slot, velocity: f32, timeout: Option<Duration>) -> Result<()> {
    let command = slot.actuator.send_velocity(velocity);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, command).await.map_err(|_| {
            TeleopError::ActuatorTimeout {
                channel: slot.channel.name.clone(),
            }
        })?,
        None => command.await,
    };

    result.map_err(|e| TeleopError::ActuatorCommand {
        channel: slot.channel.name.clone(),
        reason: e.to_string(),
    })
}
