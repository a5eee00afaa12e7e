//! # Operator Loop
//!
//! Samples the joystick, maps it to a command frame and sends the frame to
//! the rover at a fixed period until shutdown.
//!
//! Each cycle is poll, map, encode, send, then wait for the next tick.
//! Shutdown is checked once per cycle after the wait: a cycle that has
//! started always finishes, and no new frame is sampled once shutdown is
//! requested. On the way out one neutral frame is sent so a rover that is
//! still listening stops instead of holding the last command.

use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::controller::{CommandMapper, InputSource};
use crate::link::DatagramChannel;
use crate::protocol::encoder::encode_frame;
use crate::protocol::frame::CommandFrame;
use crate::shutdown::Shutdown;

/// Number of cycles between status log messages
pub const LOG_INTERVAL_CYCLES: u64 = 1000;

/// Counters reported while running and on exit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatorStats {
    pub cycles: u64,
    pub frames_sent: u64,
    pub send_failures: u64,
    pub input_failures: u64,
}

/// Sender side of the link
pub struct Operator<I, L> {
    input: I,
    link: L,
    mapper: CommandMapper,
    tagged: bool,
    period: Duration,
    stats: OperatorStats,
}

impl<I: InputSource, L: DatagramChannel> Operator<I, L> {
    /// Create an operator loop
    ///
    /// # Arguments
    ///
    /// * `input` - Joystick (or any other input source)
    /// * `link` - Link to the rover
    /// * `mapper` - Mapping for the configured mode
    /// * `tagged` - Send mode-tagged frames
    /// * `period` - Time between frames
    pub fn new(input: I, link: L, mapper: CommandMapper, tagged: bool, period: Duration) -> Self {
        Self {
            input,
            link,
            mapper,
            tagged,
            period,
            stats: OperatorStats::default(),
        }
    }

    pub fn stats(&self) -> OperatorStats {
        self.stats
    }

    /// Run until `shutdown` is triggered
    pub async fn run(&mut self, shutdown: &Shutdown) -> OperatorStats {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Starting {} operator loop, one frame every {:?}",
            self.mapper.mode(),
            self.period
        );

        // The first tick completes immediately
        ticker.tick().await;

        while !shutdown.is_triggered() {
            self.cycle().await;

            if self.stats.cycles % LOG_INTERVAL_CYCLES == 0 {
                info!(
                    "Sent {} frames ({} send failures, {} input failures)",
                    self.stats.frames_sent, self.stats.send_failures, self.stats.input_failures
                );
            }

            ticker.tick().await;
        }

        info!("Shutdown requested, sending neutral frame");
        let neutral = CommandFrame::neutral(self.mapper.mode());
        self.send(&neutral).await;

        info!("Operator stopped after {} cycles", self.stats.cycles);
        self.stats
    }

    /// One poll → map → encode → send pass
    pub async fn cycle(&mut self) {
        self.stats.cycles += 1;

        let frame = match self.input.poll().await {
            Ok(sample) => {
                debug!("Axes: {:?} | Buttons: {:?}", sample.axes, sample.buttons);
                self.mapper.map(&sample)
            }
            Err(e) => {
                // Fail safe: an unreadable stick commands nothing
                warn!("{}", e);
                self.stats.input_failures += 1;
                CommandFrame::neutral(self.mapper.mode())
            }
        };

        debug!("Mapped setpoints: {:?}", frame.values());
        self.send(&frame).await;
    }

    async fn send(&mut self, frame: &CommandFrame) {
        let payload = encode_frame(frame, self.tagged);
        match self.link.send(payload.as_bytes()).await {
            Ok(_) => {
                debug!("Sent frame: {}", payload);
                self.stats.frames_sent += 1;
            }
            Err(e) => {
                warn!("Failed to send frame: {}", e);
                self.stats.send_failures += 1;
            }
        }
    }
}
