//! # Rover Teleop
//!
//! Drive a CAN-bus rover from a joystick over a UDP link.
//!
//! The same binary runs on both ends:
//!
//! - `rover-teleop operator` reads the joystick and streams command frames
//! - `rover-teleop rover` receives frames and drives the motors
//!
//! Both ends must be started with the same `mode` in their configuration.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rover_teleop::config::Config;
use rover_teleop::controller::mapping::RangeMap;
use rover_teleop::controller::sample::AxisRange;
use rover_teleop::controller::{CommandMapper, Joystick};
use rover_teleop::drive::DriveMixer;
use rover_teleop::link::UdpLink;
use rover_teleop::motor::{CanConnector, DryRunConnector, MotorConnector, MotorDispatcher};
use rover_teleop::operator::Operator;
use rover_teleop::rover::{Rover, WireFormat};
use rover_teleop::shutdown::Shutdown;

/// Configuration file used when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Parser, Debug)]
#[command(name = "rover-teleop")]
#[command(about = "Drive a CAN-bus rover from a joystick over a UDP link")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Read the joystick and send command frames to the rover
    Operator,
    /// Receive command frames and drive the motors
    Rover,
}

/// Main entry point
///
/// # Control Flow
///
/// 1. Parse the command line and load the configuration
/// 2. Set up logging (console, plus a file when configured)
/// 3. Open every device the chosen role needs; any failure exits nonzero
/// 4. Run the role's loop until Ctrl+C
///
/// # Examples
///
/// ```bash
/// rover-teleop rover --config config/default.toml
/// rover-teleop operator --config config/default.toml
/// ```
fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let log_file = loaded.as_ref().ok().and_then(|c| c.logging.file.as_deref());
    let _guard = init_logging(log_file)?;

    let config = loaded.map_err(|e| {
        error!("Failed to load {}: {}", cli.config.display(), e);
        anyhow!(e)
    })?;

    info!(
        "Rover Teleop v{} starting as {:?} in {} mode",
        env!("CARGO_PKG_VERSION"),
        cli.role,
        config.mode
    );

    // One thread per process: the loops never share state
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    runtime.block_on(run(cli.role, config)).map_err(|e| {
        error!("{:#}", e);
        e
    })
}

async fn run(role: Role, config: Config) -> Result<()> {
    let shutdown = Shutdown::new();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                trigger.trigger();
            }
            Err(e) => warn!("Could not listen for Ctrl+C: {}", e),
        }
    });

    match role {
        Role::Operator => run_operator(config, &shutdown).await,
        Role::Rover => run_rover(config, &shutdown).await,
    }
}

async fn run_operator(config: Config, shutdown: &Shutdown) -> Result<()> {
    let mapper = CommandMapper::from_config(&config)?;

    let axis_range = AxisRange::new(config.input.axis_min, config.input.axis_max);
    let rest = RangeMap::new(
        config.input.axis_min,
        config.input.axis_max,
        config.input.output_min,
        config.input.output_max,
    )?
    .rest();
    let device_path = Some(config.input.device_path.as_str())
        .filter(|p| !p.is_empty())
        .map(Path::new);
    let joystick = Joystick::open(device_path, axis_range, rest).context("Failed to open joystick")?;

    let link = UdpLink::connect(config.peer_addr(), config.link.socket_buffer_size)
        .context("Failed to open link")?;

    let mut operator = Operator::new(
        joystick,
        link,
        mapper,
        config.link.tagged,
        config.send_interval(),
    );
    info!("Press Ctrl+C to exit");
    let stats = operator.run(shutdown).await;

    info!(
        "Total frames sent: {} ({} send failures)",
        stats.frames_sent, stats.send_failures
    );
    Ok(())
}

async fn run_rover(config: Config, shutdown: &Shutdown) -> Result<()> {
    let mut connector: Box<dyn MotorConnector> = if config.motors.enabled {
        Box::new(CanConnector::new())
    } else {
        warn!("Motors disabled: commands will only be logged");
        Box::new(DryRunConnector)
    };

    let dispatcher = MotorDispatcher::connect(
        connector.as_mut(),
        &config.motor_channels(),
        &config.motors.bus,
        config.motors.max_velocity,
        config.command_timeout(),
    )
    .await?;

    let link = UdpLink::bind(config.bind_addr(), config.link.socket_buffer_size)
        .context("Failed to open link")?;

    let format = WireFormat {
        tagged: config.link.tagged,
        neutral_on_malformed: config.link.neutral_on_malformed,
    };
    let mut rover = Rover::new(
        link,
        dispatcher,
        config.mode,
        DriveMixer::new(config.drive.gain),
        format,
        config.link.max_datagram_size,
    )
    .with_stop_on_exit(config.motors.stop_on_exit);

    info!("Press Ctrl+C to exit");
    let stats = rover.run(shutdown).await;

    info!(
        "Total frames received: {} ({} dispatched)",
        stats.frames_received, stats.frames_dispatched
    );
    Ok(())
}

/// Initialize tracing
///
/// Console output always; a non-blocking file writer when `file` is set.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_logging(file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(path) = file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
        return Ok(None);
    };

    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("Log file path {} has no file name", path.display()))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    Ok(Some(guard))
}
