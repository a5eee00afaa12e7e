//! # CAN Motor Driver
//!
//! Drives T-motor AK series controllers in servo mode over Linux SocketCAN.
//!
//! ## Velocity Frame
//!
//! | Field | Value |
//! |-------|-------|
//! | CAN id | extended, `(SET_RPM << 8) \| controller_id` |
//! | DLC | 4 |
//! | Data | electrical RPM, big-endian `i32` |
//!
//! The servo-mode protocol has no handshake: a controller is "connected"
//! once a raw socket is bound to its bus.

use async_trait::async_trait;
use std::ffi::CString;
use std::io;
use std::mem::size_of;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::Arc;
use tokio::io::unix::AsyncFd;
use tracing::{debug, info};

use super::actuator::{MotorActuator, MotorChannel, MotorConnector};

/// Servo-mode packet id for "set RPM"
pub const CAN_PACKET_SET_RPM: u32 = 3;

/// Extended frame format flag in `can_id`
const CAN_EFF_FLAG: u32 = 0x8000_0000;

/// Raw CAN protocol number
const CAN_RAW: libc::c_int = 1;

/// `struct sockaddr_can`, truncated to the fields raw sockets use
#[repr(C)]
struct SockaddrCan {
    can_family: libc::sa_family_t,
    can_ifindex: libc::c_int,
    rx_id: u32,
    tx_id: u32,
}

/// Classic `struct can_frame`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    can_id: u32,
    can_dlc: u8,
    pad: u8,
    res0: u8,
    res1: u8,
    data: [u8; 8],
}

impl CanFrame {
    /// Build an extended-id frame; `data` beyond 8 bytes is dropped
    pub fn extended(id: u32, data: &[u8]) -> Self {
        let len = data.len().min(8);
        let mut buf = [0u8; 8];
        buf[..len].copy_from_slice(&data[..len]);
        Self {
            can_id: (id & 0x1FFF_FFFF) | CAN_EFF_FLAG,
            can_dlc: len as u8,
            pad: 0,
            res0: 0,
            res1: 0,
            data: buf,
        }
    }

    /// 29-bit identifier without flags
    pub fn id(&self) -> u32 {
        self.can_id & 0x1FFF_FFFF
    }

    pub fn is_extended(&self) -> bool {
        self.can_id & CAN_EFF_FLAG != 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..usize::from(self.can_dlc)]
    }
}

/// Build the servo-mode "set RPM" frame for one controller
///
/// The velocity is rounded to the nearest whole ERPM; values beyond the
/// `i32` range saturate.
///
/// # Examples
///
/// ```
/// use rover_teleop::motor::can::set_rpm_frame;
///
/// let frame = set_rpm_frame(0x0F, -600.0);
/// assert_eq!(frame.id(), 0x30F);
/// assert_eq!(frame.data(), &(-600i32).to_be_bytes());
/// ```
pub fn set_rpm_frame(controller_id: u32, velocity: f32) -> CanFrame {
    let erpm = velocity.round() as i32;
    CanFrame::extended(
        (CAN_PACKET_SET_RPM << 8) | (controller_id & 0xFF),
        &erpm.to_be_bytes(),
    )
}

/// Non-blocking raw CAN socket bound to one interface
pub struct CanSocket {
    fd: AsyncFd<OwnedFd>,
    interface: String,
}

impl std::fmt::Debug for CanSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanSocket")
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

impl CanSocket {
    /// Open a raw socket on `interface` (e.g., "can0")
    ///
    /// # Errors
    ///
    /// Returns an error if the interface does not exist or the socket
    /// cannot be created, bound or registered with the runtime.
    pub fn open(interface: &str) -> io::Result<Self> {
        let name = CString::new(interface)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name contains NUL"))?;

        // SAFETY: `name` is a valid NUL-terminated string
        let ifindex = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if ifindex == 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: plain socket(2) call, result checked below
        let raw = unsafe {
            libc::socket(
                libc::PF_CAN,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                CAN_RAW,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `raw` is a freshly created descriptor owned by nobody else
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let addr = SockaddrCan {
            can_family: libc::AF_CAN as libc::sa_family_t,
            can_ifindex: ifindex as libc::c_int,
            rx_id: 0,
            tx_id: 0,
        };
        // SAFETY: `addr` is a properly initialized sockaddr_can prefix
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const SockaddrCan as *const libc::sockaddr,
                size_of::<SockaddrCan>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        info!("Opened CAN socket on {}", interface);

        Ok(Self {
            fd: AsyncFd::new(fd)?,
            interface: interface.to_string(),
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Write one frame, waiting while the transmit queue is full
    pub async fn write_frame(&self, frame: &CanFrame) -> io::Result<()> {
        loop {
            let mut guard = self.fd.writable().await?;
            let result = guard.try_io(|inner| {
                // SAFETY: `frame` is a repr(C) can_frame of the written size
                let n = unsafe {
                    libc::write(
                        inner.as_raw_fd(),
                        frame as *const CanFrame as *const libc::c_void,
                        size_of::<CanFrame>(),
                    )
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            });

            match result {
                Ok(Ok(n)) if n == size_of::<CanFrame>() => return Ok(()),
                Ok(Ok(n)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("short CAN write: {} bytes", n),
                    ))
                }
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
    }
}

/// AK servo on a shared CAN socket
#[derive(Debug)]
pub struct AkMotor {
    socket: Arc<CanSocket>,
    controller_id: u32,
}

impl AkMotor {
    pub fn new(socket: Arc<CanSocket>, controller_id: u32) -> Self {
        Self {
            socket,
            controller_id,
        }
    }
}

#[async_trait]
impl MotorActuator for AkMotor {
    async fn send_velocity(&mut self, velocity: f32) -> io::Result<()> {
        let frame = set_rpm_frame(self.controller_id, velocity);
        debug!(
            "CAN {} id 0x{:X} data {:02X?}",
            self.socket.interface(),
            frame.id(),
            frame.data()
        );
        self.socket.write_frame(&frame).await
    }
}

/// Connector opening one socket per bus and sharing it between motors
#[derive(Debug, Default)]
pub struct CanConnector {
    socket: Option<Arc<CanSocket>>,
}

impl CanConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn socket_for(&mut self, bus: &str) -> io::Result<Arc<CanSocket>> {
        if let Some(socket) = &self.socket {
            if socket.interface() == bus {
                return Ok(Arc::clone(socket));
            }
        }
        let socket = Arc::new(CanSocket::open(bus)?);
        self.socket = Some(Arc::clone(&socket));
        Ok(socket)
    }
}

#[async_trait]
impl MotorConnector for CanConnector {
    async fn open(
        &mut self,
        channel: &MotorChannel,
        bus: &str,
    ) -> io::Result<Box<dyn MotorActuator>> {
        let socket = self.socket_for(bus)?;
        debug!("Motor {} attached to {}", channel, bus);
        Ok(Box::new(AkMotor::new(socket, channel.id)))
    }
}
