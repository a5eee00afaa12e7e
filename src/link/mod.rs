//! # Datagram Link Module
//!
//! Handles the UDP link between the operator station and the rover.
//!
//! This module handles:
//! - Binding the rover's receive socket
//! - Opening the operator's send socket towards the rover
//! - Socket buffer tuning
//!
//! Frames are small, so one frame always fits in one datagram and there is no
//! retransmission: a lost frame is replaced by the next one a few
//! milliseconds later.

pub mod datagram;

pub use datagram::DatagramChannel;

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::error::{Result, TeleopError};

/// UDP link handle
///
/// A receiving link is bound to a local address. A sending link is bound to
/// an ephemeral port and remembers the peer every datagram goes to.
pub struct UdpLink {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
}

impl std::fmt::Debug for UdpLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpLink")
            .field("local", &self.socket.local_addr().ok())
            .field("peer", &self.peer)
            .finish()
    }
}

impl UdpLink {
    /// Bind a receiving link
    ///
    /// # Arguments
    ///
    /// * `addr` - Local address to listen on (e.g., `0.0.0.0:12344`)
    /// * `buffer_size` - Requested SO_RCVBUF size in bytes
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the socket cannot be created or bound
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_teleop::link::UdpLink;
    ///
    /// # async fn run() -> rover_teleop::error::Result<()> {
    /// let link = UdpLink::bind("0.0.0.0:12344".parse().unwrap(), 65536)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn bind(addr: SocketAddr, buffer_size: usize) -> Result<Self> {
        let socket = new_socket(addr)?;

        if let Err(e) = socket.set_recv_buffer_size(buffer_size) {
            warn!("Could not set receive buffer to {} bytes: {}", buffer_size, e);
        }

        socket
            .bind(&addr.into())
            .map_err(|e| TeleopError::Transport(format!("Failed to bind {}: {}", addr, e)))?;

        let socket = into_tokio(socket)?;
        info!("Listening on {}", addr);

        Ok(Self { socket, peer: None })
    }

    /// Open a sending link towards `peer`
    ///
    /// # Arguments
    ///
    /// * `peer` - Rover address every datagram is sent to
    /// * `buffer_size` - Requested SO_SNDBUF size in bytes
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the socket cannot be created or bound
    pub fn connect(peer: SocketAddr, buffer_size: usize) -> Result<Self> {
        let socket = new_socket(peer)?;

        if let Err(e) = socket.set_send_buffer_size(buffer_size) {
            warn!("Could not set send buffer to {} bytes: {}", buffer_size, e);
        }

        let local = SocketAddr::new(unspecified(peer.ip()), 0);
        socket
            .bind(&local.into())
            .map_err(|e| TeleopError::Transport(format!("Failed to bind {}: {}", local, e)))?;

        let socket = into_tokio(socket)?;
        info!("Sending to {}", peer);

        Ok(Self {
            socket,
            peer: Some(peer),
        })
    }

    /// Local address the socket is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Peer of a sending link
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

#[async_trait]
impl DatagramChannel for UdpLink {
    async fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
        let peer = self
            .peer
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "link has no peer"))?;
        self.socket.send_to(payload, peer).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}

fn new_socket(addr: SocketAddr) -> Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| TeleopError::Transport(format!("Failed to create socket: {}", e)))?;

    socket
        .set_nonblocking(true)
        .map_err(|e| TeleopError::Transport(format!("Failed to set non-blocking: {}", e)))?;

    Ok(socket)
}

fn into_tokio(socket: Socket) -> Result<UdpSocket> {
    if let (Ok(recv), Ok(send)) = (socket.recv_buffer_size(), socket.send_buffer_size()) {
        debug!("Socket buffers: recv {} bytes, send {} bytes", recv, send);
    }

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
        .map_err(|e| TeleopError::Transport(format!("Failed to register socket: {}", e)))
}

fn unspecified(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let link = UdpLink::bind(loopback(), 65536).unwrap();
        assert_ne!(link.local_addr().unwrap().port(), 0);
        assert_eq!(link.peer(), None);
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let mut rover = UdpLink::bind(loopback(), 65536).unwrap();
        let mut operator = UdpLink::connect(rover.local_addr().unwrap(), 65536).unwrap();

        let sent = operator.send(b"D -1 1").await.unwrap();
        assert_eq!(sent, 6);

        let mut buf = [0u8; 1024];
        let (len, _from) = tokio::time::timeout(Duration::from_secs(2), rover.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"D -1 1");
    }

    #[tokio::test]
    async fn test_send_without_peer_fails() {
        let mut link = UdpLink::bind(loopback(), 65536).unwrap();
        let err = link.send(b"0 0").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_transport_error() {
        let first = UdpLink::bind(loopback(), 65536).unwrap();
        let taken = first.local_addr().unwrap();

        let result = UdpLink::bind(taken, 65536);
        assert!(matches!(result, Err(TeleopError::Transport(_))));
    }

    #[test]
    fn test_unspecified_matches_family() {
        assert_eq!(
            unspecified("192.168.1.3".parse().unwrap()),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
        assert_eq!(
            unspecified("::1".parse().unwrap()),
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        );
    }
}
