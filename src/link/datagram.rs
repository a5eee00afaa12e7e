//! Trait abstraction for datagram I/O to enable testing

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;

/// Trait for datagram link operations
#[async_trait]
pub trait DatagramChannel: Send {
    /// Send one datagram to the peer
    async fn send(&mut self, payload: &[u8]) -> io::Result<usize>;

    /// Wait for one datagram, returning its length and sender
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock datagram link for testing
    ///
    /// `recv` hands out queued datagrams in order and waits forever once the
    /// queue is empty, like a quiet socket.
    #[derive(Clone)]
    pub struct MockDatagram {
        pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
        pub inbound: Arc<Mutex<VecDeque<Vec<u8>>>>,
        pub send_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub peer: SocketAddr,
    }

    impl MockDatagram {
        pub fn new() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                inbound: Arc::new(Mutex::new(VecDeque::new())),
                send_error: Arc::new(Mutex::new(None)),
                peer: SocketAddr::from(([192, 168, 1, 2], 40000)),
            }
        }

        pub fn get_sent(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|d| String::from_utf8_lossy(d).into_owned())
                .collect()
        }

        pub fn push_inbound(&self, datagram: &[u8]) {
            self.inbound.lock().unwrap().push_back(datagram.to_vec());
        }

        pub fn pending(&self) -> usize {
            self.inbound.lock().unwrap().len()
        }

        pub fn set_send_error(&self, error: Option<io::ErrorKind>) {
            *self.send_error.lock().unwrap() = error;
        }
    }

    #[async_trait]
    impl DatagramChannel for MockDatagram {
        async fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
            if let Some(error) = *self.send_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock send error"));
            }
            self.sent.lock().unwrap().push(payload.to_vec());
            Ok(payload.len())
        }

        async fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            let next = self.inbound.lock().unwrap().pop_front();
            match next {
                Some(datagram) => {
                    // Oversized datagrams are truncated, as a UDP socket would
                    let len = datagram.len().min(buf.len());
                    buf[..len].copy_from_slice(&datagram[..len]);
                    Ok((len, self.peer))
                }
                None => std::future::pending().await,
            }
        }
    }
}
