//! UDP transport for sending and receiving RTP packets

use crate::error::{NetworkError, Result};
use logging::Logger;
use std::net::{SocketAddr, UdpSocket};

/// Transport UDP for RTP
pub struct UdpTransport {
    socket: UdpSocket,
    remote_addr: Option<SocketAddr>,
    logger: Logger,
    bytes_sent: u64,
    bytes_received: u64,
}

impl UdpTransport {
    /// Create new UDP transport
    ///
    /// # Arguments
    /// * `bind_addr` - Local Address for bind
    /// * `logger` - Logger
    pub fn new(bind_addr: SocketAddr, logger: Logger) -> Result<Self> {
        logger.info(&format!("Creating UDP socket at {}", bind_addr));

        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| NetworkError::Network(format!("Error creating socket: {}", e)))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| NetworkError::Network(format!("Error setting non-blocking: {}", e)))?;

        logger.info("UDP socket correctly configured");

        Ok(UdpTransport {
            socket,
            remote_addr: None,
            logger,
            bytes_sent: 0,
            bytes_received: 0,
        })
    }

    /// Establishes the remote address
    pub fn set_remote(&mut self, addr: SocketAddr) {
        self.logger
            .info(&format!("Establishes remote address: {}", addr));
        self.remote_addr = Some(addr);
    }

    /// Get the configured remote address
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Get the address this transport is actually bound to, e.g. to learn
    /// the ephemeral port picked for `0` during setup.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| NetworkError::Network(format!("Error reading local address: {}", e)))
    }

    /// Send data to remote peer
    ///
    /// # Arguments
    /// * `data` - Data to send
    pub fn send(&mut self, data: &[u8]) -> Result<usize> {
        let remote_addr = self.get_remote_addr()?;
        let sent = self.send_to_socket(data, remote_addr)?;
        self.update_send_stats(sent);
        Ok(sent)
    }

    /// Get remote address or return error if not set
    fn get_remote_addr(&self) -> Result<SocketAddr> {
        self.remote_addr
            .ok_or_else(|| NetworkError::Network("Remote address not set".to_string()))
    }

    /// Send data to socket
    fn send_to_socket(&self, data: &[u8], addr: SocketAddr) -> Result<usize> {
        self.socket
            .send_to(data, addr)
            .map_err(|e| NetworkError::Network(format!("Error sending: {}", e)))
    }

    /// Update send statistics and log if necessary
    fn update_send_stats(&mut self, sent: usize) {
        self.bytes_sent += sent as u64;
        if self.bytes_sent % 100_000 < sent as u64 {
            self.logger
                .debug(&format!("Total bytes sent: {}", self.bytes_sent));
        }
    }

    /// Receive data from socket (non-blocking)
    ///
    /// # Returns
    /// * `Ok(Some((data, addr)))` - Data and sender address received
    /// * `Ok(None)` - No data available
    /// * `Err` - Network error
    pub fn receive(&mut self) -> Result<Option<(Vec<u8>, SocketAddr)>> {
        let mut buf = vec![0u8; 65536];

        match self.socket.recv_from(&mut buf) {
            Ok((size, addr)) => {
                buf.truncate(size);
                self.update_receive_stats(size);
                Ok(Some((buf, addr)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(NetworkError::Network(format!("Error receiving: {}", e))),
        }
    }

    /// Update receive statistics and log if necessary
    fn update_receive_stats(&mut self, size: usize) {
        self.bytes_received += size as u64;
        if self.bytes_received % 100_000 < size as u64 {
            self.logger
                .debug(&format!("Total bytes received: {}", self.bytes_received));
        }
    }

    /// Returns transport statistics (bytes_sent, bytes_received)
    pub fn stats(&self) -> (u64, u64) {
        (self.bytes_sent, self.bytes_received)
    }
}
