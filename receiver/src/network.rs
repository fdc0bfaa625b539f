//! UDP intake for inbound transport datagrams.
//!
//! The transport collaborator delivers already-received datagrams; this
//! wrapper is the async boundary to it. It hands raw bytes to the
//! depacketizer without interpreting them.

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tracing::{debug, info};

/// Maximum datagram the bridge accepts from the collaborator
const MAX_DATAGRAM_LEN: usize = 10_240;

/// UDP receiver for transport datagrams.
///
/// Wraps a tokio UDP socket; keeps simple intake counters for
/// observability.
pub struct DatagramReceiver {
    // ---
    socket: UdpSocket,
    datagrams_received: u64,
    bytes_received: u64,
}

impl DatagramReceiver {
    // ---
    /// Creates a receiver bound to the specified port.
    ///
    /// Listens on all interfaces (0.0.0.0) for incoming datagrams.
    ///
    /// # Errors
    ///
    /// Returns error if socket binding fails.
    pub async fn new(port: u16) -> Result<Self> {
        // ---
        let addr = format!("0.0.0.0:{}", port);

        let socket = UdpSocket::bind(&addr)
            .await
            .with_context(|| format!("failed to bind UDP socket to {}", addr))?;

        info!("UDP socket bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            datagrams_received: 0,
            bytes_received: 0,
        })
    }

    /// Receives the next datagram.
    ///
    /// Blocks until a datagram arrives and returns its bytes verbatim.
    ///
    /// # Errors
    ///
    /// Returns error if network reception fails.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        // ---
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

        let (len, src) = self
            .socket
            .recv_from(&mut buf)
            .await
            .context("failed to receive UDP datagram")?;

        buf.truncate(len);
        self.datagrams_received += 1;
        self.bytes_received += len as u64;

        if self.datagrams_received % 100 == 0 {
            debug!(
                "Received {} datagrams ({} bytes) - last {}B from {}",
                self.datagrams_received, self.bytes_received, len, src
            );
        }

        Ok(buf)
    }

    /// Returns statistics about datagrams received.
    ///
    /// # Returns
    ///
    /// Tuple of (datagrams_received, bytes_received)
    pub fn stats(&self) -> (u64, u64) {
        // ---
        (self.datagrams_received, self.bytes_received)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn test_receiver_creation() {
        // ---
        // Try binding to an ephemeral port
        let receiver = DatagramReceiver::new(0).await;
        assert!(receiver.is_ok());
    }

    #[tokio::test]
    async fn test_receiver_stats() {
        // ---
        let receiver = DatagramReceiver::new(0).await.expect("receiver creation failed");

        let (datagrams, bytes) = receiver.stats();
        assert_eq!(datagrams, 0);
        assert_eq!(bytes, 0);
    }
}
