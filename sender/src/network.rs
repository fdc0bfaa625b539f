//! UDP transmission of transport records.
//!
//! Sends already-framed records to the transport collaborator. One
//! sender instance serves one track.

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tracing::{debug, error, warn};

/// UDP sender for transport records.
///
/// Wraps a tokio UDP socket for async transmission. Transient network
/// errors are logged and survived; the stream keeps going.
pub struct RecordSender {
    // ---
    socket: UdpSocket,
    remote_addr: String,
    records_sent: u64,
    bytes_sent: u64,
}

impl RecordSender {
    // ---
    /// Creates a new sender bound to any available port.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - Destination address in "IP:port" format
    ///
    /// # Errors
    ///
    /// Returns error if socket binding fails.
    pub async fn new(remote_addr: impl Into<String>) -> Result<Self> {
        // ---
        let remote_addr = remote_addr.into();

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("failed to bind UDP socket")?;

        debug!("UDP socket bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            remote_addr,
            records_sent: 0,
            bytes_sent: 0,
        })
    }

    /// Sends one framed record to the remote endpoint.
    ///
    /// # Arguments
    ///
    /// * `record` - Complete record bytes, prefix included
    ///
    /// # Errors
    ///
    /// Returns error only on persistent transmission failure; single
    /// send errors are logged and absorbed.
    pub async fn send(&mut self, record: &[u8]) -> Result<()> {
        // ---
        match self.socket.send_to(record, &self.remote_addr).await {
            Ok(bytes) => {
                self.records_sent += 1;
                self.bytes_sent += bytes as u64;

                if self.records_sent % 100 == 0 {
                    debug!(
                        "Sent {} records ({} bytes)",
                        self.records_sent, self.bytes_sent
                    );
                }
            }
            Err(e) => {
                error!("Failed to send record: {}", e);
                // Don't bail - keep the stream alive across transient faults
                warn!("Continuing despite network error");
            }
        }

        Ok(())
    }

    /// Returns statistics about records sent.
    pub fn stats(&self) -> (u64, u64) {
        // ---
        (self.records_sent, self.bytes_sent)
    }
}
