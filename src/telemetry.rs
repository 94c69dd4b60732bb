//! Telemetry receiver for wheel-speed reports on the control socket

use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::protocol::{SpeedReading, decode_telemetry};
use crate::{LinkError, Result};

/// Best-effort receive loop.
///
/// Failures are logged and followed by a backoff; they never end the loop or
/// the session. Only cancellation stops it.
pub struct TelemetryReceiver {
    socket: Arc<UdpSocket>,
    speeds: watch::Sender<Option<SpeedReading>>,
    backoff: Duration,
    max_datagram_size: usize,
}

impl TelemetryReceiver {
    pub fn new(
        socket: Arc<UdpSocket>,
        speeds: watch::Sender<Option<SpeedReading>>,
        backoff: Duration,
        max_datagram_size: usize,
    ) -> Self {
        Self { socket, speeds, backoff, max_datagram_size }
    }

    /// Receive until cancelled. Returns the number of readings published.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        info!("Telemetry receiver started");
        let mut buf = vec![0u8; self.max_datagram_size];
        let mut readings = 0u64;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.receive(&mut buf) => result,
            };

            match result {
                Ok(reading) => {
                    readings += 1;
                    trace!(left = reading.left, right = reading.right, "Speed update");
                    self.speeds.send_replace(Some(reading));
                }
                Err(e) => {
                    debug!("Telemetry dropped, backing off {:?}: {}", self.backoff, e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }

        info!("Telemetry receiver stopped ({} readings)", readings);
        readings
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<SpeedReading> {
        let (len, from) = self
            .socket
            .recv_from(buf)
            .await
            .map_err(|e| LinkError::socket_error("receiving telemetry", e))?;

        trace!(from = %from, len, "Telemetry datagram");
        Ok(decode_telemetry(&buf[..len])?)
    }
}
