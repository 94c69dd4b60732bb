//! Ack-driven video stream puller.
//!
//! The rover sends one video datagram per acknowledgement it receives, so the
//! puller sends an Ack, waits a bounded time for the frame, and repeats. A
//! missing frame costs at most one timeout; after that the socket is thrown away
//! and a fresh one is opened, which also recovers from stale NAT state or a
//! rebooted rover.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::FpsMeter;
use crate::config::RoverConfig;
use crate::protocol::encode_ack;
use crate::{LinkError, Result, VideoFrame};

/// Counters shared with the connection handle.
#[derive(Debug, Default)]
pub struct StreamStats {
    frames_received: AtomicU64,
    socket_resets: AtomicU64,
}

impl StreamStats {
    /// Frames delivered since the connection was created.
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Stream sockets discarded after a timeout or socket error.
    pub fn socket_resets(&self) -> u64 {
        self.socket_resets.load(Ordering::Relaxed)
    }
}

/// Output channels of the puller.
#[derive(Clone)]
pub struct StreamOutputs {
    pub frames: watch::Sender<Option<Arc<VideoFrame>>>,
    pub fps: watch::Sender<Option<f64>>,
    pub stats: Arc<StreamStats>,
}

/// Why one socket's pull loop ended
enum PullEnd {
    Cancelled,
    Failed(LinkError),
}

/// Pulls frames from one rover until cancelled.
pub struct StreamPuller {
    peer: SocketAddr,
    outputs: StreamOutputs,
    frame_timeout: Duration,
    fps_window: Duration,
    reopen_delay: Duration,
    max_datagram_size: usize,
}

impl StreamPuller {
    pub fn new(peer: SocketAddr, outputs: StreamOutputs, config: &RoverConfig) -> Self {
        Self {
            peer,
            outputs,
            frame_timeout: config.frame_timeout,
            fps_window: config.fps_window,
            reopen_delay: config.stream_reopen_delay,
            max_datagram_size: config.max_datagram_size,
        }
    }

    /// Run until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(peer = %self.peer, "Stream puller started");
        let mut buf = vec![0u8; self.max_datagram_size];

        while !cancel.is_cancelled() {
            match self.open_socket().await {
                Ok(socket) => match self.pull(&socket, &mut buf, &cancel).await {
                    PullEnd::Cancelled => break,
                    PullEnd::Failed(e) => {
                        self.outputs.stats.socket_resets.fetch_add(1, Ordering::Relaxed);
                        debug!("Replacing stream socket: {}", e);
                    }
                },
                Err(e) => debug!("Stream socket unavailable: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reopen_delay) => {}
            }
        }

        info!(
            frames = self.outputs.stats.frames_received(),
            resets = self.outputs.stats.socket_resets(),
            "Stream puller stopped"
        );
    }

    async fn open_socket(&self) -> Result<UdpSocket> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| LinkError::socket_error("binding stream socket", e))?;
        socket
            .connect(self.peer)
            .await
            .map_err(|e| LinkError::socket_error("connecting stream socket", e))?;
        Ok(socket)
    }

    async fn pull(
        &self,
        socket: &UdpSocket,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> PullEnd {
        let ack = encode_ack();
        let mut meter = FpsMeter::new(self.fps_window);

        loop {
            let exchange = tokio::time::timeout(self.frame_timeout, async {
                socket.send(&ack).await?;
                socket.recv(buf).await
            });

            let len = tokio::select! {
                _ = cancel.cancelled() => return PullEnd::Cancelled,
                result = exchange => match result {
                    Ok(Ok(len)) => len,
                    Ok(Err(e)) => {
                        return PullEnd::Failed(LinkError::socket_error("pulling frame", e));
                    }
                    Err(_) => {
                        return PullEnd::Failed(LinkError::Timeout { duration: self.frame_timeout });
                    }
                },
            };

            let sequence = self.outputs.stats.frames_received.fetch_add(1, Ordering::Relaxed);
            trace!(sequence, len, "Frame received");
            let frame = VideoFrame::new(buf[..len].to_vec(), sequence);
            self.outputs.frames.send_replace(Some(Arc::new(frame)));

            if let Some(fps) = meter.record(Instant::now()) {
                debug!(fps, "Frame rate updated");
                self.outputs.fps.send_replace(Some(fps));
            }
        }
    }
}
