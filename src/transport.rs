//! Datagram transport seam for the command channel

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::{LinkError, Result};

/// Destination for encoded command frames.
///
/// The session driver uses [`ControlSocket`]; tests substitute sinks that record
/// or fail sends.
#[async_trait::async_trait]
pub trait DatagramSink: Send + Sync + 'static {
    /// Transmit one datagram to the peer.
    ///
    /// An error means the control path is broken and the session must be reset.
    async fn send_datagram(&self, datagram: &[u8]) -> Result<()>;
}

/// Ephemeral UDP socket used for both commands and telemetry.
///
/// Commands are sent to the peer's control port; telemetry arrives on the same
/// local port, so the receiver task shares the socket through [`ControlSocket::socket`].
#[derive(Clone)]
pub struct ControlSocket {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl ControlSocket {
    /// Bind an ephemeral IPv4 port for talking to `peer`.
    pub async fn bind(peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| LinkError::socket_error("binding control socket", e))?;

        if let Ok(local) = socket.local_addr() {
            debug!(local = %local, peer = %peer, "Control socket bound");
        }

        Ok(Self { socket: Arc::new(socket), peer })
    }

    /// Shared handle for receiving telemetry.
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    /// Control address of the peer.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait::async_trait]
impl DatagramSink for ControlSocket {
    async fn send_datagram(&self, datagram: &[u8]) -> Result<()> {
        self.socket
            .send_to(datagram, self.peer)
            .await
            .map(|_| ())
            .map_err(|source| LinkError::ControlSend { peer: self.peer, source })
    }
}
