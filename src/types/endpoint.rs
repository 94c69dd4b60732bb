//! Discovered peer addresses

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Address and ports of a discovered rover.
///
/// Produced once per successful discovery and kept unchanged until the session
/// that uses it is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerEndpoint {
    pub address: IpAddr,
    pub control_port: u16,
    pub stream_port: u16,
}

impl PeerEndpoint {
    pub fn new(address: IpAddr, control_port: u16, stream_port: u16) -> Self {
        Self { address, control_port, stream_port }
    }

    /// Destination for command frames.
    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.control_port)
    }

    /// Destination for frame requests.
    pub fn stream_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.stream_port)
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (control {}, stream {})", self.address, self.control_port, self.stream_port)
    }
}
