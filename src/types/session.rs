//! Session lifecycle as seen by collaborators

use super::PeerEndpoint;

/// Current phase of the session driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Probing the network for a rover
    Discovering,

    /// Rover found, waiting for the caller to start streaming
    AwaitingStart(PeerEndpoint),

    /// Streaming, receiving telemetry and dispatching commands
    Active(PeerEndpoint),

    /// Tearing the session down before rediscovery
    Faulted,
}

impl SessionState {
    /// Peer of the current session, if one has been discovered.
    pub fn peer(&self) -> Option<PeerEndpoint> {
        match self {
            SessionState::AwaitingStart(peer) | SessionState::Active(peer) => Some(*peer),
            SessionState::Discovering | SessionState::Faulted => None,
        }
    }

    /// Whether a start trigger would be acted on now.
    pub fn can_start(&self) -> bool {
        matches!(self, SessionState::AwaitingStart(_))
    }
}

/// Lifecycle notifications, delivered in order to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    DiscoveryStarted,
    Discovered(PeerEndpoint),
    StreamingStarted(PeerEndpoint),
    Faulted { reason: String },
}
