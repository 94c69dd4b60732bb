//! Error types for the rover link.
//!
//! Every failure the link can observe falls into one of four classes, and the
//! owning loop decides what to do based on that class rather than on the
//! concrete variant:
//!
//! - **Transient**: timeouts, receive failures, unanswered probes. The loop that
//!   hit the error backs off and retries on its own.
//! - **Session fatal**: the control socket can no longer send. The session is torn
//!   down and the driver goes back to discovery.
//! - **Malformed**: a datagram from the peer that does not decode. Dropped.
//! - **Configuration**: invalid settings supplied by the caller.
//!
//! ```rust
//! use camrover_link::{ErrorClass, LinkError};
//!
//! let error = LinkError::discovery_failed("no probe match");
//! assert_eq!(error.class(), ErrorClass::Transient);
//! assert!(error.is_retryable());
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::protocol::DecodeError;

/// Result type alias for link operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// How the owning loop should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Recovered locally by backing off and retrying.
    Transient,
    /// The session must be reset and the peer rediscovered.
    SessionFatal,
    /// Peer input that is dropped without further action.
    Malformed,
    /// Caller supplied settings that cannot be used.
    Configuration,
}

/// Main error type for link operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Discovery failed: {reason}")]
    Discovery { reason: String },

    #[error("Socket error while {context}")]
    Socket {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Control channel send failed to {peer}")]
    ControlSend {
        peer: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Malformed datagram: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid configuration: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Rover connection has been shut down")]
    Closed,
}

impl LinkError {
    /// Classify this error for the owning loop.
    pub fn class(&self) -> ErrorClass {
        match self {
            LinkError::Discovery { .. } => ErrorClass::Transient,
            LinkError::Socket { .. } => ErrorClass::Transient,
            LinkError::Timeout { .. } => ErrorClass::Transient,
            LinkError::ControlSend { .. } => ErrorClass::SessionFatal,
            LinkError::Closed => ErrorClass::SessionFatal,
            LinkError::Decode(_) => ErrorClass::Malformed,
            LinkError::Config { .. } => ErrorClass::Configuration,
        }
    }

    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LinkError::Discovery { .. } => vec![
                "Check the rover is powered and joined to the same network",
                "Verify multicast traffic is not filtered by the access point",
                "Try a broadcast discovery address instead of multicast",
            ],
            LinkError::Socket { .. } => vec![
                "Check the local network interface is up",
                "Verify no firewall blocks UDP traffic to the rover",
            ],
            LinkError::ControlSend { .. } => vec![
                "Wait for the rover to be rediscovered",
                "Check the rover has not rebooted onto a different address",
            ],
            LinkError::Timeout { .. } => vec![
                "Move closer to the access point",
                "Increase the configured timeout",
            ],
            LinkError::Decode(_) => vec![
                "Check the rover firmware speaks the same protocol revision",
            ],
            LinkError::Config { .. } => vec![
                "Check timeouts and cadence are non-zero",
                "Check the discovery address is a valid IPv4 socket address",
            ],
            LinkError::Closed => vec!["Create a new connection"],
        }
    }

    /// Helper constructor for discovery failures.
    pub fn discovery_failed(reason: impl Into<String>) -> Self {
        LinkError::Discovery { reason: reason.into() }
    }

    /// Helper constructor for socket errors with context.
    pub fn socket_error(context: impl Into<String>, source: std::io::Error) -> Self {
        LinkError::Socket { context: context.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        LinkError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_error_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        LinkError::Config { reason: reason.into(), source: Some(source) }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Socket { context: "<unknown>".to_string(), source: err }
    }
}
