//! Link configuration.
//!
//! Defaults match the rover firmware. Any subset of fields can be overridden
//! from YAML, durations are given in milliseconds:
//!
//! ```rust
//! use camrover_link::RoverConfig;
//! use std::time::Duration;
//!
//! let config = RoverConfig::from_yaml_str(
//!     "discovery_addr: 192.168.4.255:3703\ncommand_cadence: 150\n",
//! ).unwrap();
//! assert_eq!(config.command_cadence, Duration::from_millis(150));
//! assert_eq!(config.frame_timeout, Duration::from_secs(5));
//! ```

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::protocol::PROBE;
use crate::{LinkError, Result};

/// Multicast group the rover listens on for probes.
pub const DEFAULT_DISCOVERY_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// UDP port the rover listens on for probes.
pub const DEFAULT_DISCOVERY_PORT: u16 = 3703;

/// Largest UDP payload the link will receive.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Timing and addressing for every link component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    /// Where probes are sent (multicast group or broadcast address)
    pub discovery_addr: SocketAddr,

    /// ASCII probe payload
    pub probe: String,

    /// TTL for multicast probes
    pub multicast_ttl: u32,

    /// How long one probe waits for a reply
    #[serde(with = "millis")]
    pub discovery_timeout: Duration,

    /// Pause between unanswered probes
    #[serde(with = "millis")]
    pub discovery_backoff: Duration,

    /// Resend interval for held commands
    #[serde(with = "millis")]
    pub command_cadence: Duration,

    /// Pause after a telemetry receive or decode failure
    #[serde(with = "millis")]
    pub telemetry_backoff: Duration,

    /// How long one frame request waits before the stream socket is replaced
    #[serde(with = "millis")]
    pub frame_timeout: Duration,

    /// Minimum window over which frame rate is measured
    #[serde(with = "millis")]
    pub fps_window: Duration,

    /// Pause before a replaced stream socket is reopened
    #[serde(with = "millis")]
    pub stream_reopen_delay: Duration,

    /// Pause between a session fault and rediscovery
    #[serde(with = "millis")]
    pub fault_backoff: Duration,

    /// Receive buffer size for stream and telemetry datagrams
    pub max_datagram_size: usize,

    /// Lifecycle events buffered per subscriber
    pub event_capacity: usize,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            discovery_addr: SocketAddr::V4(SocketAddrV4::new(
                DEFAULT_DISCOVERY_GROUP,
                DEFAULT_DISCOVERY_PORT,
            )),
            probe: PROBE.to_string(),
            multicast_ttl: 8,
            discovery_timeout: Duration::from_secs(5),
            discovery_backoff: Duration::from_secs(5),
            command_cadence: Duration::from_millis(200),
            telemetry_backoff: Duration::from_secs(5),
            frame_timeout: Duration::from_secs(5),
            fps_window: Duration::from_secs(5),
            stream_reopen_delay: Duration::from_millis(100),
            fault_backoff: Duration::from_secs(1),
            max_datagram_size: MAX_DATAGRAM_SIZE,
            event_capacity: 32,
        }
    }
}

impl RoverConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: RoverConfig = serde_yaml_ng::from_str(yaml).map_err(|e| {
            LinkError::config_error_with_source("YAML could not be parsed", Box::new(e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading rover config from {}", path.display());

        let yaml = std::fs::read_to_string(path).map_err(|e| {
            LinkError::config_error_with_source(
                format!("cannot read {}", path.display()),
                Box::new(e),
            )
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject settings the loops cannot run with.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("discovery_timeout", self.discovery_timeout),
            ("discovery_backoff", self.discovery_backoff),
            ("command_cadence", self.command_cadence),
            ("telemetry_backoff", self.telemetry_backoff),
            ("frame_timeout", self.frame_timeout),
            ("fps_window", self.fps_window),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(LinkError::config_error(format!("{name} must be non-zero")));
            }
        }

        if self.probe.is_empty() || !self.probe.is_ascii() {
            return Err(LinkError::config_error("probe must be non-empty ASCII"));
        }
        if !self.discovery_addr.is_ipv4() {
            return Err(LinkError::config_error("discovery_addr must be IPv4"));
        }
        if self.discovery_addr.port() == 0 {
            return Err(LinkError::config_error("discovery_addr needs a port"));
        }
        if self.max_datagram_size < crate::protocol::TELEMETRY_LEN {
            return Err(LinkError::config_error("max_datagram_size too small for telemetry"));
        }
        if self.event_capacity == 0 {
            return Err(LinkError::config_error("event_capacity must be non-zero"));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RoverConfig::default();
        config.validate().unwrap();
        assert_eq!(config.discovery_addr.to_string(), "239.255.255.250:3703");
        assert_eq!(config.probe, "CAM-ROVER:PROBE");
        assert_eq!(config.command_cadence, Duration::from_millis(200));
        assert_eq!(config.fault_backoff, Duration::from_secs(1));
    }

    #[test]
    fn yaml_overrides_subset() {
        let config = RoverConfig::from_yaml_str(
            "discovery_addr: 10.0.0.255:4000\nframe_timeout: 2500\nprobe: CAM-ROVER:PROBE\n",
        )
        .unwrap();

        assert_eq!(config.discovery_addr.to_string(), "10.0.0.255:4000");
        assert_eq!(config.frame_timeout, Duration::from_millis(2500));
        assert_eq!(config.discovery_timeout, Duration::from_secs(5));
    }

    #[test]
    fn yaml_round_trips_through_serialize() {
        let config = RoverConfig { command_cadence: Duration::from_millis(120), ..Default::default() };
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        assert_eq!(RoverConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let err = RoverConfig::from_yaml_str("command_cadence: 0\n").unwrap_err();
        assert!(err.to_string().contains("command_cadence"));
        assert_eq!(err.class(), crate::ErrorClass::Configuration);
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = RoverConfig::from_yaml_str("frame_timeout: [not, a, number]\n").unwrap_err();
        assert!(matches!(err, LinkError::Config { source: Some(_), .. }));
    }

    #[test]
    fn ipv6_discovery_is_rejected() {
        let config = RoverConfig { discovery_addr: "[ff02::1]:3703".parse().unwrap(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = RoverConfig::load("/nonexistent/rover.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rover.yaml"));
    }
}
