//! Rover discovery over UDP probe / probe-match.
//!
//! The controller sends `CAM-ROVER:PROBE` to the discovery group and waits for a
//! `CAM-ROVER:PROBE_MATCH:...:<control_port>:<stream_port>` reply. The reply's
//! source address is the rover. Unanswered or malformed probes are retried
//! after a fixed backoff until a rover answers or the caller cancels.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::RoverConfig;
use crate::protocol::PROBE_MATCH_PREFIX;
use crate::{LinkError, PeerEndpoint, Result};

/// Probe loop configuration.
#[derive(Debug, Clone)]
pub struct Discovery {
    target: SocketAddr,
    probe: String,
    multicast_ttl: u32,
    timeout: Duration,
    backoff: Duration,
    max_datagram_size: usize,
}

impl Discovery {
    pub fn new(config: &RoverConfig) -> Self {
        Self {
            target: config.discovery_addr,
            probe: config.probe.clone(),
            multicast_ttl: config.multicast_ttl,
            timeout: config.discovery_timeout,
            backoff: config.discovery_backoff,
            max_datagram_size: config.max_datagram_size,
        }
    }

    /// Probe until a rover answers.
    ///
    /// Failures never surface: each one is logged and followed by the backoff.
    /// Returns `None` only when `cancel` fires.
    pub async fn discover(&self, cancel: &CancellationToken) -> Option<PeerEndpoint> {
        info!(target_addr = %self.target, "Discovering rover");
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let attempt = tokio::select! {
                _ = cancel.cancelled() => return None,
                attempt = self.probe_once() => attempt,
            };

            match attempt {
                Ok(peer) => {
                    info!(peer = %peer, attempts, "Rover discovered");
                    return Some(peer);
                }
                Err(e) => {
                    debug!("Discovery attempt {} failed: {}", attempts, e);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }

    /// Send one probe and wait for one reply.
    pub async fn probe_once(&self) -> Result<PeerEndpoint> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| LinkError::socket_error("binding discovery socket", e))?;

        socket
            .set_broadcast(true)
            .map_err(|e| LinkError::socket_error("enabling broadcast", e))?;
        if self.target.ip().is_multicast() {
            socket
                .set_multicast_ttl_v4(self.multicast_ttl)
                .map_err(|e| LinkError::socket_error("setting multicast TTL", e))?;
        }

        trace!(target_addr = %self.target, "Sending probe");
        socket
            .send_to(self.probe.as_bytes(), self.target)
            .await
            .map_err(|e| LinkError::socket_error("sending probe", e))?;

        let mut buf = vec![0u8; self.max_datagram_size];
        let (len, from) = tokio::time::timeout(self.timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| LinkError::Timeout { duration: self.timeout })?
            .map_err(|e| LinkError::socket_error("receiving probe reply", e))?;

        let (control_port, stream_port) = parse_probe_match(&buf[..len])?;
        Ok(PeerEndpoint::new(from.ip(), control_port, stream_port))
    }
}

/// Extract `(control_port, stream_port)` from a probe reply.
///
/// The last two colon-separated fields after the prefix are the ports. The
/// rover firmware sends exactly those two; replies with additional leading
/// fields are accepted as well.
pub fn parse_probe_match(reply: &[u8]) -> Result<(u16, u16)> {
    let text = std::str::from_utf8(reply)
        .ok()
        .filter(|text| text.is_ascii())
        .ok_or_else(|| LinkError::discovery_failed("reply is not ASCII"))?;

    let fields = text
        .strip_prefix(PROBE_MATCH_PREFIX)
        .ok_or_else(|| LinkError::discovery_failed(format!("unexpected reply {text:?}")))?;

    let mut tokens = fields.rsplit(':');
    let (Some(stream), Some(control)) = (tokens.next(), tokens.next()) else {
        return Err(LinkError::discovery_failed(format!("missing ports in {text:?}")));
    };

    let port = |token: &str| {
        token
            .trim()
            .parse::<u16>()
            .map_err(|_| LinkError::discovery_failed(format!("invalid port {token:?}")))
    };

    Ok((port(control)?, port(stream)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config(target: SocketAddr) -> RoverConfig {
        RoverConfig {
            discovery_addr: target,
            discovery_timeout: Duration::from_millis(200),
            discovery_backoff: Duration::from_millis(20),
            ..Default::default()
        }
    }

    /// Fake rover answering each probe with the next canned reply.
    async fn spawn_responder(replies: Vec<Option<&'static str>>) -> (SocketAddr, Arc<AtomicUsize>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let probes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probes);

        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let mut replies = replies.into_iter();
            loop {
                let Ok((len, from)) = socket.recv_from(&mut buf).await else { return };
                assert_eq!(&buf[..len], b"CAM-ROVER:PROBE");
                counter.fetch_add(1, Ordering::SeqCst);
                match replies.next() {
                    Some(Some(reply)) => {
                        socket.send_to(reply.as_bytes(), from).await.unwrap();
                    }
                    Some(None) => {}
                    None => return,
                }
            }
        });

        (addr, probes)
    }

    #[test]
    fn parses_firmware_reply() {
        assert_eq!(parse_probe_match(b"CAM-ROVER:PROBE_MATCH:5001:5002").unwrap(), (5001, 5002));
    }

    #[test]
    fn parses_reply_with_extra_field() {
        assert_eq!(parse_probe_match(b"CAM-ROVER:PROBE_MATCH:x:9001:9002").unwrap(), (9001, 9002));
    }

    #[test]
    fn rejects_malformed_replies() {
        let bad: [&[u8]; 7] = [
            b"CAM-ROVER:PROBE",
            b"HELLO:PROBE_MATCH:1:2",
            b"CAM-ROVER:PROBE_MATCH:9001",
            b"CAM-ROVER:PROBE_MATCH:x:abc:9002",
            b"CAM-ROVER:PROBE_MATCH:9001:70000",
            b"CAM-ROVER:PROBE_MATCH:9001:",
            b"CAM-ROVER:PROBE_MATCH:9001:\xff\xfe",
        ];
        for reply in bad {
            let err = parse_probe_match(reply).unwrap_err();
            assert!(matches!(err, LinkError::Discovery { .. }), "{reply:?} gave {err:?}");
        }
    }

    proptest! {
        #[test]
        fn any_ports_are_recovered(control in any::<u16>(), stream in any::<u16>(), extra in "[a-z0-9]{0,8}") {
            let reply = format!("CAM-ROVER:PROBE_MATCH:{extra}:{control}:{stream}");
            prop_assert_eq!(parse_probe_match(reply.as_bytes()).unwrap(), (control, stream));
        }

        #[test]
        fn arbitrary_bytes_never_panic(reply in prop::collection::vec(any::<u8>(), 0..64)) {
            let _ = parse_probe_match(&reply);
        }
    }

    #[tokio::test]
    async fn reply_source_becomes_peer_address() {
        let (addr, probes) = spawn_responder(vec![Some("CAM-ROVER:PROBE_MATCH:x:9001:9002")]).await;
        let discovery = Discovery::new(&test_config(addr));

        let peer = discovery.discover(&CancellationToken::new()).await.unwrap();

        assert_eq!(peer, PeerEndpoint::new("127.0.0.1".parse().unwrap(), 9001, 9002));
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_and_missing_replies_are_retried() {
        let (addr, probes) = spawn_responder(vec![
            Some("CAM-ROVER:HELLO"),
            Some("CAM-ROVER:PROBE_MATCH:x:abc:def"),
            None,
            Some("CAM-ROVER:PROBE_MATCH:7000:7001"),
        ])
        .await;
        let discovery = Discovery::new(&test_config(addr));

        let peer = discovery.discover(&CancellationToken::new()).await.unwrap();

        assert_eq!(peer.control_port, 7000);
        assert_eq!(peer.stream_port, 7001);
        assert_eq!(probes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cancellation_ends_discovery() {
        let (addr, _probes) = spawn_responder(vec![None; 100]).await;
        let discovery = Discovery::new(&test_config(addr));
        let cancel = CancellationToken::new();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { discovery.discover(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        assert_eq!(task.await.unwrap(), None);
    }
}
