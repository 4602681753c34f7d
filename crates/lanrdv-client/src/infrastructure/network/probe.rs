//! Discovery probe: one `ANNOUNCE` out, any number of replies back.
//!
//! # Round shape
//!
//! ```text
//! bind sender (1601, 1602, ... on BindConflict)
//! send ANNOUNCE:<tag> to the group
//! loop
//!   wait up to poll_interval for one datagram
//!     valid ANNOUNCE-REPLY  -> record source address, misses = 0
//!     malformed datagram    -> discard, keep waiting in the same window
//!     window closes empty   -> misses += 1
//!   stop when misses == max_consecutive_misses or the deadline passes
//! ```
//!
//! Any valid reply resets the miss counter, so a chatty segment can keep a
//! round alive for a long time.  [`RoundPolicy::deadline`] puts a hard cap on
//! that.
//!
//! Peers are recorded in arrival order.  A host that replies twice (for
//! example from two interfaces joined to the group) appears twice.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use lanrdv_core::domain::peer::addresses;
use lanrdv_core::net::{bind_udp_with_retry, into_tokio, is_timeout_error};
use lanrdv_core::protocol::codec::decode_expected;
use lanrdv_core::protocol::messages::MAX_MESSAGE_LEN;
use lanrdv_core::{encode_message, MessageKind, MulticastGroup, NetError, PeerRecord, WireMessage};
use socket2::SockRef;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::domain::config::{
    DEFAULT_BIND_ATTEMPTS, DEFAULT_MAX_MISSES, DEFAULT_POLL_INTERVAL, DEFAULT_SENDER_PORT,
};
use crate::domain::ClientConfig;

/// When a discovery round ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPolicy {
    /// How long each poll window waits for a reply.
    pub poll_interval: Duration,
    /// Empty poll windows in a row that end the round.  Zero ends the round
    /// right after the probe is sent.
    pub max_consecutive_misses: u32,
    /// Hard bound on the whole round, measured from the send.
    pub deadline: Option<Duration>,
}

impl Default for RoundPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_misses: DEFAULT_MAX_MISSES,
            deadline: None,
        }
    }
}

/// Where and how the probe is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Destination of the probe: the group, or a unicast override.
    pub target: SocketAddr,
    pub ttl: u32,
    pub loopback: bool,
    /// Outgoing interface for multicast.  `None` leaves the OS default.
    pub multicast_interface: Option<Ipv4Addr>,
    pub bind_ip: IpAddr,
    /// First local port tried.  `0` lets the OS choose and skips retries.
    pub bind_port: u16,
    pub bind_attempts: u16,
    pub policy: RoundPolicy,
}

impl ProbeConfig {
    /// Targets `group` with its TTL, loopback flag and first interface, from
    /// the default sender port window.
    pub fn for_group(group: &MulticastGroup) -> Self {
        Self {
            target: group.socket_addr(),
            ttl: group.ttl(),
            loopback: group.loopback(),
            multicast_interface: group.interfaces().first().copied(),
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            bind_port: DEFAULT_SENDER_PORT,
            bind_attempts: DEFAULT_BIND_ATTEMPTS,
            policy: RoundPolicy::default(),
        }
    }

    /// Builds the probe settings from a full client configuration.
    pub fn from_client_config(cfg: &ClientConfig) -> Self {
        let mut probe = Self::for_group(&cfg.group);
        if let Some(target) = cfg.target {
            probe.target = target;
        }
        probe.bind_ip = cfg.sender_ip;
        probe.bind_port = cfg.sender_port;
        probe.bind_attempts = cfg.bind_attempts;
        probe.policy = RoundPolicy {
            poll_interval: cfg.poll_interval,
            max_consecutive_misses: cfg.max_consecutive_misses,
            deadline: cfg.deadline,
        };
        probe
    }

    /// Sends the probe to `target` instead of the group.
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    pub fn with_policy(mut self, policy: RoundPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Runs discovery rounds.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    config: ProbeConfig,
}

impl ProbeClient {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Runs one round and returns every peer that replied, in arrival order.
    ///
    /// An empty result is not an error.
    ///
    /// # Errors
    ///
    /// - [`NetError::BindExhausted`] if every port in the sender window is busy.
    /// - [`NetError::Socket`] if a socket option cannot be applied.
    /// - [`NetError::Send`] if the probe cannot be sent.
    /// - [`NetError::Protocol`] if `client_tag` is not a valid message body.
    pub async fn discover(&self, client_tag: &str) -> Result<Vec<PeerRecord>, NetError> {
        let probe = encode_message(&WireMessage::Announce {
            client_tag: client_tag.to_string(),
        })?;
        let socket = self.open_sender()?;

        let target = self.config.target;
        socket
            .send_to(&probe, target)
            .await
            .map_err(|source| NetError::Send {
                addr: target,
                source,
            })?;
        debug!("sent ANNOUNCE to {target}");

        let peers = self.collect_replies(&socket).await;
        info!("discovery round to {target} found {} peer(s)", peers.len());
        Ok(peers)
    }

    /// Binds the sender within the port window and applies multicast options.
    fn open_sender(&self) -> Result<UdpSocket, NetError> {
        let cfg = &self.config;
        let socket = bind_udp_with_retry(cfg.bind_ip, cfg.bind_port, cfg.bind_attempts)?;

        if cfg.target.ip().is_multicast() {
            socket
                .set_multicast_ttl_v4(cfg.ttl)
                .map_err(NetError::Socket)?;
            socket
                .set_multicast_loop_v4(cfg.loopback)
                .map_err(NetError::Socket)?;
            if let Some(interface) = cfg.multicast_interface {
                SockRef::from(&socket)
                    .set_multicast_if_v4(&interface)
                    .map_err(NetError::Socket)?;
            }
        }

        let socket = into_tokio(socket)?;
        if let Ok(local) = socket.local_addr() {
            debug!("probe sender bound to {local}");
        }
        Ok(socket)
    }

    /// The poll loop.  Never fails: an empty window or a receive error counts
    /// as a miss.
    async fn collect_replies(&self, socket: &UdpSocket) -> Vec<PeerRecord> {
        let policy = self.config.policy;
        let deadline = policy.deadline.map(|d| Instant::now() + d);
        let mut peers = Vec::new();
        let mut misses = 0u32;
        let mut buf = vec![0u8; MAX_MESSAGE_LEN + 1];

        while misses < policy.max_consecutive_misses {
            let mut window_end = Instant::now() + policy.poll_interval;
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    debug!("discovery deadline reached");
                    break;
                }
                window_end = window_end.min(deadline);
            }

            match next_reply(socket, &mut buf, window_end).await {
                Some(peer) => {
                    peers.push(peer);
                    misses = 0;
                }
                None => misses += 1,
            }
        }

        peers
    }
}

/// Waits until `window_end` for one valid `ANNOUNCE-REPLY`.
///
/// Malformed datagrams are discarded and the wait continues in the same
/// window.  Returns `None` if the window closes or the receive fails.
async fn next_reply(
    socket: &UdpSocket,
    buf: &mut [u8],
    window_end: Instant,
) -> Option<PeerRecord> {
    loop {
        let (len, src) = match timeout_at(window_end, socket.recv_from(buf)).await {
            Ok(Ok(received)) => received,
            Ok(Err(e)) if is_timeout_error(&e) => return None,
            Ok(Err(e)) => {
                warn!("discovery recv error: {e}");
                return None;
            }
            Err(_elapsed) => return None,
        };

        match decode_expected(&buf[..len], MessageKind::AnnounceReply) {
            Ok(identity) => {
                debug!("reply from {src}: identity={identity}");
                return Some(PeerRecord::new(src.ip(), identity));
            }
            Err(e) => debug!("discarding datagram from {src}: {e}"),
        }
    }
}

/// Runs one round against `group` from the default sender port window and
/// returns the replying addresses in arrival order, duplicates included.
///
/// # Errors
///
/// See [`ProbeClient::discover`].
pub async fn discover(
    group: &MulticastGroup,
    client_tag: &str,
    poll_interval: Duration,
    max_consecutive_misses: u32,
) -> Result<Vec<IpAddr>, NetError> {
    let config = ProbeConfig::for_group(group).with_policy(RoundPolicy {
        poll_interval,
        max_consecutive_misses,
        deadline: None,
    });
    let peers = ProbeClient::new(config).discover(client_tag).await?;
    Ok(addresses(&peers))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A fake host on loopback that answers every datagram with `replies`.
    async fn fake_host(replies: Vec<&'static [u8]>) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            while let Ok((_, src)) = socket.recv_from(&mut buf).await {
                for reply in &replies {
                    let _ = socket.send_to(reply, src).await;
                }
            }
        });
        addr
    }

    fn loopback_probe(target: SocketAddr, max_misses: u32) -> ProbeConfig {
        ProbeConfig {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind_port: 0,
            ..ProbeConfig::for_group(&MulticastGroup::default())
        }
        .with_target(target)
        .with_policy(RoundPolicy {
            poll_interval: Duration::from_millis(100),
            max_consecutive_misses: max_misses,
            deadline: None,
        })
    }

    #[test]
    fn test_for_group_copies_group_options() {
        // Arrange
        let group = MulticastGroup::default()
            .with_ttl(4)
            .unwrap()
            .with_interfaces(vec![Ipv4Addr::new(10, 0, 0, 2)])
            .with_loopback(false);

        // Act
        let cfg = ProbeConfig::for_group(&group);

        // Assert
        assert_eq!(cfg.target, "239.5.0.5:1505".parse().unwrap());
        assert_eq!(cfg.ttl, 4);
        assert!(!cfg.loopback);
        assert_eq!(cfg.multicast_interface, Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(cfg.bind_port, 1601);
        assert_eq!(cfg.bind_attempts, 9);
    }

    #[test]
    fn test_from_client_config_applies_target_override() {
        let cfg = ClientConfig {
            target: Some("127.0.0.1:7000".parse().unwrap()),
            deadline: Some(Duration::from_secs(1)),
            ..ClientConfig::default()
        };

        let probe = ProbeConfig::from_client_config(&cfg);

        assert_eq!(probe.target, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(probe.policy.deadline, Some(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_discover_records_observed_source_and_identity() {
        // Arrange
        let host = fake_host(vec![b"ANNOUNCE-REPLY:den-pc"]).await;
        let client = ProbeClient::new(loopback_probe(host, 2));

        // Act
        let peers = client.discover("laptop").await.unwrap();

        // Assert
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].address, host.ip());
        assert_eq!(peers[0].identity, "den-pc");
    }

    #[tokio::test]
    async fn test_discover_preserves_duplicate_replies_in_order() {
        let host = fake_host(vec![b"ANNOUNCE-REPLY:a", b"ANNOUNCE-REPLY:b"]).await;
        let client = ProbeClient::new(loopback_probe(host, 2));

        let peers = client.discover("laptop").await.unwrap();

        let identities: Vec<_> = peers.iter().map(|p| p.identity.as_str()).collect();
        assert_eq!(identities, ["a", "b"]);
        assert_eq!(addresses(&peers), vec![host.ip(), host.ip()]);
    }

    #[tokio::test]
    async fn test_discover_with_no_responder_returns_empty_after_misses() {
        // Arrange: a bound socket that never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = ProbeClient::new(loopback_probe(silent.local_addr().unwrap(), 3));

        // Act
        let started = std::time::Instant::now();
        let peers = client.discover("laptop").await.unwrap();

        // Assert: three 100ms windows, with slack for slow CI.
        assert!(peers.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_malformed_datagrams_alone_do_not_produce_peers() {
        let host = fake_host(vec![b"WELCOME:den-pc", b"garbage"]).await;
        let client = ProbeClient::new(loopback_probe(host, 2));

        let peers = client.discover("laptop").await.unwrap();

        assert!(peers.is_empty());
    }

    #[tokio::test]
    async fn test_noise_before_a_late_reply_does_not_end_the_round() {
        // Arrange: three junk datagrams at once, the real reply 100ms later.
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let host = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            if let Ok((_, src)) = socket.recv_from(&mut buf).await {
                for _ in 0..3 {
                    let _ = socket.send_to(b"Hi from discovery server legacy", src).await;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
                let _ = socket.send_to(b"ANNOUNCE-REPLY:den-pc", src).await;
            }
        });
        let cfg = loopback_probe(host, 3).with_policy(RoundPolicy {
            poll_interval: Duration::from_millis(500),
            max_consecutive_misses: 3,
            deadline: None,
        });

        // Act
        let peers = ProbeClient::new(cfg).discover("laptop").await.unwrap();

        // Assert
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].identity, "den-pc");
    }

    #[tokio::test]
    async fn test_malformed_datagrams_do_not_shorten_the_window() {
        // Arrange: a burst of junk and nothing else.
        let host = fake_host(vec![&b"junk"[..]; 5]).await;
        let client = ProbeClient::new(loopback_probe(host, 1));

        // Act
        let started = std::time::Instant::now();
        let peers = client.discover("laptop").await.unwrap();

        // Assert: the single 100ms window is waited out in full.
        assert!(peers.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_zero_misses_returns_right_after_send() {
        let host = fake_host(vec![b"ANNOUNCE-REPLY:den-pc"]).await;
        let client = ProbeClient::new(loopback_probe(host, 0));

        let peers = client.discover("laptop").await.unwrap();

        assert!(peers.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_caps_the_round() {
        // Arrange: long poll windows, short deadline.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let cfg = loopback_probe(silent.local_addr().unwrap(), 10).with_policy(RoundPolicy {
            poll_interval: Duration::from_secs(5),
            max_consecutive_misses: 10,
            deadline: Some(Duration::from_millis(150)),
        });

        // Act
        let started = std::time::Instant::now();
        let peers = ProbeClient::new(cfg).discover("laptop").await.unwrap();

        // Assert
        assert!(peers.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_invalid_tag_is_a_protocol_error() {
        let client = ProbeClient::new(loopback_probe("127.0.0.1:9".parse().unwrap(), 1));

        let result = client.discover("bad\ntag").await;

        assert!(matches!(result, Err(NetError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_busy_single_port_window_is_exhausted() {
        // Arrange: hold the only port in the window.
        let held = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let first = held.local_addr().unwrap().port();
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut cfg = loopback_probe(silent.local_addr().unwrap(), 1);
        cfg.bind_port = first;
        cfg.bind_attempts = 1;

        // Act
        let result = ProbeClient::new(cfg).discover("laptop").await;

        // Assert
        assert!(matches!(result, Err(NetError::BindExhausted { attempts: 1, .. })));
    }
}
