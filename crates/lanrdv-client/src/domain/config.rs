//! Client configuration types.
//!
//! [`ClientConfig`] holds every setting a round needs.  The binary builds it
//! from command-line arguments; tests build it from
//! [`ClientConfig::default`] and override single fields.
//!
//! No environment variables or files are read here.  Populating the struct is
//! the entry point's job.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use lanrdv_core::domain::group::DEFAULT_RENDEZVOUS_PORT;
use lanrdv_core::{default_client_tag, MulticastGroup};

/// First local UDP port the probe sender tries to bind.
pub const DEFAULT_SENDER_PORT: u16 = 1601;
/// Number of consecutive ports tried before giving up.
pub const DEFAULT_BIND_ATTEMPTS: u16 = 9;
/// How long each poll window waits for a reply.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Consecutive empty poll windows that end a round.
pub const DEFAULT_MAX_MISSES: u32 = 3;
/// Bound on one whole rendezvous exchange.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

/// All runtime configuration for one discover-and-connect round.
///
/// # Example
///
/// ```rust
/// use lanrdv_client::domain::ClientConfig;
///
/// let cfg = ClientConfig::default();
/// assert_eq!(cfg.rendezvous_port, 2505);
/// assert_eq!(cfg.sender_port, 1601);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Group probes are sent to.  Its TTL, loopback flag and first interface
    /// also configure the sending socket.
    pub group: MulticastGroup,

    /// Send the probe to this unicast address instead of the group.
    ///
    /// Used where multicast is not routed, and by loopback tests.
    pub target: Option<SocketAddr>,

    /// TCP port of every peer's rendezvous server.
    pub rendezvous_port: u16,

    /// Tag sent in `ANNOUNCE` and `HELLO` messages.
    pub client_tag: String,

    /// Local address the probe socket binds to.
    pub sender_ip: IpAddr,

    /// First local port tried for the probe socket.  `0` lets the OS choose.
    pub sender_port: u16,

    /// Consecutive ports tried, starting at `sender_port`.
    pub bind_attempts: u16,

    /// How long each poll window waits for a reply.
    pub poll_interval: Duration,

    /// Empty poll windows in a row that end discovery.
    pub max_consecutive_misses: u32,

    /// Hard bound on the discovery step, regardless of replies.
    pub deadline: Option<Duration>,

    /// Bound on each peer's whole rendezvous exchange.
    pub handshake_timeout: Duration,

    /// Collapse repeated peer addresses before the rendezvous step.
    pub dedupe_peers: bool,
}

impl Default for ClientConfig {
    /// | Field                  | Default           |
    /// |------------------------|-------------------|
    /// | group                  | `239.5.0.5:1505`  |
    /// | rendezvous_port        | `2505`            |
    /// | sender                 | `0.0.0.0:1601`    |
    /// | bind_attempts          | 9                 |
    /// | poll_interval          | 500 ms            |
    /// | max_consecutive_misses | 3                 |
    /// | handshake_timeout      | 3 seconds         |
    fn default() -> Self {
        Self {
            group: MulticastGroup::default(),
            target: None,
            rendezvous_port: DEFAULT_RENDEZVOUS_PORT,
            client_tag: default_client_tag(),
            sender_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            sender_port: DEFAULT_SENDER_PORT,
            bind_attempts: DEFAULT_BIND_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_misses: DEFAULT_MAX_MISSES,
            deadline: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            dedupe_peers: false,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
