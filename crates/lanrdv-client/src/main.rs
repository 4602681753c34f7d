//! lanrdv client: find hosts on the LAN and greet each one.
//!
//! Prints one line per peer found, in discovery order:
//!
//! ```text
//! 192.168.1.20    den-pc
//! 192.168.1.31    FAILED: failed to connect to 192.168.1.31:2505: Connection refused
//! ```
//!
//! Every option can also be set through a `LANRDV_*` environment variable;
//! the command line wins when both are present.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lanrdv_client::application::DiscoverAndConnect;
use lanrdv_client::domain::config::{
    ClientConfig, DEFAULT_BIND_ATTEMPTS, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MAX_MISSES,
    DEFAULT_POLL_INTERVAL, DEFAULT_SENDER_PORT,
};
use lanrdv_core::domain::group::{
    DEFAULT_GROUP_ADDR, DEFAULT_MULTICAST_PORT, DEFAULT_RENDEZVOUS_PORT, DEFAULT_TTL,
};
use lanrdv_core::{default_client_tag, MulticastGroup};

// ── CLI argument definitions ──────────────────────────────────────────────────

const DEFAULT_POLL_INTERVAL_MS: u64 = DEFAULT_POLL_INTERVAL.as_millis() as u64;
const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = DEFAULT_HANDSHAKE_TIMEOUT.as_millis() as u64;

/// Discovers lanrdv hosts on the local network and performs a rendezvous
/// with each.
#[derive(Debug, Parser)]
#[command(
    name = "lanrdv-client",
    about = "LAN discovery probe and rendezvous client",
    version
)]
struct Cli {
    /// Multicast group address to probe.
    #[arg(long, default_value_t = DEFAULT_GROUP_ADDR, env = "LANRDV_GROUP")]
    group: Ipv4Addr,

    /// UDP port of the multicast group.
    #[arg(long, default_value_t = DEFAULT_MULTICAST_PORT, env = "LANRDV_PORT")]
    port: u16,

    /// TCP port of each host's rendezvous server.
    #[arg(long, default_value_t = DEFAULT_RENDEZVOUS_PORT, env = "LANRDV_RENDEZVOUS_PORT")]
    rendezvous_port: u16,

    /// Tag sent in probes and greetings.  Defaults to `client-<uuid>`.
    #[arg(long, env = "LANRDV_TAG")]
    tag: Option<String>,

    /// Multicast time-to-live.
    #[arg(long, default_value_t = DEFAULT_TTL, env = "LANRDV_TTL")]
    ttl: u32,

    /// Local IPv4 interface to send the probe from.
    #[arg(long, env = "LANRDV_INTERFACE")]
    interface: Option<Ipv4Addr>,

    /// First local UDP port tried for the probe socket.
    #[arg(long, default_value_t = DEFAULT_SENDER_PORT, env = "LANRDV_SENDER_PORT")]
    sender_port: u16,

    /// Consecutive ports tried when the sender port is busy.
    #[arg(long, default_value_t = DEFAULT_BIND_ATTEMPTS, env = "LANRDV_BIND_ATTEMPTS")]
    bind_attempts: u16,

    /// Poll window for replies, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS, env = "LANRDV_POLL_INTERVAL_MS")]
    poll_interval_ms: u64,

    /// Quiet poll windows in a row that end discovery.
    #[arg(long, default_value_t = DEFAULT_MAX_MISSES, env = "LANRDV_MAX_MISSES")]
    max_misses: u32,

    /// Hard limit on discovery, in milliseconds.
    #[arg(long, env = "LANRDV_DEADLINE_MS")]
    deadline_ms: Option<u64>,

    /// Limit on each rendezvous exchange, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_HANDSHAKE_TIMEOUT_MS, env = "LANRDV_HANDSHAKE_TIMEOUT_MS")]
    handshake_timeout_ms: u64,

    /// Greet each address once even if it replied several times.
    #[arg(long, env = "LANRDV_DEDUPE")]
    dedupe: bool,

    /// Send the probe to this unicast `IP:PORT` instead of the group.
    #[arg(long, env = "LANRDV_TARGET")]
    target: Option<SocketAddr>,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the group address, port or TTL is invalid.
    fn into_client_config(self) -> anyhow::Result<ClientConfig> {
        let group = MulticastGroup::new(self.group, self.port)
            .and_then(|g| g.with_ttl(self.ttl))
            .with_context(|| format!("invalid multicast group {}:{}", self.group, self.port))?
            .with_interfaces(self.interface.into_iter().collect());

        Ok(ClientConfig {
            group,
            target: self.target,
            rendezvous_port: self.rendezvous_port,
            client_tag: self.tag.unwrap_or_else(default_client_tag),
            sender_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            sender_port: self.sender_port,
            bind_attempts: self.bind_attempts,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_consecutive_misses: self.max_misses,
            deadline: self.deadline_ms.map(Duration::from_millis),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            dedupe_peers: self.dedupe,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the peer lines.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = Cli::parse().into_client_config()?;
    info!("lanrdv client '{}' probing {}", cfg.client_tag, cfg.group);

    let report = DiscoverAndConnect::from_config(&cfg)
        .run(&cfg.client_tag)
        .await
        .context("discovery round failed")?;

    if report.is_empty() {
        info!("no hosts answered");
    }
    for entry in report.entries() {
        match &entry.outcome {
            Ok(identity) => println!("{}\t{identity}", entry.address),
            Err(e) => println!("{}\tFAILED: {e}", entry.address),
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
