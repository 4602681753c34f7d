//! DiscoverAndConnect: find hosts, then greet each one.
//!
//! ```text
//! ProbeClient::discover(tag)        -> Vec<PeerRecord>   (arrival order)
//!   └─ optional dedupe by address (first reply wins)
//! handshake_all(addresses, port)    -> one result per peer
//!   └─ zipped with the discovery records into a RendezvousReport
//! ```
//!
//! The peer list lives only for the duration of [`DiscoverAndConnect::run`].

use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use lanrdv_core::domain::peer::addresses;
use lanrdv_core::{NetError, PeerRecord};
use tracing::info;

use crate::domain::ClientConfig;
use crate::infrastructure::network::{handshake_all, HandshakeError, ProbeClient, ProbeConfig};

/// Outcome of one peer's rendezvous.
#[derive(Debug)]
pub struct RendezvousEntry {
    /// Transport-observed address of the discovery reply.
    pub address: IpAddr,
    /// Identity the host put in its discovery reply.
    pub advertised_identity: String,
    /// Identity from the rendezvous reply, or why the rendezvous failed.
    pub outcome: Result<String, HandshakeError>,
}

/// Every rendezvous attempted in one round, in discovery order.
#[derive(Debug, Default)]
pub struct RendezvousReport {
    entries: Vec<RendezvousEntry>,
}

impl RendezvousReport {
    pub fn entries(&self) -> &[RendezvousEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `(address, identity)` for every successful rendezvous.
    pub fn successes(&self) -> impl Iterator<Item = (IpAddr, &str)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.as_ref().ok().map(|id| (e.address, id.as_str())))
    }

    /// `(address, error)` for every failed rendezvous.
    pub fn failures(&self) -> impl Iterator<Item = (IpAddr, &HandshakeError)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.as_ref().err().map(|err| (e.address, err)))
    }
}

/// The discover-then-connect use case.
#[derive(Debug, Clone)]
pub struct DiscoverAndConnect {
    probe: ProbeClient,
    rendezvous_port: u16,
    handshake_timeout: Duration,
    dedupe_peers: bool,
}

impl DiscoverAndConnect {
    pub fn new(probe: ProbeClient, rendezvous_port: u16, handshake_timeout: Duration) -> Self {
        Self {
            probe,
            rendezvous_port,
            handshake_timeout,
            dedupe_peers: false,
        }
    }

    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self::new(
            ProbeClient::new(ProbeConfig::from_client_config(cfg)),
            cfg.rendezvous_port,
            cfg.handshake_timeout,
        )
        .with_dedupe(cfg.dedupe_peers)
    }

    /// Collapse repeated peer addresses before the rendezvous step.
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe_peers = dedupe;
        self
    }

    /// Runs one round.
    ///
    /// # Errors
    ///
    /// Returns a [`NetError`] only if discovery itself cannot run (no free
    /// sender port, send failure).  Per-peer failures are in the report.
    pub async fn run(&self, client_tag: &str) -> Result<RendezvousReport, NetError> {
        let mut peers = self.probe.discover(client_tag).await?;
        if self.dedupe_peers {
            peers = dedupe_by_address(peers);
        }

        let results = handshake_all(
            &addresses(&peers),
            self.rendezvous_port,
            client_tag,
            self.handshake_timeout,
        )
        .await;

        let entries: Vec<RendezvousEntry> = peers
            .into_iter()
            .zip(results)
            .map(|(peer, (address, outcome))| RendezvousEntry {
                address,
                advertised_identity: peer.identity,
                outcome,
            })
            .collect();

        let report = RendezvousReport { entries };
        info!(
            "round complete: {} peer(s), {} rendezvous succeeded",
            report.len(),
            report.successes().count()
        );
        Ok(report)
    }
}

/// Keeps the first record for each address, preserving order.
fn dedupe_by_address(peers: Vec<PeerRecord>) -> Vec<PeerRecord> {
    let mut seen = HashSet::new();
    peers
        .into_iter()
        .filter(|p| seen.insert(p.address))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
