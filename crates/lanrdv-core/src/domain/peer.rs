//! Peers found during a discovery round.

use std::net::IpAddr;
use std::time::Instant;

/// One reply collected by a discovery round.
///
/// `address` is always the transport-observed source of the reply datagram.
/// `identity` is whatever the host put in its reply; it is informational and
/// never used to address the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub address: IpAddr,
    pub identity: String,
    pub discovered_at: Instant,
}

impl PeerRecord {
    /// Creates a record stamped with the current instant.
    pub fn new(address: IpAddr, identity: impl Into<String>) -> Self {
        Self {
            address,
            identity: identity.into(),
            discovered_at: Instant::now(),
        }
    }
}

/// Returns the addresses of `peers` in discovery order, duplicates included.
pub fn addresses(peers: &[PeerRecord]) -> Vec<IpAddr> {
    peers.iter().map(|p| p.address).collect()
}
