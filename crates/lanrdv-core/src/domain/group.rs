//! The multicast group a discovery round targets.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use thiserror::Error;

/// Default multicast group address.
pub const DEFAULT_GROUP_ADDR: Ipv4Addr = Ipv4Addr::new(239, 5, 0, 5);
/// Default multicast (discovery) UDP port.
pub const DEFAULT_MULTICAST_PORT: u16 = 1505;
/// Default rendezvous TCP port.
pub const DEFAULT_RENDEZVOUS_PORT: u16 = 2505;
/// Default multicast time-to-live.
pub const DEFAULT_TTL: u32 = 30;

/// Error type for group construction.
#[derive(Debug, Error, PartialEq)]
pub enum GroupError {
    /// The address is not in the class-D (224.0.0.0/4) range.
    #[error("{0} is not a multicast address")]
    NotMulticast(Ipv4Addr),
    /// Port 0 cannot be joined by a remote prober.
    #[error("multicast port must be non-zero")]
    ZeroPort,
    /// A TTL of zero would keep probes on the sending host.
    #[error("multicast TTL must be between 1 and 255, got {0}")]
    InvalidTtl(u32),
}

/// A multicast group address/port pair plus the options used to join it.
///
/// Built once and then only read.  The `with_*` methods consume the group so
/// a configured value cannot be changed behind a listener's back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastGroup {
    address: Ipv4Addr,
    port: u16,
    ttl: u32,
    /// Local interfaces to join on.  Empty means "the wildcard interface".
    interfaces: Vec<Ipv4Addr>,
    /// Whether probes sent from this host are looped back to local listeners.
    loopback: bool,
}

impl MulticastGroup {
    /// Creates a group with the default TTL, wildcard interface and loopback on.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::NotMulticast`] for a non class-D address and
    /// [`GroupError::ZeroPort`] for port 0.
    pub fn new(address: Ipv4Addr, port: u16) -> Result<Self, GroupError> {
        if !address.is_multicast() {
            return Err(GroupError::NotMulticast(address));
        }
        if port == 0 {
            return Err(GroupError::ZeroPort);
        }
        Ok(Self {
            address,
            port,
            ttl: DEFAULT_TTL,
            interfaces: Vec::new(),
            loopback: true,
        })
    }

    /// Returns a copy with the given multicast TTL.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::InvalidTtl`] unless `1 <= ttl <= 255`.
    pub fn with_ttl(mut self, ttl: u32) -> Result<Self, GroupError> {
        if !(1..=255).contains(&ttl) {
            return Err(GroupError::InvalidTtl(ttl));
        }
        self.ttl = ttl;
        Ok(self)
    }

    /// Returns a copy that joins on each of `interfaces` instead of the wildcard.
    pub fn with_interfaces(mut self, interfaces: Vec<Ipv4Addr>) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Returns a copy with multicast loopback set to `loopback`.
    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn interfaces(&self) -> &[Ipv4Addr] {
        &self.interfaces
    }

    pub fn loopback(&self) -> bool {
        self.loopback
    }

    /// The `group:port` destination probes are sent to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.address, self.port))
    }
}

impl Default for MulticastGroup {
    fn default() -> Self {
        Self {
            address: DEFAULT_GROUP_ADDR,
            port: DEFAULT_MULTICAST_PORT,
            ttl: DEFAULT_TTL,
            interfaces: Vec::new(),
            loopback: true,
        }
    }
}

impl std::fmt::Display for MulticastGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_class_d_address() {
        // Arrange / Act
        let group = MulticastGroup::new(Ipv4Addr::new(226, 2, 3, 4), 50300).unwrap();

        // Assert
        assert_eq!(group.address(), Ipv4Addr::new(226, 2, 3, 4));
        assert_eq!(group.port(), 50300);
        assert_eq!(group.ttl(), DEFAULT_TTL);
        assert!(group.interfaces().is_empty());
        assert!(group.loopback());
    }

    #[test]
    fn test_new_rejects_unicast_address() {
        let result = MulticastGroup::new(Ipv4Addr::new(192, 168, 1, 10), 1505);
        assert_eq!(
            result,
            Err(GroupError::NotMulticast(Ipv4Addr::new(192, 168, 1, 10)))
        );
    }

    #[test]
    fn test_new_rejects_zero_port() {
        assert_eq!(
            MulticastGroup::new(DEFAULT_GROUP_ADDR, 0),
            Err(GroupError::ZeroPort)
        );
    }

    #[test]
    fn test_with_ttl_validates_range() {
        let group = MulticastGroup::default();
        assert_eq!(group.clone().with_ttl(0), Err(GroupError::InvalidTtl(0)));
        assert_eq!(group.clone().with_ttl(256), Err(GroupError::InvalidTtl(256)));
        assert_eq!(group.with_ttl(32).unwrap().ttl(), 32);
    }

    #[test]
    fn test_with_interfaces_and_loopback() {
        let ifaces = vec![Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(192, 168, 0, 2)];
        let group = MulticastGroup::default()
            .with_interfaces(ifaces.clone())
            .with_loopback(false);

        assert_eq!(group.interfaces(), ifaces.as_slice());
        assert!(!group.loopback());
    }

    #[test]
    fn test_default_group_matches_constants() {
        let group = MulticastGroup::default();
        assert_eq!(
            group.socket_addr(),
            "239.5.0.5:1505".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(group.to_string(), "239.5.0.5:1505");
    }
}
