//! Multicast group membership on a wildcard-bound UDP socket.
//!
//! Some hosts refuse to `bind()` to a multicast address, so the socket is
//! bound to `0.0.0.0:<port>` and membership is added with
//! `IP_ADD_MEMBERSHIP`, once for the wildcard interface or once per
//! configured interface address.
//!
//! The socket is created with `SO_REUSEADDR` (and `SO_REUSEPORT` on BSD
//! derivatives) so several listeners on one machine can share the group port.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::domain::group::MulticastGroup;
use crate::net::bind::classify_bind_error;
use crate::net::error::NetError;

/// A UDP socket joined to one multicast group.
///
/// Dropping the value closes the socket, which also releases the kernel
/// membership.  [`MulticastMembership::leave`] drops membership explicitly
/// first and reports failures.
#[derive(Debug)]
pub struct MulticastMembership {
    socket: UdpSocket,
    group: Ipv4Addr,
    /// Interfaces membership was added on; `0.0.0.0` for the wildcard.
    joined: Vec<Ipv4Addr>,
}

impl MulticastMembership {
    /// Binds `0.0.0.0:local_port` and joins `group`.
    ///
    /// Must be called from inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`NetError::BindConflict`] if the port is held by a socket that does
    ///   not allow sharing.
    /// - [`NetError::JoinFailure`] naming the interface that could not join.
    /// - [`NetError::Socket`] if a socket option cannot be applied.
    ///
    /// The socket is closed on every error path.
    pub fn join(group: &MulticastGroup, local_port: u16) -> Result<Self, NetError> {
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, local_port));

        let socket =
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(NetError::Socket)?;
        socket.set_reuse_address(true).map_err(NetError::Socket)?;
        #[cfg(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        ))]
        socket.set_reuse_port(true).map_err(NetError::Socket)?;

        socket
            .bind(&bind_addr.into())
            .map_err(|source| classify_bind_error(bind_addr, source))?;

        let joined = if group.interfaces().is_empty() {
            vec![Ipv4Addr::UNSPECIFIED]
        } else {
            group.interfaces().to_vec()
        };

        for interface in &joined {
            socket
                .join_multicast_v4(&group.address(), interface)
                .map_err(|source| NetError::JoinFailure {
                    group: group.address(),
                    interface: *interface,
                    source,
                })?;
            debug!("joined {} on interface {interface}", group.address());
        }

        socket
            .set_multicast_ttl_v4(group.ttl())
            .map_err(NetError::Socket)?;
        socket
            .set_multicast_loop_v4(group.loopback())
            .map_err(NetError::Socket)?;
        socket.set_nonblocking(true).map_err(NetError::Socket)?;

        let socket = UdpSocket::from_std(socket.into()).map_err(NetError::Socket)?;
        info!(
            "joined multicast group {} on UDP {bind_addr} ({} interface(s))",
            group.address(),
            joined.len()
        );

        Ok(Self {
            socket,
            group: group.address(),
            joined,
        })
    }

    /// The joined socket.
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    /// The local address the socket is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Socket`] if the OS cannot report the address.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.socket.local_addr().map_err(NetError::Socket)
    }

    /// Interfaces membership was added on (`0.0.0.0` for the wildcard).
    pub fn interfaces(&self) -> &[Ipv4Addr] {
        &self.joined
    }

    /// Drops membership on every joined interface, then closes the socket.
    ///
    /// Every interface is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`NetError::LeaveFailure`]; the socket is closed
    /// regardless.
    pub fn leave(self) -> Result<(), NetError> {
        let mut first_error = None;

        for interface in &self.joined {
            if let Err(source) = self.socket.leave_multicast_v4(self.group, *interface) {
                warn!("failed to leave {} on {interface}: {source}", self.group);
                first_error.get_or_insert(NetError::LeaveFailure {
                    group: self.group,
                    interface: *interface,
                    source,
                });
            }
        }

        debug!("left multicast group {}", self.group);
        first_error.map_or(Ok(()), Err)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
