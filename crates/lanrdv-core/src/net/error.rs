//! Error type for socket setup and listener supervision.

use std::net::{Ipv4Addr, SocketAddr};

use thiserror::Error;

use crate::protocol::codec::ProtocolError;

/// Errors raised while creating, configuring, or supervising sockets.
#[derive(Debug, Error)]
pub enum NetError {
    /// The local port is already bound by another socket.
    #[error("port busy: {addr} is already in use")]
    BindConflict { addr: SocketAddr },

    /// Every candidate port in the retry window was busy.
    #[error("no free UDP port in {first_port}..={last_port} after {attempts} attempt(s)")]
    BindExhausted {
        first_port: u16,
        last_port: u16,
        attempts: u16,
    },

    /// Binding failed for a reason other than a port conflict.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The group could not be joined on the given local interface.
    ///
    /// `interface` is `0.0.0.0` when joining on the wildcard interface.
    #[error("failed to join multicast group {group} on interface {interface}: {source}")]
    JoinFailure {
        group: Ipv4Addr,
        interface: Ipv4Addr,
        #[source]
        source: std::io::Error,
    },

    /// Dropping a membership failed; the socket is still released.
    #[error("failed to leave multicast group {group} on interface {interface}: {source}")]
    LeaveFailure {
        group: Ipv4Addr,
        interface: Ipv4Addr,
        #[source]
        source: std::io::Error,
    },

    /// A socket could not be created or an option could not be applied.
    #[error("socket setup failed: {0}")]
    Socket(#[source] std::io::Error),

    /// A datagram could not be sent.
    #[error("failed to send to {addr}: {source}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An outbound message could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A supervised listener task panicked.
    #[error("listener task '{name}' panicked")]
    TaskPanicked { name: &'static str },
}

impl NetError {
    /// Returns `true` if the error is a busy-port conflict.
    pub fn is_bind_conflict(&self) -> bool {
        matches!(self, NetError::BindConflict { .. })
    }
}
