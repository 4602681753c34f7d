//! Multicast discovery responder.
//!
//! The host joins the multicast group on the discovery port and answers
//! `ANNOUNCE` probes sent by clients.  On receiving a valid probe it:
//!
//! 1. Parses the client tag from the payload.
//! 2. Asks the [`IdentityProvider`] for the current host identity.
//! 3. Sends `ANNOUNCE-REPLY:<identity>` as a unicast datagram to the
//!    probe's source address as observed by the socket.
//!
//! # Why the observed source address?
//!
//! The reply goes to the address the kernel reports for the datagram, never
//! to anything written inside the payload.  Behind NAT, or from a host with
//! several interfaces, an address a client writes about itself is often not
//! the one that can reach it.
//!
//! # No authentication
//!
//! Any host on the segment can trigger a reply, and any host can forge one.
//! Replies are candidates for rendezvous, not proof of identity.
//!
//! # Shutdown
//!
//! The receive loop races `recv_from` against the listener's
//! [`ShutdownSignal`], so stopping the [`ListenerHandle`] ends the loop even
//! when no datagrams are arriving.  Membership is left on the way out.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lanrdv_core::net::{bind_udp, into_tokio, is_timeout_error};
use lanrdv_core::protocol::codec::decode_expected;
use lanrdv_core::protocol::messages::MAX_MESSAGE_LEN;
use lanrdv_core::{
    encode_message, IdentityProvider, ListenerHandle, MessageKind, MulticastGroup,
    MulticastMembership, NetError, ProtocolError, ShutdownSignal, WireMessage,
};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Receive buffer size: one byte more than the largest valid message, so an
/// oversize datagram shows up as too long instead of being silently cut.
const RECV_BUFFER_LEN: usize = MAX_MESSAGE_LEN + 1;

/// Pause after a failed receive so a persistent socket error does not spin.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Where probes are received.
#[derive(Debug)]
enum ProbeEndpoint {
    /// Joined to a multicast group (normal operation).
    Multicast(MulticastMembership),
    /// Plain unicast socket, for hosts without a multicast route and tests.
    Unicast(UdpSocket),
}

impl ProbeEndpoint {
    fn socket(&self) -> &UdpSocket {
        match self {
            ProbeEndpoint::Multicast(membership) => membership.socket(),
            ProbeEndpoint::Unicast(socket) => socket,
        }
    }

    fn close(self) {
        if let ProbeEndpoint::Multicast(membership) = self {
            if let Err(e) = membership.leave() {
                warn!("discovery responder shutdown: {e}");
            }
        }
    }
}

/// Answers discovery probes with the host's identity.
pub struct DiscoveryResponder {
    endpoint: ProbeEndpoint,
    identity: Arc<dyn IdentityProvider>,
}

impl DiscoveryResponder {
    /// Joins `group` on its port and spawns the receive loop.
    ///
    /// Must be called from inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::BindConflict`] if the port is held exclusively by
    /// another socket, or [`NetError::JoinFailure`] if the group cannot be
    /// joined on one of the configured interfaces.
    pub fn start(
        group: &MulticastGroup,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<ListenerHandle, NetError> {
        Self::join(group, identity)?.spawn()
    }

    /// Binds a unicast socket on `addr` and spawns the receive loop.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::BindConflict`] or [`NetError::BindFailed`].
    pub fn start_unicast(
        addr: SocketAddr,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<ListenerHandle, NetError> {
        Self::bind_unicast(addr, identity)?.spawn()
    }

    /// Joins `group` without starting the loop.
    ///
    /// # Errors
    ///
    /// See [`DiscoveryResponder::start`].
    pub fn join(
        group: &MulticastGroup,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, NetError> {
        let membership = MulticastMembership::join(group, group.port())?;
        debug!("discovery responder joined {group} on {:?}", membership.interfaces());
        Ok(Self {
            endpoint: ProbeEndpoint::Multicast(membership),
            identity,
        })
    }

    /// Binds a unicast socket without starting the loop.
    ///
    /// # Errors
    ///
    /// See [`DiscoveryResponder::start_unicast`].
    pub fn bind_unicast(
        addr: SocketAddr,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, NetError> {
        let socket = into_tokio(bind_udp(addr)?)?;
        Ok(Self {
            endpoint: ProbeEndpoint::Unicast(socket),
            identity,
        })
    }

    /// The local address probes are received on.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Socket`] if the OS cannot report the address.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.endpoint.socket().local_addr().map_err(NetError::Socket)
    }

    /// Spawns the receive loop as a supervised listener.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Socket`] if the local address cannot be read.
    pub fn spawn(self) -> Result<ListenerHandle, NetError> {
        let local_addr = self.local_addr()?;
        info!("discovery responder listening on UDP {local_addr}");
        Ok(ListenerHandle::spawn(
            "discovery-responder",
            local_addr,
            move |shutdown| self.run(shutdown),
        ))
    }

    /// The receive loop.  Runs until `shutdown` fires.
    async fn run(self, mut shutdown: ShutdownSignal) {
        let DiscoveryResponder { endpoint, identity } = self;
        let mut buf = vec![0u8; RECV_BUFFER_LEN];

        {
            let socket = endpoint.socket();
            loop {
                let received = tokio::select! {
                    _ = shutdown.requested() => break,
                    received = socket.recv_from(&mut buf) => received,
                };

                let (len, src) = match received {
                    Ok(pair) => pair,
                    Err(e) => {
                        let Some(pause) = recv_error_backoff(&e) else {
                            continue;
                        };
                        // e.g. ICMP port-unreachable surfaced as ConnectionReset on Windows.
                        warn!("discovery recv error: {e}");
                        tokio::select! {
                            _ = shutdown.requested() => break,
                            _ = tokio::time::sleep(pause) => continue,
                        }
                    }
                };

                match build_reply(&buf[..len], identity.as_ref()) {
                    Ok((client_tag, reply)) => {
                        debug!("announce from {src}: client_tag={client_tag}");
                        if let Err(e) = socket.send_to(&reply, src).await {
                            warn!("failed to send ANNOUNCE-REPLY to {src}: {e}");
                        }
                    }
                    Err(e) => {
                        debug!("discarding datagram from {src}: {e}");
                    }
                }
            }
        }

        endpoint.close();
        info!("discovery responder stopped");
    }
}

/// How long the receive loop waits before retrying after `e`.
///
/// `None` means retry at once: a timed-out receive is not a failure.
fn recv_error_backoff(e: &io::Error) -> Option<Duration> {
    if is_timeout_error(e) {
        None
    } else {
        Some(RECV_ERROR_BACKOFF)
    }
}

/// Parses a probe and builds the encoded reply.
///
/// Returns the client tag together with the reply bytes.
///
/// # Errors
///
/// Returns [`ProtocolError`] if `datagram` is not an `ANNOUNCE` probe, or if
/// the identity is not a valid message body.
pub fn build_reply(
    datagram: &[u8],
    identity: &dyn IdentityProvider,
) -> Result<(String, Vec<u8>), ProtocolError> {
    let client_tag = decode_expected(datagram, MessageKind::Announce)?;
    let reply = encode_message(&WireMessage::AnnounceReply {
        host_identity: identity.identity(),
    })?;
    Ok((client_tag, reply))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
