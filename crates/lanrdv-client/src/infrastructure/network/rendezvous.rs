//! Rendezvous client: one `HELLO`/`WELCOME` exchange per peer.
//!
//! Each exchange opens a fresh TCP connection, writes the greeting, reads the
//! reply until the host closes the connection, and returns the host's
//! identity.  Connect, write and read together are bounded by one timeout,
//! so an unresponsive peer costs at most that long.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use lanrdv_core::protocol::codec::decode_expected;
use lanrdv_core::protocol::messages::MAX_MESSAGE_LEN;
use lanrdv_core::{encode_message, MessageKind, ProtocolError, WireMessage};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Why a rendezvous with one peer failed.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The TCP connection could not be opened (e.g. refused).
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The exchange did not finish in time.
    #[error("no reply from {addr} within {after:?}")]
    TimedOut { addr: SocketAddr, after: Duration },
    /// Writing the greeting or reading the reply failed.
    #[error("I/O error talking to {addr}: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The greeting could not be encoded, or the reply was not a `WELCOME`.
    #[error("malformed exchange with {addr}: {source}")]
    Malformed {
        addr: SocketAddr,
        #[source]
        source: ProtocolError,
    },
    /// The host closed the connection without replying.
    #[error("{addr} closed the connection without replying")]
    Closed { addr: SocketAddr },
}

impl HandshakeError {
    /// The peer address the failure refers to.
    pub fn addr(&self) -> SocketAddr {
        match self {
            HandshakeError::Connect { addr, .. }
            | HandshakeError::TimedOut { addr, .. }
            | HandshakeError::Io { addr, .. }
            | HandshakeError::Malformed { addr, .. }
            | HandshakeError::Closed { addr } => *addr,
        }
    }
}

/// Performs one rendezvous with `peer` on `port` and returns its identity.
///
/// # Errors
///
/// Returns a [`HandshakeError`] describing the failure.  Nothing is retried.
pub async fn handshake(
    peer: IpAddr,
    port: u16,
    client_tag: &str,
    timeout: Duration,
) -> Result<String, HandshakeError> {
    let addr = SocketAddr::new(peer, port);
    let greeting = encode_message(&WireMessage::Hello {
        client_tag: client_tag.to_string(),
    })
    .map_err(|source| HandshakeError::Malformed { addr, source })?;

    let reply = tokio::time::timeout(timeout, exchange(addr, &greeting))
        .await
        .map_err(|_| HandshakeError::TimedOut {
            addr,
            after: timeout,
        })??;

    if reply.is_empty() {
        return Err(HandshakeError::Closed { addr });
    }
    decode_expected(&reply, MessageKind::Welcome)
        .map_err(|source| HandshakeError::Malformed { addr, source })
}

/// Runs [`handshake`] for every peer, in order, one at a time.
///
/// Returns exactly one entry per input peer, in input order.  A failure at
/// one peer never prevents attempts at later ones.
pub async fn handshake_all(
    peers: &[IpAddr],
    port: u16,
    client_tag: &str,
    timeout: Duration,
) -> Vec<(IpAddr, Result<String, HandshakeError>)> {
    let mut results = Vec::with_capacity(peers.len());
    for &peer in peers {
        let result = handshake(peer, port, client_tag, timeout).await;
        match &result {
            Ok(identity) => info!("rendezvous with {peer}: identity={identity}"),
            Err(e) => warn!("rendezvous with {peer} failed: {e}"),
        }
        results.push((peer, result));
    }
    results
}

/// Connects, sends `greeting`, and reads the reply to EOF.
///
/// At most `MAX_MESSAGE_LEN + 1` bytes are read, so an oversize reply is
/// reported by the decoder rather than buffered without bound.
async fn exchange(addr: SocketAddr, greeting: &[u8]) -> Result<Vec<u8>, HandshakeError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|source| HandshakeError::Connect { addr, source })?;
    debug!("connected to {addr}");

    let io_err = |source: std::io::Error| HandshakeError::Io { addr, source };
    stream.write_all(greeting).await.map_err(io_err)?;

    let mut reply = Vec::new();
    (&mut stream)
        .take(MAX_MESSAGE_LEN as u64 + 1)
        .read_to_end(&mut reply)
        .await
        .map_err(io_err)?;
    Ok(reply)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
