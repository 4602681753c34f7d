//! TCP rendezvous server: accept loop and per-connection greeting exchange.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured rendezvous port.
//! 2. Accepting connections from clients that found this host via discovery.
//! 3. For each connection, on its own Tokio task:
//!    - reading one bounded `HELLO:<tag>` greeting,
//!    - writing one `WELCOME:<identity>` reply,
//!    - closing the connection.
//! 4. Stopping when the [`ListenerHandle`]'s stop signal fires.
//!
//! No state survives a connection.  Connection tasks share only the
//! read-only identity provider and timeout.
//!
//! # Greeting framing
//!
//! A greeting is whatever the first successful `read` returns, up to
//! [`MAX_MESSAGE_LEN`] bytes.  Greetings are a few dozen bytes and arrive in a
//! single segment on a LAN; a greeting that does not parse as `HELLO` is
//! logged and the connection is closed without a reply.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lanrdv_core::net::classify_bind_error;
use lanrdv_core::protocol::codec::decode_expected;
use lanrdv_core::protocol::messages::MAX_MESSAGE_LEN;
use lanrdv_core::{
    encode_message, IdentityProvider, ListenerHandle, MessageKind, NetError, ProtocolError,
    ShutdownSignal, WireMessage,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Default bound on how long a connected client may take to greet.
pub const DEFAULT_GREETING_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a failed `accept` so a persistent error does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Why a single connection ended without a completed exchange.
#[derive(Debug, Error)]
pub enum GreetingError {
    /// The client did not greet (or drain the reply) in time.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    /// The client closed the connection before greeting.
    #[error("connection closed before greeting")]
    Closed,
    /// The greeting did not parse as `HELLO`, or the reply could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Answers rendezvous greetings with the host's identity.
pub struct RendezvousServer {
    listener: TcpListener,
    identity: Arc<dyn IdentityProvider>,
    greeting_timeout: Duration,
}

impl RendezvousServer {
    /// Binds `0.0.0.0:port` and spawns the accept loop with the default
    /// greeting timeout.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::BindConflict`] if the port is in use, or
    /// [`NetError::BindFailed`] for other bind failures.
    pub async fn serve(
        port: u16,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<ListenerHandle, NetError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        Self::bind(addr, identity, DEFAULT_GREETING_TIMEOUT)
            .await?
            .spawn()
    }

    /// Binds the listener without starting the accept loop.
    ///
    /// # Errors
    ///
    /// See [`RendezvousServer::serve`].
    pub async fn bind(
        addr: SocketAddr,
        identity: Arc<dyn IdentityProvider>,
        greeting_timeout: Duration,
    ) -> Result<Self, NetError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| classify_bind_error(addr, source))?;
        Ok(Self {
            listener,
            identity,
            greeting_timeout,
        })
    }

    /// The local address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Socket`] if the OS cannot report the address.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.listener.local_addr().map_err(NetError::Socket)
    }

    /// Spawns the accept loop as a supervised listener.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Socket`] if the local address cannot be read.
    pub fn spawn(self) -> Result<ListenerHandle, NetError> {
        let local_addr = self.local_addr()?;
        info!("rendezvous server listening on TCP {local_addr}");
        Ok(ListenerHandle::spawn(
            "rendezvous-server",
            local_addr,
            move |shutdown| self.run(shutdown),
        ))
    }

    /// The accept loop.  Runs until `shutdown` fires.
    async fn run(self, mut shutdown: ShutdownSignal) {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.requested() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer_addr)) => {
                    debug!("rendezvous connection from {peer_addr}");
                    let identity = Arc::clone(&self.identity);
                    let greeting_timeout = self.greeting_timeout;
                    let mut conn_shutdown = shutdown.clone();

                    // One task per connection so a slow client never blocks others.
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = conn_shutdown.requested() => {
                                debug!("dropping rendezvous connection from {peer_addr} on shutdown");
                            }
                            _ = handle_connection(stream, peer_addr, identity, greeting_timeout) => {}
                        }
                    });
                }
                Err(e) => {
                    // Transient accept error (e.g., too many open file descriptors).
                    error!("rendezvous accept error: {e}");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        info!("rendezvous server stopped");
    }
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Runs one greeting exchange and logs the outcome.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    identity: Arc<dyn IdentityProvider>,
    greeting_timeout: Duration,
) {
    match exchange_greeting(&mut stream, identity.as_ref(), greeting_timeout).await {
        Ok(client_tag) => info!("rendezvous with {peer_addr}: client_tag={client_tag}"),
        Err(GreetingError::Protocol(e)) => {
            warn!("rendezvous with {peer_addr} rejected: {e}");
        }
        Err(e) => debug!("rendezvous with {peer_addr} ended early: {e}"),
    }
}

/// Reads one `HELLO` greeting from `stream`, writes the `WELCOME` reply and
/// shuts down the write side.
///
/// Returns the client tag from the greeting.  Each of the read and the write
/// is bounded by `greeting_timeout`.
///
/// # Errors
///
/// Returns [`GreetingError`] describing why no reply was sent, or why it could
/// not be delivered.
pub async fn exchange_greeting<S>(
    stream: &mut S,
    identity: &dyn IdentityProvider,
    greeting_timeout: Duration,
) -> Result<String, GreetingError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; MAX_MESSAGE_LEN + 1];
    let len = timeout(greeting_timeout, stream.read(&mut buf))
        .await
        .map_err(|_| GreetingError::TimedOut(greeting_timeout))??;
    if len == 0 {
        return Err(GreetingError::Closed);
    }

    let client_tag = decode_expected(&buf[..len], MessageKind::Hello)?;
    let reply = encode_message(&WireMessage::Welcome {
        host_identity: identity.identity(),
    })?;

    timeout(greeting_timeout, async {
        stream.write_all(&reply).await?;
        stream.shutdown().await
    })
    .await
    .map_err(|_| GreetingError::TimedOut(greeting_timeout))??;

    Ok(client_tag)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use lanrdv_core::StaticIdentity;
    use tokio::io::duplex;

    const SHORT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_exchange_greeting_replies_with_identity() {
        // Arrange
        let (mut client, mut server) = duplex(4096);
        let identity = StaticIdentity::new("den-pc");
        client.write_all(b"HELLO:laptop").await.unwrap();

        // Act
        let tag = exchange_greeting(&mut server, &identity, SHORT).await.unwrap();

        // Assert
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(tag, "laptop");
        assert_eq!(reply, b"WELCOME:den-pc");
    }

    #[tokio::test]
    async fn test_exchange_greeting_writes_exactly_one_reply() {
        // Arrange: the mock fails the test on any unexpected write.
        let mut stream = tokio_test::io::Builder::new()
            .read(b"HELLO:laptop\r\n")
            .write(b"WELCOME:den-pc")
            .build();

        // Act
        let tag = exchange_greeting(&mut stream, &StaticIdentity::new("den-pc"), SHORT)
            .await
            .unwrap();

        // Assert
        assert_eq!(tag, "laptop");
    }

    #[tokio::test]
    async fn test_exchange_greeting_rejects_wrong_kind_without_reply() {
        // Arrange
        let (mut client, mut server) = duplex(4096);
        let identity = StaticIdentity::new("den-pc");
        client.write_all(b"ANNOUNCE:laptop").await.unwrap();

        // Act
        let result = exchange_greeting(&mut server, &identity, SHORT).await;
        drop(server);

        // Assert
        assert!(matches!(
            result,
            Err(GreetingError::Protocol(ProtocolError::UnexpectedKind { .. }))
        ));
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty(), "no reply for a rejected greeting");
    }

    #[tokio::test]
    async fn test_exchange_greeting_times_out_on_silent_client() {
        let (_client, mut server) = duplex(4096);
        let identity = StaticIdentity::new("den-pc");

        let result = exchange_greeting(&mut server, &identity, SHORT).await;

        assert!(matches!(result, Err(GreetingError::TimedOut(d)) if d == SHORT));
    }

    #[tokio::test]
    async fn test_exchange_greeting_reports_early_close() {
        let (client, mut server) = duplex(4096);
        drop(client);
        let identity = StaticIdentity::new("den-pc");

        let result = exchange_greeting(&mut server, &identity, SHORT).await;

        assert!(matches!(result, Err(GreetingError::Closed)));
    }

    #[tokio::test]
    async fn test_exchange_greeting_rejects_oversize_greeting() {
        // Arrange: one byte past the limit.
        let (mut client, mut server) = duplex(8192);
        let mut greeting = b"HELLO:".to_vec();
        greeting.resize(MAX_MESSAGE_LEN + 1, b'x');
        client.write_all(&greeting).await.unwrap();

        // Act
        let result = exchange_greeting(&mut server, &StaticIdentity::new("h"), SHORT).await;

        // Assert
        assert!(matches!(
            result,
            Err(GreetingError::Protocol(ProtocolError::MessageTooLong { .. }))
        ));
    }

    #[tokio::test]
    async fn test_serve_on_busy_port_is_a_bind_conflict() {
        let holder = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = holder.local_addr().unwrap().port();

        let result = RendezvousServer::serve(port, Arc::new(StaticIdentity::new("x"))).await;

        assert!(matches!(result, Err(NetError::BindConflict { .. })));
    }
}
