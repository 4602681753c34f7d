//! UDP bind helpers with busy-port retry.

use std::net::{IpAddr, SocketAddr};

use tracing::{debug, info};

use crate::net::error::NetError;

/// Binds a UDP socket on `addr`.
///
/// # Errors
///
/// Returns [`NetError::BindConflict`] if the port is in use and
/// [`NetError::BindFailed`] for any other failure.
pub fn bind_udp(addr: SocketAddr) -> Result<std::net::UdpSocket, NetError> {
    std::net::UdpSocket::bind(addr).map_err(|source| classify_bind_error(addr, source))
}

/// Binds a UDP socket on `ip`, starting at `first_port` and moving to the next
/// higher port each time the candidate is busy.
///
/// At most `attempts` ports are tried (at least one).  A `first_port` of 0
/// asks the OS for an ephemeral port and never retries.
///
/// # Errors
///
/// Returns [`NetError::BindExhausted`] when every candidate was busy, or the
/// first non-conflict bind error unchanged.
pub fn bind_udp_with_retry(
    ip: IpAddr,
    first_port: u16,
    attempts: u16,
) -> Result<std::net::UdpSocket, NetError> {
    if first_port == 0 {
        return bind_udp(SocketAddr::new(ip, 0));
    }

    let mut tried: u16 = 0;
    let mut last_port = first_port;

    for offset in 0..attempts.max(1) {
        let Some(port) = first_port.checked_add(offset) else {
            break;
        };
        tried += 1;
        last_port = port;

        match bind_udp(SocketAddr::new(ip, port)) {
            Ok(socket) => {
                if offset > 0 {
                    info!("bound UDP {ip}:{port} after {offset} busy port(s)");
                }
                return Ok(socket);
            }
            Err(NetError::BindConflict { addr }) => {
                debug!("{addr} is busy; trying next port");
            }
            Err(e) => return Err(e),
        }
    }

    Err(NetError::BindExhausted {
        first_port,
        last_port,
        attempts: tried,
    })
}

/// Moves a bound std socket onto the Tokio reactor.
///
/// Must be called from inside a Tokio runtime.
///
/// # Errors
///
/// Returns [`NetError::Socket`] if the socket cannot be made non-blocking or
/// registered with the reactor.
pub fn into_tokio(socket: std::net::UdpSocket) -> Result<tokio::net::UdpSocket, NetError> {
    socket.set_nonblocking(true).map_err(NetError::Socket)?;
    tokio::net::UdpSocket::from_std(socket).map_err(NetError::Socket)
}

/// Maps a bind error to [`NetError::BindConflict`] or [`NetError::BindFailed`].
pub fn classify_bind_error(addr: SocketAddr, source: std::io::Error) -> NetError {
    if source.kind() == std::io::ErrorKind::AddrInUse {
        NetError::BindConflict { addr }
    } else {
        NetError::BindFailed { addr, source }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
