//! Socket primitives shared by the host and client halves.
//!
//! # Sub-modules
//!
//! - **`bind`** – UDP bind helpers.  `bind_udp_with_retry` walks upward from
//!   a preferred port when it is busy, up to a bounded number of attempts.
//!
//! - **`membership`** – [`MulticastMembership`]: a UDP socket bound to the
//!   wildcard address and joined to a multicast group, on the wildcard
//!   interface or on each configured interface.
//!
//! - **`task`** – [`ListenerHandle`]: a supervised listener task with an
//!   explicit stop signal that unblocks any pending accept or receive.
//!
//! - **`error`** – [`NetError`], which keeps "port busy" and "cannot join the
//!   group on this interface" apart so startup failures are actionable.
//!
//! All functions that hand back a Tokio socket must be called from inside a
//! Tokio runtime.

pub mod bind;
pub mod error;
pub mod membership;
pub mod task;

pub use bind::{bind_udp, bind_udp_with_retry, classify_bind_error, into_tokio};
pub use error::NetError;
pub use membership::MulticastMembership;
pub use task::{ListenerHandle, ShutdownSignal};

/// Returns `true` for OS timeout / would-block errors that should be retried.
pub fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
