//! lanrdv-host library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the host do?
//!
//! A host makes itself findable and reachable on the local network by
//! running two independent listeners:
//!
//! 1. A **discovery responder** joined to the multicast group.  Each
//!    `ANNOUNCE:<tag>` probe is answered with `ANNOUNCE-REPLY:<identity>`,
//!    sent straight back to the address the probe arrived from.
//! 2. A **rendezvous server** on a fixed TCP port.  Each connection carries
//!    one `HELLO:<tag>` greeting and gets one `WELCOME:<identity>` reply
//!    before the host closes it.

/// Application layer: the use case that runs both listeners.
pub mod application;

/// Infrastructure layer: sockets and configuration storage.
pub mod infrastructure;
