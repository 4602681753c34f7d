//! lanrdv-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the client do?
//!
//! One run is a *round* in two steps:
//!
//! 1. **Discovery.**  Send one `ANNOUNCE:<tag>` probe to the multicast group
//!    and collect `ANNOUNCE-REPLY` datagrams until the group goes quiet.
//!    Every reply's source address becomes a peer.
//! 2. **Rendezvous.**  Open a TCP connection to each peer's rendezvous port,
//!    send `HELLO:<tag>`, read `WELCOME:<identity>`, and close.
//!
//! A failure at one peer is recorded and the round moves on to the next.

/// Domain layer: client configuration.
pub mod domain;

/// Application layer: the discover-then-connect use case.
pub mod application;

/// Infrastructure layer: the UDP probe and the TCP rendezvous client.
pub mod infrastructure;
