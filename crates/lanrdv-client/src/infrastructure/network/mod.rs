//! Network infrastructure for the client.
//!
//! # Sub-modules
//!
//! - **`probe`** – Sends one `ANNOUNCE` probe and collects `ANNOUNCE-REPLY`
//!   datagrams until the configured number of quiet poll windows pass.
//!
//! - **`rendezvous`** – One TCP `HELLO`/`WELCOME` exchange per peer, each
//!   bounded by a timeout, with failures isolated per peer.

pub mod probe;
pub mod rendezvous;

pub use probe::{discover, ProbeClient, ProbeConfig, RoundPolicy};
pub use rendezvous::{handshake, handshake_all, HandshakeError};
