//! Network infrastructure for the host.
//!
//! # Sub-modules
//!
//! - **`responder`** – Receives `ANNOUNCE` probes on the multicast group and
//!   answers each one with a unicast `ANNOUNCE-REPLY` to the probe's observed
//!   source address.
//!
//! - **`rendezvous`** – Accepts TCP connections, reads one `HELLO` greeting
//!   per connection, writes one `WELCOME` reply, and closes.

pub mod rendezvous;
pub mod responder;

pub use rendezvous::RendezvousServer;
pub use responder::DiscoveryResponder;
