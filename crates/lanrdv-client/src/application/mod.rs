//! Application layer use cases for the client.
//!
//! - **`discover_and_connect`** – One discovery round followed by a
//!   rendezvous with every peer found, collected into a
//!   [`RendezvousReport`](discover_and_connect::RendezvousReport).

pub mod discover_and_connect;

pub use discover_and_connect::{DiscoverAndConnect, RendezvousEntry, RendezvousReport};
