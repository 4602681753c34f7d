//! # lanrdv-core
//!
//! Shared library for LAN discovery and rendezvous.  Both the host half
//! (multicast responder + TCP rendezvous server) and the client half
//! (multicast probe + TCP rendezvous client) build on this crate.
//!
//! # How a rendezvous works
//!
//! ```text
//! client                                   host(s)
//! ──────                                   ───────
//! ANNOUNCE:<tag>  ──UDP multicast──▶  DiscoveryResponder
//!                 ◀──UDP unicast────  ANNOUNCE-REPLY:<identity>
//! (collect source addresses until the round ends)
//! HELLO:<tag>     ──TCP────────────▶  RendezvousServer
//!                 ◀──TCP────────────  WELCOME:<identity>
//! ```
//!
//! The crate is split into three modules:
//!
//! - **`domain`** – Plain value types: the [`MulticastGroup`] a host listens
//!   on, the [`PeerRecord`] produced by a discovery round, and the
//!   [`IdentityProvider`] seam that supplies identity strings.
//!
//! - **`protocol`** – The tagged text wire schema.  Every datagram and TCP
//!   message is `<KIND>:<body>`; parsing is driven by the kind so malformed
//!   or unexpected messages are rejected rather than mis-compared.
//!
//! - **`net`** – Socket primitives shared by both halves: multicast
//!   membership, bind-with-retry, and the supervised [`ListenerHandle`]
//!   that owns a long-running listener task.

pub mod domain;
pub mod net;
pub mod protocol;

pub use domain::group::{GroupError, MulticastGroup};
pub use domain::identity::{default_client_tag, HostnameIdentity, IdentityProvider, StaticIdentity};
pub use domain::peer::PeerRecord;
pub use net::error::NetError;
pub use net::membership::MulticastMembership;
pub use net::task::{ListenerHandle, ShutdownSignal};
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::{MessageKind, WireMessage};
