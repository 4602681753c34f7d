//! Domain module: plain value types shared by both halves.
//!
//! Nothing in here touches a socket.  The `net` module and the host/client
//! crates consume these types.

pub mod group;
pub mod identity;
pub mod peer;

pub use group::{GroupError, MulticastGroup};
pub use identity::{default_client_tag, HostnameIdentity, IdentityProvider, StaticIdentity};
pub use peer::PeerRecord;
