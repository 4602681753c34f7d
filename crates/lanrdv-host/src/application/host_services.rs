//! HostServices: runs the discovery responder and the rendezvous server.
//!
//! The two listeners are independent.  They share nothing except the
//! read-only [`IdentityProvider`], and each is owned by its own
//! [`ListenerHandle`]:
//!
//! ```text
//! HostServices::start(settings, identity)
//!   ├─ DiscoveryResponder  (UDP, multicast group or unicast address)
//!   └─ RendezvousServer    (TCP, rendezvous port)
//! ```
//!
//! Startup is all-or-nothing: if the rendezvous port cannot be bound, the
//! responder that was already started is stopped before the error is
//! returned.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lanrdv_core::domain::group::DEFAULT_RENDEZVOUS_PORT;
use lanrdv_core::{IdentityProvider, ListenerHandle, MulticastGroup, NetError};
use tracing::{info, warn};

use crate::infrastructure::network::rendezvous::DEFAULT_GREETING_TIMEOUT;
use crate::infrastructure::network::{DiscoveryResponder, RendezvousServer};

/// Where the discovery responder receives probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEndpoint {
    /// Join a multicast group (normal operation).
    Multicast(MulticastGroup),
    /// Listen on a plain unicast address.
    Unicast(SocketAddr),
}

/// Everything needed to start both listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    pub discovery: DiscoveryEndpoint,
    pub rendezvous_addr: SocketAddr,
    pub greeting_timeout: Duration,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            discovery: DiscoveryEndpoint::Multicast(MulticastGroup::default()),
            rendezvous_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_RENDEZVOUS_PORT)),
            greeting_timeout: DEFAULT_GREETING_TIMEOUT,
        }
    }
}

/// The running host: one responder and one rendezvous server.
#[derive(Debug)]
pub struct HostServices {
    responder: ListenerHandle,
    rendezvous: ListenerHandle,
}

impl HostServices {
    /// Starts the discovery responder, then the rendezvous server.
    ///
    /// Must be called from inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the first [`NetError`] hit while starting either listener.
    /// Nothing is left running on error.
    pub async fn start(
        settings: &HostSettings,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, NetError> {
        let responder = match &settings.discovery {
            DiscoveryEndpoint::Multicast(group) => {
                DiscoveryResponder::start(group, Arc::clone(&identity))?
            }
            DiscoveryEndpoint::Unicast(addr) => {
                DiscoveryResponder::start_unicast(*addr, Arc::clone(&identity))?
            }
        };

        let rendezvous = match RendezvousServer::bind(
            settings.rendezvous_addr,
            identity,
            settings.greeting_timeout,
        )
        .await
        .and_then(RendezvousServer::spawn)
        {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(stop_err) = responder.stop().await {
                    warn!("stopping discovery responder after failed startup: {stop_err}");
                }
                return Err(e);
            }
        };

        info!(
            "host services running: discovery on {}, rendezvous on {}",
            responder.local_addr(),
            rendezvous.local_addr()
        );
        Ok(Self {
            responder,
            rendezvous,
        })
    }

    pub fn responder(&self) -> &ListenerHandle {
        &self.responder
    }

    pub fn rendezvous(&self) -> &ListenerHandle {
        &self.rendezvous
    }

    /// Splits the services so each listener can be stopped on its own.
    ///
    /// Returns `(responder, rendezvous)`.
    pub fn into_parts(self) -> (ListenerHandle, ListenerHandle) {
        (self.responder, self.rendezvous)
    }

    /// Stops both listeners and waits for them to exit.
    ///
    /// Both are stopped even if the first one fails to join cleanly.
    ///
    /// # Errors
    ///
    /// Returns the first [`NetError::TaskPanicked`] encountered.
    pub async fn stop(self) -> Result<(), NetError> {
        self.responder.request_stop();
        self.rendezvous.request_stop();

        let responder = self.responder.join().await;
        let rendezvous = self.rendezvous.join().await;
        info!("host services stopped");
        responder.and(rendezvous)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
