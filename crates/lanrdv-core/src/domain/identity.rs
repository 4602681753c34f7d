//! Identity strings carried in replies and greetings.
//!
//! Identities are opaque labels.  The host half asks an [`IdentityProvider`]
//! for one each time it answers a probe or a greeting, so a provider may
//! return a different value over time (e.g. after a rename).

use uuid::Uuid;

/// Fallback identity when the OS host name cannot be read.
const FALLBACK_HOST_IDENTITY: &str = "lanrdv-host";

/// Supplies the identity string a host puts in its replies.
///
/// Implemented for [`StaticIdentity`], [`HostnameIdentity`], and any
/// `Fn() -> String` closure.
#[cfg_attr(test, mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// Returns the identity to send in the next reply.
    fn identity(&self) -> String;
}

impl<F> IdentityProvider for F
where
    F: Fn() -> String + Send + Sync,
{
    fn identity(&self) -> String {
        self()
    }
}

/// A fixed identity string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity(String);

impl StaticIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }
}

impl IdentityProvider for StaticIdentity {
    fn identity(&self) -> String {
        self.0.clone()
    }
}

/// The local host name, read once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameIdentity {
    name: String,
}

impl HostnameIdentity {
    /// Reads the OS host name, falling back to a fixed label if it is
    /// unavailable or empty after sanitising.
    pub fn detect() -> Self {
        let raw = hostname::get()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name: sanitize(&raw),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl IdentityProvider for HostnameIdentity {
    fn identity(&self) -> String {
        self.name.clone()
    }
}

/// Generates a fresh client tag of the form `client-<uuid>`.
pub fn default_client_tag() -> String {
    format!("client-{}", Uuid::new_v4().simple())
}

/// Drops control characters so the name is a valid message body.
fn sanitize(raw: &str) -> String {
    let cleaned: String = raw.trim().chars().filter(|c| !c.is_control()).collect();
    if cleaned.is_empty() {
        FALLBACK_HOST_IDENTITY.to_string()
    } else {
        cleaned
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
