//! TOML-based configuration persistence for the host.
//!
//! Reads and writes `HostConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\lanrdv\host.toml`
//! - Linux:    `~/.config/lanrdv/host.toml`
//! - macOS:    `~/Library/Application Support/lanrdv/host.toml`
//!
//! Example:
//!
//! ```toml
//! [host]
//! identity = "den-pc"
//! log_level = "debug"
//!
//! [discovery]
//! group = "239.5.0.5"
//! port = 1505
//! ttl = 30
//! interfaces = ["192.168.1.20"]
//!
//! [rendezvous]
//! port = 2505
//! greeting_timeout_ms = 5000
//! ```
//!
//! Every field carries `#[serde(default = ...)]`, so a missing file, a
//! missing section, or a missing key all fall back to the built-in defaults.
//! Values are kept as strings on disk and validated in
//! [`HostConfig::to_settings`], so a typo is reported with the field name.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lanrdv_core::domain::group::{
    DEFAULT_GROUP_ADDR, DEFAULT_MULTICAST_PORT, DEFAULT_RENDEZVOUS_PORT, DEFAULT_TTL,
};
use lanrdv_core::{GroupError, HostnameIdentity, IdentityProvider, MulticastGroup, StaticIdentity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::host_services::{DiscoveryEndpoint, HostSettings};

/// File name inside the platform config directory.
const CONFIG_FILE_NAME: &str = "host.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An address field does not hold a valid IP address.
    #[error("invalid address in `{field}`: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    /// The multicast group settings are invalid.
    #[error("invalid multicast group: {0}")]
    Group(#[from] GroupError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level host configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub rendezvous: RendezvousSection,
}

/// General host behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSection {
    /// Identity sent in replies.  Absent means "use the OS host name".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Multicast discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoverySection {
    /// Multicast group address (class D).
    #[serde(default = "default_group")]
    pub group: String,
    /// UDP port probes are sent to.
    #[serde(default = "default_multicast_port")]
    pub port: u16,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    /// Local IPv4 interfaces to join on.  Empty joins on the wildcard interface.
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Loop outgoing multicast back to local sockets.
    #[serde(default = "default_true")]
    pub loopback: bool,
    /// Listen on this unicast address instead of joining the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicast_address: Option<String>,
}

/// TCP rendezvous settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RendezvousSection {
    /// IP address to bind the listener to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_rendezvous_port")]
    pub port: u16,
    /// How long a connected client may take to send its greeting.
    #[serde(default = "default_greeting_timeout_ms")]
    pub greeting_timeout_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_group() -> String {
    DEFAULT_GROUP_ADDR.to_string()
}
fn default_multicast_port() -> u16 {
    DEFAULT_MULTICAST_PORT
}
fn default_ttl() -> u32 {
    DEFAULT_TTL
}
fn default_true() -> bool {
    true
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_rendezvous_port() -> u16 {
    DEFAULT_RENDEZVOUS_PORT
}
fn default_greeting_timeout_ms() -> u64 {
    5_000
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            identity: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            group: default_group(),
            port: default_multicast_port(),
            ttl: default_ttl(),
            interfaces: Vec::new(),
            loopback: default_true(),
            unicast_address: None,
        }
    }
}

impl Default for RendezvousSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_rendezvous_port(),
            greeting_timeout_ms: default_greeting_timeout_ms(),
        }
    }
}

// ── Conversion to runtime settings ────────────────────────────────────────────

impl HostConfig {
    /// Validates the file values and converts them into [`HostSettings`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] for an unparsable address and
    /// [`ConfigError::Group`] for an invalid group, port or TTL.
    pub fn to_settings(&self) -> Result<HostSettings, ConfigError> {
        let discovery = match &self.discovery.unicast_address {
            Some(addr) => DiscoveryEndpoint::Unicast(SocketAddr::new(
                parse_ip("discovery.unicast_address", addr)?,
                self.discovery.port,
            )),
            None => DiscoveryEndpoint::Multicast(self.multicast_group()?),
        };

        let bind_ip = parse_ip("rendezvous.bind_address", &self.rendezvous.bind_address)?;

        Ok(HostSettings {
            discovery,
            rendezvous_addr: SocketAddr::new(bind_ip, self.rendezvous.port),
            greeting_timeout: Duration::from_millis(self.rendezvous.greeting_timeout_ms),
        })
    }

    /// Builds the identity provider: the configured identity if set and
    /// non-blank, otherwise the OS host name.
    pub fn identity_provider(&self) -> Arc<dyn IdentityProvider> {
        match self.host.identity.as_deref().map(str::trim) {
            Some(identity) if !identity.is_empty() => Arc::new(StaticIdentity::new(identity)),
            _ => Arc::new(HostnameIdentity::detect()),
        }
    }

    fn multicast_group(&self) -> Result<MulticastGroup, ConfigError> {
        let address = parse_ipv4("discovery.group", &self.discovery.group)?;
        let interfaces = self
            .discovery
            .interfaces
            .iter()
            .map(|iface| parse_ipv4("discovery.interfaces", iface))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MulticastGroup::new(address, self.discovery.port)?
            .with_ttl(self.discovery.ttl)?
            .with_interfaces(interfaces)
            .with_loopback(self.discovery.loopback))
    }
}

fn parse_ip(field: &'static str, value: &str) -> Result<IpAddr, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

fn parse_ipv4(field: &'static str, value: &str) -> Result<Ipv4Addr, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Loads `HostConfig` from the platform config file, returning
/// `HostConfig::default()` if the file does not yet exist.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<HostConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `HostConfig` from `path`, returning the defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<HostConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: HostConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HostConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the platform config file and returns its path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined, or any error from [`save_config_to`].
pub fn save_config(config: &HostConfig) -> Result<PathBuf, ConfigError> {
    let path = config_file_path()?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &HostConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config directory, including the `lanrdv` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("lanrdv"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("lanrdv"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("lanrdv")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("lanrdv_test_{}", Uuid::new_v4()))
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_host_config_default_has_expected_ports() {
        // Arrange / Act
        let cfg = HostConfig::default();

        // Assert
        assert_eq!(cfg.discovery.group, "239.5.0.5");
        assert_eq!(cfg.discovery.port, 1505);
        assert_eq!(cfg.discovery.ttl, 30);
        assert_eq!(cfg.rendezvous.port, 2505);
    }

    #[test]
    fn test_host_section_default_log_level_is_info() {
        let cfg = HostSection::default();
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.identity.is_none());
    }

    // ── TOML parsing ──────────────────────────────────────────────────────────

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: HostConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, HostConfig::default());
    }

    #[test]
    fn test_deserialize_partial_discovery_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[discovery]
port = 9999
interfaces = ["10.0.0.5"]
"#;

        // Act
        let cfg: HostConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.discovery.port, 9999);
        assert_eq!(cfg.discovery.interfaces, vec!["10.0.0.5".to_string()]);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.discovery.ttl, 30);
        assert_eq!(cfg.rendezvous.greeting_timeout_ms, 5_000);
    }

    #[test]
    fn test_serialized_default_omits_unset_identity() {
        let toml_str = toml::to_string_pretty(&HostConfig::default()).expect("serialize");

        assert!(!toml_str.contains("identity"), "None identity must be omitted");
        assert!(!toml_str.contains("unicast_address"));
    }

    // ── to_settings ───────────────────────────────────────────────────────────

    #[test]
    fn test_to_settings_default_is_multicast_on_standard_ports() {
        // Act
        let settings = HostConfig::default().to_settings().unwrap();

        // Assert
        assert_eq!(settings, HostSettings::default());
    }

    #[test]
    fn test_to_settings_applies_interfaces_and_ttl() {
        // Arrange
        let mut cfg = HostConfig::default();
        cfg.discovery.interfaces = vec!["192.168.1.20".to_string()];
        cfg.discovery.ttl = 4;

        // Act
        let settings = cfg.to_settings().unwrap();

        // Assert
        let DiscoveryEndpoint::Multicast(group) = settings.discovery else {
            panic!("expected multicast discovery");
        };
        assert_eq!(group.ttl(), 4);
        assert_eq!(group.interfaces(), &[Ipv4Addr::new(192, 168, 1, 20)]);
    }

    #[test]
    fn test_to_settings_unicast_address_replaces_group() {
        let mut cfg = HostConfig::default();
        cfg.discovery.unicast_address = Some("127.0.0.1".to_string());

        let settings = cfg.to_settings().unwrap();

        assert_eq!(
            settings.discovery,
            DiscoveryEndpoint::Unicast("127.0.0.1:1505".parse().unwrap())
        );
    }

    #[test]
    fn test_to_settings_rejects_non_multicast_group() {
        let mut cfg = HostConfig::default();
        cfg.discovery.group = "192.168.1.1".to_string();

        let result = cfg.to_settings();

        assert!(matches!(
            result,
            Err(ConfigError::Group(GroupError::NotMulticast(_)))
        ));
    }

    #[test]
    fn test_to_settings_names_the_bad_field() {
        let mut cfg = HostConfig::default();
        cfg.rendezvous.bind_address = "not-an-ip".to_string();

        let result = cfg.to_settings();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidAddress { field: "rendezvous.bind_address", .. })
        ));
    }

    #[test]
    fn test_to_settings_rejects_zero_ttl() {
        let mut cfg = HostConfig::default();
        cfg.discovery.ttl = 0;

        assert!(matches!(
            cfg.to_settings(),
            Err(ConfigError::Group(GroupError::InvalidTtl(0)))
        ));
    }

    // ── Identity ──────────────────────────────────────────────────────────────

    #[test]
    fn test_identity_provider_prefers_configured_identity() {
        let mut cfg = HostConfig::default();
        cfg.host.identity = Some("  den-pc ".to_string());

        assert_eq!(cfg.identity_provider().identity(), "den-pc");
    }

    #[test]
    fn test_blank_identity_falls_back_to_hostname() {
        let mut cfg = HostConfig::default();
        cfg.host.identity = Some("   ".to_string());

        let identity = cfg.identity_provider().identity();

        assert_eq!(identity, HostnameIdentity::detect().name());
    }

    // ── Load / save ───────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let path = temp_dir().join(CONFIG_FILE_NAME);

        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg, HostConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let dir = temp_dir();
        let path = dir.join("nested").join(CONFIG_FILE_NAME);
        let mut cfg = HostConfig::default();
        cfg.rendezvous.port = 12345;
        cfg.host.log_level = "debug".to_string();
        cfg.host.identity = Some("den-pc".to_string());

        // Act
        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_config_to_replaces_an_existing_file() {
        // Arrange
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[rendezvous]\nport = 4000\n").unwrap();
        let mut cfg = load_config_from(&path).unwrap();
        cfg.discovery.ttl = 4;

        // Act
        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded.rendezvous.port, 4000);
        assert_eq!(loaded.discovery.ttl, 4);
        assert_eq!(loaded, cfg);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_from_malformed_file_is_parse_error() {
        // Arrange
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_host_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("lanrdv/host.toml") || path.ends_with("lanrdv\\host.toml"),
                "unexpected config path {path:?}"
            );
        }
        // NoPlatformConfigDir in a stripped CI env is also acceptable.
    }
}
