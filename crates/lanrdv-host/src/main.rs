//! lanrdv host: discovery responder plus rendezvous server.
//!
//! # Usage
//!
//! ```text
//! lanrdv-host [OPTIONS]
//!
//! Options:
//!   --config          <PATH>  Config file [default: platform config dir]
//!   --group           <ADDR>  Multicast group address [default: 239.5.0.5]
//!   --port            <PORT>  Multicast (discovery) UDP port [default: 1505]
//!   --rendezvous-port <PORT>  Rendezvous TCP port [default: 2505]
//!   --ttl             <TTL>   Multicast TTL [default: 30]
//!   --interface       <ADDR>  Local interface to join on (repeatable)
//!   --identity        <NAME>  Identity sent in replies [default: host name]
//!   --write-config            Save the effective config to the config file and exit
//! ```
//!
//! Precedence: command line (or `LANRDV_*` environment variable), then the
//! TOML config file, then built-in defaults.
//!
//! ```text
//! main()
//!  └─ load HostConfig, apply CLI overrides
//!  └─ HostServices::start
//!       ├─ DiscoveryResponder  (UDP, multicast group)
//!       └─ RendezvousServer    (TCP, rendezvous port)
//!  └─ wait for Ctrl-C, then HostServices::stop
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lanrdv_host::application::host_services::HostServices;
use lanrdv_host::infrastructure::storage::config::{self, HostConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Answers LAN discovery probes and rendezvous greetings.
#[derive(Debug, Parser)]
#[command(
    name = "lanrdv-host",
    about = "LAN discovery responder and rendezvous server",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    ///
    /// Defaults to `host.toml` in the platform config directory.  A missing
    /// file is not an error.
    #[arg(long, env = "LANRDV_CONFIG")]
    config: Option<PathBuf>,

    /// Multicast group address to join.
    #[arg(long, env = "LANRDV_GROUP")]
    group: Option<String>,

    /// UDP port of the multicast group.
    #[arg(long, env = "LANRDV_PORT")]
    port: Option<u16>,

    /// TCP port for the rendezvous server.
    #[arg(long, env = "LANRDV_RENDEZVOUS_PORT")]
    rendezvous_port: Option<u16>,

    /// Multicast time-to-live.
    #[arg(long, env = "LANRDV_TTL")]
    ttl: Option<u32>,

    /// Local IPv4 interface to join the group on.  Repeat for several.
    #[arg(long = "interface", env = "LANRDV_INTERFACES", value_delimiter = ',')]
    interfaces: Vec<String>,

    /// Identity string sent in replies.
    #[arg(long, env = "LANRDV_IDENTITY")]
    identity: Option<String>,

    /// Write the effective configuration (file plus command line) back to
    /// the config file, then exit without starting the listeners.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Overlays the command-line values on `cfg`.
    fn apply_to(self, mut cfg: HostConfig) -> HostConfig {
        if let Some(group) = self.group {
            cfg.discovery.group = group;
        }
        if let Some(port) = self.port {
            cfg.discovery.port = port;
        }
        if let Some(port) = self.rendezvous_port {
            cfg.rendezvous.port = port;
        }
        if let Some(ttl) = self.ttl {
            cfg.discovery.ttl = ttl;
        }
        if !self.interfaces.is_empty() {
            cfg.discovery.interfaces = self.interfaces;
        }
        if let Some(identity) = self.identity {
            cfg.host.identity = Some(identity);
        }
        cfg
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone();
    let write_config = cli.write_config;

    let file_cfg = match &config_path {
        Some(path) => config::load_config_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => config::load_config().context("failed to load host config")?,
    };
    let cfg = cli.apply_to(file_cfg);

    // `RUST_LOG` wins over the config file's log level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.host.log_level)),
        )
        .init();

    let settings = cfg.to_settings().context("invalid host configuration")?;

    if write_config {
        let written = match &config_path {
            Some(path) => config::save_config_to(&cfg, path).map(|()| path.clone()),
            None => config::save_config(&cfg),
        }
        .context("failed to write host config")?;
        info!("wrote host config to {}", written.display());
        return Ok(());
    }

    let identity = cfg.identity_provider();
    info!("lanrdv host starting as '{}'", identity.identity());

    let services = match HostServices::start(&settings, identity).await {
        Ok(services) => services,
        Err(e) => {
            if e.is_bind_conflict() {
                error!("port already in use: is another lanrdv host running on this machine?");
            }
            return Err(e).context("failed to start host services");
        }
    };

    info!("lanrdv host ready.  Press Ctrl-C to exit.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutdown signal received");

    services.stop().await.context("host services did not stop cleanly")?;
    Ok(())
}
