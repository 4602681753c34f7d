//! Domain layer for the client.
//!
//! - **`config`** – [`ClientConfig`](config::ClientConfig), the single source
//!   of truth for one round's settings.

pub mod config;

pub use config::ClientConfig;
