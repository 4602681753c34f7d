//! Infrastructure layer for the host.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `lanrdv_core`, but MUST NOT be imported by `lanrdv_core`.
//!
//! # Sub-modules
//!
//! - **`network`** – The UDP discovery responder and the TCP rendezvous
//!   server, each run as a supervised listener task.
//!
//! - **`storage`** – TOML configuration file persistence.

pub mod network;
pub mod storage;
