//! Application layer use cases for the host.
//!
//! - **`host_services`** – Starts the discovery responder and the rendezvous
//!   server from one set of [`HostSettings`](host_services::HostSettings) and
//!   keeps their handles so the process can stop them together or apart.

pub mod host_services;
