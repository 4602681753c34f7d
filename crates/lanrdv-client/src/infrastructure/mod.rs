//! Infrastructure layer for the client.
//!
//! **Dependency rule**: this layer may depend on `domain` and `lanrdv_core`,
//! but MUST NOT be imported by `lanrdv_core`.
//!
//! - **`network`** – The discovery probe (UDP) and the rendezvous handshake
//!   (TCP).

pub mod network;
