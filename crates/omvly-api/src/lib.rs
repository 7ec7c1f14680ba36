//! Async client for the OpenMediaVault JSON-RPC management API.
//!
//! - **[`OmvClient`]** — session-aware client: lazy `Session.login`,
//!   envelope unwrapping, reconnection-edge tracking.
//! - **[`RpcTransport`]** — the seam the poller in `omvly-core` is generic
//!   over; `OmvClient` implements it, tests substitute scripted fakes.
//! - **[`TransportConfig`]** — TLS, timeout, and cookie settings shared by
//!   every HTTP client built here.

pub mod client;
pub mod error;
pub mod rpc;
mod session;
pub mod transport;

pub use client::OmvClient;
pub use error::Error;
pub use rpc::RpcTransport;
pub use transport::{TlsMode, TransportConfig, device_url};
