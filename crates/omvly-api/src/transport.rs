// Shared transport configuration for building reqwest::Client instances.
//
// TLS, timeout, and cookie settings for the RPC client live here so the
// session logic in `client.rs` never touches builder details.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use url::Url;

use crate::error::Error;

/// TLS verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Accept any certificate (for self-signed appliances).
    DangerAcceptInvalid,
}

impl TlsMode {
    /// Map the device-level "verify SSL" flag onto a TLS mode.
    pub fn from_verify(verify: bool) -> Self {
        if verify {
            Self::System
        } else {
            Self::DangerAcceptInvalid
        }
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    pub cookie_jar: Option<Arc<Jar>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(30),
            cookie_jar: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("omvly/", env!("CARGO_PKG_VERSION")));

        if self.tls == TlsMode::DangerAcceptInvalid {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref jar) = self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Create a config with a fresh cookie jar (for session auth).
    pub fn with_cookie_jar(mut self) -> Self {
        self.cookie_jar = Some(Arc::new(Jar::default()));
        self
    }
}

/// Build the device base URL from a bare host (optionally `host:port`).
///
/// Hosts that already carry a scheme are parsed as-is.
pub fn device_url(host: &str, use_ssl: bool) -> Result<Url, Error> {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        return Ok(Url::parse(host)?);
    }
    let scheme = if use_ssl { "https" } else { "http" };
    Ok(Url::parse(&format!("{scheme}://{host}"))?)
}
