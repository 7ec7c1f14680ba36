// ── Runtime poller configuration ──
//
// Describes *which* device to poll and *how often*. Carries credentials
// but never touches disk; `omvly-config` builds these from a profile.

use std::time::Duration;

use secrecy::SecretString;

/// Connection settings for one device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Host name or address, optionally `host:port` or a full URL.
    pub host: String,
    pub username: String,
    pub password: SecretString,
    /// Talk HTTPS instead of HTTP.
    pub use_ssl: bool,
    /// Validate the device certificate. Self-signed appliances need `false`.
    pub verify_ssl: bool,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            username: "admin".into(),
            password: SecretString::from(String::new()),
            use_ssl: false,
            verify_ssl: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration for a single poller instance.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Display name; also keys the update topic.
    pub name: String,
    pub device: DeviceConfig,
    /// Cadence of the hardware/plugin/disk cycle.
    pub fast_interval: Duration,
    /// Cadence of the full inventory cycle.
    pub slow_interval: Duration,
    /// How long the fast cycle waits for the snapshot before giving up.
    pub fast_lock_wait: Duration,
    /// How long the slow cycle waits for the snapshot before giving up.
    pub slow_lock_wait: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            name: "OpenMediaVault".into(),
            device: DeviceConfig::default(),
            fast_interval: Duration::from_secs(60),
            slow_interval: Duration::from_secs(3600),
            fast_lock_wait: Duration::from_secs(30),
            slow_lock_wait: Duration::from_secs(10),
        }
    }
}
