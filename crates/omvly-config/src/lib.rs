//! Shared configuration for omvly.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `omvly_core::PollerConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use omvly_core::{DeviceConfig, PollerConfig};

/// Keyring service name for stored passwords.
const KEYRING_SERVICE: &str = "omvly";

/// Environment variable overriding every other password source.
pub const PASSWORD_ENV: &str = "OMVLY_PASSWORD";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "OMVLY_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Output format: "json" or "yaml".
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between hardware/plugin/disk cycles.
    #[serde(default = "default_fast_interval")]
    pub fast_interval: u64,

    /// Seconds between full inventory cycles.
    #[serde(default = "default_slow_interval")]
    pub slow_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            fast_interval: default_fast_interval(),
            slow_interval: default_slow_interval(),
        }
    }
}

fn default_output() -> String {
    "json".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_fast_interval() -> u64 {
    60
}
fn default_slow_interval() -> u64 {
    3600
}

/// A named device profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Host name or address of the device, optionally with a port.
    pub host: String,

    /// Display name; defaults to the profile name.
    pub name: Option<String>,

    #[serde(default = "default_username")]
    pub username: String,

    /// Password (plaintext — prefer keyring or env var).
    pub password: Option<String>,

    #[serde(default)]
    pub use_ssl: bool,

    #[serde(default)]
    pub verify_ssl: bool,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override fast cadence (seconds).
    pub fast_interval: Option<u64>,

    /// Override slow cadence (seconds).
    pub slow_interval: Option<u64>,
}

fn default_username() -> String {
    "admin".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `OMVLY_CONFIG`, else platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "omvly", "omvly").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("omvly");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. Missing files yield the defaults.
///
/// `OMVLY_`-prefixed variables override file values; nested keys use a
/// double underscore (`OMVLY_DEFAULTS__TIMEOUT=5`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed("OMVLY_")
                .ignore(&["PASSWORD", "CONFIG", "LOG"])
                .split("__"),
        );

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/password"),
    )?)
}

/// Resolve the device password: env var → system keyring → plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Env var
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 2. Keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password.expose_secret())?;
    Ok(())
}

/// Build a `PollerConfig` from a profile and the global defaults.
pub fn profile_to_poller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<PollerConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("profile '{profile_name}' has no host"),
        });
    }

    let fast = profile.fast_interval.unwrap_or(defaults.fast_interval);
    let slow = profile.slow_interval.unwrap_or(defaults.slow_interval);
    if fast == 0 || slow == 0 {
        return Err(ConfigError::Validation {
            field: "interval".into(),
            reason: "poll intervals must be at least one second".into(),
        });
    }

    let password = resolve_password(profile, profile_name)?;
    let device = DeviceConfig {
        host: profile.host.clone(),
        username: profile.username.clone(),
        password,
        use_ssl: profile.use_ssl,
        verify_ssl: profile.verify_ssl,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    };

    Ok(PollerConfig {
        name: profile
            .name
            .clone()
            .unwrap_or_else(|| profile_name.to_owned()),
        device,
        fast_interval: Duration::from_secs(fast),
        slow_interval: Duration::from_secs(slow),
        ..PollerConfig::default()
    })
}
