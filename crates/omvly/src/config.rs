//! CLI configuration -- thin wrapper around `omvly_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--host, --username, --ssl, --timeout).

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use omvly_config::{
    Config, Profile, config_path, load_config, profile_to_poller_config,
    store_password,
};
use omvly_core::PollerConfig;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Apply flag overrides on top of a profile.
fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(ref username) = global.username {
        profile.username.clone_from(username);
    }
    profile.use_ssl |= global.ssl;
    profile.verify_ssl |= global.verify_ssl;
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
    profile
}

/// Build a `PollerConfig` from the config file, profile, and CLI overrides.
///
/// Without a matching profile the device must come from `--host`. A config
/// file that exists but does not parse is an error, not an empty config.
pub fn build_poller_config(
    global: &GlobalOpts,
    fast_interval: Option<u64>,
    slow_interval: Option<u64>,
) -> Result<PollerConfig, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let base = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.host.is_some() => Profile {
            username: "admin".into(),
            ..Profile::default()
        },
        None if global.profile.is_some() => {
            let available: Vec<_> = cfg.profiles.keys().cloned().collect();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    let mut profile = apply_overrides(base, global);
    if fast_interval.is_some() {
        profile.fast_interval = fast_interval;
    }
    if slow_interval.is_some() {
        profile.slow_interval = slow_interval;
    }

    Ok(profile_to_poller_config(&profile, &profile_name, &cfg.defaults)?)
}
