//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use omvly_config::ConfigError;
use omvly_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to device at {url}")]
    #[diagnostic(
        code(omvly::connection_failed),
        help(
            "Check that the device is running and reachable.\n\
             Reason: {reason}\n\
             Try: omvly snapshot --ssl, or the plain-HTTP port of the device"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(omvly::auth_failed),
        help(
            "Verify the username and password.\n\
             Run: omvly config set-password --profile <name>"
        )
    )]
    AuthFailed { message: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(omvly::no_credentials),
        help(
            "Store one with: omvly config set-password --profile {profile}\n\
             Or set the OMVLY_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Device ───────────────────────────────────────────────────────
    #[error("Device rejected {call}: {message}")]
    #[diagnostic(code(omvly::rpc))]
    Rpc { call: String, message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(omvly::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(omvly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(omvly::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Add one under [profiles.<name>] in the config file, or pass --host."
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(omvly::no_config),
        help(
            "Pass --host (or set OMVLY_HOST), or add a profile to the config file.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(omvly::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out")]
    #[diagnostic(
        code(omvly::timeout),
        help("Increase timeout with --timeout or check device responsiveness.")
    )]
    Timeout,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(omvly::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(omvly::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } | Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout => CliError::Timeout,
            CoreError::Rpc {
                service,
                method,
                message,
            } => CliError::Rpc {
                call: format!("{service}.{method}"),
                message,
            },
            CoreError::Api { message, status: _ } => CliError::ApiError { message },
            CoreError::Schema { schema, message } => CliError::ApiError {
                message: format!("schema '{schema}': {message}"),
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: "(none)".into(),
            },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            other => CliError::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let err = CliError::from(CoreError::ConnectionFailed {
            url: "http://nas.local/rpc.php".into(),
            reason: "refused".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONNECTION);

        let err = CliError::from(CoreError::AuthenticationFailed {
            message: "bad password".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);

        assert_eq!(CliError::from(CoreError::Timeout).exit_code(), exit_code::TIMEOUT);
    }

    #[test]
    fn config_errors_keep_their_meaning() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "garage".into(),
        });
        assert!(matches!(err, CliError::NoCredentials { ref profile } if profile == "garage"));
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let err = CliError::from(ConfigError::Validation {
            field: "host".into(),
            reason: "empty".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn rpc_rejection_names_the_call() {
        let err = CliError::from(CoreError::Rpc {
            service: "FileSystemMgmt".into(),
            method: "enumerateMountedFilesystems".into(),
            message: "denied".into(),
        });
        assert_eq!(
            err.to_string(),
            "Device rejected FileSystemMgmt.enumerateMountedFilesystems: denied"
        );
    }
}
