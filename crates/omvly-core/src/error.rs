// ── Core error types ──
//
// Errors surfaced by omvly-core constructors and one-shot helpers.
// Scheduled cycles never return these; they log and move on.
// The `From<omvly_api::Error>` impl folds transport failures into
// domain-level variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Device request timed out")]
    Timeout,

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device rejected {service}.{method}: {message}")]
    Rpc {
        service: String,
        method: String,
        message: String,
    },

    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    // ── Setup errors ─────────────────────────────────────────────────
    #[error("Invalid schema '{schema}': {message}")]
    Schema {
        schema: &'static str,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<omvly_api::Error> for CoreError {
    fn from(err: omvly_api::Error) -> Self {
        match err {
            omvly_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            omvly_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            omvly_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            omvly_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            omvly_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            omvly_api::Error::Rpc { code, message } => CoreError::Api {
                message: format!("RPC error {code}: {message}"),
                status: None,
            },
            omvly_api::Error::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            omvly_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("Deserialization error: {message}"),
                status: None,
            },
        }
    }
}

impl CoreError {
    /// Attach the failing call to an RPC-level error.
    pub(crate) fn rpc(service: &str, method: &str, err: omvly_api::Error) -> Self {
        match err {
            omvly_api::Error::Rpc { message, .. } => CoreError::Rpc {
                service: service.to_owned(),
                method: method.to_owned(),
                message,
            },
            other => other.into(),
        }
    }
}
