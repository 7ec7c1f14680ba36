use thiserror::Error;

/// RPC error code for a request made without an authenticated session.
pub const RPC_SESSION_NOT_AUTHENTICATED: i64 = 5001;
/// RPC error code for a session that timed out on the device.
pub const RPC_SESSION_TIMEOUT: i64 = 5002;

/// Top-level error type for the `omvly-api` crate.
///
/// Covers every failure mode of the JSON-RPC surface: authentication,
/// transport, RPC-level errors reported by the device, and malformed
/// response bodies. `omvly-core` maps these into its own error type.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, account disabled, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The device rejected the session cookie (expired or never issued).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── RPC ─────────────────────────────────────────────────────────
    /// Error object returned in the `{"response", "error"}` envelope.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Non-success HTTP status without a parseable RPC error body.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the session can no longer be used after this error.
    ///
    /// RPC errors for a single call (unknown device file, missing plugin)
    /// leave the session intact; transport and auth failures do not.
    pub fn breaks_session(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. }
                | Self::SessionExpired
                | Self::Transport(_)
                | Self::Tls(_)
                | Self::Http { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_errors_keep_the_session() {
        let err = Error::Rpc {
            code: 1000,
            message: "No such device".into(),
        };
        assert!(!err.breaks_session());
    }

    #[test]
    fn auth_errors_break_the_session() {
        assert!(Error::SessionExpired.breaks_session());
        assert!(
            Error::Http {
                status: 502,
                message: "bad gateway".into()
            }
            .breaks_session()
        );
    }
}
