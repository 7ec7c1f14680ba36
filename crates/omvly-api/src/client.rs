// OpenMediaVault JSON-RPC client
//
// Wraps `reqwest::Client` with the `/rpc.php` envelope, cookie-based
// session tracking, and reconnection-edge bookkeeping. Session login and
// logout live in `session.rs` to keep this module focused on transport
// mechanics.

use std::sync::atomic::{AtomicBool, Ordering};

use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, RPC_SESSION_NOT_AUTHENTICATED, RPC_SESSION_TIMEOUT};
use crate::rpc::{RpcEnvelope, RpcErrorBody, RpcRequest, RpcTransport};
use crate::transport::TransportConfig;

const RPC_PATH: &str = "rpc.php";

/// Raw HTTP client for the device's JSON-RPC API.
///
/// Logs in lazily: the first [`query`](Self::query) (or any query after the
/// session broke) performs `Session.login` before the actual call. A login
/// that follows a lost session raises the reconnection flag read by
/// [`has_reconnected`](RpcTransport::has_reconnected).
pub struct OmvClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
    connected: AtomicBool,
    /// Set after the first successful login; distinguishes a first
    /// connection from a reconnection.
    ever_connected: AtomicBool,
    reconnected: AtomicBool,
    /// Serializes logins so concurrent callers don't race the session cookie.
    login_lock: tokio::sync::Mutex<()>,
}

impl OmvClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// automatically (the session id travels as a cookie). `base_url` is the
    /// device root, e.g. `https://nas.local`.
    pub fn new(
        base_url: Url,
        username: impl Into<String>,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        Ok(Self::with_client(http, base_url, username, password))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            http,
            base_url,
            username: username.into(),
            password,
            connected: AtomicBool::new(false),
            ever_connected: AtomicBool::new(false),
            reconnected: AtomicBool::new(false),
            login_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &SecretString {
        &self.password
    }

    /// Full URL of the RPC endpoint.
    pub(crate) fn rpc_url(&self) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{RPC_PATH}"))?)
    }

    // ── Session state ────────────────────────────────────────────────

    /// Log in unless a usable session already exists.
    pub async fn connect(&self) -> Result<(), Error> {
        let _guard = self.login_lock.lock().await;
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        match self.login().await {
            Ok(()) => {
                self.connected.store(true, Ordering::SeqCst);
                if self.ever_connected.swap(true, Ordering::SeqCst) {
                    info!(host = %self.base_url, "session re-established");
                    self.reconnected.store(true, Ordering::SeqCst);
                }
                Ok(())
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Drop the session flag so the next query logs in again.
    pub(crate) fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!(host = %self.base_url, "session marked disconnected");
        }
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Issue one RPC call, (re)logging in first when the session is down.
    ///
    /// Errors that break the session flip [`connected`](RpcTransport::connected)
    /// to `false`; the call itself is never retried.
    pub async fn query(
        &self,
        service: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, Error> {
        if !self.connected.load(Ordering::SeqCst) {
            self.connect().await?;
        }

        match self.call(service, method, params.unwrap_or(Value::Null)).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.breaks_session() {
                    warn!(service, method, error = %e, "RPC call failed, dropping session");
                    self.mark_disconnected();
                } else {
                    debug!(service, method, error = %e, "RPC call returned an error");
                }
                Err(e)
            }
        }
    }

    /// Send one RPC request and unwrap the envelope. No session handling.
    pub(crate) async fn call(
        &self,
        service: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, Error> {
        let url = self.rpc_url()?;
        debug!(service, method, "POST {}", url);

        let body = RpcRequest {
            service,
            method,
            params,
            options: None,
        };
        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_envelope(resp).await
    }
}

impl RpcTransport for OmvClient {
    async fn query(
        &self,
        service: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, Error> {
        OmvClient::query(self, service, method, params).await
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn has_reconnected(&self) -> bool {
        self.reconnected.swap(false, Ordering::SeqCst)
    }
}

/// Parse the `{ response, error }` envelope.
///
/// The device reports RPC failures with an `error` object, sometimes with
/// HTTP 200 and sometimes with 4xx/5xx; the body wins over the status.
async fn parse_envelope(resp: reqwest::Response) -> Result<Value, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;

    match serde_json::from_str::<RpcEnvelope>(&body) {
        Ok(envelope) => {
            if let Some(err) = envelope.error {
                return Err(rpc_error(err));
            }
            if status.is_success() {
                Ok(envelope.response)
            } else {
                Err(http_error(status, &body))
            }
        }
        Err(_) if status == reqwest::StatusCode::UNAUTHORIZED => Err(Error::SessionExpired),
        Err(_) if !status.is_success() => Err(http_error(status, &body)),
        Err(e) => Err(Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        }),
    }
}

fn rpc_error(err: RpcErrorBody) -> Error {
    match err.code {
        RPC_SESSION_NOT_AUTHENTICATED | RPC_SESSION_TIMEOUT => Error::SessionExpired,
        code => Error::Rpc {
            code,
            message: err.message.unwrap_or_else(|| format!("code {code}")),
        },
    }
}

fn http_error(status: reqwest::StatusCode, body: &str) -> Error {
    Error::Http {
        status: status.as_u16(),
        message: preview(body),
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OmvClient {
        OmvClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://nas.local/").expect("valid url"),
            "admin",
            SecretString::from("secret".to_string()),
        )
    }

    #[test]
    fn rpc_url_appends_endpoint() {
        let url = client().rpc_url().expect("valid url");
        assert_eq!(url.as_str(), "https://nas.local/rpc.php");
    }

    #[test]
    fn fresh_client_is_disconnected_without_reconnect_edge() {
        let c = client();
        assert!(!RpcTransport::connected(&c));
        assert!(!c.has_reconnected());
    }

    #[test]
    fn session_codes_map_to_session_expired() {
        let err = rpc_error(RpcErrorBody {
            code: RPC_SESSION_TIMEOUT,
            message: Some("Session timeout.".into()),
        });
        assert!(matches!(err, Error::SessionExpired));

        let err = rpc_error(RpcErrorBody {
            code: 1000,
            message: None,
        });
        assert!(matches!(err, Error::Rpc { code: 1000, .. }));
    }

    #[test]
    fn mark_disconnected_is_idempotent() {
        let c = client();
        c.connected.store(true, Ordering::SeqCst);
        c.mark_disconnected();
        c.mark_disconnected();
        assert!(!RpcTransport::connected(&c));
    }

    #[test]
    fn reconnect_edge_reads_once() {
        let c = client();
        c.reconnected.store(true, Ordering::SeqCst);
        assert!(tokio_test::block_on(async { c.has_reconnected() }));
        assert!(!c.has_reconnected());
    }
}
