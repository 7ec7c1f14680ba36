// Session authentication
//
// `Session.login` sets the session cookie in the client's jar; every
// later RPC call carries it automatically.

use secrecy::ExposeSecret;
use serde_json::json;
use tracing::debug;

use crate::client::OmvClient;
use crate::error::Error;

impl OmvClient {
    /// Authenticate with the device using the configured credentials.
    ///
    /// `Session.login` answers `{"authenticated": true, ...}` on success.
    /// An explicit `false`, or any RPC error, is reported as
    /// [`Error::Authentication`].
    pub async fn login(&self) -> Result<(), Error> {
        debug!(host = %self.base_url(), user = self.username(), "logging in");

        let params = json!({
            "username": self.username(),
            "password": self.password().expose_secret(),
        });

        let response = self
            .call("Session", "login", params)
            .await
            .map_err(|e| match e {
                Error::Rpc { message, .. } => Error::Authentication { message },
                Error::SessionExpired => Error::Authentication {
                    message: "device refused to open a session".into(),
                },
                other => other,
            })?;

        let authenticated = response
            .get("authenticated")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true);
        if !authenticated {
            return Err(Error::Authentication {
                message: format!("login rejected for user '{}'", self.username()),
            });
        }

        debug!("login successful");
        Ok(())
    }

    /// End the current session.
    pub async fn logout(&self) -> Result<(), Error> {
        debug!(host = %self.base_url(), "logging out");
        let result = self.call("Session", "logout", serde_json::Value::Null).await;
        self.mark_disconnected();
        result.map(|_| ())
    }
}
