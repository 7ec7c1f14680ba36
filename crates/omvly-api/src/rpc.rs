// JSON-RPC envelope types and the transport seam used by the poller.
//
// Every call is a POST of `{service, method, params, options}` to
// `/rpc.php`; the device answers with `{response, error}`.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Request body sent to the RPC endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub service: &'a str,
    pub method: &'a str,
    pub params: Value,
    pub options: Option<Value>,
}

/// Response envelope. Exactly one of `response` / `error` carries data.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcEnvelope {
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

/// The device-facing side of the poller.
///
/// Implemented by [`OmvClient`](crate::OmvClient) for real devices and by
/// scripted fakes in tests. Failed calls are returned, never retried.
pub trait RpcTransport: Send + Sync + 'static {
    /// Issue one RPC call and return the unwrapped `response` value.
    fn query(
        &self,
        service: &str,
        method: &str,
        params: Option<Value>,
    ) -> impl Future<Output = Result<Value, Error>> + Send;

    /// Whether the last call (or login) left the session usable.
    fn connected(&self) -> bool;

    /// `true` exactly once after each reconnection edge, then resets.
    fn has_reconnected(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_serializes_null_options() {
        let body = RpcRequest {
            service: "System",
            method: "getInformation",
            params: Value::Null,
            options: None,
        };
        let encoded = serde_json::to_value(&body).expect("serializable");
        assert_eq!(
            encoded,
            json!({
                "service": "System",
                "method": "getInformation",
                "params": null,
                "options": null
            })
        );
    }

    #[test]
    fn envelope_tolerates_missing_members() {
        let env: RpcEnvelope = serde_json::from_value(json!({ "response": [1, 2] }))
            .expect("valid envelope");
        assert!(env.error.is_none());
        assert_eq!(env.response, json!([1, 2]));

        let env: RpcEnvelope = serde_json::from_value(json!({
            "response": null,
            "error": { "code": 5001, "message": "Session not authenticated." }
        }))
        .expect("valid envelope");
        assert_eq!(env.error.map(|e| e.code), Some(5001));
    }
}
