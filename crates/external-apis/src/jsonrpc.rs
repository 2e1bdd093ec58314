// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! JSON-RPC 2.0 plumbing shared by the HTTP and websocket transports

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use api_client::SourceError;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;
use tracing::trace;

/// Outgoing JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    /// Request id, echoed back in the response
    pub id: u64,
    method: &'a str,
    params: Value,
}

impl<'a> JsonRpcRequest<'a> {
    /// Build a request
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// Incoming JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Id of the request this answers
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    /// Whether this response answers request `id`
    pub fn answers(&self, id: u64) -> bool {
        self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }

    /// Extract the typed result; a JSON `null` result is passed to `T` as is
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, RpcError> {
        if let Some(error) = self.error {
            return Err(RpcError::Remote {
                code: error.code,
                message: error.message,
            });
        }
        serde_json::from_value(self.result.unwrap_or(Value::Null)).map_err(RpcError::Decode)
    }
}

/// Errors raised by a JSON-RPC exchange
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum RpcError {
    /// Transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("endpoint returned status {status}")]
    Status { status: u16 },

    /// Request did not complete in time
    #[error("request timeout")]
    Timeout { seconds: u64 },

    /// Response body was not the expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The node answered with an error object
    #[error("RPC error {code}: {message}")]
    Remote { code: i64, message: String },
}

impl From<RpcError> for SourceError {
    fn from(value: RpcError) -> Self {
        match value {
            RpcError::Http(error) => SourceError::Http {
                message: error.to_string(),
            },
            RpcError::Status { status } => SourceError::Http {
                message: format!("endpoint returned status {status}"),
            },
            RpcError::Timeout { seconds } => SourceError::Timeout {
                timeout_seconds: seconds,
            },
            RpcError::Decode(error) => SourceError::InvalidResponse {
                message: error.to_string(),
            },
            RpcError::Remote { code, message } => SourceError::Rpc { code, message },
        }
    }
}

/// JSON-RPC over HTTP POST
#[derive(Debug)]
pub struct HttpJsonRpc {
    client: Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpJsonRpc {
    /// Create a client whose calls are bounded by `request_timeout`
    pub fn new(request_timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent("nft-api/0.1.0")
            .build()?;

        Ok(Self {
            client,
            timeout: request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Call `method` on the node at `url`
    pub async fn call<T: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        trace!(url, method, id, "sending JSON-RPC request");

        let response = timeout(self.timeout, self.client.post(url).json(&request).send())
            .await
            .map_err(|_| RpcError::Timeout {
                seconds: self.timeout.as_secs(),
            })??;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let response: JsonRpcResponse = serde_json::from_slice(&body)?;
        response.into_result()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, method},
    };

    use super::*;

    #[test]
    fn request_shape() {
        let request = JsonRpcRequest::new(7, "eth_chainId", json!([]));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 7, "method": "eth_chainId", "params": []})
        );
    }

    #[test]
    fn null_result_decodes_as_none() {
        let response: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": null})).unwrap();
        assert!(response.answers(1));
        let result: Option<String> = response.into_result().unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn error_object_becomes_remote_error() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .unwrap();

        let error = response.into_result::<String>().unwrap_err();
        assert!(matches!(error, RpcError::Remote { code: -32601, .. }));
        assert!(matches!(SourceError::from(error), SourceError::Rpc { .. }));
    }

    #[tokio::test]
    async fn http_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_chainId"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "0x504"})),
            )
            .mount(&server)
            .await;

        let rpc = HttpJsonRpc::new(Duration::from_secs(5)).unwrap();
        let chain_id: String = rpc
            .call(&server.uri(), "eth_chainId", json!([]))
            .await
            .unwrap();
        assert_eq!(chain_id, "0x504");
    }

    #[tokio::test]
    async fn http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let rpc = HttpJsonRpc::new(Duration::from_secs(5)).unwrap();
        let result = rpc
            .call::<String>(&server.uri(), "eth_chainId", json!([]))
            .await;
        assert!(matches!(result, Err(RpcError::Status { status: 503 })));
    }
}
