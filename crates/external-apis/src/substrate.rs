// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Substrate node connection over a websocket
//!
//! A connection is explicitly acquired per query through a [`ChainStateConnector`] and
//! must be released with [`ChainStateConnection::close`] on every exit path.

use std::{fmt::Debug, time::Duration};

use api_client::SourceError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, trace};

use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

/// Storage queries against a connected node
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainStateConnection: Send {
    /// Up to `count` storage keys starting with `prefix`, after `start_key`
    async fn keys_paged(
        &mut self,
        prefix: &str,
        count: u32,
        start_key: Option<String>,
    ) -> Result<Vec<String>, SourceError>;

    /// Hex-encoded storage value at `key`, if any
    async fn storage(&mut self, key: &str) -> Result<Option<String>, SourceError>;

    /// Release the connection
    async fn close(&mut self) -> Result<(), SourceError>;
}

/// Opens connections to a node
#[async_trait]
pub trait ChainStateConnector: Send + Sync + Debug {
    /// Connect to the node at `endpoint`
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn ChainStateConnection>, SourceError>;
}

/// Connects over `ws://` or `wss://`
#[derive(Debug, Clone)]
pub struct WsConnector {
    request_timeout: Duration,
}

impl WsConnector {
    /// Connector whose handshake and requests are each bounded by `request_timeout`
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

#[async_trait]
impl ChainStateConnector for WsConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn ChainStateConnection>, SourceError> {
        debug!(endpoint, "connecting to node");

        let (stream, _) = timeout(self.request_timeout, connect_async(endpoint))
            .await
            .map_err(|_| SourceError::Timeout {
                timeout_seconds: self.request_timeout.as_secs(),
            })?
            .map_err(|e| SourceError::Connection {
                message: format!("failed to connect to {endpoint}: {e}"),
            })?;

        Ok(Box::new(WsConnection {
            stream,
            request_timeout: self.request_timeout,
            next_id: 1,
        }))
    }
}

/// JSON-RPC session over one websocket
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    request_timeout: Duration,
    next_id: u64,
}

impl Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("request_timeout", &self.request_timeout)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl WsConnection {
    async fn request<T: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<T, SourceError> {
        let id = self.next_id;
        self.next_id += 1;

        let payload = serde_json::to_string(&JsonRpcRequest::new(id, method, params)).map_err(
            |e| SourceError::InvalidResponse {
                message: e.to_string(),
            },
        )?;
        trace!(method, id, "sending node request");

        let seconds = self.request_timeout.as_secs();
        timeout(self.request_timeout, self.exchange(id, payload))
            .await
            .map_err(|_| SourceError::Timeout {
                timeout_seconds: seconds,
            })?
    }

    async fn exchange<T: DeserializeOwned>(
        &mut self,
        id: u64,
        payload: String,
    ) -> Result<T, SourceError> {
        self.stream
            .send(Message::Text(payload.into()))
            .await
            .map_err(connection_error)?;

        while let Some(message) = self.stream.next().await {
            match message.map_err(connection_error)? {
                Message::Text(text) => {
                    let response: JsonRpcResponse = serde_json::from_str(text.as_str())
                        .map_err(|e| SourceError::InvalidResponse {
                            message: e.to_string(),
                        })?;
                    if response.answers(id) {
                        return Ok(response.into_result()?);
                    }
                    trace!(id, "skipping message for another request");
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        Err(SourceError::Connection {
            message: "node closed the connection".to_string(),
        })
    }
}

fn connection_error(error: tokio_tungstenite::tungstenite::Error) -> SourceError {
    SourceError::Connection {
        message: error.to_string(),
    }
}

#[async_trait]
impl ChainStateConnection for WsConnection {
    async fn keys_paged(
        &mut self,
        prefix: &str,
        count: u32,
        start_key: Option<String>,
    ) -> Result<Vec<String>, SourceError> {
        let params = match start_key {
            Some(start_key) => json!([prefix, count, start_key]),
            None => json!([prefix, count]),
        };
        self.request("state_getKeysPaged", params).await
    }

    async fn storage(&mut self, key: &str) -> Result<Option<String>, SourceError> {
        self.request("state_getStorage", json!([key])).await
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.stream.close(None).await.map_err(connection_error)
    }
}
