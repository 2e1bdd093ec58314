// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP and websocket request handlers
//!
//! Both query surfaces run the same aggregation. The websocket surface pushes every
//! snapshot as a JSON text frame and closes once the final one is out; the HTTP
//! surface returns only the final snapshot.

use axum::{
    Json,
    extract::{
        Path, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use external_apis::{ChannelReporter, NoopReporter};
use shared_types::NftSnapshot;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    error::ServerError,
    metrics,
    state::{HealthCheck, ServerState},
};

const SNAPSHOT_BUFFER: usize = 16;

/// Health check endpoint handler
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    summary = "Health check endpoint",
    description = "Returns the service version, environment and the data sources every query is dispatched to.",
    responses(
        (status = 200, description = "Service is up or degraded", body = HealthCheck)
    )
)]
pub async fn health_handler(State(state): State<ServerState>) -> Json<HealthCheck> {
    Json(state.health_check())
}

/// One-shot ownership query
///
/// Runs the full aggregation and returns the final snapshot. A rejected address is
/// still a 200; the snapshot's `error` field says why.
///
/// # Errors
///
/// Returns `ServerError::ShuttingDown` if the server stops while the query runs.
#[utoipa::path(
    get,
    path = "/v1/nfts/{address}",
    tag = "nfts",
    summary = "Query NFT ownership",
    description = "Queries every data source applicable to the address and returns the merged result.",
    params(
        ("address" = String, Path, description = "SS58, raw public key or 0x-prefixed EVM address")
    ),
    responses(
        (status = 200, description = "Final snapshot, possibly carrying a top-level error", body = NftSnapshot),
        (status = 503, description = "Server is shutting down", body = String)
    )
)]
pub async fn nfts_handler(
    State(state): State<ServerState>,
    Path(address): Path<String>,
) -> Result<Json<NftSnapshot>, ServerError> {
    let outcome = tokio::select! {
        outcome = state.aggregator().query(&address, &NoopReporter) => outcome,
        () = state.cancellation_token.cancelled() => return Err(ServerError::ShuttingDown),
    };

    metrics::record_query(&outcome);
    Ok(Json(outcome.snapshot))
}

/// Progressive ownership query over a websocket
///
/// The first text frame is taken as the address.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: ServerState) {
    let token = state.cancellation_token.clone();

    let address = tokio::select! {
        address = next_address(&mut socket) => address,
        () = token.cancelled() => None,
    };
    let Some(address) = address else {
        debug!("websocket closed before an address arrived");
        return;
    };

    {
        let (reporter, receiver) = ChannelReporter::channel(SNAPSHOT_BUFFER);
        let query = async {
            let outcome = state.aggregator().query(&address, &reporter).await;
            metrics::record_query(&outcome);
        };
        let forward = forward_snapshots(&mut socket, receiver);

        tokio::select! {
            ((), sent) = async { tokio::join!(query, forward) } => {
                debug!(address = %address, sent, "websocket query finished");
            }
            () = token.cancelled() => {
                info!(address = %address, "websocket query cancelled by shutdown");
            }
        }
    }

    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: Utf8Bytes::from_static("query finished"),
    }));
    if let Err(e) = socket.send(close).await {
        debug!(error = %e, "websocket close failed");
    }
}

async fn next_address(socket: &mut WebSocket) -> Option<String> {
    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
            Ok(Message::Close(_)) => return None,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "websocket receive failed");
                return None;
            }
        }
    }
    None
}

/// Push snapshots until the reporter closes or the client goes away
async fn forward_snapshots(
    socket: &mut WebSocket,
    mut receiver: mpsc::Receiver<NftSnapshot>,
) -> usize {
    let mut sent = 0;
    while let Some(snapshot) = receiver.recv().await {
        let text = match serde_json::to_string(&snapshot) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to serialize snapshot");
                continue;
            }
        };
        if let Err(e) = socket.send(Message::Text(text.into())).await {
            debug!(error = %e, "websocket client went away");
            break;
        }
        sent += 1;
    }
    sent
}
