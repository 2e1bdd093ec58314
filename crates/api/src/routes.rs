// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Routes module
//!
//! This module provides route configuration and handlers for the NFT API server.

pub mod handlers;

use axum::{Router, routing::get};
use handlers::{health_handler, nfts_handler, ws_handler};

use crate::{
    metrics::metrics_handler,
    openapi::{openapi_spec, swagger_ui},
    state::ServerState,
};

/// Create application routes
pub fn create_routes() -> Router<ServerState> {
    let health_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler));

    let docs_routes = Router::new()
        .route("/api-doc/openapi.json", get(openapi_spec))
        .route("/swagger-ui", get(swagger_ui));

    let api_routes = Router::new().route("/nfts/{address}", get(nfts_handler));

    Router::new()
        .merge(health_routes)
        .merge(docs_routes)
        .route("/ws", get(ws_handler))
        .nest("/v1", api_routes)
}
