// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! NFT API Server Implementation
//!
//! This crate provides the server in front of the NFT ownership aggregator, built with
//! Axum. One query fans out to every data source that can answer for the address and
//! is reported either progressively over a websocket or as a single JSON response.
//!
//! # Module Structure
//!
//! - [`config`]: Server configuration and environment management with hierarchical loading
//! - [`error`]: Error types and HTTP response handling with proper status codes
//! - [`state`]: Shared application state, the aggregator and cancellation token
//! - [`server`]: Main server implementation, lifecycle, and coordinated shutdown
//! - [`routes`]: Route configuration, HTTP and websocket handlers
//! - [`metrics`]: Prometheus counters and histograms for queries and sources
//! - [`openapi`]: `OpenAPI` specification and Swagger UI endpoints for API documentation

pub mod config;
pub mod docs;
pub mod error;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{Environment, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::{Server, ShutdownConfig};
pub use state::{HealthCheck, HealthStatus, ServerState};
