// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server state management module
//!
//! This module provides shared application state for the NFT API server,
//! including configuration, the query aggregator, and coordinated cancellation.

use std::sync::Arc;

use external_apis::Aggregator;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::config::{Environment, ServerConfig};

/// Shared application state with cancellation token support
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Server configuration
    config: ServerConfig,
    /// Aggregator shared by every connection
    aggregator: Arc<Aggregator>,
    /// Cancellation token for coordinated shutdown
    pub cancellation_token: CancellationToken,
}

impl ServerState {
    /// Create new server state
    pub fn new(
        config: ServerConfig,
        aggregator: Arc<Aggregator>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            aggregator,
            cancellation_token,
        }
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The query aggregator
    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// Report service health
    ///
    /// Sources are not probed; a server without any enabled source is degraded since
    /// every query would come back empty.
    pub fn health_check(&self) -> HealthCheck {
        let sources: Vec<String> = self
            .aggregator
            .registry()
            .source_names()
            .into_iter()
            .map(ToString::to_string)
            .collect();

        let status = if sources.is_empty() {
            HealthStatus::Degraded {
                reason: Box::from("no data sources enabled"),
            }
        } else {
            HealthStatus::Up
        };

        HealthCheck {
            status,
            version: Box::from(env!("CARGO_PKG_VERSION")),
            environment: self.config.environment,
            timestamp: chrono::Utc::now().to_rfc3339(),
            sources,
        }
    }
}

/// Health status of the service
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum HealthStatus {
    /// Service is fully operational
    Up,

    /// Service answers but cannot produce useful results
    Degraded {
        /// Human-readable explanation of the degradation condition
        reason: Box<str>,
    },
}

/// Health check status
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthCheck {
    /// Service status
    pub status: HealthStatus,
    /// Service version
    pub version: Box<str>,
    /// Environment
    pub environment: Environment,
    /// Timestamp
    pub timestamp: String,
    /// Registered data sources, in dispatch order
    pub sources: Vec<String>,
}
