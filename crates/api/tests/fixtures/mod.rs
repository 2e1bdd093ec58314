// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Test fixtures for server integration tests
//!
//! An in-process source stands in for the real adapters so the server can be
//! exercised end to end without network access.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use api::{Server, ServerConfig, ShutdownConfig};
use api_client::{NftSource, SourceContribution, SourceError};
use async_trait::async_trait;
use external_apis::{Aggregator, AggregatorConfig, SourceRegistry};
use shared_types::{NftItem, SourceFamily};
use tokio_util::sync::CancellationToken;

/// Alice's well-known development key, generic SS58 encoding
pub const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

/// Source returning a fixed number of items for every address
#[derive(Debug)]
pub struct FixedSource {
    pub name: &'static str,
    pub family: SourceFamily,
    pub items: usize,
}

#[async_trait]
impl NftSource for FixedSource {
    fn name(&self) -> &str {
        self.name
    }

    fn family(&self) -> SourceFamily {
        self.family
    }

    async fn fetch_by_address(
        &self,
        address: &str,
    ) -> Result<Option<SourceContribution>, SourceError> {
        Ok(Some(
            (0..self.items)
                .map(|i| NftItem::new(format!("{i}-{}", self.name), self.name, "KSM", address))
                .collect(),
        ))
    }
}

/// Source that always fails outright
#[derive(Debug)]
pub struct BrokenSource;

#[async_trait]
impl NftSource for BrokenSource {
    fn name(&self) -> &str {
        "Statemine"
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::Substrate
    }

    async fn fetch_by_address(
        &self,
        _address: &str,
    ) -> Result<Option<SourceContribution>, SourceError> {
        Err(SourceError::Connection {
            message: "node unreachable".to_string(),
        })
    }
}

/// Start a server backed by two RMRK stand-ins and one failing source
pub async fn start_server() -> (SocketAddr, CancellationToken) {
    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(FixedSource {
        name: "RMRK1",
        family: SourceFamily::Substrate,
        items: 2,
    }));
    registry.register(Arc::new(FixedSource {
        name: "RMRK2",
        family: SourceFamily::Substrate,
        items: 1,
    }));
    registry.register(Arc::new(BrokenSource));

    let aggregator = Aggregator::new(Arc::new(registry), AggregatorConfig::default());
    Server::with_aggregator(
        ServerConfig::for_testing(),
        ShutdownConfig::default(),
        Arc::new(aggregator),
    )
    .run_for_testing()
    .await
    .expect("Failed to start test server")
}
