// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Registry of the data sources a query can be dispatched to
//!
//! The registry owns one shared instance of every enabled adapter. Adapters keep no
//! per-query state, so the same instances serve concurrent queries.

use std::{collections::BTreeSet, sync::Arc};

use api_client::{IpfsGateway, NftSource, SourceError};
use shared_types::SourceFamily;
use tracing::{debug, info};

use crate::{
    config::SourcesConfig,
    evm::EvmSource,
    metadata::MetadataFetcher,
    rmrk::{RmrkSource, RmrkVersion},
    statemine::StatemineSource,
    substrate::WsConnector,
};

/// Ordered collection of adapters
#[derive(Debug, Default, Clone)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn NftSource>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every enabled source in `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the IPFS gateway is not a URL, or a source cannot be built
    pub fn from_config(config: &SourcesConfig) -> Result<Self, SourceError> {
        let gateway = IpfsGateway::new(config.ipfs_gateway.clone())?;
        let metadata = Arc::new(MetadataFetcher::new(config.metadata.clone())?);
        let mut registry = Self::new();

        for chain in config.evm_chains.iter().filter(|chain| chain.enabled) {
            let source = EvmSource::new(chain.clone(), Arc::clone(&metadata), gateway.clone())?;
            registry.register(Arc::new(source));
        }

        for (version, indexer) in [
            (RmrkVersion::V1, &config.rmrk1),
            (RmrkVersion::V2, &config.rmrk2),
        ] {
            if indexer.enabled {
                let source = RmrkSource::new(version, indexer.clone(), gateway.clone())?;
                registry.register(Arc::new(source));
            }
        }

        if config.statemine.enabled {
            let connector = Arc::new(WsConnector::new(config.statemine.request_timeout()));
            registry.register(Arc::new(StatemineSource::new(
                config.statemine.clone(),
                connector,
                metadata,
                gateway,
            )));
        }

        info!(
            sources = registry.source_count(),
            names = ?registry.source_names(),
            "source registry initialized"
        );
        Ok(registry)
    }

    /// Add a source
    pub fn register(&mut self, source: Arc<dyn NftSource>) {
        debug!(source = source.name(), family = %source.family(), "registering source");
        self.sources.push(source);
    }

    /// Sources serving any of `families`, in registration order
    pub fn for_families(&self, families: &BTreeSet<SourceFamily>) -> Vec<Arc<dyn NftSource>> {
        self.sources
            .iter()
            .filter(|source| families.contains(&source.family()))
            .cloned()
            .collect()
    }

    /// Number of registered sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Names of registered sources, in registration order
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }
}
