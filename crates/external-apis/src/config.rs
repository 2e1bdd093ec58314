// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Per-source configuration
//!
//! Loaded once at process start and never mutated. Every section defaults to the
//! production catalogue, so an empty configuration file polls every known source.

use std::time::Duration;

use api_client::IpfsGateway;
use serde::{Deserialize, Serialize};

const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 20;
const DEFAULT_PROBE_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

/// Configuration for every data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Base URL `ipfs://` pointers are rewritten onto
    pub ipfs_gateway: String,
    /// Account-model chains, polled in this order
    pub evm_chains: Vec<EvmChainConfig>,
    /// RMRK 1.0 indexer
    pub rmrk1: GraphQlSourceConfig,
    /// RMRK 2.0 indexer
    pub rmrk2: GraphQlSourceConfig,
    /// Statemine node
    pub statemine: ChainStateSourceConfig,
    /// Off-chain metadata fetching
    pub metadata: MetadataFetchConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            ipfs_gateway: IpfsGateway::DEFAULT_BASE.to_string(),
            evm_chains: vec![EvmChainConfig::moonbeam(), EvmChainConfig::polygon()],
            rmrk1: GraphQlSourceConfig::rmrk1(),
            rmrk2: GraphQlSourceConfig::rmrk2(),
            statemine: ChainStateSourceConfig::default(),
            metadata: MetadataFetchConfig::default(),
        }
    }
}

impl SourcesConfig {
    /// Configuration with every source disabled
    pub fn disabled() -> Self {
        let mut config = Self::default();
        for chain in &mut config.evm_chains {
            chain.enabled = false;
        }
        config.rmrk1.enabled = false;
        config.rmrk2.enabled = false;
        config.statemine.enabled = false;
        config
    }
}

/// A contract polled on an account-model chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmContract {
    /// Contract address
    pub address: String,
    /// Display name, also used in item ids
    pub name: String,
    /// Token symbol
    pub symbol: String,
}

/// An account-model chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmChainConfig {
    /// Whether the chain is polled
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Chain name, used as the item source name
    pub name: String,
    /// Expected `eth_chainId`
    pub chain_id: u64,
    /// Native currency symbol
    pub currency: String,
    /// Candidate RPC endpoints, in order of preference
    pub rpc: Vec<String>,
    /// Explorer base URL
    pub explorer_url: String,
    /// Contracts to enumerate
    pub contracts: Vec<EvmContract>,
    /// Upper bound on tokens enumerated per contract
    #[serde(default = "default_max_tokens_per_contract")]
    pub max_tokens_per_contract: u64,
    /// Tokens resolved at once per contract
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_tokens: usize,
    /// Timeout for endpoint probes, in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
    /// Timeout for contract calls, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl EvmChainConfig {
    /// Moonbeam mainnet
    pub fn moonbeam() -> Self {
        Self {
            enabled: true,
            name: "Moonbeam".to_string(),
            chain_id: 1284,
            currency: "GLMR".to_string(),
            rpc: vec!["https://moonbeam.api.onfinality.io/public".to_string()],
            explorer_url: "https://moonbeam.moonscan.io/address/".to_string(),
            contracts: vec![EvmContract {
                address: "0xDF67E64DC198E5287a6a625a4733841bD147E584".to_string(),
                name: "Ghosts of the Past".to_string(),
                symbol: "GOTP".to_string(),
            }],
            max_tokens_per_contract: default_max_tokens_per_contract(),
            max_concurrent_tokens: DEFAULT_MAX_CONCURRENT_REQUESTS,
            probe_timeout_seconds: DEFAULT_PROBE_TIMEOUT_SECONDS,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }

    /// Polygon mainnet
    pub fn polygon() -> Self {
        Self {
            enabled: true,
            name: "Polygon".to_string(),
            chain_id: 137,
            currency: "MATIC".to_string(),
            rpc: vec!["https://polygon-rpc.com".to_string()],
            explorer_url: "https://polygonscan.com/address/".to_string(),
            contracts: vec![EvmContract {
                address: "0x4372597f1c600D86598675DCB6cF5713bB7525Cf".to_string(),
                name: "Snook NFT".to_string(),
                symbol: "SNK".to_string(),
            }],
            max_tokens_per_contract: default_max_tokens_per_contract(),
            max_concurrent_tokens: DEFAULT_MAX_CONCURRENT_REQUESTS,
            probe_timeout_seconds: DEFAULT_PROBE_TIMEOUT_SECONDS,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }

    /// Probe timeout as a duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// A GraphQL indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQlSourceConfig {
    /// Whether the indexer is polled
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// GraphQL endpoint
    pub endpoint: String,
    /// Explorer base URL
    pub explorer_url: String,
    /// Native currency symbol
    pub token_symbol: String,
    /// SS58 prefix the indexer stores owners under
    #[serde(default = "default_ss58_prefix")]
    pub ss58_prefix: u16,
    /// Request timeout, in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

impl GraphQlSourceConfig {
    /// RMRK 1.0 indexer
    pub fn rmrk1() -> Self {
        Self {
            enabled: true,
            endpoint: "https://gql-rmrk1.rmrk.link/v1/graphql".to_string(),
            explorer_url: "https://singular.rmrk.app/collectibles/".to_string(),
            token_symbol: "KSM".to_string(),
            ss58_prefix: default_ss58_prefix(),
            timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }

    /// RMRK 2.0 indexer
    pub fn rmrk2() -> Self {
        Self {
            enabled: true,
            endpoint: "https://gql-rmrk2-prod.graphcdn.app".to_string(),
            explorer_url: "https://singular.app/collectibles/".to_string(),
            token_symbol: "KSM".to_string(),
            ss58_prefix: default_ss58_prefix(),
            timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// A chain node queried over a websocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainStateSourceConfig {
    /// Whether the node is polled
    pub enabled: bool,
    /// Node websocket URL
    pub endpoint: String,
    /// Explorer base URL
    pub explorer_url: String,
    /// Native currency symbol
    pub token_symbol: String,
    /// SS58 prefix of the chain
    pub ss58_prefix: u16,
    /// Keys requested per `state_getKeysPaged` call
    pub page_size: u32,
    /// Upper bound on pages read per query
    pub max_pages: u32,
    /// Off-chain metadata documents fetched at once
    pub max_concurrent_items: usize,
    /// Timeout for each node request, in seconds
    pub request_timeout_seconds: u64,
}

impl Default for ChainStateSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "wss://statemine.api.onfinality.io/public-ws".to_string(),
            explorer_url: "https://singular.app/collectibles/statemine/".to_string(),
            token_symbol: "KSM".to_string(),
            ss58_prefix: default_ss58_prefix(),
            page_size: 1000,
            max_pages: 10,
            max_concurrent_items: DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl ChainStateSourceConfig {
    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Off-chain metadata fetching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataFetchConfig {
    /// Per-request timeout, in seconds
    pub timeout_seconds: u64,
    /// Retries after the first attempt
    pub max_retries: usize,
    /// How long a fetched document is reused, in seconds
    pub cache_ttl_seconds: u64,
    /// Maximum cached documents
    pub cache_max_entries: usize,
}

impl Default for MetadataFetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            max_retries: 2,
            cache_ttl_seconds: 3600,
            cache_max_entries: 10_000,
        }
    }
}

impl MetadataFetchConfig {
    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Cache TTL as a duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

const fn enabled() -> bool {
    true
}

const fn default_ss58_prefix() -> u16 {
    crate::address::KUSAMA_PREFIX
}

const fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

const fn default_probe_timeout() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECONDS
}

const fn default_max_tokens_per_contract() -> u64 {
    500
}

const fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}
