// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! NFT data sources and query aggregation
//!
//! This crate implements the [`api_client::NftSource`] capability for every supported
//! chain and indexer, and the machinery that fans a single ownership query out to them.
//!
//! # Architecture
//!
//! - **Adapters**: [`evm`], [`rmrk`], [`statemine`] - one per data source family
//! - **Transports**: [`jsonrpc`], [`substrate`], [`endpoint`] - node access and endpoint selection
//! - **Registry**: [`registry::SourceRegistry`] - the enabled adapters, filtered by family
//! - **Aggregation**: [`aggregator::Aggregator`] - concurrent dispatch, merge and progress reporting
//! - **Codecs**: [`address`], [`abi`] - SS58, EIP-55 and ERC-721 call encoding
//!
//! Off-chain metadata documents go through [`metadata::MetadataFetcher`], which retries
//! transient failures and caches documents by URL.

pub mod abi;
pub mod address;
pub mod aggregator;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod endpoint;
pub mod evm;
pub mod jsonrpc;
pub mod metadata;
pub mod non_empty_string;
pub mod registry;
pub mod reporter;
pub mod rmrk;
pub mod statemine;
pub mod substrate;

pub use aggregator::{Aggregator, AggregatorConfig, AggregatorState, QueryOutcome};
pub use classifier::{AddressClassifier, ClassifyError};
pub use config::SourcesConfig;
pub use evm::EvmSource;
pub use metadata::MetadataFetcher;
pub use non_empty_string::NonEmptyString;
pub use registry::SourceRegistry;
pub use reporter::{ChannelReporter, NoopReporter, ProgressReporter};
pub use rmrk::{RmrkSource, RmrkVersion};
pub use statemine::StatemineSource;
