// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Source adapter capability and shared adapter utilities
//!
//! Every data source the service can poll implements [`NftSource`]. The aggregator only
//! ever holds `Arc<dyn NftSource>`, never a concrete adapter type.
//!
//! # Core Abstractions
//!
//! - **`NftSource` Trait**: fetch the items an address owns on one source
//! - **`SourceContribution`**: call-scoped result of one fetch, items plus per-item drops
//! - **`SourceError`**: failure taxonomy shared by every adapter
//! - **`IpfsGateway`**: normalization of `ipfs://` pointers to gateway URLs
//! - **`FetchTracker`**: in-flight counter adapters raise around their network phase

use std::fmt::Debug;

use async_trait::async_trait;
use shared_types::SourceFamily;
use thiserror::Error;

pub mod ipfs;
pub mod tracker;
pub mod types;

pub use ipfs::IpfsGateway;
pub use tracker::{FetchGuard, FetchTracker};
pub use types::*;

/// Capability every data source adapter provides
///
/// Adapters are shared across concurrent queries, so all per-query state lives in the
/// returned [`SourceContribution`] rather than in the adapter.
#[async_trait]
pub trait NftSource: Send + Sync + Debug {
    /// Name used as `sourceName` on every item this adapter emits
    fn name(&self) -> &str;

    /// Address family this adapter understands
    fn family(&self) -> SourceFamily;

    /// Fetch every item `address` owns on this source
    ///
    /// # Returns
    ///
    /// * `Ok(Some(contribution))` when the source answered, even with zero items
    /// * `Ok(None)` when the address does not belong to this adapter's family
    /// * `Err(error)` when the source failed as a whole
    ///
    /// Failures limited to single items are reported inside the contribution and never
    /// turn into an `Err`.
    async fn fetch_by_address(&self, address: &str)
    -> Result<Option<SourceContribution>, SourceError>;
}

/// Common errors that can occur while polling a source
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum SourceError {
    /// HTTP request failed
    #[error("HTTP request failed: {message}")]
    Http { message: String },

    /// Invalid response format
    #[error("Invalid response format: {message}")]
    InvalidResponse { message: String },

    /// Network timeout
    #[error("Request timeout after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    /// The node or contract answered with an error
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// A connection could not be opened or was lost
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// A media or metadata pointer could not be normalized
    #[error("Malformed media URI: {uri}")]
    MalformedMediaUri { uri: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The address could not be re-encoded for this source
    #[error("Invalid address {address}: {message}")]
    InvalidAddress { address: String, message: String },
}

impl SourceError {
    /// Short, stable label for logs and metrics
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Timeout { .. } => "timeout",
            Self::Rpc { .. } => "rpc",
            Self::Connection { .. } => "connection",
            Self::MalformedMediaUri { .. } => "malformed_media_uri",
            Self::Configuration { .. } => "configuration",
            Self::InvalidAddress { .. } => "invalid_address",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shared_types::NftItem;

    use super::*;

    #[derive(Debug)]
    struct FixedSource;

    #[async_trait]
    impl NftSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn family(&self) -> SourceFamily {
            SourceFamily::Substrate
        }

        async fn fetch_by_address(
            &self,
            address: &str,
        ) -> Result<Option<SourceContribution>, SourceError> {
            if address.starts_with("0x") {
                return Ok(None);
            }
            let item = NftItem::new("1-fixed", self.name(), "KSM", address);
            Ok(Some(SourceContribution::new(vec![item])))
        }
    }

    #[tokio::test]
    async fn source_is_usable_as_trait_object() {
        let source: Arc<dyn NftSource> = Arc::new(FixedSource);

        let contribution = source.fetch_by_address("HNZata7i").await.unwrap().unwrap();
        assert_eq!(contribution.count(), 1);
        assert_eq!(contribution.items()[0].owner_address, "HNZata7i");

        assert!(source.fetch_by_address("0xabc").await.unwrap().is_none());
    }

    #[test]
    fn error_display() {
        let error = SourceError::Rpc {
            code: -32000,
            message: "execution reverted".to_string(),
        };
        assert_eq!(error.to_string(), "RPC error -32000: execution reverted");
        assert_eq!(error.kind(), "rpc");

        let error = SourceError::Timeout { timeout_seconds: 5 };
        assert_eq!(error.to_string(), "Request timeout after 5 seconds");
    }
}
