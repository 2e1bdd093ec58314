// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Off-chain metadata fetching
//!
//! Token metadata documents live behind HTTP(S) or IPFS gateway URLs. Requests are
//! retried with jittered exponential backoff on transport errors and on 408, 429 and
//! 5xx statuses. Successfully decoded documents are cached by URL.

use std::{sync::Arc, time::Duration};

use api_client::SourceError;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;
use tokio_retry::{
    RetryIf,
    strategy::{ExponentialBackoff, jitter},
};
use tracing::{debug, warn};

use crate::{cache::DocumentCache, config::MetadataFetchConfig};

/// Errors raised while fetching a metadata document
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// Request did not complete in time
    #[error("request timeout")]
    Timeout { seconds: u64 },

    /// Body was not JSON
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

impl FetchError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => should_retry_status(*status),
            Self::Json(_) => false,
        }
    }
}

impl From<FetchError> for SourceError {
    fn from(value: FetchError) -> Self {
        match value {
            FetchError::Http(error) => SourceError::Http {
                message: error.to_string(),
            },
            FetchError::Status { url, status } => SourceError::Http {
                message: format!("{url} returned status {status}"),
            },
            FetchError::Timeout { seconds } => SourceError::Timeout {
                timeout_seconds: seconds,
            },
            FetchError::Json(error) => SourceError::InvalidResponse {
                message: error.to_string(),
            },
        }
    }
}

/// Determine if an HTTP status code should trigger a retry
fn should_retry_status(status: u16) -> bool {
    matches!(
        status,
        429 |           // Rate limit
        500
            ..=599 |     // Server errors
        408 // Request timeout
    )
}

/// Fetches and caches off-chain JSON documents
#[derive(Debug)]
pub struct MetadataFetcher {
    client: Client,
    config: MetadataFetchConfig,
    cache: DocumentCache,
}

impl MetadataFetcher {
    /// Create a fetcher
    pub fn new(config: MetadataFetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent("nft-api/0.1.0")
            .build()?;
        let cache = DocumentCache::with_settings(config.cache_ttl(), config.cache_max_entries);

        Ok(Self {
            client,
            config,
            cache,
        })
    }

    /// Document cache, for statistics
    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Fetch the JSON document at `url`
    pub async fn fetch_json(&self, url: &str) -> Result<Arc<Value>, FetchError> {
        if let Some(document) = self.cache.get(url) {
            return Ok(document);
        }

        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(10))
            .take(self.config.max_retries)
            .map(jitter);

        let body = RetryIf::spawn(
            retry_strategy,
            || self.fetch_once(url),
            |error: &FetchError| {
                let retry = error.is_retryable();
                if retry {
                    warn!(url, error = %error, "metadata fetch failed, will retry");
                }
                retry
            },
        )
        .await?;

        let document = Arc::new(serde_json::from_slice::<Value>(&body)?);
        self.cache.store(url, Arc::clone(&document));
        Ok(document)
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url, "fetching metadata document");

        let seconds = self.config.timeout_seconds;
        let response = timeout(
            self.config.timeout(),
            self.client
                .get(url)
                .header("accept", "application/json")
                .send(),
        )
        .await
        .map_err(|_| FetchError::Timeout { seconds })??;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
