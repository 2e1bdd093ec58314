// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Endpoint selection
//!
//! RPC-style sources are configured with several candidate endpoints. Every candidate
//! is probed concurrently for the network id it serves; the first candidate, in
//! configuration order, that reports the expected id is used. A probe that fails or
//! outlives the probe timeout counts as a mismatch.

use std::{fmt::Debug, sync::Arc, time::Duration};

use api_client::SourceError;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::jsonrpc::HttpJsonRpc;

/// Asks an endpoint which network it serves
#[async_trait]
pub trait NetworkProbe: Send + Sync + Debug {
    /// Network id reported by `endpoint`
    async fn network_id(&self, endpoint: &str) -> Result<u64, SourceError>;
}

/// Probe using `eth_chainId`
#[derive(Debug, Clone)]
pub struct ChainIdProbe {
    rpc: Arc<HttpJsonRpc>,
}

impl ChainIdProbe {
    /// Probe over an existing JSON-RPC client
    pub fn new(rpc: Arc<HttpJsonRpc>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl NetworkProbe for ChainIdProbe {
    async fn network_id(&self, endpoint: &str) -> Result<u64, SourceError> {
        let reported: String = self.rpc.call(endpoint, "eth_chainId", json!([])).await?;
        parse_quantity(&reported)
    }
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_quantity(value: &str) -> Result<u64, SourceError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| SourceError::InvalidResponse {
            message: format!("expected hex quantity, got {value}"),
        })?;
    u64::from_str_radix(digits, 16).map_err(|e| SourceError::InvalidResponse {
        message: format!("invalid hex quantity {value}: {e}"),
    })
}

/// Picks the first endpoint serving the expected network
#[derive(Debug, Clone)]
pub struct EndpointSelector {
    probe: Arc<dyn NetworkProbe>,
    probe_timeout: Duration,
}

impl EndpointSelector {
    /// Create a selector; each probe is abandoned after `probe_timeout`
    pub fn new(probe: Arc<dyn NetworkProbe>, probe_timeout: Duration) -> Self {
        Self {
            probe,
            probe_timeout,
        }
    }

    /// First candidate, in input order, reporting `expected` as its network id
    pub async fn select<'a>(&self, candidates: &'a [String], expected: u64) -> Option<&'a str> {
        let probes = candidates.iter().map(|candidate| async move {
            match timeout(self.probe_timeout, self.probe.network_id(candidate)).await {
                Ok(Ok(reported)) => Some(reported),
                Ok(Err(error)) => {
                    debug!(endpoint = %candidate, error = %error, "endpoint probe failed");
                    None
                }
                Err(_) => {
                    debug!(endpoint = %candidate, "endpoint probe timed out");
                    None
                }
            }
        });

        let reported = join_all(probes).await;

        let selected = candidates
            .iter()
            .zip(reported)
            .find(|(_, reported)| *reported == Some(expected))
            .map(|(candidate, _)| candidate.as_str());

        trace!(?selected, expected, candidates = candidates.len(), "endpoint selection done");
        selected
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Debug)]
    struct FixedProbe {
        answers: HashMap<String, (Duration, Result<u64, ()>)>,
    }

    impl FixedProbe {
        fn new(answers: &[(&str, Duration, Result<u64, ()>)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(endpoint, delay, result)| ((*endpoint).to_string(), (*delay, *result)))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl NetworkProbe for FixedProbe {
        async fn network_id(&self, endpoint: &str) -> Result<u64, SourceError> {
            let (delay, result) = self.answers[endpoint];
            tokio::time::sleep(delay).await;
            result.map_err(|()| SourceError::Connection {
                message: "refused".to_string(),
            })
        }
    }

    fn candidates(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn first_match_in_input_order_wins() {
        let probe = FixedProbe::new(&[
            ("e1", Duration::ZERO, Ok(1)),
            // slower than e3, still preferred
            ("e2", Duration::from_millis(50), Ok(1284)),
            ("e3", Duration::ZERO, Ok(1284)),
        ]);
        let selector = EndpointSelector::new(Arc::new(probe), Duration::from_secs(1));
        let endpoints = candidates(&["e1", "e2", "e3"]);

        assert_eq!(selector.select(&endpoints, 1284).await, Some("e2"));
    }

    #[tokio::test]
    async fn failing_and_slow_probes_are_mismatches() {
        let probe = FixedProbe::new(&[
            ("down", Duration::ZERO, Err(())),
            ("slow", Duration::from_secs(5), Ok(137)),
            ("ok", Duration::ZERO, Ok(137)),
        ]);
        let selector = EndpointSelector::new(Arc::new(probe), Duration::from_millis(100));
        let endpoints = candidates(&["down", "slow", "ok"]);

        assert_eq!(selector.select(&endpoints, 137).await, Some("ok"));
    }

    #[tokio::test]
    async fn no_match() {
        let probe = FixedProbe::new(&[("e1", Duration::ZERO, Ok(1))]);
        let selector = EndpointSelector::new(Arc::new(probe), Duration::from_secs(1));

        assert_eq!(selector.select(&candidates(&["e1"]), 137).await, None);
        assert_eq!(selector.select(&[], 137).await, None);
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0x504").unwrap(), 1284);
        assert_eq!(parse_quantity("0x89").unwrap(), 137);
        assert!(parse_quantity("137").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }
}
