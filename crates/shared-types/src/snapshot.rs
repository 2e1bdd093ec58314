// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Query snapshots
//!
//! [`NftSnapshot`] is the accumulator owned by the aggregator for one query. A copy of
//! it is pushed to the caller every time the aggregate changes. Fields are private so
//! that `count` can only move together with `items`, and `is_fetching` can only go
//! from `true` to `false` once.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::nft::NftItem;

/// Merged result of one ownership query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NftSnapshot {
    address: String,
    items: Vec<NftItem>,
    count: usize,
    is_fetching: bool,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sources: Vec<SourceReport>,
}

impl NftSnapshot {
    /// Create the snapshot emitted when a query is accepted
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            items: Vec::new(),
            count: 0,
            is_fetching: true,
            elapsed_ms: 0,
            error: None,
            sources: Vec::new(),
        }
    }

    /// Append one source's items, preserving their order
    pub fn merge(&mut self, items: impl IntoIterator<Item = NftItem>) {
        self.items.extend(items);
        self.count = self.items.len();
    }

    /// Attach a per-source diagnostic entry
    pub fn record(&mut self, report: SourceReport) {
        self.sources.push(report);
    }

    /// Update the elapsed time
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    /// Set the top-level error
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Mark the query as settled
    ///
    /// Returns `false` if the snapshot was already finished, in which case nothing changes.
    pub fn finish(&mut self, elapsed: Duration) -> bool {
        if !self.is_fetching {
            return false;
        }
        self.is_fetching = false;
        self.set_elapsed(elapsed);
        true
    }

    /// Queried address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Items merged so far
    pub fn items(&self) -> &[NftItem] {
        &self.items
    }

    /// Number of items merged so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether sources are still being polled
    pub fn is_fetching(&self) -> bool {
        self.is_fetching
    }

    /// Milliseconds since the query was accepted
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Top-level error, if the query could not be dispatched
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Per-source diagnostics
    pub fn sources(&self) -> &[SourceReport] {
        &self.sources
    }
}

/// How a single source settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceOutcome {
    /// The source returned at least one item
    Contributed,
    /// The source answered but had nothing for this address
    Empty,
    /// The source failed as a whole
    Failed,
    /// The source did not settle within its deadline
    TimedOut,
}

impl SourceOutcome {
    /// Label used in logs and metrics
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contributed => "contributed",
            Self::Empty => "empty",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic entry for one source in one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    /// Source name
    pub source: String,
    /// How the source settled
    pub outcome: SourceOutcome,
    /// Items contributed
    pub item_count: usize,
    /// Time the source took, in milliseconds
    pub elapsed_ms: u64,
    /// Failure detail, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<NftItem> {
        (0..n)
            .map(|i| NftItem::new(format!("{i}-test"), "test", "KSM", "addr"))
            .collect()
    }

    #[test]
    fn new_snapshot_is_fetching_and_empty() {
        let snapshot = NftSnapshot::new("addr");
        assert!(snapshot.is_fetching());
        assert_eq!(snapshot.count(), 0);
        assert!(snapshot.items().is_empty());
        assert!(snapshot.error().is_none());
    }

    #[test]
    fn merge_keeps_count_in_sync() {
        let mut snapshot = NftSnapshot::new("addr");
        snapshot.merge(items(3));
        assert_eq!(snapshot.count(), 3);
        snapshot.merge(Vec::new());
        assert_eq!(snapshot.count(), 3);
        snapshot.merge(items(2));
        assert_eq!(snapshot.count(), snapshot.items().len());
        assert_eq!(snapshot.count(), 5);
    }

    #[test]
    fn merge_preserves_order_within_a_source() {
        let mut snapshot = NftSnapshot::new("addr");
        snapshot.merge(items(3));
        let ids: Vec<_> = snapshot.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["0-test", "1-test", "2-test"]);
    }

    #[test]
    fn finish_is_one_way() {
        let mut snapshot = NftSnapshot::new("addr");
        assert!(snapshot.finish(Duration::from_millis(42)));
        assert!(!snapshot.is_fetching());
        assert_eq!(snapshot.elapsed_ms(), 42);

        assert!(!snapshot.finish(Duration::from_millis(99)));
        assert!(!snapshot.is_fetching());
        assert_eq!(snapshot.elapsed_ms(), 42);
    }

    #[test]
    fn wire_format() {
        let mut snapshot = NftSnapshot::new("addr");
        snapshot.fail("No Address Provided");
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["isFetching"], true);
        assert_eq!(json["count"], 0);
        assert_eq!(json["error"], "No Address Provided");
        assert!(json.get("sources").is_none());
    }

    #[test]
    fn diagnostics_are_serialized() {
        let mut snapshot = NftSnapshot::new("addr");
        snapshot.record(SourceReport {
            source: "RMRK2".to_string(),
            outcome: SourceOutcome::Failed,
            item_count: 0,
            elapsed_ms: 10,
            detail: Some("boom".to_string()),
        });
        assert_eq!(snapshot.sources().len(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["sources"][0]["outcome"], "failed");
    }
}
