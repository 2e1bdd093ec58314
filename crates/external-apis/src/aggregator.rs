// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Query aggregation
//!
//! The [`Aggregator`] drives one ownership query through
//! `Idle -> Dispatching -> Reducing -> Done`. Every applicable source runs as its own
//! task; the aggregator waits for all of them to settle and merges contributions as
//! they arrive. A source that fails, panics or overruns its deadline contributes
//! nothing, and never sets the top-level error.

use std::{
    fmt,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant},
};

use api_client::{NftSource, SourceContribution};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use shared_types::{NftSnapshot, SourceOutcome, SourceReport};
use tokio::{task::JoinSet, time::timeout};
use tracing::{debug, info, warn};

use crate::{
    classifier::{AddressClassifier, ClassifyError},
    registry::SourceRegistry,
    reporter::ProgressReporter,
};

const DEFAULT_SOURCE_TIMEOUT_SECONDS: u64 = 60;

/// Aggregator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Deadline for a single source, in seconds
    pub source_timeout_seconds: u64,
    /// Whether snapshots carry per-source diagnostics
    pub diagnostics: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            source_timeout_seconds: DEFAULT_SOURCE_TIMEOUT_SECONDS,
            diagnostics: false,
        }
    }
}

impl AggregatorConfig {
    /// Source deadline as a duration
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_seconds)
    }
}

/// Lifecycle of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    /// Nothing dispatched yet
    Idle,
    /// Classifying and spawning sources
    Dispatching,
    /// Merging settled sources
    Reducing,
    /// Final snapshot emitted
    Done,
}

impl fmt::Display for AggregatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Dispatching => "dispatching",
            Self::Reducing => "reducing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of a finished query
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Final snapshot, as last reported
    pub snapshot: NftSnapshot,
    /// One entry per dispatched source, in settlement order
    pub reports: Vec<SourceReport>,
}

/// How a source task ended
enum Settlement {
    Contributed(SourceContribution),
    NotApplicable,
    Failed(String),
    TimedOut,
}

struct Settled {
    source: String,
    elapsed: Duration,
    settlement: Settlement,
}

/// Fans a query out to every applicable source and merges the results
#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    classifier: AddressClassifier,
    config: AggregatorConfig,
}

impl Aggregator {
    /// Create an aggregator using the default address classifier
    pub fn new(registry: Arc<SourceRegistry>, config: AggregatorConfig) -> Self {
        Self {
            registry,
            classifier: AddressClassifier::default(),
            config,
        }
    }

    /// Replace the address classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: AddressClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sources available for dispatch
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Run one query, pushing every snapshot to `reporter`
    ///
    /// The reporter sees the acceptance snapshot, one snapshot per settled source and a
    /// final snapshot with `is_fetching == false`, and is then closed.
    pub async fn query(&self, address: &str, reporter: &dyn ProgressReporter) -> QueryOutcome {
        let started = Instant::now();
        let mut state = AggregatorState::Idle;
        let mut snapshot = NftSnapshot::new(address);
        let mut reports = Vec::new();

        reporter.report(&snapshot).await;

        if address.trim().is_empty() {
            info!("query rejected: empty address");
            snapshot.fail(ClassifyError::Empty.to_string());
            return complete(snapshot, reports, &mut state, started, reporter).await;
        }

        transition(&mut state, AggregatorState::Dispatching, address);
        let families = match self.classifier.classify(address) {
            Ok(families) => families,
            Err(error) => {
                info!(address, error = %error, "query rejected");
                snapshot.fail(error.to_string());
                return complete(snapshot, reports, &mut state, started, reporter).await;
            }
        };

        let sources = self.registry.for_families(&families);
        if sources.is_empty() {
            let error = ClassifyError::NoRegisteredSource;
            info!(address, families = ?families, error = %error, "query rejected");
            snapshot.fail(error.to_string());
            return complete(snapshot, reports, &mut state, started, reporter).await;
        }
        debug!(
            address,
            families = ?families,
            sources = sources.len(),
            "dispatching sources"
        );

        let mut tasks = JoinSet::new();
        for source in sources {
            tasks.spawn(run_source(
                source,
                address.to_string(),
                self.config.source_timeout(),
            ));
        }

        transition(&mut state, AggregatorState::Reducing, address);
        while let Some(joined) = tasks.join_next().await {
            let report = match joined {
                Ok(settled) => reduce(&mut snapshot, settled),
                Err(error) => {
                    warn!(address, error = %error, "source task did not complete");
                    SourceReport {
                        source: "unknown".to_string(),
                        outcome: SourceOutcome::Failed,
                        item_count: 0,
                        elapsed_ms: 0,
                        detail: Some(error.to_string()),
                    }
                }
            };

            if self.config.diagnostics {
                snapshot.record(report.clone());
            }
            reports.push(report);
            snapshot.set_elapsed(started.elapsed());
            reporter.report(&snapshot).await;
        }

        complete(snapshot, reports, &mut state, started, reporter).await
    }
}

async fn complete(
    mut snapshot: NftSnapshot,
    reports: Vec<SourceReport>,
    state: &mut AggregatorState,
    started: Instant,
    reporter: &dyn ProgressReporter,
) -> QueryOutcome {
    snapshot.finish(started.elapsed());
    transition(state, AggregatorState::Done, snapshot.address());

    reporter.report(&snapshot).await;
    reporter.close().await;

    info!(
        address = snapshot.address(),
        count = snapshot.count(),
        elapsed_ms = snapshot.elapsed_ms(),
        error = snapshot.error().unwrap_or_default(),
        "query finished"
    );
    QueryOutcome { snapshot, reports }
}

fn transition(state: &mut AggregatorState, next: AggregatorState, address: &str) {
    debug!(address, from = %state, to = %next, "aggregator state change");
    *state = next;
}

async fn run_source(source: Arc<dyn NftSource>, address: String, deadline: Duration) -> Settled {
    let started = Instant::now();
    let fetch = timeout(deadline, source.fetch_by_address(&address));

    let settlement = match AssertUnwindSafe(fetch).catch_unwind().await {
        Ok(Ok(Ok(Some(contribution)))) => Settlement::Contributed(contribution),
        Ok(Ok(Ok(None))) => Settlement::NotApplicable,
        Ok(Ok(Err(error))) => Settlement::Failed(error.to_string()),
        Ok(Err(_)) => Settlement::TimedOut,
        Err(_) => Settlement::Failed("source panicked".to_string()),
    };

    Settled {
        source: source.name().to_string(),
        elapsed: started.elapsed(),
        settlement,
    }
}

/// Merge one settled source into the snapshot
fn reduce(snapshot: &mut NftSnapshot, settled: Settled) -> SourceReport {
    let Settled {
        source,
        elapsed,
        settlement,
    } = settled;

    let (outcome, item_count, detail) = match settlement {
        Settlement::Contributed(contribution) => {
            let (items, skipped) = contribution.into_parts();
            for item in &skipped {
                warn!(source = %source, key = %item.key, reason = %item.reason, "item dropped");
            }
            let count = items.len();
            snapshot.merge(items);

            let outcome = if count > 0 {
                SourceOutcome::Contributed
            } else {
                SourceOutcome::Empty
            };
            let detail = (!skipped.is_empty()).then(|| format!("{} items dropped", skipped.len()));
            (outcome, count, detail)
        }
        Settlement::NotApplicable => (SourceOutcome::Empty, 0, None),
        Settlement::Failed(reason) => {
            warn!(source = %source, reason = %reason, "source failed");
            (SourceOutcome::Failed, 0, Some(reason))
        }
        Settlement::TimedOut => {
            warn!(source = %source, "source timed out");
            (SourceOutcome::TimedOut, 0, None)
        }
    };

    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    debug!(source = %source, outcome = %outcome, item_count, elapsed_ms, "source settled");

    SourceReport {
        source,
        outcome,
        item_count,
        elapsed_ms,
        detail,
    }
}
