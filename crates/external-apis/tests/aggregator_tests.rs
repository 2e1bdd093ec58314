// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the query aggregator, using in-process sources

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use api_client::{NftSource, SourceContribution, SourceError};
use async_trait::async_trait;
use external_apis::{
    Aggregator, AggregatorConfig, ProgressReporter, SourceRegistry,
    classifier::AddressClassifier,
};
use shared_types::{NftItem, NftSnapshot, SourceFamily, SourceOutcome};

use fixtures::ALICE;

const EVM_OWNER: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Items(usize),
    NotApplicable,
    Fail,
    Panic,
    Stall,
}

#[derive(Debug)]
struct StubSource {
    name: &'static str,
    family: SourceFamily,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl StubSource {
    fn new(name: &'static str, family: SourceFamily, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            family,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NftSource for StubSource {
    fn name(&self) -> &str {
        self.name
    }

    fn family(&self) -> SourceFamily {
        self.family
    }

    #[allow(clippy::panic)]
    async fn fetch_by_address(
        &self,
        address: &str,
    ) -> Result<Option<SourceContribution>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Items(n) => {
                let mut contribution: SourceContribution = (0..n)
                    .map(|i| NftItem::new(format!("{i}-{}", self.name), self.name, "KSM", address))
                    .collect();
                contribution.skip("broken", "metadata fetch failed");
                Ok(Some(contribution))
            }
            Behavior::NotApplicable => Ok(None),
            Behavior::Fail => Err(SourceError::Connection {
                message: "no endpoint".to_string(),
            }),
            Behavior::Panic => panic!("adapter bug"),
            Behavior::Stall => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Some(SourceContribution::empty()))
            }
        }
    }
}

#[derive(Debug, Default)]
struct RecordingReporter {
    snapshots: Mutex<Vec<NftSnapshot>>,
    closed: AtomicUsize,
}

impl RecordingReporter {
    fn snapshots(&self) -> Vec<NftSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressReporter for RecordingReporter {
    async fn report(&self, snapshot: &NftSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn aggregator(sources: &[Arc<StubSource>], config: AggregatorConfig) -> Aggregator {
    let mut registry = SourceRegistry::new();
    for source in sources {
        registry.register(Arc::clone(source) as Arc<dyn NftSource>);
    }
    Aggregator::new(Arc::new(registry), config)
}

fn assert_lifecycle(snapshots: &[NftSnapshot]) {
    let (last, rest) = snapshots.split_last().unwrap();
    assert!(!last.is_fetching());
    assert!(rest.iter().all(NftSnapshot::is_fetching));
    for snapshot in snapshots {
        assert_eq!(snapshot.count(), snapshot.items().len());
    }
}

#[tokio::test]
async fn empty_address_runs_no_sources() {
    let substrate = StubSource::new("RMRK1", SourceFamily::Substrate, Behavior::Items(1));
    let evm = StubSource::new("Moonbeam", SourceFamily::AccountModel, Behavior::Items(1));
    let aggregator = aggregator(&[substrate.clone(), evm.clone()], AggregatorConfig::default());
    let reporter = RecordingReporter::default();

    let outcome = aggregator.query("", &reporter).await;

    assert_eq!(outcome.snapshot.error(), Some("No Address Provided"));
    assert_eq!(outcome.snapshot.count(), 0);
    assert!(outcome.reports.is_empty());
    assert_eq!(substrate.calls() + evm.calls(), 0);

    let snapshots = reporter.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_lifecycle(&snapshots);
    assert_eq!(reporter.closed(), 1);
}

#[tokio::test]
async fn unknown_address_family_is_a_top_level_error() {
    let substrate = StubSource::new("RMRK1", SourceFamily::Substrate, Behavior::Items(1));
    let aggregator = aggregator(&[substrate.clone()], AggregatorConfig::default());
    let reporter = RecordingReporter::default();

    let outcome = aggregator.query("definitely-not-an-address", &reporter).await;

    assert_eq!(
        outcome.snapshot.error(),
        Some("Address is not a valid Substrate or Ethereum Address")
    );
    assert!(outcome.snapshot.items().is_empty());
    assert_eq!(substrate.calls(), 0);
    assert_lifecycle(&reporter.snapshots());
}

#[tokio::test]
async fn family_without_sources_is_a_top_level_error() {
    let substrate = StubSource::new("RMRK1", SourceFamily::Substrate, Behavior::Items(1));
    let aggregator = aggregator(&[substrate.clone()], AggregatorConfig::default());
    let reporter = RecordingReporter::default();

    let outcome = aggregator.query(EVM_OWNER, &reporter).await;

    assert_eq!(
        outcome.snapshot.error(),
        Some("No Source Available For This Address")
    );
    assert_eq!(outcome.snapshot.count(), 0);
    assert!(outcome.reports.is_empty());
    assert_eq!(substrate.calls(), 0);

    let snapshots = reporter.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_lifecycle(&snapshots);
    assert_eq!(reporter.closed(), 1);
}

#[tokio::test]
async fn total_failure_of_one_source_keeps_the_others() {
    let failing = StubSource::new("RMRK1", SourceFamily::Substrate, Behavior::Fail);
    let working = StubSource::new("RMRK2", SourceFamily::Substrate, Behavior::Items(3));
    let aggregator = aggregator(&[failing.clone(), working.clone()], AggregatorConfig::default());
    let reporter = RecordingReporter::default();

    let outcome = aggregator.query(ALICE, &reporter).await;

    assert_eq!(outcome.snapshot.count(), 3);
    assert!(outcome.snapshot.error().is_none());
    assert!(outcome.snapshot.items().iter().all(|i| i.source_name == "RMRK2"));
    assert!(outcome.snapshot.items().iter().all(|i| i.owner_address == ALICE));

    let snapshots = reporter.snapshots();
    // acceptance, one per source, final
    assert_eq!(snapshots.len(), 4);
    assert_lifecycle(&snapshots);
    assert_eq!(reporter.closed(), 1);

    let mut outcomes: Vec<_> = outcome
        .reports
        .iter()
        .map(|r| (r.source.as_str(), r.outcome))
        .collect();
    outcomes.sort_unstable_by_key(|(source, _)| *source);
    assert_eq!(
        outcomes,
        [
            ("RMRK1", SourceOutcome::Failed),
            ("RMRK2", SourceOutcome::Contributed)
        ]
    );
}

#[tokio::test]
async fn panicking_source_is_a_failure() {
    let panicking = StubSource::new("Statemine", SourceFamily::Substrate, Behavior::Panic);
    let working = StubSource::new("RMRK2", SourceFamily::Substrate, Behavior::Items(2));
    let aggregator = aggregator(&[panicking, working], AggregatorConfig::default());

    let outcome = aggregator.query(ALICE, &RecordingReporter::default()).await;

    assert_eq!(outcome.snapshot.count(), 2);
    assert!(outcome.snapshot.error().is_none());
    let report = outcome
        .reports
        .iter()
        .find(|r| r.source == "Statemine")
        .unwrap();
    assert_eq!(report.outcome, SourceOutcome::Failed);
    assert_eq!(report.detail.as_deref(), Some("source panicked"));
}

#[test]
fn release_profile_keeps_unwinding() {
    let manifest = include_str!("../../../Cargo.toml");
    let release = manifest
        .split("[profile.release]")
        .nth(1)
        .unwrap()
        .split("\n[")
        .next()
        .unwrap();

    let panic_lines: Vec<_> = release
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("panic"))
        .collect();
    assert_eq!(panic_lines, ["panic = \"unwind\""]);
}

#[tokio::test]
async fn stalled_source_times_out() {
    let stalled = StubSource::new("Statemine", SourceFamily::Substrate, Behavior::Stall);
    let working = StubSource::new("RMRK1", SourceFamily::Substrate, Behavior::Items(1));
    let config = AggregatorConfig {
        source_timeout_seconds: 1,
        ..AggregatorConfig::default()
    };
    let aggregator = aggregator(&[stalled, working], config);

    let outcome = aggregator.query(ALICE, &RecordingReporter::default()).await;

    assert_eq!(outcome.snapshot.count(), 1);
    assert!(!outcome.snapshot.is_fetching());
    assert!(
        outcome
            .reports
            .iter()
            .any(|r| r.source == "Statemine" && r.outcome == SourceOutcome::TimedOut)
    );
}

#[tokio::test]
async fn dispatches_only_matching_families() {
    let substrate = StubSource::new("RMRK1", SourceFamily::Substrate, Behavior::Items(1));
    let evm = StubSource::new("Moonbeam", SourceFamily::AccountModel, Behavior::Items(2));
    let aggregator = aggregator(&[substrate.clone(), evm.clone()], AggregatorConfig::default());

    let outcome = aggregator.query(EVM_OWNER, &RecordingReporter::default()).await;

    assert_eq!(outcome.snapshot.count(), 2);
    assert_eq!(evm.calls(), 1);
    assert_eq!(substrate.calls(), 0);
}

#[tokio::test]
async fn not_applicable_source_is_empty() {
    let source = StubSource::new("RMRK1", SourceFamily::Substrate, Behavior::NotApplicable);
    let aggregator = aggregator(&[source], AggregatorConfig::default());

    let outcome = aggregator.query(ALICE, &RecordingReporter::default()).await;

    assert_eq!(outcome.snapshot.count(), 0);
    assert!(outcome.snapshot.error().is_none());
    assert_eq!(outcome.reports[0].outcome, SourceOutcome::Empty);
}

#[tokio::test]
async fn diagnostics_are_opt_in() {
    let sources = [
        StubSource::new("RMRK1", SourceFamily::Substrate, Behavior::Items(1)),
        StubSource::new("RMRK2", SourceFamily::Substrate, Behavior::Fail),
    ];

    let quiet = aggregator(&sources, AggregatorConfig::default());
    let outcome = quiet.query(ALICE, &RecordingReporter::default()).await;
    assert!(outcome.snapshot.sources().is_empty());
    assert_eq!(outcome.reports.len(), 2);

    let verbose = aggregator(
        &sources,
        AggregatorConfig {
            diagnostics: true,
            ..AggregatorConfig::default()
        },
    );
    let outcome = verbose.query(ALICE, &RecordingReporter::default()).await;
    assert_eq!(outcome.snapshot.sources().len(), 2);

    let contributed = outcome
        .snapshot
        .sources()
        .iter()
        .find(|r| r.source == "RMRK1")
        .unwrap();
    assert_eq!(contributed.item_count, 1);
    assert_eq!(contributed.detail.as_deref(), Some("1 items dropped"));
}

#[tokio::test]
async fn custom_classifier_routes_new_families() {
    let source = StubSource::new("RMRK1", SourceFamily::Substrate, Behavior::Items(1));
    let aggregator = aggregator(&[source.clone()], AggregatorConfig::default()).with_classifier(
        AddressClassifier::empty().with_rule(SourceFamily::Substrate, |address| {
            address.starts_with("test:")
        }),
    );

    let outcome = aggregator
        .query("test:owner", &RecordingReporter::default())
        .await;

    assert_eq!(outcome.snapshot.count(), 1);
    assert_eq!(source.calls(), 1);
}
