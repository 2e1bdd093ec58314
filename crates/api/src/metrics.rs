// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics module
//!
//! Provides global metrics using the default Prometheus registry via macros and
//! an Axum-compatible metrics handler.

use std::sync::LazyLock;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use external_apis::QueryOutcome;
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, TextEncoder, register_histogram_vec,
    register_int_counter_vec,
};
use tracing::error;

/// Finished queries, labeled by outcome (`completed` or `rejected`)
pub static QUERIES_BY_OUTCOME: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "nft_api_queries_total",
        "Total number of ownership queries, labeled by outcome",
        &["outcome"]
    )
    .expect("Failed to create nft_api_queries_total counter vec")
});

/// Time each source took to settle, in seconds
pub static SOURCE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "nft_api_source_duration_seconds",
        "Per-source query durations in seconds",
        &["source", "outcome"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to create source duration histogram")
});

/// Items contributed by each source
pub static SOURCE_ITEMS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "nft_api_source_items_total",
        "Total number of items contributed, labeled by source",
        &["source"]
    )
    .expect("Failed to create nft_api_source_items_total counter vec")
});

/// Record a finished query
pub fn record_query(outcome: &QueryOutcome) {
    let label = if outcome.snapshot.error().is_some() {
        "rejected"
    } else {
        "completed"
    };
    QUERIES_BY_OUTCOME.with_label_values(&[label]).inc();

    for report in &outcome.reports {
        let result = report.outcome.to_string();
        #[allow(clippy::cast_precision_loss)]
        let seconds = report.elapsed_ms as f64 / 1000.0;
        SOURCE_DURATION
            .with_label_values(&[report.source.as_str(), result.as_str()])
            .observe(seconds);
        SOURCE_ITEMS
            .with_label_values(&[report.source.as_str()])
            .inc_by(u64::try_from(report.item_count).unwrap_or(u64::MAX));
    }
}

/// Axum handler that exports metrics in Prometheus text format
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match String::from_utf8(buffer) {
        Ok(body) => (
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "metrics buffer is not UTF-8");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
