// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! In-flight fetch tracking
//!
//! Adapters are shared between concurrent queries, so "is this adapter fetching" is a
//! counter of outstanding network phases rather than a flag. The counter is only for
//! introspection; nothing depends on it for correctness.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Counter of network phases currently running on an adapter
#[derive(Debug, Clone, Default)]
pub struct FetchTracker {
    in_flight: Arc<AtomicUsize>,
}

impl FetchTracker {
    /// Create a tracker with nothing in flight
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a network phase; it ends when the guard is dropped
    #[must_use = "the fetch ends as soon as the guard is dropped"]
    pub fn begin(&self) -> FetchGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        FetchGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Whether at least one network phase is running
    pub fn is_fetching(&self) -> bool {
        self.in_flight() > 0
    }

    /// Number of network phases running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Ends a network phase on drop
#[derive(Debug)]
pub struct FetchGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
