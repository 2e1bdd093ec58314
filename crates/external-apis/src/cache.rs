// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Caching layer for off-chain metadata documents
//!
//! Token metadata documents are immutable in practice and heavily shared between
//! queries (the same collection is looked up for many owners), so fetched documents are
//! kept in memory keyed by their resolved URL. Entries expire after a fixed TTL; when
//! the cache is full the least recently read entry is evicted.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

const DEFAULT_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug)]
struct Entry {
    document: Arc<Value>,
    stored_at: Instant,
    last_read: Instant,
}

impl Entry {
    fn new(document: Arc<Value>) -> Self {
        let now = Instant::now();
        Self {
            document,
            stored_at: now,
            last_read: now,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.stores,
            &self.evictions,
            &self.expired,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// In-memory cache of metadata documents keyed by URL
#[derive(Debug)]
pub struct DocumentCache {
    documents: DashMap<String, Entry>,
    ttl: Duration,
    max_entries: usize,
    counters: Counters,
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentCache {
    /// Create a cache with default settings
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with custom settings; `max_entries == 0` disables caching
    pub fn with_settings(ttl: Duration, max_entries: usize) -> Self {
        Self {
            documents: DashMap::new(),
            ttl,
            max_entries,
            counters: Counters::default(),
        }
    }

    /// Get a fresh cached document
    pub fn get(&self, url: &str) -> Option<Arc<Value>> {
        let fresh = self.documents.get_mut(url).and_then(|mut entry| {
            entry.is_fresh(self.ttl).then(|| {
                entry.last_read = Instant::now();
                Arc::clone(&entry.document)
            })
        });

        if fresh.is_some() {
            Counters::bump(&self.counters.hits, 1);
            trace!(url, "document cache hit");
            return fresh;
        }

        if self
            .documents
            .remove_if(url, |_, entry| !entry.is_fresh(self.ttl))
            .is_some()
        {
            Counters::bump(&self.counters.expired, 1);
            debug!(url, "expired document removed from cache");
        }
        Counters::bump(&self.counters.misses, 1);
        None
    }

    /// Store a document, making room first if the cache is full
    pub fn store(&self, url: &str, document: Arc<Value>) {
        if self.max_entries == 0 {
            return;
        }

        if self.documents.len() >= self.max_entries && !self.documents.contains_key(url) {
            self.cleanup_expired();
            if self.documents.len() >= self.max_entries {
                self.evict_least_recently_read();
            }
        }

        self.documents.insert(url.to_string(), Entry::new(document));
        Counters::bump(&self.counters.stores, 1);
        trace!(url, size = self.documents.len(), "stored document in cache");
    }

    fn evict_least_recently_read(&self) {
        let victim = self
            .documents
            .iter()
            .min_by_key(|entry| entry.last_read)
            .map(|entry| entry.key().clone());

        if let Some((url, entry)) = victim.and_then(|key| self.documents.remove(&key)) {
            Counters::bump(&self.counters.evictions, 1);
            debug!(
                url,
                age_ms = entry.stored_at.elapsed().as_millis(),
                "evicted least recently read document"
            );
        }
    }

    /// Remove expired entries, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let before = self.documents.len();
        self.documents.retain(|_, entry| entry.is_fresh(self.ttl));
        let removed = before.saturating_sub(self.documents.len());

        if removed > 0 {
            Counters::bump(&self.counters.expired, removed as u64);
            debug!(removed, "cleaned up expired documents");
        }
        removed
    }

    /// Drop every document and reset the counters
    pub fn clear(&self) {
        self.documents.clear();
        self.counters.reset();
    }

    /// Number of cached documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Snapshot of the cache counters
    pub fn stats(&self) -> DocumentCacheStats {
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        let hits = read(&self.counters.hits);
        let misses = read(&self.counters.misses);

        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        };

        DocumentCacheStats {
            entries: self.documents.len(),
            max_entries: self.max_entries,
            hits,
            misses,
            stores: read(&self.counters.stores),
            evictions: read(&self.counters.evictions),
            expired: read(&self.counters.expired),
            hit_rate,
        }
    }
}

/// Cache counters at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCacheStats {
    /// Documents currently cached
    pub entries: usize,
    /// Capacity
    pub max_entries: usize,
    /// Reads answered from the cache
    pub hits: u64,
    /// Reads that found nothing fresh
    pub misses: u64,
    /// Documents stored
    pub stores: u64,
    /// Documents evicted for capacity
    pub evictions: u64,
    /// Documents dropped after their TTL
    pub expired: u64,
    /// `hits / (hits + misses)`, 0 when nothing was read
    pub hit_rate: f64,
}
