// SPDX-License-Identifier: PMPL-1.0-or-later
//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Aggregate statistics about cache behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from a resolved entry.
    pub hits: u64,
    /// Lookups that attached to a resolution already in flight.
    pub joins: u64,
    /// Lookups that started a new resolution.
    pub misses: u64,
    /// Remote queries issued by the executor.
    pub remote_queries: u64,
    /// Remote queries whose failure was absorbed.
    pub failed_chunks: u64,
    /// Callers that stopped waiting because their signal fired.
    pub aborted_waits: u64,
    /// Attribute values dropped by the swapped-column guard.
    pub suppressed_values: u64,
    /// Resolved entries currently held.
    pub entries: usize,
    /// Resolutions currently in flight.
    pub in_flight: usize,
    /// Bumped on every `clear()`.
    pub generation: u64,
    /// `hits / (hits + joins + misses)`, or 0.0 if no lookups.
    pub hit_ratio: f64,
}

/// Lock-free counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub struct StatsCounters {
    hits: AtomicU64,
    joins: AtomicU64,
    misses: AtomicU64,
    remote_queries: AtomicU64,
    failed_chunks: AtomicU64,
    aborted_waits: AtomicU64,
    suppressed_values: AtomicU64,
}

impl StatsCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_join(&self) {
        self.joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_query(&self) {
        self.remote_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_chunk(&self) {
        self.failed_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aborted_wait(&self) {
        self.aborted_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed_value(&self) {
        self.suppressed_values.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters. Store-level gauges are filled in by the caller.
    pub fn snapshot(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let joins = self.joins.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + joins + misses;
        let hit_ratio = if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        };

        CacheStats {
            hits,
            joins,
            misses,
            remote_queries: self.remote_queries.load(Ordering::Relaxed),
            failed_chunks: self.failed_chunks.load(Ordering::Relaxed),
            aborted_waits: self.aborted_waits.load(Ordering::Relaxed),
            suppressed_values: self.suppressed_values.load(Ordering::Relaxed),
            hit_ratio,
            ..CacheStats::default()
        }
    }
}
