// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metrics-collecting wrapper for Bazaar remote stores.
//
// Wraps any `RemoteStore` and transparently records how many queries were
// issued, how many failed, how many rows came back, which collections were
// hit, and how large every `in` list was. The cache's deduplication and
// chunking guarantees are asserted against these counters.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::RemoteStore;
use crate::error::RemoteError;
use crate::predicate::{QueryRequest, Row};

/// Accumulated statistics for a remote store.
///
/// All counters are monotonically increasing until [`MetricsStore::reset_stats`].
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Number of queries issued.
    pub query_count: u64,
    /// Number of queries that returned an error.
    pub failure_count: u64,
    /// Total rows returned across all successful queries.
    pub rows_returned: u64,
    /// Cumulative wall-clock latency of all queries, in milliseconds.
    pub latency_sum_ms: f64,
    /// Queries issued per collection.
    pub per_collection: BTreeMap<String, u64>,
    /// Size of the largest `in` list of each query, in issue order.
    pub in_list_sizes: Vec<usize>,
}

impl StoreStats {
    /// Queries issued against `collection`.
    pub fn queries_for(&self, collection: &str) -> u64 {
        self.per_collection.get(collection).copied().unwrap_or(0)
    }
}

/// A remote store wrapper that collects query metrics.
///
/// # Example
///
/// ```rust
/// use bazaar_remote::backend::RemoteStore;
/// use bazaar_remote::memory::InMemoryStore;
/// use bazaar_remote::metrics::MetricsStore;
/// use bazaar_remote::predicate::QueryRequest;
///
/// # tokio_test::block_on(async {
/// let inner = InMemoryStore::new();
/// inner.create_collection("items").await;
/// let metered = MetricsStore::new(inner);
///
/// metered.query(&QueryRequest::new("items")).await.unwrap();
///
/// let stats = metered.stats().await;
/// assert_eq!(stats.query_count, 1);
/// # });
/// ```
pub struct MetricsStore<S: RemoteStore> {
    /// The wrapped store that answers the queries.
    inner: S,
    /// Shared, mutable statistics accumulator.
    stats: Arc<RwLock<StoreStats>>,
}

impl<S: RemoteStore> MetricsStore<S> {
    /// Wrap `inner` with metrics collection.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            stats: Arc::new(RwLock::new(StoreStats::default())),
        }
    }

    /// Return a snapshot of the current statistics.
    pub async fn stats(&self) -> StoreStats {
        self.stats.read().await.clone()
    }

    /// Reset all statistics to zero.
    pub async fn reset_stats(&self) {
        let mut s = self.stats.write().await;
        *s = StoreStats::default();
    }

    /// Return a reference to the inner store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RemoteStore> RemoteStore for MetricsStore<S> {
    async fn query(&self, request: &QueryRequest) -> Result<Vec<Row>, RemoteError> {
        let start = Instant::now();
        let result = self.inner.query(request).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut s = self.stats.write().await;
        s.query_count += 1;
        s.latency_sum_ms += elapsed_ms;
        *s.per_collection
            .entry(request.collection.clone())
            .or_insert(0) += 1;
        s.in_list_sizes.push(request.largest_in_list());
        match &result {
            Ok(rows) => s.rows_returned += rows.len() as u64,
            Err(_) => s.failure_count += 1,
        }

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
