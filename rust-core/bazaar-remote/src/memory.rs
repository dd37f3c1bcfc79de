// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory remote store for Bazaar.
//
// Holds named collections of JSON rows in a `BTreeMap` wrapped in a tokio
// `RwLock` and evaluates every predicate shape locally. Latency and failures
// can be injected so the cache's concurrency and partial-failure behaviour
// can be exercised without a network.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::RemoteStore;
use crate::error::RemoteError;
use crate::predicate::{values_equal, Predicate, QueryRequest, Row};

/// Default ceiling on the number of values in a single `in` predicate.
pub const DEFAULT_MAX_IN_VALUES: usize = 1000;

/// An injected failure: queries against `collection` fail, either always or
/// only when one of their `eq`/`in` predicates mentions `trigger`.
#[derive(Debug, Clone)]
struct FailureRule {
    collection: String,
    trigger: Option<Value>,
}

impl FailureRule {
    fn applies_to(&self, request: &QueryRequest) -> bool {
        if self.collection != request.collection {
            return false;
        }
        let Some(trigger) = &self.trigger else {
            return true;
        };
        request.filters.iter().any(|p| match p {
            Predicate::Eq { value, .. } | Predicate::Contains { value, .. } => {
                values_equal(value, trigger)
            }
            Predicate::In { values, .. } => values.iter().any(|v| values_equal(v, trigger)),
            Predicate::ILike { .. } => false,
        })
    }
}

#[derive(Debug)]
struct MemoryInner {
    collections: BTreeMap<String, Vec<Row>>,
    latency: Option<Duration>,
    failures: Vec<FailureRule>,
    max_in_values: usize,
}

impl Default for MemoryInner {
    fn default() -> Self {
        Self {
            collections: BTreeMap::new(),
            latency: None,
            failures: Vec::new(),
            max_in_values: DEFAULT_MAX_IN_VALUES,
        }
    }
}

/// An in-memory remote store backed by sorted collections of rows.
///
/// All data lives in process memory and is lost on drop. Clones share the
/// same underlying collections.
///
/// # Example
///
/// ```rust
/// use bazaar_remote::backend::RemoteStore;
/// use bazaar_remote::memory::InMemoryStore;
/// use bazaar_remote::predicate::{Predicate, QueryRequest};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryStore::new();
/// store
///     .insert_json("items", vec![json!({"id": 1, "name": "Iron Ingot"})])
///     .await;
///
/// let request = QueryRequest::new("items").filter(Predicate::eq("id", 1));
/// let rows = store.query(&request).await.unwrap();
/// assert_eq!(rows.len(), 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl InMemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection (queries against unknown collections fail).
    pub async fn create_collection(&self, collection: &str) {
        let mut inner = self.inner.write().await;
        inner.collections.entry(collection.to_string()).or_default();
    }

    /// Append rows to `collection`, creating it if needed.
    pub async fn insert_rows<I>(&self, collection: &str, rows: I)
    where
        I: IntoIterator<Item = Row>,
    {
        let mut inner = self.inner.write().await;
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(rows);
    }

    /// Append JSON objects to `collection`. Non-object values are skipped.
    pub async fn insert_json<I>(&self, collection: &str, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let rows: Vec<Row> = values
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.insert_rows(collection, rows).await;
    }

    /// Number of rows currently held in `collection`.
    pub async fn row_count(&self, collection: &str) -> usize {
        let inner = self.inner.read().await;
        inner.collections.get(collection).map_or(0, Vec::len)
    }

    /// Delay every query by `latency` before answering.
    pub async fn set_latency(&self, latency: Duration) {
        self.inner.write().await.latency = Some(latency);
    }

    /// Change the `in` predicate ceiling.
    pub async fn set_max_in_values(&self, max: usize) {
        self.inner.write().await.max_in_values = max;
    }

    /// Make every query against `collection` fail.
    pub async fn fail_collection(&self, collection: &str) {
        self.inner.write().await.failures.push(FailureRule {
            collection: collection.to_string(),
            trigger: None,
        });
    }

    /// Make queries against `collection` fail whenever one of their
    /// predicates mentions `value`.
    pub async fn fail_when_filtering(&self, collection: &str, value: impl Into<Value>) {
        self.inner.write().await.failures.push(FailureRule {
            collection: collection.to_string(),
            trigger: Some(value.into()),
        });
    }

    /// Remove every injected failure.
    pub async fn clear_failures(&self) {
        self.inner.write().await.failures.clear();
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn query(&self, request: &QueryRequest) -> Result<Vec<Row>, RemoteError> {
        let latency = self.inner.read().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let inner = self.inner.read().await;

        if inner.failures.iter().any(|rule| rule.applies_to(request)) {
            return Err(RemoteError::Unavailable(format!(
                "injected failure for collection '{}'",
                request.collection
            )));
        }

        let size = request.largest_in_list();
        if size > inner.max_in_values {
            return Err(RemoteError::PredicateTooLarge {
                size,
                max: inner.max_in_values,
            });
        }

        let rows = inner
            .collections
            .get(&request.collection)
            .ok_or_else(|| RemoteError::UnknownCollection(request.collection.clone()))?;

        let (skip, take) = match request.range {
            Some(range) => (range.from, range.len()),
            None => (0, usize::MAX),
        };
        let take = request.limit.map_or(take, |limit| take.min(limit));

        let result: Vec<Row> = rows
            .iter()
            .filter(|row| request.matches(row))
            .skip(skip)
            .take(take)
            .map(|row| request.project(row))
            .collect();

        debug!(
            collection = %request.collection,
            filters = request.filters.len(),
            rows = result.len(),
            "In-memory query answered"
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
