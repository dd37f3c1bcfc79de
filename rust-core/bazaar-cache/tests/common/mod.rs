// SPDX-License-Identifier: PMPL-1.0-or-later
//! Shared fixtures for the market cache integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use bazaar_cache::{MarketCache, MarketConfig};
use bazaar_remote::{InMemoryStore, QueryRequest, RemoteError, RemoteStore, Row};
use serde_json::json;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary. Honours `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// An in-memory store that records every request it answers.
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub inner: InMemoryStore,
    requests: Arc<Mutex<Vec<QueryRequest>>>,
}

impl RecordingStore {
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, collection: &str) -> Vec<QueryRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.collection == collection)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteStore for RecordingStore {
    async fn query(&self, request: &QueryRequest) -> Result<Vec<Row>, RemoteError> {
        self.requests.lock().unwrap().push(request.clone());
        self.inner.query(request).await
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// A small market: six items with levels, patches and marketability.
///
/// | id | level | patch | marketable |
/// |----|-------|-------|------------|
/// | 1  | 50    | 700   | no         |
/// | 2  | 90    | 650   | yes        |
/// | 3  | -     | -     | no         |
/// | 4  | 90    | -     | yes        |
/// | 5  | 5 (swapped, suppressed) | - | no |
/// | 6  | 10    | -     | no         |
pub async fn seed_market(store: &InMemoryStore) {
    store
        .insert_json(
            "items",
            (1..=6).map(|i| {
                json!({
                    "id": i,
                    "name": format!("Bronze Item {i}"),
                    "category_id": if i <= 3 { 10 } else { 20 },
                    "jobs": if i % 2 == 0 { json!(["PLD", "WAR"]) } else { json!(["WHM"]) },
                })
            }),
        )
        .await;
    store
        .insert_json(
            "equipment",
            vec![
                json!({"id": 1, "level": 50}),
                json!({"id": 2, "level": 90}),
                json!({"id": 4, "level": 90}),
                json!({"id": 5, "level": 5}),
                json!({"id": 6, "level": 10}),
            ],
        )
        .await;
    store
        .insert_json(
            "item_patches",
            vec![json!({"id": 1, "patch": 700}), json!({"id": 2, "patch": 650})],
        )
        .await;
    store
        .insert_json("marketable_items", vec![json!({"id": 2}), json!({"id": 4})])
        .await;
    store
        .insert_json(
            "item_descriptions",
            (1..=6).map(|i| json!({"id": i, "text": format!("Description {i}")})),
        )
        .await;
}

/// Items `1..=count`, skipping multiples of 7.
pub async fn seed_many_items(store: &InMemoryStore, count: i64) {
    store
        .insert_json(
            "items",
            (1..=count)
                .filter(|i| i % 7 != 0)
                .map(|i| json!({"id": i, "name": format!("Item {i}")})),
        )
        .await;
}

pub async fn recording_market(config: MarketConfig) -> (MarketCache<RecordingStore>, RecordingStore) {
    init_tracing();
    let remote = RecordingStore::default();
    seed_market(&remote.inner).await;
    let cache = MarketCache::new(remote.clone(), config).unwrap();
    (cache, remote)
}
