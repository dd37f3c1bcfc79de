// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bazaar Remote Store Abstraction
//
// This crate provides the predicate-query interface Bazaar uses to reach the
// hosted market database. The `RemoteStore` trait runs one query and returns
// JSON rows, so the caching layer can swap a live HTTP gateway for an
// in-process store without changing any logic.
//
// # Modules
//
// - [`backend`] -- The `RemoteStore` trait.
// - [`error`] -- The `RemoteError` enum covering all store failure modes.
// - [`predicate`] -- `QueryRequest`, `Predicate` and the `ILIKE` matcher.
// - [`memory`] -- An in-memory store with latency and failure injection.
// - [`metrics`] -- A transparent wrapper that counts queries and rows.
// - [`rest`] -- A PostgREST-dialect HTTP store built on `reqwest`.
//
// # Example
//
// ```rust
// use bazaar_remote::backend::RemoteStore;
// use bazaar_remote::memory::InMemoryStore;
// use bazaar_remote::metrics::MetricsStore;
// use bazaar_remote::predicate::{Predicate, QueryRequest};
// use serde_json::json;
//
// # tokio_test::block_on(async {
// let raw = InMemoryStore::new();
// raw.insert_json("items", vec![json!({"id": 1, "name": "Iron Ingot"})]).await;
// let metered = MetricsStore::new(raw);
//
// let rows = metered
//     .query(&QueryRequest::new("items").filter(Predicate::ilike("name", "%ingot%")))
//     .await
//     .unwrap();
// assert_eq!(rows.len(), 1);
// assert_eq!(metered.stats().await.query_count, 1);
// # });
// ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod predicate;
pub mod rest;

// Re-export the most commonly used types at the crate root for convenience.
pub use backend::RemoteStore;
pub use error::RemoteError;
pub use memory::InMemoryStore;
pub use metrics::{MetricsStore, StoreStats};
pub use predicate::{Predicate, QueryRequest, Row, RowRange};
pub use rest::{RestConfig, RestStore};
