// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bazaar Targeted-Query Cache
//
// Every read the market UI makes goes through this crate. It guarantees at
// most one remote resolution in flight per (query kind, normalized key),
// order-independent cache keys, chunked batching below the remote store's
// predicate ceiling, and best-effort partial results when chunks fail.
//
// # Modules
//
// - [`key`] -- Key normalization and search pattern construction.
// - [`kind`] -- The query kinds that namespace the cache.
// - [`value`] -- Cached payloads and the `Cacheable` conversion trait.
// - [`store`] -- Resolved entries, in-flight handles, accumulators.
// - [`flight`] -- Resolver tasks and shared outcomes.
// - [`batch`] -- The chunking batch query executor.
// - [`market`] -- `MarketCache`, the interface exposed to callers.
// - [`abort`] -- Cooperative cancellation signals.
// - [`config`] -- `MarketConfig` and environment overlay.
// - [`stats`] -- Atomic counters and the `CacheStats` snapshot.
// - [`error`] -- The `CacheError` enum.

pub mod abort;
pub mod batch;
pub mod config;
pub mod error;
pub mod flight;
pub mod key;
pub mod kind;
pub mod market;
pub mod stats;
pub mod store;
pub mod value;

pub use abort::{AbortController, AbortSignal};
pub use config::{Collections, MarketConfig};
pub use error::CacheError;
pub use key::{codes_key, search_key, search_patterns, CodeSet, ItemId, KeySet, NormalizedKey};
pub use kind::{QueryFamily, QueryKind};
pub use market::MarketCache;
pub use stats::CacheStats;
pub use store::CacheStore;
pub use value::{AttributeMap, CacheEntry, CachedValue, Cacheable, FlagMap, ItemRecord, RowMap};
