// SPDX-License-Identifier: PMPL-1.0-or-later
//! The market cache: every read the UI layer makes goes through here.
//!
//! Each operation normalizes its input into a [`NormalizedKey`], then either
//! answers from the [`CacheStore`], attaches to a resolution already in
//! flight for the same `(kind, key)`, or starts a new one. New resolutions
//! run on their own tokio task and always complete, so a caller that gives up
//! (via its [`AbortSignal`]) only stops its own wait.
//!
//! Not-found is never an error: missing ids are absent from the result. Only
//! cancellation and setup errors reach the caller.
//!
//! # Example
//!
//! ```rust
//! use bazaar_cache::config::MarketConfig;
//! use bazaar_cache::market::MarketCache;
//! use bazaar_remote::InMemoryStore;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let remote = InMemoryStore::new();
//! remote
//!     .insert_json("items", vec![json!({"id": 1, "name": "Iron Ingot"})])
//!     .await;
//!
//! let cache = MarketCache::new(remote, MarketConfig::default()).unwrap();
//! let rows = cache.items([1, 1, 2], None).await.unwrap();
//! assert_eq!(rows[&1]["name"], "Iron Ingot");
//! assert!(!rows.contains_key(&2));
//!
//! // The same set in any order is a cache hit.
//! cache.items([2, 1], None).await.unwrap();
//! assert_eq!(cache.stats().hits, 1);
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;

use bazaar_remote::{RemoteStore, Row};
use serde_json::Value;
use tracing::{debug, info};

use crate::abort::{self, AbortSignal};
use crate::batch::BatchExecutor;
use crate::config::MarketConfig;
use crate::error::{CacheError, Result};
use crate::flight;
use crate::key::{search_key, CodeSet, ItemId, KeySet, NormalizedKey};
use crate::kind::QueryKind;
use crate::stats::{CacheStats, StatsCounters};
use crate::store::{Begin, CacheStore};
use crate::value::{sort_by_level, AttributeMap, Cacheable, FlagMap, ItemRecord, RowMap};

struct MarketInner<S> {
    config: MarketConfig,
    store: Arc<CacheStore>,
    executor: BatchExecutor<S>,
    stats: Arc<StatsCounters>,
}

/// Cached, deduplicated access to the market database.
///
/// Cheap to clone; clones share the same cache store.
pub struct MarketCache<S> {
    inner: Arc<MarketInner<S>>,
}

impl<S> Clone for MarketCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RemoteStore + 'static> MarketCache<S> {
    /// Build a cache over `remote` with its own, empty store.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] if `config` fails validation.
    pub fn new(remote: S, config: MarketConfig) -> Result<Self> {
        config.validate()?;
        let stats = Arc::new(StatsCounters::default());
        let executor = BatchExecutor::new(
            remote,
            config.chunk_size,
            config.search_limit,
            config.collections.clone(),
            Arc::clone(&stats),
        );
        info!(
            store = executor.remote().name(),
            chunk_size = config.chunk_size,
            cache_enabled = config.cache_enabled,
            "Market cache initialised"
        );
        Ok(Self {
            inner: Arc::new(MarketInner {
                config,
                store: Arc::new(CacheStore::new()),
                executor,
                stats,
            }),
        })
    }

    pub fn config(&self) -> &MarketConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.inner.store
    }

    /// The remote store this cache reads from.
    pub fn remote(&self) -> &S {
        self.inner.executor.remote()
    }

    /// Answer `(kind, key)` from the store, an in-flight resolution, or a new
    /// one running `work`.
    ///
    /// `work` receives a clone of this cache and the signal the executor
    /// should honour: `None` for shared resolutions, the caller's own signal
    /// when caching is disabled.
    async fn resolve<V, F, Fut>(
        &self,
        kind: QueryKind,
        key: NormalizedKey,
        abort: Option<&AbortSignal>,
        work: F,
    ) -> Result<V>
    where
        V: Cacheable,
        F: FnOnce(Self, Option<AbortSignal>) -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        abort::check(abort)?;

        if !self.inner.config.cache_enabled {
            self.inner.stats.record_miss();
            return work(self.clone(), abort.cloned()).await;
        }

        let outcome = match self.inner.store.begin(kind, &key) {
            Begin::Hit(entry) => {
                self.inner.stats.record_hit();
                debug!(%kind, %key, "Cache hit");
                return V::from_cached(&entry.value).ok_or(CacheError::ShapeMismatch { kind });
            }
            Begin::Joined(outcome) => {
                self.inner.stats.record_join();
                debug!(%kind, %key, "Joined in-flight resolution");
                outcome
            }
            Begin::Started(outcome, pending) => {
                self.inner.stats.record_miss();
                debug!(%kind, %key, "Started resolution");
                let work = work(self.clone(), None);
                flight::launch(Arc::clone(&self.inner.store), pending, async move {
                    work.await.map(V::into_cached)
                });
                outcome
            }
        };

        match flight::await_outcome(outcome, abort).await {
            Ok(value) => V::from_cached(&value).ok_or(CacheError::ShapeMismatch { kind }),
            Err(e) => {
                if e.is_aborted() {
                    self.inner.stats.record_aborted_wait();
                    debug!(%kind, %key, "Caller aborted its wait");
                }
                Err(e)
            }
        }
    }

    /// Item rows for `ids`. Non-positive and duplicate ids are ignored.
    pub async fn items<I>(&self, ids: I, abort: Option<&AbortSignal>) -> Result<RowMap>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let keys = KeySet::from_ids(ids);
        if keys.is_empty() {
            return Ok(RowMap::new());
        }
        let key = keys.key().clone();
        self.resolve(QueryKind::Items, key, abort, move |cache, signal| async move {
            let exec = &cache.inner.executor;
            exec.fetch_rows(&exec.collections().items, &keys, signal.as_ref())
                .await
        })
        .await
    }

    /// One item row. Answered from any cached `items` result for exactly
    /// this id, otherwise by a single-row lookup that is not cached.
    pub async fn item(&self, id: ItemId, abort: Option<&AbortSignal>) -> Result<Option<Row>> {
        if id <= 0 {
            return Ok(None);
        }
        abort::check(abort)?;

        if self.inner.config.cache_enabled {
            let key = KeySet::from_ids([id]).key().clone();
            if let Some(entry) = self.inner.store.get(QueryKind::Items, &key) {
                self.inner.stats.record_hit();
                let rows = RowMap::from_cached(&entry.value).ok_or(CacheError::ShapeMismatch {
                    kind: QueryKind::Items,
                })?;
                return Ok(rows.get(&id).cloned());
            }
        }

        self.inner.stats.record_miss();
        let exec = &self.inner.executor;
        exec.fetch_one(&exec.collections().items, id, abort).await
    }

    /// Description rows for `ids`. Ids resolved by earlier description
    /// lookups, with or without a row, are reused; only unseen ids are
    /// fetched.
    pub async fn descriptions<I>(&self, ids: I, abort: Option<&AbortSignal>) -> Result<RowMap>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let keys = KeySet::from_ids(ids);
        if keys.is_empty() {
            return Ok(RowMap::new());
        }

        let (mut known, missing) = if self.inner.config.cache_enabled {
            self.inner
                .store
                .accumulated(QueryKind::Descriptions, keys.ids())
        } else {
            (RowMap::new(), keys.ids().to_vec())
        };
        if missing.is_empty() {
            abort::check(abort)?;
            self.inner.stats.record_hit();
            debug!(ids = keys.len(), "Descriptions answered from accumulator");
            return Ok(known);
        }

        let missing = KeySet::from_ids(missing);
        let key = missing.key().clone();
        let fetched: RowMap = self
            .resolve(QueryKind::Descriptions, key, abort, move |cache, signal| async move {
                let exec = &cache.inner.executor;
                exec.fetch_rows(&exec.collections().descriptions, &missing, signal.as_ref())
                    .await
            })
            .await?;
        known.extend(fetched);
        Ok(known)
    }

    /// Item level per id; `None` when unknown.
    pub async fn item_levels<I>(&self, ids: I, abort: Option<&AbortSignal>) -> Result<AttributeMap>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let keys = KeySet::from_ids(ids);
        if keys.is_empty() {
            return Ok(AttributeMap::new());
        }
        let key = keys.key().clone();
        self.resolve(QueryKind::ItemLevels, key, abort, move |cache, signal| async move {
            let exec = &cache.inner.executor;
            let c = exec.collections();
            exec.fetch_attribute(&c.item_levels, &c.level_column, &keys, signal.as_ref())
                .await
        })
        .await
    }

    /// Patch (game version) per id; `None` when unknown.
    pub async fn patches<I>(&self, ids: I, abort: Option<&AbortSignal>) -> Result<AttributeMap>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let keys = KeySet::from_ids(ids);
        if keys.is_empty() {
            return Ok(AttributeMap::new());
        }
        let key = keys.key().clone();
        self.resolve(QueryKind::Patches, key, abort, move |cache, signal| async move {
            let exec = &cache.inner.executor;
            let c = exec.collections();
            exec.fetch_attribute(&c.patches, &c.patch_column, &keys, signal.as_ref())
                .await
        })
        .await
    }

    /// Marketability per id. Every requested id is present.
    pub async fn marketable<I>(&self, ids: I, abort: Option<&AbortSignal>) -> Result<FlagMap>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let keys = KeySet::from_ids(ids);
        if keys.is_empty() {
            return Ok(FlagMap::new());
        }
        let key = keys.key().clone();
        self.resolve(QueryKind::Marketable, key, abort, move |cache, signal| async move {
            let exec = &cache.inner.executor;
            exec.fetch_presence(&exec.collections().marketable, &keys, signal.as_ref())
                .await
        })
        .await
    }

    /// Items whose name matches `term`. A blank term returns nothing without
    /// touching the cache or the remote store.
    pub async fn search(
        &self,
        term: &str,
        fuzzy: bool,
        abort: Option<&AbortSignal>,
    ) -> Result<RowMap> {
        let key = search_key(term, fuzzy, Some(self.inner.config.search_limit));
        if key.is_empty() {
            return Ok(RowMap::new());
        }
        let term = term.trim().to_string();
        self.resolve(QueryKind::Search, key, abort, move |cache, signal| async move {
            cache
                .inner
                .executor
                .search(&term, fuzzy, signal.as_ref())
                .await
        })
        .await
    }

    /// Ids of items in any of `categories`.
    pub async fn ids_by_categories<I>(
        &self,
        categories: I,
        abort: Option<&AbortSignal>,
    ) -> Result<KeySet>
    where
        I: IntoIterator<Item = i64>,
    {
        let categories = KeySet::from_ids(categories);
        if categories.is_empty() {
            return Ok(KeySet::default());
        }
        let key = categories.key().clone();
        self.resolve(QueryKind::ItemsByCategory, key, abort, move |cache, signal| async move {
            let exec = &cache.inner.executor;
            let c = exec.collections();
            let values: Vec<Value> = categories.sorted().into_iter().map(Value::from).collect();
            exec.fetch_reverse(&c.items, &c.category_column, &values, signal.as_ref())
                .await
        })
        .await
    }

    /// Ids of items usable by any of the job `codes`.
    pub async fn ids_by_jobs<'a, I>(&self, codes: I, abort: Option<&AbortSignal>) -> Result<KeySet>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let codes = CodeSet::new(codes);
        if codes.is_empty() {
            return Ok(KeySet::default());
        }
        let key = codes.key().clone();
        self.resolve(QueryKind::ItemsByJob, key, abort, move |cache, signal| async move {
            let exec = &cache.inner.executor;
            let c = exec.collections();
            exec.fetch_containing(&c.items, &c.jobs_column, codes.codes(), signal.as_ref())
                .await
        })
        .await
    }

    /// Joined records for `ids`, ordered by item level descending (unknown
    /// last, ties by id descending).
    pub async fn listing<I>(&self, ids: I, abort: Option<&AbortSignal>) -> Result<Vec<ItemRecord>>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let keys = KeySet::from_ids(ids);
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let key = keys.key().clone();
        self.resolve(QueryKind::ListingByIds, key, abort, move |cache, signal| {
            cache.build_listing(keys, None, signal)
        })
        .await
    }

    /// Joined records for the items matching `term`, in listing order.
    pub async fn search_listing(
        &self,
        term: &str,
        fuzzy: bool,
        abort: Option<&AbortSignal>,
    ) -> Result<Vec<ItemRecord>> {
        let key = search_key(term, fuzzy, Some(self.inner.config.search_limit));
        if key.is_empty() {
            return Ok(Vec::new());
        }
        let term = term.trim().to_string();
        self.resolve(QueryKind::ListingBySearch, key, abort, move |cache, signal| async move {
            let rows = cache.search(&term, fuzzy, signal.as_ref()).await?;
            let keys = KeySet::from_ids(rows.keys().copied());
            cache.build_listing(keys, Some(rows), signal).await
        })
        .await
    }

    /// Resolve names, then levels, sort, then resolve the remaining
    /// attributes in sorted order.
    async fn build_listing(
        self,
        keys: KeySet,
        rows: Option<RowMap>,
        signal: Option<AbortSignal>,
    ) -> Result<Vec<ItemRecord>> {
        let signal = signal.as_ref();
        let rows = match rows {
            Some(rows) => rows,
            None => self.items(keys.ids().iter().copied(), signal).await?,
        };
        let levels = self.item_levels(keys.ids().iter().copied(), signal).await?;

        let mut order: Vec<ItemId> = keys
            .ids()
            .iter()
            .copied()
            .filter(|id| rows.contains_key(id))
            .collect();
        sort_by_level(&mut order, &levels);

        let patches = self.patches(order.iter().copied(), signal).await?;
        let marketable = self.marketable(order.iter().copied(), signal).await?;

        let name_column = &self.inner.config.collections.name_column;
        Ok(order
            .into_iter()
            .map(|id| ItemRecord {
                id,
                name: rows
                    .get(&id)
                    .and_then(|row| row.get(name_column))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                item_level: levels.get(&id).copied().flatten(),
                patch: patches.get(&id).copied().flatten(),
                marketable: marketable.get(&id).copied().unwrap_or(false),
            })
            .collect())
    }

    /// Drop every cached entry and in-flight registration.
    pub fn clear(&self) {
        self.inner.store.clear();
    }

    /// Snapshot of counters and store gauges.
    pub fn stats(&self) -> CacheStats {
        let store = &self.inner.store;
        CacheStats {
            entries: store.entry_count(),
            in_flight: store.in_flight_count(),
            generation: store.generation(),
            ..self.inner.stats.snapshot()
        }
    }
}
