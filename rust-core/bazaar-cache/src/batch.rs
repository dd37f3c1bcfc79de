// SPDX-License-Identifier: PMPL-1.0-or-later
//! Batch query executor.
//!
//! Resolves id sets, search terms and reverse lookups against a
//! [`RemoteStore`]. Id sets are split into chunks no larger than the
//! configured ceiling and issued one `in` query at a time, in caller order.
//! Rows are merged by their own identity column.
//!
//! Failures are absorbed at the smallest granularity: a failing chunk counts
//! as zero rows, a failing search or single-row lookup as no match. Only
//! abort propagates. The optional signal is checked before and after every
//! remote call.

use std::collections::HashSet;
use std::sync::Arc;

use bazaar_remote::{Predicate, QueryRequest, RemoteStore, Row};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::abort::{self, AbortSignal};
use crate::config::Collections;
use crate::error::Result;
use crate::key::{search_patterns, ItemId, KeySet};
use crate::stats::StatsCounters;
use crate::value::{AttributeMap, FlagMap, RowMap};

/// Runs chunked remote queries on behalf of the cache.
pub struct BatchExecutor<S> {
    remote: S,
    chunk_size: usize,
    search_limit: usize,
    collections: Collections,
    stats: Arc<StatsCounters>,
}

impl<S: RemoteStore> BatchExecutor<S> {
    pub fn new(
        remote: S,
        chunk_size: usize,
        search_limit: usize,
        collections: Collections,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            remote,
            chunk_size: chunk_size.max(1),
            search_limit,
            collections,
            stats,
        }
    }

    pub fn remote(&self) -> &S {
        &self.remote
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    /// Issue one query. `Ok(None)` means it failed and the failure was
    /// absorbed.
    async fn run(
        &self,
        request: QueryRequest,
        signal: Option<&AbortSignal>,
    ) -> Result<Option<Vec<Row>>> {
        abort::check(signal)?;
        self.stats.record_remote_query();
        let result = self.remote.query(&request).await;
        abort::check(signal)?;

        match result {
            Ok(rows) => {
                debug!(
                    store = self.remote.name(),
                    collection = %request.collection,
                    rows = rows.len(),
                    "Remote query answered"
                );
                Ok(Some(rows))
            }
            Err(e) => {
                self.stats.record_failed_chunk();
                warn!(
                    store = self.remote.name(),
                    collection = %request.collection,
                    error = %e,
                    "Remote query failed, treating as empty"
                );
                Ok(None)
            }
        }
    }

    /// Fetch full rows for `keys` from `collection`, chunked.
    pub async fn fetch_rows(
        &self,
        collection: &str,
        keys: &KeySet,
        signal: Option<&AbortSignal>,
    ) -> Result<RowMap> {
        let id_column = &self.collections.id_column;
        let mut merged = RowMap::new();

        for (index, chunk) in keys.chunks(self.chunk_size).enumerate() {
            let request = QueryRequest::new(collection)
                .filter(Predicate::in_list(id_column, chunk.iter().copied()));
            let Some(rows) = self.run(request, signal).await? else {
                continue;
            };
            let requested: HashSet<ItemId> = chunk.iter().copied().collect();
            for row in rows {
                let Some(id) = row_id(&row, id_column) else {
                    warn!(collection, chunk = index, "Dropping row without a valid id");
                    continue;
                };
                if !requested.contains(&id) {
                    debug!(collection, id, "Dropping row outside the requested chunk");
                    continue;
                }
                merged
                    .entry(id)
                    .or_insert_with(|| normalize_row(row, &self.collections.jobs_column));
            }
        }
        Ok(merged)
    }

    /// Fetch one row by id. Any failure reads as not found.
    pub async fn fetch_one(
        &self,
        collection: &str,
        id: ItemId,
        signal: Option<&AbortSignal>,
    ) -> Result<Option<Row>> {
        let id_column = &self.collections.id_column;
        let request = QueryRequest::new(collection)
            .filter(Predicate::eq(id_column, id))
            .with_limit(1);
        let rows = self.run(request, signal).await?.unwrap_or_default();
        Ok(rows
            .into_iter()
            .find(|row| row_id(row, id_column) == Some(id))
            .map(|row| normalize_row(row, &self.collections.jobs_column)))
    }

    /// Free-text search over item names. Every pattern from
    /// [`search_patterns`] must match.
    pub async fn search(
        &self,
        term: &str,
        fuzzy: bool,
        signal: Option<&AbortSignal>,
    ) -> Result<RowMap> {
        let patterns = search_patterns(term, fuzzy);
        if patterns.is_empty() {
            return Ok(RowMap::new());
        }

        let c = &self.collections;
        let request = patterns.iter().fold(
            QueryRequest::new(&c.items).with_limit(self.search_limit),
            |req, pattern| req.filter(Predicate::ilike(&c.name_column, pattern)),
        );
        let rows = self.run(request, signal).await?.unwrap_or_default();

        let mut merged = RowMap::new();
        for row in rows {
            match row_id(&row, &c.id_column) {
                Some(id) => {
                    merged
                        .entry(id)
                        .or_insert_with(|| normalize_row(row, &c.jobs_column));
                }
                None => warn!(collection = %c.items, "Dropping search row without a valid id"),
            }
        }
        Ok(merged)
    }

    /// Resolve a numeric attribute for `keys`.
    ///
    /// Non-integer values are unknown. A value equal to its own row id means
    /// the id column was read in place of the attribute; it is suppressed.
    pub async fn fetch_attribute(
        &self,
        collection: &str,
        column: &str,
        keys: &KeySet,
        signal: Option<&AbortSignal>,
    ) -> Result<AttributeMap> {
        let id_column = &self.collections.id_column;
        let mut merged = AttributeMap::new();

        for chunk in keys.chunks(self.chunk_size) {
            let request = QueryRequest::new(collection)
                .with_columns([id_column.as_str(), column])
                .filter(Predicate::in_list(id_column, chunk.iter().copied()));
            let Some(rows) = self.run(request, signal).await? else {
                continue;
            };
            let requested: HashSet<ItemId> = chunk.iter().copied().collect();
            for row in rows {
                let Some(id) = row_id(&row, id_column).filter(|id| requested.contains(id)) else {
                    continue;
                };
                let value = match row.get(column).and_then(integer_value) {
                    Some(v) if v == id => {
                        self.stats.record_suppressed_value();
                        error!(
                            collection,
                            column,
                            id,
                            "Attribute equals its own row id, suppressing (swapped column?)"
                        );
                        None
                    }
                    other => other,
                };
                merged.entry(id).or_insert(value);
            }
        }
        Ok(merged)
    }

    /// Presence flags: `true` for every id found in `collection`, `false`
    /// for the rest. Every requested id appears in the result.
    pub async fn fetch_presence(
        &self,
        collection: &str,
        keys: &KeySet,
        signal: Option<&AbortSignal>,
    ) -> Result<FlagMap> {
        let id_column = &self.collections.id_column;
        let mut flags: FlagMap = keys.ids().iter().map(|id| (*id, false)).collect();

        for chunk in keys.chunks(self.chunk_size) {
            let request = QueryRequest::new(collection)
                .with_columns([id_column.as_str()])
                .filter(Predicate::in_list(id_column, chunk.iter().copied()));
            let Some(rows) = self.run(request, signal).await? else {
                continue;
            };
            for id in rows.iter().filter_map(|row| row_id(row, id_column)) {
                if let Some(flag) = flags.get_mut(&id) {
                    *flag = true;
                }
            }
        }
        Ok(flags)
    }

    /// Ids of rows in `collection` whose `column` is any of `values`.
    pub async fn fetch_reverse(
        &self,
        collection: &str,
        column: &str,
        values: &[Value],
        signal: Option<&AbortSignal>,
    ) -> Result<KeySet> {
        let id_column = &self.collections.id_column;
        let mut ids = Vec::new();

        for chunk in values.chunks(self.chunk_size) {
            let request = QueryRequest::new(collection)
                .with_columns([id_column.as_str()])
                .filter(Predicate::in_list(column, chunk.iter().cloned()));
            if let Some(rows) = self.run(request, signal).await? {
                ids.extend(rows.iter().filter_map(|row| row_id(row, id_column)));
            }
        }
        Ok(KeySet::from_ids(ids))
    }

    /// Ids of rows in `collection` whose array `column` contains any of
    /// `codes`. One query per code.
    pub async fn fetch_containing(
        &self,
        collection: &str,
        column: &str,
        codes: &[String],
        signal: Option<&AbortSignal>,
    ) -> Result<KeySet> {
        let id_column = &self.collections.id_column;
        let mut ids = Vec::new();

        for code in codes {
            let request = QueryRequest::new(collection)
                .with_columns([id_column.as_str()])
                .filter(Predicate::contains(column, code.as_str()));
            if let Some(rows) = self.run(request, signal).await? {
                ids.extend(rows.iter().filter_map(|row| row_id(row, id_column)));
            }
        }
        Ok(KeySet::from_ids(ids))
    }
}

/// A row's positive integer identity, from a number or a numeric string.
pub fn row_id(row: &Row, id_column: &str) -> Option<ItemId> {
    integer_value(row.get(id_column)?).filter(|id| *id > 0)
}

/// An integer cell value. Fractional numbers and non-numeric strings are
/// not integers.
fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Decode a `jobs` column delivered as a JSON-encoded string. Unparsable
/// payloads become an empty list.
pub fn normalize_row(mut row: Row, jobs_column: &str) -> Row {
    if let Some(Value::String(raw)) = row.get(jobs_column) {
        let decoded = match serde_json::from_str::<Vec<Value>>(raw) {
            Ok(jobs) => Value::Array(jobs),
            Err(e) => {
                warn!(
                    column = jobs_column,
                    payload = %raw,
                    error = %e,
                    "Malformed job list, treating as empty"
                );
                Value::Array(Vec::new())
            }
        };
        row.insert(jobs_column.to_string(), decoded);
    }
    row
}
