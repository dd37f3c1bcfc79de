// SPDX-License-Identifier: PMPL-1.0-or-later
//! The cache store: resolved entries and in-flight resolutions.
//!
//! Two typed maps, `QueryKind -> NormalizedKey -> _`, one for resolved
//! [`CacheEntry`] values and one for [`InFlightHandle`]s, plus a per-kind
//! row accumulator for kinds whose results are folded into an "everything
//! seen so far" view. The accumulator also remembers ids a resolution asked
//! for and did not get back, so they are not fetched again.
//!
//! All state sits behind one `std::sync::Mutex`. No critical section spans an
//! `.await`. Lookup, join and registration happen in a single critical
//! section, so two callers can never both start a resolution for the same
//! `(kind, key)`. The resolver itself is launched after the lock is
//! released.
//!
//! `clear()` bumps a generation counter; resolutions that started under an
//! older generation finish normally but do not publish.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bazaar_remote::Row;
use chrono::Utc;
use tracing::{debug, info};

use crate::flight::{PendingFlight, SharedOutcome};
use crate::key::{ItemId, KeySet, NormalizedKey};
use crate::kind::QueryKind;
use crate::value::{CacheEntry, CachedValue, RowMap};

/// A resolution currently in progress for one `(kind, key)`.
#[derive(Clone)]
pub struct InFlightHandle {
    pub flight_id: u64,
    pub generation: u64,
    pub outcome: SharedOutcome,
}

/// Identifies one registered resolution. Held by the resolver task and used
/// to publish its result and release its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightTicket {
    pub kind: QueryKind,
    pub key: NormalizedKey,
    pub flight_id: u64,
    pub generation: u64,
}

/// Result of [`CacheStore::begin`].
pub enum Begin {
    /// A resolved entry already exists.
    Hit(CacheEntry),
    /// Another caller's resolution is in flight; await its outcome.
    Joined(SharedOutcome),
    /// A new resolution was registered; launch it with
    /// [`flight::launch`](crate::flight::launch), then await its outcome.
    Started(SharedOutcome, PendingFlight),
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<QueryKind, HashMap<NormalizedKey, CacheEntry>>,
    in_flight: HashMap<QueryKind, HashMap<NormalizedKey, InFlightHandle>>,
    /// `None` marks an id that was requested and came back without a row.
    accumulators: HashMap<QueryKind, BTreeMap<ItemId, Option<Row>>>,
    generation: u64,
    next_flight_id: u64,
}

impl StoreInner {
    fn insert_entry(&mut self, kind: QueryKind, key: NormalizedKey, value: CachedValue) {
        if kind.accumulates() {
            if let CachedValue::Rows(rows) = &value {
                let acc = self.accumulators.entry(kind).or_default();
                for (id, row) in rows.iter() {
                    acc.insert(*id, Some(row.clone()));
                }
                // Accumulating kinds are keyed by their id set.
                for id in KeySet::from_strs(key.as_str().split(',')).ids() {
                    acc.entry(*id).or_insert(None);
                }
            }
        }
        let entry = CacheEntry {
            kind,
            key: key.clone(),
            value,
            cached_at: Utc::now(),
        };
        self.entries.entry(kind).or_default().insert(key, entry);
    }
}

/// Per-service cache state. Construct one per [`MarketCache`](crate::market::MarketCache)
/// and share it by `Arc`.
#[derive(Default)]
pub struct CacheStore {
    inner: Mutex<StoreInner>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a resolved entry.
    pub fn get(&self, kind: QueryKind, key: &NormalizedKey) -> Option<CacheEntry> {
        self.lock()
            .entries
            .get(&kind)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    /// Store a resolved value, replacing any previous entry. Rows of
    /// accumulating kinds are also folded into the kind's accumulator.
    pub fn put(&self, kind: QueryKind, key: NormalizedKey, value: CachedValue) {
        debug!(%kind, %key, size = value.len(), "Caching resolved value");
        self.lock().insert_entry(kind, key, value);
    }

    /// Split `ids` into rows already known to the accumulator of `kind` and
    /// ids never resolved, preserving the order of `ids`. Ids resolved
    /// without a row are in neither.
    pub fn accumulated(&self, kind: QueryKind, ids: &[ItemId]) -> (RowMap, Vec<ItemId>) {
        let inner = self.lock();
        let mut known = RowMap::new();
        let mut missing = Vec::new();
        let acc = inner.accumulators.get(&kind);
        for id in ids {
            match acc.and_then(|acc| acc.get(id)) {
                Some(Some(row)) => {
                    known.insert(*id, row.clone());
                }
                Some(None) => {}
                None => missing.push(*id),
            }
        }
        (known, missing)
    }

    /// Number of ids the accumulator of `kind` has resolved, with or
    /// without a row.
    pub fn accumulated_len(&self, kind: QueryKind) -> usize {
        self.lock().accumulators.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Hit, join, or register in one critical section.
    ///
    /// On a miss the returned [`PendingFlight`] must be launched by the
    /// caller; its waiters see [`CacheError::ResolverFailed`] if it is
    /// dropped unlaunched.
    ///
    /// [`CacheError::ResolverFailed`]: crate::error::CacheError::ResolverFailed
    pub fn begin(&self, kind: QueryKind, key: &NormalizedKey) -> Begin {
        let mut inner = self.lock();

        if let Some(entry) = inner.entries.get(&kind).and_then(|e| e.get(key)) {
            return Begin::Hit(entry.clone());
        }
        if let Some(handle) = inner.in_flight.get(&kind).and_then(|f| f.get(key)) {
            return Begin::Joined(handle.outcome.clone());
        }

        inner.next_flight_id += 1;
        let ticket = FlightTicket {
            kind,
            key: key.clone(),
            flight_id: inner.next_flight_id,
            generation: inner.generation,
        };
        let (pending, outcome) = PendingFlight::new(ticket);
        let handle = InFlightHandle {
            flight_id: pending.ticket.flight_id,
            generation: pending.ticket.generation,
            outcome: outcome.clone(),
        };
        inner
            .in_flight
            .entry(kind)
            .or_default()
            .insert(key.clone(), handle);
        Begin::Started(outcome, pending)
    }

    /// Store the result of the resolution identified by `ticket`, unless the
    /// store was cleared after it started. Returns whether it was stored.
    pub fn publish(&self, ticket: &FlightTicket, value: CachedValue) -> bool {
        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            debug!(
                kind = %ticket.kind,
                key = %ticket.key,
                "Discarding result of a resolution started before clear"
            );
            return false;
        }
        inner.insert_entry(ticket.kind, ticket.key.clone(), value);
        true
    }

    /// Release the in-flight slot of `ticket`. Only removes the handle that
    /// ticket registered. Returns whether a handle was removed.
    pub fn resolve_in_flight(&self, ticket: &FlightTicket) -> bool {
        let mut inner = self.lock();
        let Some(flights) = inner.in_flight.get_mut(&ticket.kind) else {
            return false;
        };
        match flights.get(&ticket.key) {
            Some(handle) if handle.flight_id == ticket.flight_id => {
                flights.remove(&ticket.key);
                true
            }
            _ => false,
        }
    }

    /// Wipe every entry, accumulator and in-flight registration.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let entries: usize = inner.entries.values().map(HashMap::len).sum();
        inner.entries.clear();
        inner.accumulators.clear();
        inner.in_flight.clear();
        inner.generation += 1;
        info!(
            dropped = entries,
            generation = inner.generation,
            "Cache cleared"
        );
    }

    pub fn entry_count(&self) -> usize {
        self.lock().entries.values().map(HashMap::len).sum()
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.values().map(HashMap::len).sum()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}
