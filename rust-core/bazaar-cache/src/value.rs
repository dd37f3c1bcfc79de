// SPDX-License-Identifier: PMPL-1.0-or-later
//! Cached payloads.
//!
//! Every resolved query is stored as one immutable [`CachedValue`]. The
//! payload is `Arc`-shared so handing it to many callers is cheap; typed
//! access goes through [`Cacheable`].

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use bazaar_remote::Row;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::{ItemId, KeySet, NormalizedKey};
use crate::kind::QueryKind;

/// Rows keyed by their own identity column.
pub type RowMap = BTreeMap<ItemId, Row>;

/// A numeric attribute per id; `None` means unknown.
pub type AttributeMap = BTreeMap<ItemId, Option<i64>>;

/// A boolean flag per id.
pub type FlagMap = BTreeMap<ItemId, bool>;

/// A joined item record, as produced by the listing queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub name: String,
    pub item_level: Option<i64>,
    pub patch: Option<i64>,
    pub marketable: bool,
}

/// The resolved payload of one cache entry.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Rows(Arc<RowMap>),
    Keys(Arc<KeySet>),
    Attributes(Arc<AttributeMap>),
    Flags(Arc<FlagMap>),
    Records(Arc<Vec<ItemRecord>>),
}

impl CachedValue {
    /// Number of keys, ids or records held.
    pub fn len(&self) -> usize {
        match self {
            CachedValue::Rows(rows) => rows.len(),
            CachedValue::Keys(keys) => keys.len(),
            CachedValue::Attributes(attrs) => attrs.len(),
            CachedValue::Flags(flags) => flags.len(),
            CachedValue::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A resolved query result. Never mutated once stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub kind: QueryKind,
    pub key: NormalizedKey,
    pub value: CachedValue,
    pub cached_at: DateTime<Utc>,
}

/// Conversion between a typed result and its cached payload.
pub trait Cacheable: Sized + Send + Sync + 'static {
    fn into_cached(self) -> CachedValue;

    /// `None` when `value` holds a different shape.
    fn from_cached(value: &CachedValue) -> Option<Self>;
}

impl Cacheable for RowMap {
    fn into_cached(self) -> CachedValue {
        CachedValue::Rows(Arc::new(self))
    }

    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::Rows(rows) => Some(rows.as_ref().clone()),
            _ => None,
        }
    }
}

impl Cacheable for KeySet {
    fn into_cached(self) -> CachedValue {
        CachedValue::Keys(Arc::new(self))
    }

    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::Keys(keys) => Some(keys.as_ref().clone()),
            _ => None,
        }
    }
}

impl Cacheable for AttributeMap {
    fn into_cached(self) -> CachedValue {
        CachedValue::Attributes(Arc::new(self))
    }

    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::Attributes(attrs) => Some(attrs.as_ref().clone()),
            _ => None,
        }
    }
}

impl Cacheable for FlagMap {
    fn into_cached(self) -> CachedValue {
        CachedValue::Flags(Arc::new(self))
    }

    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::Flags(flags) => Some(flags.as_ref().clone()),
            _ => None,
        }
    }
}

impl Cacheable for Vec<ItemRecord> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Records(Arc::new(self))
    }

    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::Records(records) => Some(records.as_ref().clone()),
            _ => None,
        }
    }
}

/// Listing order: level descending, unknown levels last, ties by id descending.
pub fn level_order(a: (ItemId, Option<i64>), b: (ItemId, Option<i64>)) -> Ordering {
    let by_level = match (a.1, b.1) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_level.then_with(|| b.0.cmp(&a.0))
}

/// Sort `ids` into listing order using `levels`; ids absent from `levels`
/// count as unknown.
pub fn sort_by_level(ids: &mut [ItemId], levels: &AttributeMap) {
    ids.sort_by(|a, b| {
        let la = levels.get(a).copied().flatten();
        let lb = levels.get(b).copied().flatten();
        level_order((*a, la), (*b, lb))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_through_cached_value() {
        let mut levels = AttributeMap::new();
        levels.insert(1, Some(90));
        levels.insert(2, None);

        let cached = levels.clone().into_cached();
        assert_eq!(cached.len(), 2);
        assert_eq!(AttributeMap::from_cached(&cached), Some(levels));
    }

    #[test]
    fn test_shape_mismatch_is_none() {
        let cached = FlagMap::new().into_cached();
        assert!(cached.is_empty());
        assert!(RowMap::from_cached(&cached).is_none());
        assert!(KeySet::from_cached(&cached).is_none());
        assert!(Vec::<ItemRecord>::from_cached(&cached).is_none());
    }

    #[test]
    fn test_rows_payload_is_shared() {
        let mut rows = RowMap::new();
        rows.insert(7, json!({"id": 7}).as_object().cloned().unwrap());
        let cached = rows.into_cached();
        let copy = cached.clone();
        match (&cached, &copy) {
            (CachedValue::Rows(a), CachedValue::Rows(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected rows"),
        }
    }

    #[test]
    fn test_level_order_nulls_last_and_id_tiebreak() {
        let mut levels = AttributeMap::new();
        levels.insert(1, Some(50));
        levels.insert(2, Some(90));
        levels.insert(3, None);
        levels.insert(4, Some(90));
        levels.insert(5, None);

        let mut ids = vec![1, 2, 3, 4, 5, 6];
        sort_by_level(&mut ids, &levels);
        // 6 has no entry at all and sorts with the unknowns.
        assert_eq!(ids, vec![4, 2, 1, 6, 5, 3]);
    }
}
